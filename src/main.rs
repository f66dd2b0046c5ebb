pub mod appointments;
pub mod auth;
pub mod config;
pub mod err;
pub mod feedback;
pub mod models;
pub mod profile;
pub mod resources;
pub mod sos;
pub mod telephony;
pub mod tracking;

use axum::handler::Handler;
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json, Router};

use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;

use crate::config::Config;
use crate::err::{Fine, Maybe, Nothing};
use crate::telephony::Telephony;

pub use crate::err::Error;

pub type Payload<T> = axum::response::Result<Json<Maybe<T>>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Fine(value)))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Ok(Json(Nothing(err)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::load()?;

    let pg = PgPoolOptions::new()
        .max_connections(8)
        .connect(&config.database_url)
        .await?;
    let telephony = Telephony::new(&config);

    let students = Router::new()
        .route("/signup", post(auth::register_student))
        .route("/login", post(auth::login_student))
        .route("/logout", post(auth::logout_student))
        .route("/password/reset", post(auth::reset_password))
        .route("/password/change", post(auth::change_password))
        .route(
            "/profile",
            get(profile::read_profile).put(profile::update_profile),
        )
        .route("/counselors", get(appointments::list_counselors))
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::book_appointment),
        )
        .route("/appointments/:id", delete(appointments::cancel_appointment))
        .route("/mood", get(tracking::list_moods).post(tracking::record_mood))
        .route(
            "/mood/:id",
            put(tracking::update_mood).delete(tracking::delete_mood),
        )
        .route("/habits", get(tracking::list_habits).post(tracking::log_habit))
        .route(
            "/habits/:id",
            put(tracking::update_habit).delete(tracking::delete_habit),
        )
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::submit_feedback),
        )
        .route("/resources", get(resources::list_resources))
        .route("/sos", get(sos::list_sos_logs).post(sos::trigger_sos));

    let app = Router::new()
        .nest("/api/students", students)
        .fallback(err::handler404.into_service())
        .layer(Extension(pg))
        .layer(Extension(telephony));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    log::info!("Starting MindMate HTTP Server on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
