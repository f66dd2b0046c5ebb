use axum::extract::Query;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, TypedHeader};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::require_session;
use crate::models::Resource;
use crate::{proceeds, Error, Payload};

/// Read-only catalogue of self-help materials. Students can filter it but
/// never mutate it.
pub async fn list_resources(
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(filter): Query<ResourceFilter>,
    Extension(pg): Extension<PgPool>,
) -> Payload<ResourceList> {
    require_session(bearer.token(), &pg).await?;

    let resources = sqlx::query_as::<_, Resource>(
        "SELECT * FROM resources \
         WHERE ($1::TEXT IS NULL OR kind = $1) AND ($2::TEXT IS NULL OR language = $2) \
         ORDER BY title",
    )
    .bind(&filter.kind)
    .bind(&filter.language)
    .fetch_all(&pg)
    .await
    .map_err(Error::from)?;

    proceeds(ResourceList { resources })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceFilter {
    pub kind: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceList {
    pub resources: Vec<Resource>,
}
