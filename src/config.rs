use std::env;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            port: try_load("MINDMATE_PORT", "3000"),
            database_url: require("DATABASE_URL")?,
            twilio_account_sid: require("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: require("TWILIO_AUTH_TOKEN")?,
            twilio_from_number: require("TWILIO_FROM_NUMBER")?,
        })
    }
}

fn require(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Environment variable {} is not set", key))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            log::info!("{} not set, using default: {}", key, default);
            default.to_string()
        })
        .parse()
        .unwrap_or_else(|e| panic!("Invalid {} value: {}", key, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_falls_back_to_default() {
        env::remove_var("MINDMATE_PORT");
        let port: u16 = try_load("MINDMATE_PORT", "3000");
        assert_eq!(port, 3000);
    }

    #[test]
    fn missing_required_var_errors() {
        env::remove_var("MINDMATE_NO_SUCH_VAR");
        assert!(require("MINDMATE_NO_SUCH_VAR").is_err());
    }
}
