use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub max_db_connections: u32,
    pub request_timeout_secs: u64,
    pub settlement_rate_limit: u32,
    pub settlement_rate_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/gigledger".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            max_db_connections: env_parse("MAX_DB_CONNECTIONS", 20)?,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 15)?,
            settlement_rate_limit: env_parse("SETTLEMENT_RATE_LIMIT", 30)?,
            settlement_rate_window_secs: env_parse("SETTLEMENT_RATE_WINDOW_SECS", 60)?,
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            config::ConfigError::Message(format!("{} is not a valid value for {}", raw, key))
        }),
        Err(_) => Ok(default),
    }
}
