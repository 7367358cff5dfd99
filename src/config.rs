use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::info;

pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            max_connections: try_load("TOWNHALL_DB_MAX_CONNECTIONS", "5")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_fall_back_to_default() {
        let value: u32 = try_load("TOWNHALL_TEST_UNSET_KEY", "5").unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn invalid_values_are_errors() {
        let result: anyhow::Result<u32> = try_load("TOWNHALL_TEST_UNSET_KEY", "many");
        assert!(result.unwrap_err().to_string().contains("TOWNHALL_TEST_UNSET_KEY"));
    }

    #[test]
    fn database_url_is_required_only_when_asked_for() {
        let config = Config {
            database_url: None,
            max_connections: 5,
        };
        assert!(config.database_url().is_err());
    }
}
