// src/config.rs
use serde::Deserialize;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub database_min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub database_acquire_timeout_secs: u64,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    #[serde(default = "default_program_cache_capacity")]
    pub program_cache_capacity: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),
    #[error("JWT_SECRET must be at least 32 bytes")]
    WeakSecret,
    #[error("TOKEN_TTL_DAYS must be positive")]
    InvalidTokenTtl,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Config = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        if self.token_ttl_days <= 0 {
            return Err(ConfigError::InvalidTokenTtl);
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database_acquire_timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_program_cache_capacity() -> u64 {
    100
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/strength_tracker_test".to_string(),
        jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        host: default_host(),
        port: default_port(),
        database_max_connections: 2,
        database_min_connections: 0,
        database_acquire_timeout_secs: 1,
        token_ttl_days: default_token_ttl_days(),
        program_cache_capacity: 10,
    }
}
