//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::{Local, Offset, Weekday};
use std::net::SocketAddr;
use study_tracker_core::calendar::{week_start_from_index, LocalDateNormalizer};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub week_start: Weekday,
    /// Used when a request does not carry its own `utcOffsetMinutes`.
    pub default_normalizer: LocalDateNormalizer,
    pub session_ttl_days: i64,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Calendar Settings ---
        let week_start_str = std::env::var("WEEK_START_DAY").unwrap_or_else(|_| "0".to_string());
        let week_start = week_start_str
            .parse::<u8>()
            .ok()
            .and_then(week_start_from_index)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "WEEK_START_DAY".to_string(),
                    format!("'{}' is not a weekday index in 0..=6", week_start_str),
                )
            })?;

        // The host's offset right now stands in for the user's zone when
        // nothing else is configured.
        let default_normalizer = match std::env::var("UTC_OFFSET_MINUTES") {
            Ok(raw) => raw
                .parse::<i32>()
                .ok()
                .and_then(LocalDateNormalizer::from_offset_minutes)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "UTC_OFFSET_MINUTES".to_string(),
                        format!("'{}' is not an offset in -840..=840", raw),
                    )
                })?,
            Err(_) => LocalDateNormalizer::new(Local::now().offset().fix()),
        };

        let session_ttl_str =
            std::env::var("SESSION_TTL_DAYS").unwrap_or_else(|_| "30".to_string());
        let session_ttl_days = session_ttl_str
            .parse::<i64>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue("SESSION_TTL_DAYS".to_string(), session_ttl_str.clone())
            })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            week_start,
            default_normalizer,
            session_ttl_days,
            cors_origin,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            log_level: Level::INFO,
            week_start: Weekday::Sun,
            default_normalizer: LocalDateNormalizer::utc(),
            session_ttl_days: 30,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}
