//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use study_tracker_core::calendar::LocalDateNormalizer;
use study_tracker_core::ports::DatabaseService;
use utoipa::IntoParams;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// The normalizer for one request: the caller's own offset when it sent
    /// one, the configured default otherwise.
    pub fn normalizer(
        &self,
        utc_offset_minutes: Option<i32>,
    ) -> Result<LocalDateNormalizer, (StatusCode, String)> {
        match utc_offset_minutes {
            None => Ok(self.config.default_normalizer),
            Some(minutes) => LocalDateNormalizer::from_offset_minutes(minutes).ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("utcOffsetMinutes {} is out of range", minutes),
                )
            }),
        }
    }
}

/// Query parameters for endpoints whose only calendar input is the caller's offset.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct OffsetQuery {
    /// East-positive minutes from UTC, e.g. `-300` for UTC-05:00.
    pub utc_offset_minutes: Option<i32>,
}

/// Parses a client-supplied instant, naming the offending field on failure.
pub fn parse_instant_param(
    normalizer: &LocalDateNormalizer,
    field: &str,
    raw: &str,
) -> Result<DateTime<Utc>, (StatusCode, String)> {
    normalizer
        .parse_instant(raw)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Invalid {}: '{}'", field, raw)))
}

/// Parses a client-supplied calendar day. Full instants are accepted and
/// reduced to their local date.
pub fn parse_day_param(
    normalizer: &LocalDateNormalizer,
    field: &str,
    raw: &str,
) -> Result<NaiveDate, (StatusCode, String)> {
    let at = parse_instant_param(normalizer, field, raw)?;
    normalizer
        .to_local_calendar_date(at)
        .ok_or_else(|| out_of_range(field))
}

/// The error for a calendar value that cannot be shifted or widened to a week.
pub fn out_of_range(field: &str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("{} is out of range", field))
}
