//! services/api/src/web/stats.rs
//!
//! Weekly progress over topics, overall and per track.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use study_tracker_core::aggregate::weekly_stats;
use study_tracker_core::domain::{Record, Topic};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::rest::Totals;
use crate::web::state::{out_of_range, parse_instant_param, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WeeklyStatsQuery {
    /// Restrict the rollup to one track.
    pub track_id: Option<Uuid>,
    /// Any day or instant inside the wanted week; defaults to now.
    pub date: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatsResponse {
    pub track_id: Uuid,
    pub track_name: Option<String>,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStatsResponse {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
    pub by_track: Vec<TrackStatsResponse>,
}

/// GET /stats/weekly - Topic progress for the week containing `date`.
///
/// A topic counts toward the week once when its scheduled date or its last
/// study session falls inside it. Minutes are the target minutes of completed
/// topics.
#[utoipa::path(
    get,
    path = "/stats/weekly",
    params(WeeklyStatsQuery),
    responses(
        (status = 200, description = "Weekly rollup", body = WeeklyStatsResponse),
        (status = 400, description = "Malformed date or offset")
    )
)]
pub async fn weekly_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<WeeklyStatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let reference = match params.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_instant_param(&normalizer, "date", raw)?,
        None => Utc::now(),
    };

    let topics = state
        .db
        .list_topics(user_id, params.track_id)
        .await
        .map_err(|e| port_failure("Failed to compute weekly stats", e))?;
    let tracks = state
        .db
        .list_tracks(user_id)
        .await
        .map_err(|e| port_failure("Failed to compute weekly stats", e))?;

    let records: Vec<Record> = topics.iter().map(Topic::to_record).collect();
    let stats = weekly_stats(
        &records,
        user_id,
        reference,
        state.config.week_start,
        &normalizer,
    )
    .ok_or_else(|| out_of_range("date"))?;

    let names: HashMap<Uuid, String> = tracks.into_iter().map(|t| (t.id, t.name)).collect();
    let by_track = stats
        .by_group
        .into_iter()
        .filter_map(|(key, totals)| {
            key.map(|track_id| TrackStatsResponse {
                track_id,
                track_name: names.get(&track_id).cloned(),
                totals: totals.into(),
            })
        })
        .collect();

    Ok(Json(WeeklyStatsResponse {
        week_start: stats.window.start_date(),
        week_end: stats.window.end_date(),
        totals: stats.totals.into(),
        by_track,
    }))
}
