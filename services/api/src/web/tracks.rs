//! services/api/src/web/tracks.rs
//!
//! Track management and first-run seeding of the default curriculum.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use study_tracker_core::domain::Track;
use study_tracker_core::ports::{NewTopic, TrackPatch};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::rest::MessageResponse;
use crate::web::state::AppState;

/// The tracks every new user can start from, with each topic's target minutes.
pub const DEFAULT_TRACKS: &[(&str, &[(&str, u32)])] = &[
    (
        "JavaScript Fundamentals",
        &[
            ("Hello, world!", 15),
            ("Code structure", 15),
            ("The modern mode, \"use strict\"", 15),
            ("Variables", 15),
            ("Data types", 15),
            ("Interaction: alert, prompt, confirm", 15),
            ("Type Conversions", 15),
            ("Basic operators, maths", 15),
            ("Comparisons", 15),
            ("Conditional branching: if, '?'", 15),
            ("Logical operators", 15),
            ("Nullish coalescing operator '??'", 15),
            ("Loops: while and for", 15),
        ],
    ),
    (
        "MCP Learning",
        &[
            ("Introduction to MCP", 20),
            ("MCP Architecture Overview", 30),
            ("Building Your First MCP Server", 45),
            ("MCP Client Integration", 30),
        ],
    ),
    (
        "CSS MDN Guides",
        &[
            ("CSS Basics", 20),
            ("CSS Selectors", 25),
            ("The Box Model", 30),
            ("Flexbox Layout", 35),
            ("Grid Layout", 35),
            ("CSS Positioning", 25),
            ("Responsive Design", 30),
            ("CSS Variables", 20),
        ],
    ),
];

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct TrackRequest {
    pub name: String,
}

/// Both fields are optional; an empty body leaves the track as it is.
#[derive(Deserialize, ToSchema)]
pub struct UpdateTrackRequest {
    pub name: Option<String>,
    /// Display position, zero or greater.
    pub order: Option<i64>,
}

impl UpdateTrackRequest {
    fn into_patch(self) -> Result<TrackPatch, (StatusCode, String)> {
        let name = self
            .name
            .as_deref()
            .map(required_name)
            .transpose()?
            .map(str::to_string);
        let order = self.order.map(track_order).transpose()?;
        Ok(TrackPatch { name, order })
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub id: Uuid,
    pub name: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub total_topics: usize,
    pub completed_topics: usize,
}

impl TrackResponse {
    fn new(track: Track, total_topics: usize, completed_topics: usize) -> Self {
        Self {
            id: track.id,
            name: track.name,
            order: track.order,
            created_at: track.created_at,
            total_topics,
            completed_topics,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SeedResponse {
    pub message: String,
    pub tracks: Vec<TrackResponse>,
}

fn required_name(name: &str) -> Result<&str, (StatusCode, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Track name is required".to_string()));
    }
    Ok(name)
}

fn track_order(raw: i64) -> Result<i32, (StatusCode, String)> {
    i32::try_from(raw).ok().filter(|order| *order >= 0).ok_or((
        StatusCode::BAD_REQUEST,
        format!("order must be between 0 and {}", i32::MAX),
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /tracks - The user's tracks in display order, with topic progress counts.
#[utoipa::path(
    get,
    path = "/tracks",
    responses(
        (status = 200, description = "Tracks of the current user", body = [TrackResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_tracks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let tracks = state
        .db
        .list_tracks(user_id)
        .await
        .map_err(|e| port_failure("Failed to fetch tracks", e))?;
    let topics = state
        .db
        .list_topics(user_id, None)
        .await
        .map_err(|e| port_failure("Failed to fetch tracks", e))?;

    let mut counts: HashMap<Uuid, (usize, usize)> = HashMap::new();
    for topic in &topics {
        let entry = counts.entry(topic.track_id).or_default();
        entry.0 += 1;
        if topic.completed {
            entry.1 += 1;
        }
    }

    let response: Vec<TrackResponse> = tracks
        .into_iter()
        .map(|track| {
            let (total, completed) = counts.get(&track.id).copied().unwrap_or_default();
            TrackResponse::new(track, total, completed)
        })
        .collect();
    Ok(Json(response))
}

/// POST /tracks - Append a new, empty track.
#[utoipa::path(
    post,
    path = "/tracks",
    request_body = TrackRequest,
    responses(
        (status = 201, description = "Track created", body = TrackResponse),
        (status = 400, description = "Missing name")
    )
)]
pub async fn create_track_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<TrackRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = required_name(&req.name)?;
    let track = state
        .db
        .create_track(user_id, name)
        .await
        .map_err(|e| port_failure("Failed to create track", e))?;
    Ok((StatusCode::CREATED, Json(TrackResponse::new(track, 0, 0))))
}

/// PATCH /tracks/{id} - Rename or reorder a track.
#[utoipa::path(
    patch,
    path = "/tracks/{id}",
    request_body = UpdateTrackRequest,
    params(("id" = Uuid, Path, description = "Track id")),
    responses(
        (status = 200, description = "Track updated", body = TrackResponse),
        (status = 400, description = "Blank name or negative order"),
        (status = 404, description = "No such track for this user")
    )
)]
pub async fn update_track_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(track_id): Path<Uuid>,
    Json(req): Json<UpdateTrackRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let patch = req.into_patch()?;
    let track = state
        .db
        .update_track(user_id, track_id, patch)
        .await
        .map_err(|e| port_failure("Failed to update track", e))?;
    let topics = state
        .db
        .list_topics(user_id, Some(track_id))
        .await
        .map_err(|e| port_failure("Failed to update track", e))?;
    let completed = topics.iter().filter(|t| t.completed).count();
    Ok(Json(TrackResponse::new(track, topics.len(), completed)))
}

/// DELETE /tracks/{id} - Delete a track and everything in it.
#[utoipa::path(
    delete,
    path = "/tracks/{id}",
    params(("id" = Uuid, Path, description = "Track id")),
    responses(
        (status = 200, description = "Track deleted", body = MessageResponse),
        (status = 404, description = "No such track for this user")
    )
)]
pub async fn delete_track_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(track_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .delete_track(user_id, track_id)
        .await
        .map_err(|e| port_failure("Failed to delete track", e))?;
    Ok(Json(MessageResponse {
        message: "Track deleted".to_string(),
    }))
}

/// POST /tracks/seed - Create the default tracks, once, for a user who has none.
#[utoipa::path(
    post,
    path = "/tracks/seed",
    responses(
        (status = 201, description = "Default tracks created", body = SeedResponse),
        (status = 200, description = "User already has tracks", body = MessageResponse)
    )
)]
pub async fn seed_tracks_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<axum::response::Response, (StatusCode, String)> {
    let existing = state
        .db
        .list_tracks(user_id)
        .await
        .map_err(|e| port_failure("Failed to seed tracks", e))?;
    if !existing.is_empty() {
        info!(
            "User {} already has {} tracks, skipping seed",
            user_id,
            existing.len()
        );
        let body = MessageResponse {
            message: "User already has tracks".to_string(),
        };
        return Ok((StatusCode::OK, Json(body)).into_response());
    }

    let mut created = Vec::with_capacity(DEFAULT_TRACKS.len());
    for (name, topics) in DEFAULT_TRACKS {
        let track = state
            .db
            .create_track(user_id, name)
            .await
            .map_err(|e| port_failure("Failed to seed tracks", e))?;
        for (title, target_minutes) in topics.iter() {
            state
                .db
                .create_topic(NewTopic {
                    user_id,
                    track_id: track.id,
                    title: title.to_string(),
                    target_minutes: *target_minutes,
                    scheduled_date: None,
                    source_url: None,
                })
                .await
                .map_err(|e| port_failure("Failed to seed tracks", e))?;
        }
        info!(
            "Created track \"{}\" with {} topics for user {}",
            track.name,
            topics.len(),
            user_id
        );
        created.push(TrackResponse::new(track, topics.len(), 0));
    }

    let body = SeedResponse {
        message: "Default tracks seeded successfully".to_string(),
        tracks: created,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_must_be_a_non_negative_i32() {
        assert_eq!(track_order(0).unwrap(), 0);
        assert_eq!(track_order(3).unwrap(), 3);
        assert_eq!(track_order(-1).unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            track_order(i64::from(i32::MAX) + 1).unwrap_err().0,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn a_blank_name_in_a_patch_is_rejected() {
        let req = UpdateTrackRequest {
            name: Some("  ".to_string()),
            order: None,
        };
        assert_eq!(req.into_patch().unwrap_err().0, StatusCode::BAD_REQUEST);

        let patch = UpdateTrackRequest {
            name: Some(" Rust ".to_string()),
            order: Some(2),
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.name.as_deref(), Some("Rust"));
        assert_eq!(patch.order, Some(2));
    }
}
