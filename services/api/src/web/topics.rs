//! services/api/src/web/topics.rs
//!
//! Topic listing with search, sorting and week filters; topic CRUD; topic notes;
//! and the shared predefined-topic catalogue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use study_tracker_core::bucket::{RecordQuery, SortKey};
use study_tracker_core::calendar::WeekWindow;
use study_tracker_core::domain::{Record, Topic, TopicNote};
use study_tracker_core::ports::{check_minutes, NewTodo, NewTopic, PortError, TopicPatch};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::rest::{
    double_option, MessageResponse, NoteResponse, PredefinedTopicResponse, TodoResponse,
    TopicResponse,
};
use crate::web::state::{parse_day_param, parse_instant_param, AppState, OffsetQuery};

const DEFAULT_TARGET_MINUTES: u32 = 15;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TopicListQuery {
    pub track_id: Option<Uuid>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
    /// One of `title`, `completed`, `scheduledDate`, `lastStudiedAt`, `createdAt`.
    pub sort: Option<String>,
    /// First day (inclusive) of a date filter; needs `weekEnd` as well.
    pub week_start: Option<String>,
    /// Last day (inclusive) of a date filter; needs `weekStart` as well.
    pub week_end: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    /// When set, a todo is created from this catalogue entry instead of a topic.
    pub predefined_topic_id: Option<Uuid>,
    pub title: Option<String>,
    pub track_id: Option<Uuid>,
    pub target_minutes: Option<u32>,
    pub scheduled_date: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    pub title: Option<String>,
    pub target_minutes: Option<u32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub scheduled_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub source_url: Option<Option<String>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub last_studied_at: Option<Option<String>>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub key_idea: Option<String>,
    pub example: Option<String>,
    pub recall_question: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Ordering of the topic list. Title and status go through the record
/// ordering; the two date keys order by their own column, undated topics last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicSort {
    /// The store's newest-first creation order.
    CreatedAt,
    Record(SortKey),
    /// Earliest scheduled first.
    ScheduledDate,
    /// Most recently studied first.
    LastStudiedAt,
}

impl TopicSort {
    fn record_key(self) -> Option<SortKey> {
        match self {
            TopicSort::Record(key) => Some(key),
            _ => None,
        }
    }

    fn sort_topics(self, topics: &mut [Topic]) {
        match self {
            TopicSort::ScheduledDate => {
                topics.sort_by(|a, b| by_instant(a.scheduled_date, b.scheduled_date, false))
            }
            TopicSort::LastStudiedAt => {
                topics.sort_by(|a, b| by_instant(a.last_studied_at, b.last_studied_at, true))
            }
            TopicSort::CreatedAt | TopicSort::Record(_) => {}
        }
    }
}

fn by_instant(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>, newest_first: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if newest_first => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parses the topic list's `sort` parameter.
fn topic_sort(raw: Option<&str>) -> Result<TopicSort, (StatusCode, String)> {
    match raw {
        None | Some("createdAt") => Ok(TopicSort::CreatedAt),
        Some("title") => Ok(TopicSort::Record(SortKey::Title)),
        Some("completed") => Ok(TopicSort::Record(SortKey::Completed)),
        Some("scheduledDate") => Ok(TopicSort::ScheduledDate),
        Some("lastStudiedAt") => Ok(TopicSort::LastStudiedAt),
        Some(other) => Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown sort key: {}", other),
        )),
    }
}

fn target_minutes(value: u32) -> Result<u32, (StatusCode, String)> {
    check_minutes("targetMinutes", value).map_err(|e| port_failure("Invalid targetMinutes", e))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn track_names(
    state: &AppState,
    user_id: Uuid,
) -> Result<HashMap<Uuid, String>, (StatusCode, String)> {
    let tracks = state
        .db
        .list_tracks(user_id)
        .await
        .map_err(|e| port_failure("Failed to fetch tracks", e))?;
    Ok(tracks.into_iter().map(|t| (t.id, t.name)).collect())
}

async fn topic_response(
    state: &AppState,
    user_id: Uuid,
    topic: Topic,
) -> Result<TopicResponse, (StatusCode, String)> {
    let track_name = match state.db.get_track(user_id, topic.track_id).await {
        Ok(track) => Some(track.name),
        Err(PortError::NotFound(_)) => None,
        Err(e) => return Err(port_failure("Failed to fetch topic", e)),
    };
    Ok(TopicResponse::new(topic, track_name))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /topics - The user's topics, filtered and sorted.
#[utoipa::path(
    get,
    path = "/topics",
    params(TopicListQuery),
    responses(
        (status = 200, description = "Matching topics", body = [TopicResponse]),
        (status = 400, description = "Unknown sort key or malformed date")
    )
)]
pub async fn list_topics_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<TopicListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let sort = topic_sort(params.sort.as_deref())?;
    let window = match (&params.week_start, &params.week_end) {
        (Some(start), Some(end)) => Some(WeekWindow::from_days(
            parse_day_param(&normalizer, "weekStart", start)?,
            parse_day_param(&normalizer, "weekEnd", end)?,
        )),
        _ => None,
    };

    let topics = state
        .db
        .list_topics(user_id, params.track_id)
        .await
        .map_err(|e| port_failure("Failed to fetch topics", e))?;
    let names = track_names(&state, user_id).await?;

    let records: Vec<Record> = topics.iter().map(Topic::to_record).collect();
    let query = RecordQuery {
        owner_id: user_id,
        group_key: params.track_id,
        search: params.search,
        window,
        sort: sort.record_key(),
    };
    let selected = query.apply(&records, &normalizer);

    let mut by_id: HashMap<Uuid, Topic> = topics.into_iter().map(|t| (t.id, t)).collect();
    let mut matched: Vec<Topic> = selected
        .iter()
        .filter_map(|r| by_id.remove(&r.id))
        .collect();
    sort.sort_topics(&mut matched);

    let response: Vec<TopicResponse> = matched
        .into_iter()
        .map(|topic| {
            let track_name = names.get(&topic.track_id).cloned();
            TopicResponse::new(topic, track_name)
        })
        .collect();
    Ok(Json(response))
}

/// POST /topics - Create a topic in one of the user's tracks, or add a
/// predefined topic to the todo list.
#[utoipa::path(
    post,
    path = "/topics",
    params(OffsetQuery),
    request_body = CreateTopicRequest,
    responses(
        (status = 201, description = "Topic created (or todo, for predefinedTopicId)", body = TopicResponse),
        (status = 400, description = "Missing title or trackId"),
        (status = 404, description = "Track or predefined topic not found")
    )
)]
pub async fn create_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(offset): Query<OffsetQuery>,
    Json(req): Json<CreateTopicRequest>,
) -> Result<Response, (StatusCode, String)> {
    if let Some(predefined_id) = req.predefined_topic_id {
        let predefined = state
            .db
            .get_predefined_topic(predefined_id)
            .await
            .map_err(|e| port_failure("Failed to add topic to todo list", e))?;
        let todo = state
            .db
            .create_todo(NewTodo {
                user_id,
                task: predefined.title,
                date: Utc::now(),
                duration_minutes: 0,
                completed: false,
            })
            .await
            .map_err(|e| port_failure("Failed to add topic to todo list", e))?;
        return Ok((StatusCode::CREATED, Json(TodoResponse::from(todo))).into_response());
    }

    let title = blank_to_none(req.title)
        .ok_or((StatusCode::BAD_REQUEST, "Topic title is required".to_string()))?;
    let track_id = req
        .track_id
        .ok_or((StatusCode::BAD_REQUEST, "Track ID is required".to_string()))?;
    let normalizer = state.normalizer(offset.utc_offset_minutes)?;
    let scheduled_date = match req.scheduled_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            Some(parse_instant_param(&normalizer, "scheduledDate", raw)?)
        }
        _ => None,
    };

    let track = state
        .db
        .get_track(user_id, track_id)
        .await
        .map_err(|e| port_failure("Failed to create topic", e))?;

    let topic = state
        .db
        .create_topic(NewTopic {
            user_id,
            track_id,
            title,
            target_minutes: target_minutes(req.target_minutes.unwrap_or(DEFAULT_TARGET_MINUTES))?,
            scheduled_date,
            source_url: blank_to_none(req.source_url),
        })
        .await
        .map_err(|e| port_failure("Failed to create topic", e))?;

    let body = TopicResponse::new(topic, Some(track.name));
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /topics/{id}
#[utoipa::path(
    get,
    path = "/topics/{id}",
    params(("id" = Uuid, Path, description = "Topic id")),
    responses(
        (status = 200, description = "The topic", body = TopicResponse),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn get_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topic = state
        .db
        .get_topic(user_id, topic_id)
        .await
        .map_err(|e| port_failure("Failed to fetch topic", e))?;
    Ok(Json(topic_response(&state, user_id, topic).await?))
}

/// PATCH /topics/{id} - Partial update. Marking a topic completed stamps
/// `lastStudiedAt` with the current time unless the body sets it explicitly.
#[utoipa::path(
    patch,
    path = "/topics/{id}",
    params(("id" = Uuid, Path, description = "Topic id"), OffsetQuery),
    request_body = UpdateTopicRequest,
    responses(
        (status = 200, description = "Updated topic", body = TopicResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn update_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
    Query(offset): Query<OffsetQuery>,
    Json(req): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(offset.utc_offset_minutes)?;

    let title = match req.title {
        Some(title) if title.trim().is_empty() => {
            return Err((StatusCode::BAD_REQUEST, "Invalid topic title".to_string()))
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };

    let parse_nullable = |field: &str, value: Option<Option<String>>| match value {
        Some(Some(raw)) if !raw.trim().is_empty() => {
            parse_instant_param(&normalizer, field, &raw).map(|at| Some(Some(at)))
        }
        Some(_) => Ok(Some(None)),
        None => Ok(None),
    };
    let scheduled_date = parse_nullable("scheduledDate", req.scheduled_date)?;
    let mut last_studied_at = parse_nullable("lastStudiedAt", req.last_studied_at)?;
    if req.completed == Some(true) && last_studied_at.is_none() {
        last_studied_at = Some(Some(Utc::now()));
    }

    let patch = TopicPatch {
        title,
        target_minutes: req.target_minutes.map(target_minutes).transpose()?,
        scheduled_date,
        source_url: req.source_url.map(blank_to_none),
        completed: req.completed,
        last_studied_at,
    };
    let topic = state
        .db
        .update_topic(user_id, topic_id, patch)
        .await
        .map_err(|e| port_failure("Failed to update topic", e))?;
    Ok(Json(topic_response(&state, user_id, topic).await?))
}

/// DELETE /topics/{id}
#[utoipa::path(
    delete,
    path = "/topics/{id}",
    params(("id" = Uuid, Path, description = "Topic id")),
    responses(
        (status = 200, description = "Topic deleted", body = MessageResponse),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn delete_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .delete_topic(user_id, topic_id)
        .await
        .map_err(|e| port_failure("Failed to delete topic", e))?;
    Ok(Json(MessageResponse {
        message: "Topic deleted".to_string(),
    }))
}

/// GET /topics/{id}/notes - The topic's notes; all fields null when none were saved.
#[utoipa::path(
    get,
    path = "/topics/{id}/notes",
    params(("id" = Uuid, Path, description = "Topic id")),
    responses(
        (status = 200, description = "Notes of the topic", body = NoteResponse),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn get_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let note = state
        .db
        .get_topic_note(user_id, topic_id)
        .await
        .map_err(|e| port_failure("Failed to fetch notes", e))?
        .unwrap_or(TopicNote {
            topic_id,
            ..TopicNote::default()
        });
    Ok(Json(NoteResponse::from(note)))
}

/// PUT /topics/{id}/notes - Replace the topic's notes. Blank fields are stored as null.
#[utoipa::path(
    put,
    path = "/topics/{id}/notes",
    params(("id" = Uuid, Path, description = "Topic id")),
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Saved notes", body = NoteResponse),
        (status = 404, description = "Topic not found")
    )
)]
pub async fn put_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(topic_id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let note = TopicNote {
        topic_id,
        key_idea: blank_to_none(req.key_idea),
        example: blank_to_none(req.example),
        recall_question: blank_to_none(req.recall_question),
    };
    let saved = state
        .db
        .upsert_topic_note(user_id, note)
        .await
        .map_err(|e| port_failure("Failed to save notes", e))?;
    Ok(Json(NoteResponse::from(saved)))
}

/// GET /predefined-topics - The shared catalogue, oldest first.
#[utoipa::path(
    get,
    path = "/predefined-topics",
    responses(
        (status = 200, description = "Catalogue entries", body = [PredefinedTopicResponse])
    )
)]
pub async fn list_predefined_topics_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let topics = state
        .db
        .list_predefined_topics()
        .await
        .map_err(|e| port_failure("Failed to fetch predefined topics", e))?;
    let response: Vec<PredefinedTopicResponse> = topics.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_sort_accepts_the_enumerated_keys() {
        assert_eq!(topic_sort(None), Ok(TopicSort::CreatedAt));
        assert_eq!(topic_sort(Some("createdAt")), Ok(TopicSort::CreatedAt));
        assert_eq!(
            topic_sort(Some("title")),
            Ok(TopicSort::Record(SortKey::Title))
        );
        assert_eq!(topic_sort(Some("lastStudiedAt")), Ok(TopicSort::LastStudiedAt));
        assert_eq!(
            topic_sort(Some("priority")).map_err(|(status, _)| status),
            Err(StatusCode::BAD_REQUEST)
        );
    }

    fn topic(title: &str, scheduled: Option<&str>, studied: Option<&str>) -> Topic {
        let at = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .unwrap()
                .with_timezone(&Utc)
        };
        Topic {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            track_id: Uuid::nil(),
            title: title.to_string(),
            target_minutes: 15,
            scheduled_date: scheduled.map(at),
            last_studied_at: studied.map(at),
            source_url: None,
            completed: false,
            created_at: at("2024-05-01T00:00:00Z"),
        }
    }

    fn titles(topics: &[Topic]) -> Vec<&str> {
        topics.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn date_sorts_follow_their_own_column() {
        let mut topics = vec![
            topic("Unscheduled", None, None),
            topic("Later", Some("2024-06-10T09:00:00Z"), None),
            topic("Earlier", Some("2024-06-01T09:00:00Z"), Some("2024-06-20T09:00:00Z")),
        ];

        TopicSort::ScheduledDate.sort_topics(&mut topics);
        assert_eq!(titles(&topics), ["Earlier", "Later", "Unscheduled"]);

        TopicSort::LastStudiedAt.sort_topics(&mut topics);
        assert_eq!(titles(&topics), ["Earlier", "Later", "Unscheduled"]);

        topics[1].last_studied_at = topics[0].last_studied_at.map(|at| at + chrono::Duration::days(1));
        TopicSort::LastStudiedAt.sort_topics(&mut topics);
        assert_eq!(titles(&topics), ["Later", "Earlier", "Unscheduled"]);
    }

    #[test]
    fn oversized_targets_are_a_bad_request() {
        assert_eq!(target_minutes(45), Ok(45));
        assert_eq!(
            target_minutes(u32::MAX).map_err(|(status, _)| status),
            Err(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(blank_to_none(Some("  ".to_string())), None);
        assert_eq!(
            blank_to_none(Some(" https://developer.mozilla.org ".to_string())),
            Some("https://developer.mozilla.org".to_string())
        );
        assert_eq!(blank_to_none(None), None);
    }
}
