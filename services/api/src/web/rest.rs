//! services/api/src/web/rest.rs
//!
//! Shared REST payloads and the master definition for the OpenAPI specification.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use study_tracker_core::aggregate::AggregateResult;
use study_tracker_core::bucket::DayBucket;
use study_tracker_core::domain::{PredefinedTopic, Todo, Topic, TopicNote};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{auth, stats, todos, topics, tracks};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        tracks::list_tracks_handler,
        tracks::create_track_handler,
        tracks::update_track_handler,
        tracks::delete_track_handler,
        tracks::seed_tracks_handler,
        topics::list_topics_handler,
        topics::create_topic_handler,
        topics::get_topic_handler,
        topics::update_topic_handler,
        topics::delete_topic_handler,
        topics::get_notes_handler,
        topics::put_notes_handler,
        topics::list_predefined_topics_handler,
        todos::list_todos_handler,
        todos::create_todo_handler,
        todos::update_todo_handler,
        todos::delete_todo_handler,
        todos::today_todos_handler,
        todos::weekly_todos_handler,
        todos::todos_by_topic_handler,
        stats::weekly_stats_handler,
    ),
    components(
        schemas(
            auth::CredentialsRequest,
            auth::AuthResponse,
            tracks::TrackResponse,
            tracks::TrackRequest,
            tracks::UpdateTrackRequest,
            tracks::SeedResponse,
            topics::CreateTopicRequest,
            topics::UpdateTopicRequest,
            topics::NoteRequest,
            todos::CreateTodoRequest,
            todos::UpdateTodoRequest,
            todos::WeeklyTodosResponse,
            todos::TopicHistoryResponse,
            stats::WeeklyStatsResponse,
            stats::TrackStatsResponse,
            TopicResponse,
            NoteResponse,
            TodoResponse,
            DayBucketResponse,
            PredefinedTopicResponse,
            MessageResponse,
            Totals,
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Tracks, topics, todos and weekly progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    pub id: Uuid,
    pub track_id: Uuid,
    pub track_name: Option<String>,
    pub title: String,
    pub target_minutes: u32,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub last_studied_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl TopicResponse {
    pub fn new(topic: Topic, track_name: Option<String>) -> Self {
        Self {
            id: topic.id,
            track_id: topic.track_id,
            track_name,
            title: topic.title,
            target_minutes: topic.target_minutes,
            scheduled_date: topic.scheduled_date,
            last_studied_at: topic.last_studied_at,
            source_url: topic.source_url,
            completed: topic.completed,
            created_at: topic.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub topic_id: Uuid,
    pub key_idea: Option<String>,
    pub example: Option<String>,
    pub recall_question: Option<String>,
}

impl From<TopicNote> for NoteResponse {
    fn from(note: TopicNote) -> Self {
        Self {
            topic_id: note.topic_id,
            key_idea: note.key_idea,
            example: note.example,
            recall_question: note.recall_question,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: Uuid,
    pub task: String,
    pub date: DateTime<Utc>,
    /// Minutes.
    pub duration: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Todo> for TodoResponse {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            task: todo.task,
            date: todo.date,
            duration: todo.duration_minutes,
            completed: todo.completed,
            created_at: todo.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayBucketResponse {
    pub day: NaiveDate,
    pub total_minutes: u64,
    pub count: usize,
}

impl From<DayBucket> for DayBucketResponse {
    fn from(bucket: DayBucket) -> Self {
        Self {
            day: bucket.day,
            total_minutes: bucket.total_minutes,
            count: bucket.count,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredefinedTopicResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PredefinedTopic> for PredefinedTopicResponse {
    fn from(topic: PredefinedTopic) -> Self {
        Self {
            id: topic.id,
            title: topic.title,
            description: topic.description,
            created_at: topic.created_at,
        }
    }
}

/// The four rollup figures shared by every weekly response.
#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub duration_minutes: u64,
}

impl From<AggregateResult> for Totals {
    fn from(result: AggregateResult) -> Self {
        Self {
            total: result.total,
            completed: result.completed,
            remaining: result.remaining,
            duration_minutes: result.duration_minutes,
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
