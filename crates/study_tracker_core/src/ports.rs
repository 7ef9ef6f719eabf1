//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{PredefinedTopic, Todo, Topic, TopicNote, Track, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Largest minute count a store accepts for a todo duration or a topic target.
pub const MAX_MINUTES: u32 = i32::MAX as u32;

/// Rejects minute counts no store can hold.
pub fn check_minutes(field: &str, value: u32) -> PortResult<u32> {
    if value > MAX_MINUTES {
        return Err(PortError::Invalid(format!(
            "{field} must be at most {MAX_MINUTES} minutes"
        )));
    }
    Ok(value)
}

//=========================================================================================
// Port Inputs
//=========================================================================================

/// A partial track update: rename, reorder, or both.
#[derive(Debug, Clone, Default)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub order: Option<i32>,
}

impl TrackPatch {
    pub fn apply_to(self, track: &mut Track) {
        if let Some(name) = self.name {
            track.name = name;
        }
        if let Some(order) = self.order {
            track.order = order;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub user_id: Uuid,
    pub track_id: Uuid,
    pub title: String,
    pub target_minutes: u32,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
}

/// A partial topic update. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct TopicPatch {
    pub title: Option<String>,
    pub target_minutes: Option<u32>,
    pub scheduled_date: Option<Option<DateTime<Utc>>>,
    pub source_url: Option<Option<String>>,
    pub completed: Option<bool>,
    pub last_studied_at: Option<Option<DateTime<Utc>>>,
}

impl TopicPatch {
    /// Applies every field that is present to `topic`.
    pub fn apply_to(self, topic: &mut Topic) {
        if let Some(title) = self.title {
            topic.title = title;
        }
        if let Some(target_minutes) = self.target_minutes {
            topic.target_minutes = target_minutes;
        }
        if let Some(scheduled_date) = self.scheduled_date {
            topic.scheduled_date = scheduled_date;
        }
        if let Some(source_url) = self.source_url {
            topic.source_url = source_url;
        }
        if let Some(completed) = self.completed {
            topic.completed = completed;
        }
        if let Some(last_studied_at) = self.last_studied_at {
            topic.last_studied_at = last_studied_at;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub user_id: Uuid,
    pub task: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub task: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn apply_to(self, todo: &mut Todo) {
        if let Some(task) = self.task {
            todo.task = task;
        }
        if let Some(date) = self.date {
            todo.date = date;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            todo.duration_minutes = duration_minutes;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The record store and identity store. Every query that touches user data
/// is scoped by the owning user's id; rows of other users behave as absent.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session to its user. Sessions that expired before `now`
    /// are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str, now: DateTime<Utc>) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Tracks ---
    async fn list_tracks(&self, user_id: Uuid) -> PortResult<Vec<Track>>;

    async fn get_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<Track>;

    /// Appends a track after the user's current highest `order`.
    async fn create_track(&self, user_id: Uuid, name: &str) -> PortResult<Track>;

    /// Applies the present fields of `patch`; an empty patch returns the track unchanged.
    async fn update_track(
        &self,
        user_id: Uuid,
        track_id: Uuid,
        patch: TrackPatch,
    ) -> PortResult<Track>;

    /// Deletes the track together with its topics and their notes.
    async fn delete_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<()>;

    // --- Topics ---
    async fn list_topics(&self, user_id: Uuid, track_id: Option<Uuid>) -> PortResult<Vec<Topic>>;

    async fn get_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Topic>;

    async fn create_topic(&self, topic: NewTopic) -> PortResult<Topic>;

    async fn update_topic(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        patch: TopicPatch,
    ) -> PortResult<Topic>;

    async fn delete_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<()>;

    async fn get_topic_note(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Option<TopicNote>>;

    async fn upsert_topic_note(&self, user_id: Uuid, note: TopicNote) -> PortResult<TopicNote>;

    // --- Todos ---
    /// Lists a user's todos, optionally pre-filtered to a raw UTC range
    /// (inclusive at both ends).
    async fn list_todos(
        &self,
        user_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Todo>>;

    async fn list_todos_by_task(&self, user_id: Uuid, task: &str) -> PortResult<Vec<Todo>>;

    async fn create_todo(&self, todo: NewTodo) -> PortResult<Todo>;

    async fn update_todo(&self, user_id: Uuid, todo_id: Uuid, patch: TodoPatch) -> PortResult<Todo>;

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()>;

    // --- Predefined Topic Catalogue ---
    async fn list_predefined_topics(&self) -> PortResult<Vec<PredefinedTopic>>;

    async fn get_predefined_topic(&self, id: Uuid) -> PortResult<PredefinedTopic>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_above_the_store_limit_are_invalid() {
        assert_eq!(check_minutes("duration", MAX_MINUTES).unwrap(), MAX_MINUTES);
        assert!(matches!(
            check_minutes("duration", MAX_MINUTES + 1),
            Err(PortError::Invalid(_))
        ));
        assert!(matches!(
            check_minutes("targetMinutes", u32::MAX),
            Err(PortError::Invalid(_))
        ));
    }
}
