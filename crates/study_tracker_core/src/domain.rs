//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A time-stamped, owner-scoped unit of work: a todo item or a topic study session.
///
/// `occurred_at` is `None` when the source instant is missing or could not be
/// parsed. Such records match no window and no day.
///
/// `also_at` is a second instant that places the record in a window as well,
/// such as a topic's schedule next to its last study session. A record inside
/// a window through either instant is still one record. Day views and
/// ordering look at `occurred_at` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub also_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub completed: bool,
    pub group_key: Option<Uuid>,
}

impl Record {
    /// Every instant that can place this record inside a window.
    pub fn instants(&self) -> impl Iterator<Item = DateTime<Utc>> {
        self.occurred_at.into_iter().chain(self.also_at)
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
}

// Only used internally for login/register - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A named, ordered grouping of topics belonging to one user.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

/// A learning topic inside a track.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: Uuid,
    pub user_id: Uuid,
    pub track_id: Uuid,
    pub title: String,
    pub target_minutes: u32,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub last_studied_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    /// The topic's primary instant: when it was last studied, or failing that,
    /// when it is scheduled. Its record also carries the schedule, so a topic
    /// belongs to every week it was either scheduled or studied in.
    pub fn effective_at(&self) -> Option<DateTime<Utc>> {
        self.last_studied_at.or(self.scheduled_date)
    }

    pub fn to_record(&self) -> Record {
        Record {
            id: self.id,
            owner_id: self.user_id,
            title: self.title.clone(),
            occurred_at: self.effective_at(),
            also_at: self.scheduled_date,
            duration_minutes: self.target_minutes,
            completed: self.completed,
            group_key: Some(self.track_id),
        }
    }
}

/// Free-form study notes attached to a single topic.
#[derive(Debug, Clone, Default)]
pub struct TopicNote {
    pub topic_id: Uuid,
    pub key_idea: Option<String>,
    pub example: Option<String>,
    pub recall_question: Option<String>,
}

/// A dated todo item with a duration in minutes.
#[derive(Debug, Clone)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task: String,
    pub date: DateTime<Utc>,
    pub duration_minutes: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn to_record(&self) -> Record {
        Record {
            id: self.id,
            owner_id: self.user_id,
            title: self.task.clone(),
            occurred_at: Some(self.date),
            also_at: None,
            duration_minutes: self.duration_minutes,
            completed: self.completed,
            group_key: None,
        }
    }
}

/// A topic from the shared catalogue that any user can add to their todos.
#[derive(Debug, Clone)]
pub struct PredefinedTopic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
