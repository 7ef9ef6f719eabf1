//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_tracker_core::domain::{
    PredefinedTopic, Todo, Topic, TopicNote, Track, User, UserCredentials,
};
use study_tracker_core::ports::{
    check_minutes, DatabaseService, NewTodo, NewTopic, PortError, PortResult, TodoPatch,
    TopicPatch, TrackPatch,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn minutes_from_db(value: i32) -> PortResult<u32> {
    u32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("Stored minute count {value} is negative")))
}

fn minutes_to_db(field: &str, value: u32) -> PortResult<i32> {
    // `check_minutes` caps at `i32::MAX`, so the cast is lossless.
    check_minutes(field, value).map(|v| v as i32)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    username: String,
    hashed_password: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            username: self.username,
        }
    }

    fn to_credentials(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            username: self.username,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct TrackRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    sort_order: i32,
    created_at: DateTime<Utc>,
}
impl TrackRecord {
    fn to_domain(self) -> Track {
        Track {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    user_id: Uuid,
    track_id: Uuid,
    title: String,
    target_minutes: i32,
    scheduled_date: Option<DateTime<Utc>>,
    last_studied_at: Option<DateTime<Utc>>,
    source_url: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
}
impl TopicRecord {
    fn to_domain(self) -> PortResult<Topic> {
        Ok(Topic {
            id: self.id,
            user_id: self.user_id,
            track_id: self.track_id,
            title: self.title,
            target_minutes: minutes_from_db(self.target_minutes)?,
            scheduled_date: self.scheduled_date,
            last_studied_at: self.last_studied_at,
            source_url: self.source_url,
            completed: self.completed,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct TopicNoteRecord {
    topic_id: Uuid,
    key_idea: Option<String>,
    example: Option<String>,
    recall_question: Option<String>,
}
impl TopicNoteRecord {
    fn to_domain(self) -> TopicNote {
        TopicNote {
            topic_id: self.topic_id,
            key_idea: self.key_idea,
            example: self.example,
            recall_question: self.recall_question,
        }
    }
}

#[derive(FromRow)]
struct TodoRecord {
    id: Uuid,
    user_id: Uuid,
    task: String,
    date: DateTime<Utc>,
    duration: i32,
    completed: bool,
    created_at: DateTime<Utc>,
}
impl TodoRecord {
    fn to_domain(self) -> PortResult<Todo> {
        Ok(Todo {
            id: self.id,
            user_id: self.user_id,
            task: self.task,
            date: self.date,
            duration_minutes: minutes_from_db(self.duration)?,
            completed: self.completed,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct PredefinedTopicRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}
impl PredefinedTopicRecord {
    fn to_domain(self) -> PredefinedTopic {
        PredefinedTopic {
            id: self.id,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
        }
    }
}

const TRACK_COLUMNS: &str = "id, user_id, name, sort_order, created_at";
const TOPIC_COLUMNS: &str = "id, user_id, track_id, title, target_minutes, scheduled_date, \
     last_studied_at, source_url, completed, created_at";
const TODO_COLUMNS: &str = "id, user_id, task, date, duration, completed, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, username, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, username, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("Username {} is already taken", username))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("User {} not found", username)))?;
        Ok(record.to_credentials())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1 AND expires_at <= NOW()")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str, now: DateTime<Utc>) -> PortResult<Uuid> {
        let session: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT user_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        match session {
            Some((user_id, expires_at)) if expires_at > now => Ok(user_id),
            Some(_) => {
                self.delete_auth_session(session_id).await?;
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_tracks(&self, user_id: Uuid) -> PortResult<Vec<Track>> {
        let records = sqlx::query_as::<_, TrackRecord>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE user_id = $1 ORDER BY sort_order ASC, created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<Track> {
        let record = sqlx::query_as::<_, TrackRecord>(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE id = $1 AND user_id = $2"
        ))
        .bind(track_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Track {} not found", track_id)))?;
        Ok(record.to_domain())
    }

    async fn create_track(&self, user_id: Uuid, name: &str) -> PortResult<Track> {
        let record = sqlx::query_as::<_, TrackRecord>(&format!(
            "INSERT INTO tracks (id, user_id, name, sort_order) \
             VALUES ($1, $2, $3, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM tracks WHERE user_id = $2)) \
             RETURNING {TRACK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_track(
        &self,
        user_id: Uuid,
        track_id: Uuid,
        patch: TrackPatch,
    ) -> PortResult<Track> {
        let mut track = self.get_track(user_id, track_id).await?;
        patch.apply_to(&mut track);

        let record = sqlx::query_as::<_, TrackRecord>(&format!(
            "UPDATE tracks SET name = $1, sort_order = $2 WHERE id = $3 AND user_id = $4 \
             RETURNING {TRACK_COLUMNS}"
        ))
        .bind(&track.name)
        .bind(track.order)
        .bind(track_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Track {} not found", track_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = $1 AND user_id = $2")
            .bind(track_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Track {} not found", track_id)));
        }
        Ok(())
    }

    async fn list_topics(&self, user_id: Uuid, track_id: Option<Uuid>) -> PortResult<Vec<Topic>> {
        let records = sqlx::query_as::<_, TopicRecord>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics \
             WHERE user_id = $1 AND ($2::uuid IS NULL OR track_id = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(track_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Topic> {
        let record = sqlx::query_as::<_, TopicRecord>(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1 AND user_id = $2"
        ))
        .bind(topic_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Topic {} not found", topic_id)))?;
        record.to_domain()
    }

    async fn create_topic(&self, topic: NewTopic) -> PortResult<Topic> {
        let record = sqlx::query_as::<_, TopicRecord>(&format!(
            "INSERT INTO topics (id, user_id, track_id, title, target_minutes, scheduled_date, source_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(topic.user_id)
        .bind(topic.track_id)
        .bind(&topic.title)
        .bind(minutes_to_db("targetMinutes", topic.target_minutes)?)
        .bind(topic.scheduled_date)
        .bind(&topic.source_url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_topic(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        patch: TopicPatch,
    ) -> PortResult<Topic> {
        let mut topic = self.get_topic(user_id, topic_id).await?;
        patch.apply_to(&mut topic);

        let record = sqlx::query_as::<_, TopicRecord>(&format!(
            "UPDATE topics SET title = $1, target_minutes = $2, scheduled_date = $3, \
             last_studied_at = $4, source_url = $5, completed = $6 \
             WHERE id = $7 AND user_id = $8 RETURNING {TOPIC_COLUMNS}"
        ))
        .bind(&topic.title)
        .bind(minutes_to_db("targetMinutes", topic.target_minutes)?)
        .bind(topic.scheduled_date)
        .bind(topic.last_studied_at)
        .bind(&topic.source_url)
        .bind(topic.completed)
        .bind(topic_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Topic {} not found", topic_id)))?;
        record.to_domain()
    }

    async fn delete_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1 AND user_id = $2")
            .bind(topic_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Topic {} not found", topic_id)));
        }
        Ok(())
    }

    async fn get_topic_note(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Option<TopicNote>> {
        // Ownership is checked through the topic so a foreign id reads as missing.
        self.get_topic(user_id, topic_id).await?;
        let record = sqlx::query_as::<_, TopicNoteRecord>(
            "SELECT topic_id, key_idea, example, recall_question FROM topic_notes WHERE topic_id = $1",
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn upsert_topic_note(&self, user_id: Uuid, note: TopicNote) -> PortResult<TopicNote> {
        self.get_topic(user_id, note.topic_id).await?;
        let record = sqlx::query_as::<_, TopicNoteRecord>(
            "INSERT INTO topic_notes (topic_id, key_idea, example, recall_question) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (topic_id) DO UPDATE SET key_idea = EXCLUDED.key_idea, \
             example = EXCLUDED.example, recall_question = EXCLUDED.recall_question \
             RETURNING topic_id, key_idea, example, recall_question",
        )
        .bind(note.topic_id)
        .bind(&note.key_idea)
        .bind(&note.example)
        .bind(&note.recall_question)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_todos(
        &self,
        user_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Todo>> {
        let (from, to) = match range {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };
        let records = sqlx::query_as::<_, TodoRecord>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos \
             WHERE user_id = $1 \
             AND ($2::timestamptz IS NULL OR date >= $2) \
             AND ($3::timestamptz IS NULL OR date <= $3) \
             ORDER BY date DESC"
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_todos_by_task(&self, user_id: Uuid, task: &str) -> PortResult<Vec<Todo>> {
        let records = sqlx::query_as::<_, TodoRecord>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = $1 AND task = $2 ORDER BY date ASC"
        ))
        .bind(user_id)
        .bind(task)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_todo(&self, todo: NewTodo) -> PortResult<Todo> {
        let record = sqlx::query_as::<_, TodoRecord>(&format!(
            "INSERT INTO todos (id, user_id, task, date, duration, completed) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TODO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(todo.user_id)
        .bind(&todo.task)
        .bind(todo.date)
        .bind(minutes_to_db("duration", todo.duration_minutes)?)
        .bind(todo.completed)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_todo(&self, user_id: Uuid, todo_id: Uuid, patch: TodoPatch) -> PortResult<Todo> {
        let existing = sqlx::query_as::<_, TodoRecord>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2"
        ))
        .bind(todo_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Todo {} not found", todo_id)))?;
        let mut todo = existing.to_domain()?;
        patch.apply_to(&mut todo);

        let record = sqlx::query_as::<_, TodoRecord>(&format!(
            "UPDATE todos SET task = $1, date = $2, duration = $3, completed = $4 \
             WHERE id = $5 AND user_id = $6 RETURNING {TODO_COLUMNS}"
        ))
        .bind(&todo.task)
        .bind(todo.date)
        .bind(minutes_to_db("duration", todo.duration_minutes)?)
        .bind(todo.completed)
        .bind(todo_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Todo {} not found", todo_id)))?;
        record.to_domain()
    }

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(todo_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Todo {} not found", todo_id)));
        }
        Ok(())
    }

    async fn list_predefined_topics(&self) -> PortResult<Vec<PredefinedTopic>> {
        let records = sqlx::query_as::<_, PredefinedTopicRecord>(
            "SELECT id, title, description, created_at FROM predefined_topics ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_predefined_topic(&self, id: Uuid) -> PortResult<PredefinedTopic> {
        let record = sqlx::query_as::<_, PredefinedTopicRecord>(
            "SELECT id, title, description, created_at FROM predefined_topics WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or(format!("Predefined topic {} not found", id)))?;
        Ok(record.to_domain())
    }
}
