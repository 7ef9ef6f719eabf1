//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It backs the
//! service when no `DATABASE_URL` is configured and drives the HTTP tests.
//! Nothing is persisted across restarts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use study_tracker_core::domain::{
    AuthSession, PredefinedTopic, Todo, Topic, TopicNote, Track, User, UserCredentials,
};
use study_tracker_core::ports::{
    check_minutes, DatabaseService, NewTodo, NewTopic, PortError, PortResult, TodoPatch,
    TopicPatch, TrackPatch,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// The shared catalogue the PostgreSQL migration also seeds.
pub const PREDEFINED_TOPICS: &[(&str, &str)] = &[
    ("JavaScript Basics", "Learn the fundamentals of JavaScript."),
    ("ES6 Features", "Explore new features introduced in ES6."),
    ("Asynchronous JavaScript", "Understand promises, async/await, and event loops."),
    ("JavaScript Design Patterns", "Learn common design patterns in JavaScript."),
    ("JavaScript Testing", "Introduction to testing frameworks like Jest."),
];

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserCredentials>,
    sessions: HashMap<String, AuthSession>,
    tracks: HashMap<Uuid, Track>,
    topics: HashMap<Uuid, Topic>,
    notes: HashMap<Uuid, TopicNote>,
    todos: HashMap<Uuid, Todo>,
    predefined: Vec<PredefinedTopic>,
}

impl Tables {
    fn owned_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<&Topic> {
        self.topics
            .get(&topic_id)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))
    }
}

/// A `DatabaseService` kept entirely in memory behind an async lock.
pub struct MemoryAdapter {
    tables: RwLock<Tables>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        let now = Utc::now();
        let predefined = PREDEFINED_TOPICS
            .iter()
            .enumerate()
            .map(|(i, (title, description))| PredefinedTopic {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: Some(description.to_string()),
                created_at: now + chrono::Duration::milliseconds(i as i64),
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                predefined,
                ..Tables::default()
            }),
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn create_user(&self, username: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(PortError::Conflict(format!(
                "Username {} is already taken",
                username
            )));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id,
            username: credentials.username.clone(),
        };
        tables.users.insert(credentials.user_id, credentials);
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", username)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        tables.sessions.retain(|_, s| s.expires_at > now);
        tables.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str, now: DateTime<Utc>) -> PortResult<Uuid> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get(session_id) {
            Some(session) if session.expires_at > now => Ok(session.user_id),
            Some(_) => {
                tables.sessions.remove(session_id);
                Err(PortError::Unauthorized)
            }
            None => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn list_tracks(&self, user_id: Uuid) -> PortResult<Vec<Track>> {
        let tables = self.tables.read().await;
        let mut tracks: Vec<Track> = tables
            .tracks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tracks.sort_by_key(|t| (t.order, t.created_at));
        Ok(tracks)
    }

    async fn get_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<Track> {
        let tables = self.tables.read().await;
        tables
            .tracks
            .get(&track_id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Track {} not found", track_id)))
    }

    async fn create_track(&self, user_id: Uuid, name: &str) -> PortResult<Track> {
        let mut tables = self.tables.write().await;
        let order = tables
            .tracks
            .values()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.order + 1)
            .max()
            .unwrap_or(0);
        let track = Track {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            order,
            created_at: Utc::now(),
        };
        tables.tracks.insert(track.id, track.clone());
        Ok(track)
    }

    async fn update_track(
        &self,
        user_id: Uuid,
        track_id: Uuid,
        patch: TrackPatch,
    ) -> PortResult<Track> {
        let mut tables = self.tables.write().await;
        let track = tables
            .tracks
            .get_mut(&track_id)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Track {} not found", track_id)))?;
        patch.apply_to(track);
        Ok(track.clone())
    }

    async fn delete_track(&self, user_id: Uuid, track_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables
            .tracks
            .get(&track_id)
            .is_some_and(|t| t.user_id == user_id)
        {
            return Err(PortError::NotFound(format!("Track {} not found", track_id)));
        }
        tables.tracks.remove(&track_id);
        let orphaned: Vec<Uuid> = tables
            .topics
            .values()
            .filter(|t| t.track_id == track_id)
            .map(|t| t.id)
            .collect();
        for topic_id in orphaned {
            tables.topics.remove(&topic_id);
            tables.notes.remove(&topic_id);
        }
        Ok(())
    }

    async fn list_topics(&self, user_id: Uuid, track_id: Option<Uuid>) -> PortResult<Vec<Topic>> {
        let tables = self.tables.read().await;
        let mut topics: Vec<Topic> = tables
            .topics
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| track_id.map_or(true, |id| t.track_id == id))
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(topics)
    }

    async fn get_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Topic> {
        let tables = self.tables.read().await;
        tables.owned_topic(user_id, topic_id).cloned()
    }

    async fn create_topic(&self, topic: NewTopic) -> PortResult<Topic> {
        check_minutes("targetMinutes", topic.target_minutes)?;
        let mut tables = self.tables.write().await;
        let topic = Topic {
            id: Uuid::new_v4(),
            user_id: topic.user_id,
            track_id: topic.track_id,
            title: topic.title,
            target_minutes: topic.target_minutes,
            scheduled_date: topic.scheduled_date,
            last_studied_at: None,
            source_url: topic.source_url,
            completed: false,
            created_at: Utc::now(),
        };
        tables.topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    async fn update_topic(
        &self,
        user_id: Uuid,
        topic_id: Uuid,
        patch: TopicPatch,
    ) -> PortResult<Topic> {
        if let Some(target_minutes) = patch.target_minutes {
            check_minutes("targetMinutes", target_minutes)?;
        }
        let mut tables = self.tables.write().await;
        let topic = tables
            .topics
            .get_mut(&topic_id)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Topic {} not found", topic_id)))?;
        patch.apply_to(topic);
        Ok(topic.clone())
    }

    async fn delete_topic(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables.owned_topic(user_id, topic_id)?;
        tables.topics.remove(&topic_id);
        tables.notes.remove(&topic_id);
        Ok(())
    }

    async fn get_topic_note(&self, user_id: Uuid, topic_id: Uuid) -> PortResult<Option<TopicNote>> {
        let tables = self.tables.read().await;
        tables.owned_topic(user_id, topic_id)?;
        Ok(tables.notes.get(&topic_id).cloned())
    }

    async fn upsert_topic_note(&self, user_id: Uuid, note: TopicNote) -> PortResult<TopicNote> {
        let mut tables = self.tables.write().await;
        tables.owned_topic(user_id, note.topic_id)?;
        tables.notes.insert(note.topic_id, note.clone());
        Ok(note)
    }

    async fn list_todos(
        &self,
        user_id: Uuid,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> PortResult<Vec<Todo>> {
        let tables = self.tables.read().await;
        let mut todos: Vec<Todo> = tables
            .todos
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| range.map_or(true, |(from, to)| from <= t.date && t.date <= to))
            .cloned()
            .collect();
        todos.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(todos)
    }

    async fn list_todos_by_task(&self, user_id: Uuid, task: &str) -> PortResult<Vec<Todo>> {
        let tables = self.tables.read().await;
        let mut todos: Vec<Todo> = tables
            .todos
            .values()
            .filter(|t| t.user_id == user_id && t.task == task)
            .cloned()
            .collect();
        todos.sort_by_key(|t| t.date);
        Ok(todos)
    }

    async fn create_todo(&self, todo: NewTodo) -> PortResult<Todo> {
        check_minutes("duration", todo.duration_minutes)?;
        let mut tables = self.tables.write().await;
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id: todo.user_id,
            task: todo.task,
            date: todo.date,
            duration_minutes: todo.duration_minutes,
            completed: todo.completed,
            created_at: Utc::now(),
        };
        tables.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, user_id: Uuid, todo_id: Uuid, patch: TodoPatch) -> PortResult<Todo> {
        if let Some(duration_minutes) = patch.duration_minutes {
            check_minutes("duration", duration_minutes)?;
        }
        let mut tables = self.tables.write().await;
        let todo = tables
            .todos
            .get_mut(&todo_id)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Todo {} not found", todo_id)))?;
        patch.apply_to(todo);
        Ok(todo.clone())
    }

    async fn delete_todo(&self, user_id: Uuid, todo_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        if !tables
            .todos
            .get(&todo_id)
            .is_some_and(|t| t.user_id == user_id)
        {
            return Err(PortError::NotFound(format!("Todo {} not found", todo_id)));
        }
        tables.todos.remove(&todo_id);
        Ok(())
    }

    async fn list_predefined_topics(&self) -> PortResult<Vec<PredefinedTopic>> {
        Ok(self.tables.read().await.predefined.clone())
    }

    async fn get_predefined_topic(&self, id: Uuid) -> PortResult<PredefinedTopic> {
        let tables = self.tables.read().await;
        tables
            .predefined
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Predefined topic {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use study_tracker_core::ports::MAX_MINUTES;

    #[tokio::test]
    async fn expired_sessions_are_removed() {
        let store = MemoryAdapter::new();
        let user = store.create_user("ada", "hash").await.unwrap();
        let now = Utc::now();

        store
            .create_auth_session("stale", user.user_id, now - Duration::days(1))
            .await
            .unwrap();
        assert!(matches!(
            store.validate_auth_session("stale", now).await,
            Err(PortError::Unauthorized)
        ));
        assert!(!store.tables.read().await.sessions.contains_key("stale"));

        // A login sweeps the sessions that lapsed since the last one.
        store
            .create_auth_session("old", user.user_id, now - Duration::minutes(1))
            .await
            .unwrap();
        store
            .create_auth_session("fresh", user.user_id, now + Duration::days(1))
            .await
            .unwrap();
        let tables = store.tables.read().await;
        assert!(!tables.sessions.contains_key("old"));
        assert!(tables.sessions.contains_key("fresh"));
    }

    #[tokio::test]
    async fn oversized_minutes_are_rejected() {
        let store = MemoryAdapter::new();
        let user = store.create_user("ada", "hash").await.unwrap();
        let result = store
            .create_todo(NewTodo {
                user_id: user.user_id,
                task: "Read".to_string(),
                date: Utc::now(),
                duration_minutes: MAX_MINUTES + 1,
                completed: false,
            })
            .await;
        assert!(matches!(result, Err(PortError::Invalid(_))));
    }
}
