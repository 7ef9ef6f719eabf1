//! services/api/src/web/todos.rs
//!
//! Todo CRUD plus the calendar views over todos: today's tasks, the weekly
//! rollup and the per-title session history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use study_tracker_core::aggregate::aggregate;
use study_tracker_core::bucket::{
    filter_by_day, filter_by_window, group_by_day, sort_records, RecordQuery, SortKey,
};
use study_tracker_core::calendar::{LocalDateNormalizer, WeekWindow};
use study_tracker_core::domain::{Record, Todo};
use study_tracker_core::ports::{NewTodo, TodoPatch, MAX_MINUTES};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::port_failure;
use crate::web::rest::{DayBucketResponse, MessageResponse, TodoResponse, Totals};
use crate::web::state::{
    out_of_range, parse_day_param, parse_instant_param, AppState, OffsetQuery,
};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TodoListQuery {
    /// First local day (inclusive); needs `endDate` as well.
    pub start_date: Option<String>,
    /// Last local day (inclusive); needs `startDate` as well.
    pub end_date: Option<String>,
    pub search: Option<String>,
    /// `occurredAt`, `-occurredAt`, `title` or `completed`. Defaults to newest first.
    pub sort: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

/// A reference day or instant; defaults to now.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    pub date: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TitleQuery {
    pub title: String,
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    pub task: Option<String>,
    pub date: Option<String>,
    /// Minutes.
    pub duration: Option<i64>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    pub task: Option<String>,
    pub date: Option<String>,
    pub duration: Option<i64>,
    pub completed: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTodosResponse {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
    pub todos: Vec<TodoResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct TopicHistoryResponse {
    pub title: String,
    pub sessions: Vec<TodoResponse>,
    pub days: Vec<DayBucketResponse>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn duration_minutes(raw: i64) -> Result<u32, (StatusCode, String)> {
    u32::try_from(raw)
        .ok()
        .filter(|minutes| *minutes <= MAX_MINUTES)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid duration: {}", raw),
            )
        })
}

/// Resolves the `date` parameter into a reference instant, defaulting to now.
fn reference_instant(
    normalizer: &LocalDateNormalizer,
    raw: Option<&str>,
) -> Result<chrono::DateTime<Utc>, (StatusCode, String)> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_instant_param(normalizer, "date", raw),
        None => Ok(Utc::now()),
    }
}

/// Maps selected records back to the todos they were built from, in record order.
fn select_todos(todos: Vec<Todo>, selected: &[&Record]) -> Vec<TodoResponse> {
    let mut by_id: HashMap<Uuid, Todo> = todos.into_iter().map(|t| (t.id, t)).collect();
    selected
        .iter()
        .filter_map(|r| by_id.remove(&r.id))
        .map(TodoResponse::from)
        .collect()
}

async fn todos_in_window(
    state: &AppState,
    user_id: Uuid,
    window: &WeekWindow,
    normalizer: &LocalDateNormalizer,
) -> Result<Vec<Todo>, (StatusCode, String)> {
    let bounds = window
        .utc_bounds(normalizer)
        .ok_or_else(|| out_of_range("date"))?;
    state
        .db
        .list_todos(user_id, Some(bounds))
        .await
        .map_err(|e| port_failure("Failed to fetch todos", e))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /todos - The user's todos, optionally restricted to a local date range.
#[utoipa::path(
    get,
    path = "/todos",
    params(TodoListQuery),
    responses(
        (status = 200, description = "Matching todos", body = [TodoResponse]),
        (status = 400, description = "Unknown sort key or malformed date")
    )
)]
pub async fn list_todos_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<TodoListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let sort = match params.sort.as_deref() {
        Some(raw) => SortKey::from_str(raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => SortKey::OccurredAtDesc,
    };
    let window = match (&params.start_date, &params.end_date) {
        (Some(start), Some(end)) => Some(WeekWindow::from_days(
            parse_day_param(&normalizer, "startDate", start)?,
            parse_day_param(&normalizer, "endDate", end)?,
        )),
        _ => None,
    };

    let todos = match &window {
        Some(window) => todos_in_window(&state, user_id, window, &normalizer).await?,
        None => state
            .db
            .list_todos(user_id, None)
            .await
            .map_err(|e| port_failure("Failed to fetch todos", e))?,
    };

    let records: Vec<Record> = todos.iter().map(Todo::to_record).collect();
    let query = RecordQuery {
        owner_id: user_id,
        group_key: None,
        search: params.search,
        window,
        sort: Some(sort),
    };
    let selected = query.apply(&records, &normalizer);
    Ok(Json(select_todos(todos, &selected)))
}

/// POST /todos
#[utoipa::path(
    post,
    path = "/todos",
    params(OffsetQuery),
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = TodoResponse),
        (status = 400, description = "Missing task, date or duration")
    )
)]
pub async fn create_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(offset): Query<OffsetQuery>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(offset.utc_offset_minutes)?;
    let (task, date, duration) = match (req.task, req.date, req.duration) {
        (Some(task), Some(date), Some(duration)) if !task.trim().is_empty() => {
            (task.trim().to_string(), date, duration)
        }
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Task, date, and duration are required".to_string(),
            ))
        }
    };
    let todo = state
        .db
        .create_todo(NewTodo {
            user_id,
            task,
            date: parse_instant_param(&normalizer, "date", &date)?,
            duration_minutes: duration_minutes(duration)?,
            completed: req.completed,
        })
        .await
        .map_err(|e| port_failure("Failed to create todo", e))?;
    Ok((StatusCode::CREATED, Json(TodoResponse::from(todo))))
}

/// PATCH /todos/{id}
#[utoipa::path(
    patch,
    path = "/todos/{id}",
    params(("id" = Uuid, Path, description = "Todo id"), OffsetQuery),
    request_body = UpdateTodoRequest,
    responses(
        (status = 200, description = "Updated todo", body = TodoResponse),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn update_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
    Query(offset): Query<OffsetQuery>,
    Json(req): Json<UpdateTodoRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(offset.utc_offset_minutes)?;
    let task = match req.task {
        Some(task) if task.trim().is_empty() => {
            return Err((StatusCode::BAD_REQUEST, "Invalid task".to_string()))
        }
        other => other.map(|t| t.trim().to_string()),
    };
    let patch = TodoPatch {
        task,
        date: req
            .date
            .map(|raw| parse_instant_param(&normalizer, "date", &raw))
            .transpose()?,
        duration_minutes: req.duration.map(duration_minutes).transpose()?,
        completed: req.completed,
    };
    let todo = state
        .db
        .update_todo(user_id, todo_id, patch)
        .await
        .map_err(|e| port_failure("Failed to update todo", e))?;
    Ok(Json(TodoResponse::from(todo)))
}

/// DELETE /todos/{id}
#[utoipa::path(
    delete,
    path = "/todos/{id}",
    params(("id" = Uuid, Path, description = "Todo id")),
    responses(
        (status = 200, description = "Todo deleted", body = MessageResponse),
        (status = 404, description = "Todo not found")
    )
)]
pub async fn delete_todo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(todo_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .delete_todo(user_id, todo_id)
        .await
        .map_err(|e| port_failure("Failed to delete todo", e))?;
    Ok(Json(MessageResponse {
        message: "Todo deleted".to_string(),
    }))
}

/// GET /todos/today - Todos on one local calendar day, earliest first.
#[utoipa::path(
    get,
    path = "/todos/today",
    params(DateQuery),
    responses(
        (status = 200, description = "Todos of the day", body = [TodoResponse]),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn today_todos_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let day = match params.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_day_param(&normalizer, "date", raw)?,
        None => normalizer
            .to_local_calendar_date(Utc::now())
            .ok_or_else(|| out_of_range("date"))?,
    };

    let todos = todos_in_window(&state, user_id, &WeekWindow::from_days(day, day), &normalizer).await?;
    let records: Vec<Record> = todos.iter().map(Todo::to_record).collect();
    let mut selected = filter_by_day(&records, day, user_id, &normalizer);
    sort_records(&mut selected, SortKey::OccurredAtAsc);
    Ok(Json(select_todos(todos, &selected)))
}

/// GET /todos/weekly - The week containing `date`, with its rollup.
#[utoipa::path(
    get,
    path = "/todos/weekly",
    params(DateQuery),
    responses(
        (status = 200, description = "Todos and totals of the week", body = WeeklyTodosResponse),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn weekly_todos_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let reference = reference_instant(&normalizer, params.date.as_deref())?;
    let window = normalizer
        .week_containing(reference, state.config.week_start)
        .ok_or_else(|| out_of_range("date"))?;

    let todos = todos_in_window(&state, user_id, &window, &normalizer).await?;
    let records: Vec<Record> = todos.iter().map(Todo::to_record).collect();
    let mut in_week = filter_by_window(&records, &window, user_id, &normalizer);
    let totals = aggregate(in_week.iter().copied());
    sort_records(&mut in_week, SortKey::OccurredAtAsc);

    Ok(Json(WeeklyTodosResponse {
        week_start: window.start_date(),
        week_end: window.end_date(),
        totals: totals.into(),
        todos: select_todos(todos, &in_week),
    }))
}

/// GET /todos/by-topic - Every session logged under one task title, with
/// minutes per local day.
#[utoipa::path(
    get,
    path = "/todos/by-topic",
    params(TitleQuery),
    responses(
        (status = 200, description = "Session history", body = TopicHistoryResponse),
        (status = 400, description = "Missing title")
    )
)]
pub async fn todos_by_topic_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<TitleQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let title = params.title.trim();
    if title.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Title is required".to_string()));
    }
    let normalizer = state.normalizer(params.utc_offset_minutes)?;
    let todos = state
        .db
        .list_todos_by_task(user_id, title)
        .await
        .map_err(|e| port_failure("Failed to fetch topic history", e))?;

    let records: Vec<Record> = todos.iter().map(Todo::to_record).collect();
    let days = group_by_day(&records, &normalizer)
        .into_iter()
        .map(DayBucketResponse::from)
        .collect();

    Ok(Json(TopicHistoryResponse {
        title: title.to_string(),
        sessions: todos.into_iter().map(TodoResponse::from).collect(),
        days,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_durations_are_rejected() {
        assert_eq!(duration_minutes(45), Ok(45));
        assert_eq!(duration_minutes(0), Ok(0));
        assert_eq!(
            duration_minutes(-5).map_err(|(status, _)| status),
            Err(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn durations_past_the_store_limit_are_rejected() {
        assert_eq!(duration_minutes(i64::from(MAX_MINUTES)), Ok(MAX_MINUTES));
        assert_eq!(
            duration_minutes(i64::from(MAX_MINUTES) + 1).map_err(|(status, _)| status),
            Err(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn dates_at_the_calendar_edge_are_a_bad_request() {
        let err = reference_instant(&LocalDateNormalizer::utc(), Some("+262142-12-31"));
        assert_eq!(err.map_err(|(status, _)| status), Err(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn missing_date_means_now() {
        let before = Utc::now();
        let at = reference_instant(&LocalDateNormalizer::utc(), None).unwrap();
        assert!(at >= before);
        let blank = reference_instant(&LocalDateNormalizer::utc(), Some("  ")).unwrap();
        assert!(blank >= before);
    }

    #[test]
    fn malformed_date_is_a_bad_request() {
        let err = reference_instant(&LocalDateNormalizer::utc(), Some("next tuesday"));
        assert_eq!(err.map_err(|(status, _)| status), Err(StatusCode::BAD_REQUEST));
    }
}
