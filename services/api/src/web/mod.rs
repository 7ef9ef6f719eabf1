pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod stats;
pub mod todos;
pub mod topics;
pub mod tracks;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
use state::AppState;

/// Builds the API router: the auth endpoints are public, everything else
/// sits behind `require_auth`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route(
            "/predefined-topics",
            get(topics::list_predefined_topics_handler),
        );

    let protected_routes = Router::new()
        .route(
            "/tracks",
            get(tracks::list_tracks_handler).post(tracks::create_track_handler),
        )
        .route("/tracks/seed", post(tracks::seed_tracks_handler))
        .route(
            "/tracks/{id}",
            patch(tracks::update_track_handler).delete(tracks::delete_track_handler),
        )
        .route(
            "/topics",
            get(topics::list_topics_handler).post(topics::create_topic_handler),
        )
        .route(
            "/topics/{id}",
            get(topics::get_topic_handler)
                .patch(topics::update_topic_handler)
                .delete(topics::delete_topic_handler),
        )
        .route(
            "/topics/{id}/notes",
            get(topics::get_notes_handler).put(topics::put_notes_handler),
        )
        .route(
            "/todos",
            get(todos::list_todos_handler).post(todos::create_todo_handler),
        )
        .route("/todos/today", get(todos::today_todos_handler))
        .route("/todos/weekly", get(todos::weekly_todos_handler))
        .route("/todos/by-topic", get(todos::todos_by_topic_handler))
        .route(
            "/todos/{id}",
            patch(todos::update_todo_handler).delete(todos::delete_todo_handler),
        )
        .route("/stats/weekly", get(stats::weekly_stats_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
