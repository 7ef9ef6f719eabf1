//! End-to-end checks of the HTTP surface over the in-memory store.

use api_lib::{
    adapters::MemoryAdapter,
    config::Config,
    web::{router, state::AppState},
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = Arc::new(AppState {
        db: Arc::new(MemoryAdapter::new()),
        config: Arc::new(Config::default()),
    });
    router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, set_cookie, json)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, cookie, _) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": username, "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    cookie.expect("register sets a session cookie")
}

async fn add_todo(app: &Router, cookie: &str, task: &str, date: &str, minutes: u32, done: bool) {
    let (status, _, _) = send(
        app,
        "POST",
        "/todos",
        Some(cookie),
        Some(json!({ "task": task, "date": date, "duration": minutes, "completed": done })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = app();
    let (status, _, _) = send(&app, "GET", "/todos/weekly", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, "GET", "/todos", Some("session=bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_usernames_conflict_and_logout_ends_the_session() {
    let app = app();
    let cookie = register(&app, "ada").await;

    let (status, _, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "ada", "password": "another" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(&app, "POST", "/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, "GET", "/todos", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn weekly_rollup_counts_only_completed_minutes() {
    let app = app();
    let cookie = register(&app, "ada").await;
    add_todo(&app, &cookie, "Closures", "2024-06-04T09:00:00Z", 30, true).await;
    add_todo(&app, &cookie, "Promises", "2024-06-05T09:00:00Z", 45, false).await;
    add_todo(&app, &cookie, "Generators", "2024-06-10T09:00:00Z", 60, true).await;

    let (status, _, body) = send(&app, "GET", "/todos/weekly?date=2024-06-05", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["weekStart"], "2024-06-02");
    assert_eq!(body["weekEnd"], "2024-06-08");
    assert_eq!(body["total"], 2);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["remaining"], 1);
    assert_eq!(body["durationMinutes"], 30);
    let tasks: Vec<&str> = body["todos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["task"].as_str().unwrap())
        .collect();
    assert_eq!(tasks, vec!["Closures", "Promises"]);
}

#[tokio::test]
async fn other_users_records_never_show_up() {
    let app = app();
    let ada = register(&app, "ada").await;
    let grace = register(&app, "grace").await;
    add_todo(&app, &ada, "Closures", "2024-06-04T09:00:00Z", 30, true).await;

    let (_, _, body) = send(&app, "GET", "/todos/weekly?date=2024-06-05", Some(&grace), None).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["durationMinutes"], 0);

    let (_, _, body) = send(&app, "GET", "/todos", Some(&grace), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn caller_offset_decides_the_local_day() {
    let app = app();
    let cookie = register(&app, "ada").await;
    // Sunday 02:00 UTC is still Saturday evening at UTC-05:00.
    add_todo(&app, &cookie, "Late study", "2024-06-09T02:00:00Z", 20, true).await;

    let (_, _, body) = send(
        &app,
        "GET",
        "/todos/today?date=2024-06-08&utcOffsetMinutes=-300",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (_, _, body) = send(&app, "GET", "/todos/today?date=2024-06-08", Some(&cookie), None).await;
    assert_eq!(body, json!([]));

    let (_, _, body) = send(
        &app,
        "GET",
        "/todos/weekly?date=2024-06-05&utcOffsetMinutes=-300",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(body["total"], 1);

    let (status, _, _) = send(
        &app,
        "GET",
        "/todos/today?utcOffsetMinutes=9000",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn topic_history_groups_sessions_by_day() {
    let app = app();
    let cookie = register(&app, "ada").await;
    add_todo(&app, &cookie, "Closures", "2024-06-04T09:00:00Z", 20, true).await;
    add_todo(&app, &cookie, "Closures", "2024-06-04T18:00:00Z", 25, false).await;
    add_todo(&app, &cookie, "Closures", "2024-06-06T09:00:00Z", 10, true).await;
    add_todo(&app, &cookie, "Promises", "2024-06-06T10:00:00Z", 50, true).await;

    let (status, _, body) = send(&app, "GET", "/todos/by-topic?title=Closures", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().map(Vec::len), Some(3));
    assert_eq!(
        body["days"],
        json!([
            { "day": "2024-06-04", "totalMinutes": 45, "count": 2 },
            { "day": "2024-06-06", "totalMinutes": 10, "count": 1 }
        ])
    );
}

#[tokio::test]
async fn todo_list_filters_and_sorts() {
    let app = app();
    let cookie = register(&app, "ada").await;
    add_todo(&app, &cookie, "Promises", "2024-06-04T09:00:00Z", 30, false).await;
    add_todo(&app, &cookie, "Async iteration", "2024-06-05T09:00:00Z", 30, false).await;
    add_todo(&app, &cookie, "Closures", "2024-06-20T09:00:00Z", 30, false).await;

    let (_, _, body) = send(
        &app,
        "GET",
        "/todos?startDate=2024-06-01&endDate=2024-06-07&sort=title",
        Some(&cookie),
        None,
    )
    .await;
    let tasks: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["task"].as_str().unwrap())
        .collect();
    assert_eq!(tasks, vec!["Async iteration", "Promises"]);

    let (_, _, body) = send(&app, "GET", "/todos?search=CLOS", Some(&cookie), None).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _, _) = send(&app, "GET", "/todos?sort=priority", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        "POST",
        "/todos",
        Some(&cookie),
        Some(json!({ "task": "Negative", "date": "2024-06-04", "duration": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seeded_topics_feed_the_weekly_stats() {
    let app = app();
    let cookie = register(&app, "ada").await;

    let (status, _, body) = send(&app, "POST", "/tracks/seed", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tracks"].as_array().map(Vec::len), Some(3));
    let (status, _, _) = send(&app, "POST", "/tracks/seed", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, topics) = send(&app, "GET", "/topics?search=flexbox", Some(&cookie), None).await;
    let topics = topics.as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["title"], "Flexbox Layout");
    assert_eq!(topics[0]["trackName"], "CSS MDN Guides");
    let topic_id = topics[0]["id"].as_str().unwrap().to_string();

    let (status, _, updated) = send(
        &app,
        "PATCH",
        &format!("/topics/{}", topic_id),
        Some(&cookie),
        Some(json!({ "completed": true, "lastStudiedAt": "2024-06-04T10:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["completed"], true);

    let (_, _, stats) = send(&app, "GET", "/stats/weekly?date=2024-06-05", Some(&cookie), None).await;
    assert_eq!(stats["weekStart"], "2024-06-02");
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["remaining"], 0);
    assert_eq!(stats["durationMinutes"], 35);
    assert_eq!(stats["byTrack"][0]["trackName"], "CSS MDN Guides");

    let (_, _, in_week) = send(
        &app,
        "GET",
        "/topics?weekStart=2024-06-02&weekEnd=2024-06-08",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(in_week.as_array().map(Vec::len), Some(1));

    let (status, _, _) = send(&app, "GET", "/topics?sort=priority", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notes_default_to_empty_and_store_blanks_as_null() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let (_, _, track) = send(
        &app,
        "POST",
        "/tracks",
        Some(&cookie),
        Some(json!({ "name": "Rust" })),
    )
    .await;
    let (status, _, topic) = send(
        &app,
        "POST",
        "/topics",
        Some(&cookie),
        Some(json!({ "title": "Ownership", "trackId": track["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(topic["targetMinutes"], 15);
    let notes_uri = format!("/topics/{}/notes", topic["id"].as_str().unwrap());

    let (_, _, empty) = send(&app, "GET", &notes_uri, Some(&cookie), None).await;
    assert_eq!(empty["keyIdea"], Value::Null);

    let (status, _, saved) = send(
        &app,
        "PUT",
        &notes_uri,
        Some(&cookie),
        Some(json!({ "keyIdea": "One owner at a time", "example": "  ", "recallQuestion": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["keyIdea"], "One owner at a time");
    assert_eq!(saved["example"], Value::Null);

    let other = register(&app, "grace").await;
    let (status, _, _) = send(&app, "GET", &notes_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn add_track(app: &Router, cookie: &str, name: &str) -> Value {
    let (status, _, track) = send(
        app,
        "POST",
        "/tracks",
        Some(cookie),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    track
}

async fn add_topic(app: &Router, cookie: &str, track: &Value, title: &str, scheduled: &str) -> String {
    let (status, _, topic) = send(
        app,
        "POST",
        "/topics",
        Some(cookie),
        Some(json!({ "title": title, "trackId": track["id"], "scheduledDate": scheduled })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    topic["id"].as_str().unwrap().to_string()
}

async fn mark_studied(app: &Router, cookie: &str, topic_id: &str, at: &str) {
    let (status, _, _) = send(
        app,
        "PATCH",
        &format!("/topics/{}", topic_id),
        Some(cookie),
        Some(json!({ "lastStudiedAt": at })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn date_sorts_use_the_named_topic_field() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let track = add_track(&app, &cookie, "Rust").await;
    let a = add_topic(&app, &cookie, &track, "Ownership", "2024-06-01T09:00:00Z").await;
    add_topic(&app, &cookie, &track, "Lifetimes", "2024-06-10T09:00:00Z").await;
    mark_studied(&app, &cookie, &a, "2024-06-20T09:00:00Z").await;

    let (status, _, by_schedule) =
        send(&app, "GET", "/topics?sort=scheduledDate", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&by_schedule), ["Ownership", "Lifetimes"]);

    let (_, _, by_study) = send(&app, "GET", "/topics?sort=lastStudiedAt", Some(&cookie), None).await;
    assert_eq!(titles(&by_study), ["Ownership", "Lifetimes"]);
}

#[tokio::test]
async fn a_topic_counts_in_the_week_of_either_date_once() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let track = add_track(&app, &cookie, "Rust").await;
    // Scheduled inside the week, last studied the week before.
    let early = add_topic(&app, &cookie, &track, "Traits", "2024-06-05T09:00:00Z").await;
    mark_studied(&app, &cookie, &early, "2024-05-29T09:00:00Z").await;
    // Both dates inside the week.
    let both = add_topic(&app, &cookie, &track, "Generics", "2024-06-03T09:00:00Z").await;
    mark_studied(&app, &cookie, &both, "2024-06-06T09:00:00Z").await;
    // Neither date inside the week.
    let outside = add_topic(&app, &cookie, &track, "Macros", "2024-05-20T09:00:00Z").await;
    mark_studied(&app, &cookie, &outside, "2024-06-12T09:00:00Z").await;

    let (status, _, stats) =
        send(&app, "GET", "/stats/weekly?date=2024-06-05", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);

    let (_, _, in_week) = send(
        &app,
        "GET",
        "/topics?weekStart=2024-06-02&weekEnd=2024-06-08&sort=title",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(titles(&in_week), ["Generics", "Traits"]);
}

#[tokio::test]
async fn tracks_can_be_reordered_and_renamed() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let track = add_track(&app, &cookie, "Rust").await;
    let uri = format!("/tracks/{}", track["id"].as_str().unwrap());

    let (status, _, moved) = send(&app, "PATCH", &uri, Some(&cookie), Some(json!({ "order": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["order"], 3);
    assert_eq!(moved["name"], "Rust");

    let (status, _, renamed) = send(
        &app,
        "PATCH",
        &uri,
        Some(&cookie),
        Some(json!({ "name": " Async Rust " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Async Rust");
    assert_eq!(renamed["order"], 3);

    for body in [json!({ "order": -1 }), json!({ "name": "" }), json!({ "order": 4294967296i64 })] {
        let (status, _, _) = send(&app, "PATCH", &uri, Some(&cookie), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn calendar_edge_dates_are_bad_requests() {
    let app = app();
    let cookie = register(&app, "ada").await;
    for uri in [
        "/todos/weekly?date=%2B262142-12-31",
        "/todos/today?date=%2B262142-12-31",
        "/stats/weekly?date=-262143-01-01",
        "/todos?startDate=%2B262142-12-31&endDate=%2B262142-12-31",
    ] {
        let (status, _, _) = send(&app, "GET", uri, Some(&cookie), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn minute_counts_beyond_the_store_limit_are_rejected() {
    let app = app();
    let cookie = register(&app, "ada").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/todos",
        Some(&cookie),
        Some(json!({ "task": "Read", "date": "2024-06-05", "duration": 2147483648i64 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let track = add_track(&app, &cookie, "Rust").await;
    let (status, _, _) = send(
        &app,
        "POST",
        "/topics",
        Some(&cookie),
        Some(json!({ "title": "Ownership", "trackId": track["id"], "targetMinutes": 2147483648i64 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
