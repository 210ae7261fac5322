//! HTTP front door tests
//!
//! The router is exercised in-process via tower's `oneshot`; no sockets.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use rollcall::build_router;
use rollcall::store::NewParticipant;
use rollcall::AppState;

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn command_request(command: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/command")
        .body(Body::from(command.to_string()))
        .unwrap()
}

async fn body_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// State with one known, unregistered participant on the roster.
async fn seeded_state() -> AppState {
    let dir = tempfile::tempdir().unwrap();
    let state = helpers::state_with_store(dir.path().to_path_buf()).await;
    {
        let mut roster = state.roster.write().await;
        roster.add_sheet_row(&helpers::sheet_row(&[
            "00123", "Doe", "Jane", "Senior", "CS", "jd@x.edu",
        ]));
        roster.set_populated();
    }
    // tempdir only backs export commands; keep it alive via leak
    std::mem::forget(dir);
    state
}

#[tokio::test]
async fn check_in_known_id_registers_once() {
    let state = seeded_state().await;
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(form_request("/register", "id=00123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], true);
    assert_eq!(json["fname"], "Jane");
    assert_eq!(json["lname"], "Doe");
    assert!(json.get("alreadyRegistered").is_none());

    // Second scan: idempotent, counter unchanged
    let response = app
        .oneshot(form_request("/register", "id=00123"))
        .await
        .unwrap();
    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], true);
    assert_eq!(json["alreadyRegistered"], true);

    assert_eq!(state.roster.read().await.registered_count(), 1);
}

#[tokio::test]
async fn check_in_matches_leading_zero_variant() {
    let state = seeded_state().await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(form_request("/register", "id=123"))
        .await
        .unwrap();
    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], true);
    assert_eq!(json["fname"], "Jane");
}

#[tokio::test]
async fn check_in_unknown_id_is_flagged_not_erred() {
    let state = seeded_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(form_request("/register", "id=77777"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], false);
}

#[tokio::test]
async fn register_new_creates_and_counts() {
    let state = seeded_state().await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(form_request(
            "/register/new",
            "id=00999&first=Sam&last=Lee&year=Freshman&major=Bio&email=sl%40x.edu",
        ))
        .await
        .unwrap();
    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], true);
    assert_eq!(json["id"], "00999");
    assert_eq!(json["fname"], "Sam");

    let roster = state.roster.read().await;
    let idx = roster.find_by_id("00999").unwrap();
    let entry = roster.get(idx).unwrap();
    assert!(entry.is_new);
    assert!(entry.registered);
    assert_eq!(entry.email, "sl@x.edu");

    let stats = roster.stats();
    assert_eq!(stats.registered, 1);
    assert_eq!(stats.registered_new, 1);
}

#[tokio::test]
async fn register_new_without_required_fields_is_a_validation_flag() {
    let state = seeded_state().await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(form_request("/register/new", "last=Lee&year=Freshman"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["registered"], false);
    assert_eq!(json["registerError"], true);
    assert_eq!(state.roster.read().await.len(), 1);
}

#[tokio::test]
async fn stats_command_reports_counters_and_averages() {
    let state = seeded_state().await;
    {
        let mut roster = state.roster.write().await;
        roster.check_in("00123");
        roster.register_new(NewParticipant {
            id: "00999".into(),
            first: "Sam".into(),
            last: "Lee".into(),
            ..Default::default()
        });
    }
    let app = build_router(state);

    let response = app.oneshot(command_request("/request/stats")).await.unwrap();
    let json = body_json(response.into_body()).await;

    let data = &json["data"];
    assert_eq!(data["length"], 2);
    assert_eq!(data["stats"]["registeredCount"], 2);
    assert_eq!(data["stats"]["registeredNewCount"], 1);
    assert_eq!(data["stats"]["deletedCount"], 0);
    assert_eq!(data["stats"]["average"], 0.0);
}

#[tokio::test]
async fn delete_top_removes_first_recent_registrant() {
    let state = seeded_state().await;
    {
        let mut roster = state.roster.write().await;
        roster.check_in("00123");
        roster.register_new(NewParticipant {
            id: "00999".into(),
            first: "Sam".into(),
            last: "Lee".into(),
            ..Default::default()
        });
    }
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(command_request("/event/delete/top"))
        .await
        .unwrap();
    assert_eq!(body_text(response.into_body()).await, "success");

    {
        let roster = state.roster.read().await;
        let jane = roster.get(roster.find_by_id("00123").unwrap()).unwrap();
        assert!(jane.deleted);
        assert_eq!(roster.stats().registered, 1);
        assert_eq!(roster.stats().deleted, 1);
    }

    // Deleting again targets the next (bottom == top now) entry, then an
    // empty list answers with an error body
    let response = app
        .clone()
        .oneshot(command_request("/event/delete/bottom"))
        .await
        .unwrap();
    assert_eq!(body_text(response.into_body()).await, "success");

    let response = app
        .oneshot(command_request("/event/delete/top"))
        .await
        .unwrap();
    let json = body_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("No entry"));
}

#[tokio::test]
async fn rename_command_updates_session_and_store() {
    let state = seeded_state().await;
    let pool = state.db.clone().unwrap();
    rollcall::db::sessions::create_if_missing(
        &pool,
        helpers::TEST_SESSION_KEY,
        helpers::TEST_SESSION_KEY,
        "spring",
        2016,
    )
    .await
    .unwrap();

    let app = build_router(state.clone());
    let response = app
        .oneshot(command_request("/event/name/Career%20Night"))
        .await
        .unwrap();
    assert_eq!(body_text(response.into_body()).await, "success");

    assert_eq!(state.session.read().await.name(), "Career Night");
    let rows = rollcall::db::sessions::fetch_all(&pool).await.unwrap();
    assert_eq!(rows[0].name, "Career Night");
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let state = seeded_state().await;
    let app = build_router(state);

    let response = app.oneshot(command_request("/frobnicate")).await.unwrap();
    assert_eq!(
        body_text(response.into_body()).await,
        "ERR: Invalid command [frobnicate]"
    );
}

#[tokio::test]
async fn export_command_writes_the_session_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let state = helpers::state_with_store(dir.path().to_path_buf()).await;
    {
        let mut roster = state.roster.write().await;
        roster.add_sheet_row(&helpers::sheet_row(&[
            "00123", "Doe", "Jane", "Senior", "CS", "jd@x.edu",
        ]));
    }
    let app = build_router(state.clone());

    let response = app.oneshot(command_request("/export/excel")).await.unwrap();
    assert_eq!(body_text(response.into_body()).await, "success");

    let path = state
        .config
        .session_roster_path(helpers::TEST_SESSION_KEY);
    assert!(path.exists());
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let state = seeded_state().await;
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "rollcall");
}

#[tokio::test]
async fn index_page_is_served() {
    let state = seeded_state().await;
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response.into_body()).await;
    assert!(html.contains("rollcall"));
}
