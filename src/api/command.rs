//! Admin command handler
//!
//! POST /command takes a slash-delimited command string in the body:
//! `/export/<excel|csv|mysql>`, `/event/name/<urlencoded name>`,
//! `/event/delete/<top|bottom>`, `/request/stats`. Store and adapter
//! failures come back as plain-text or JSON error bodies.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::events::AppEvent;
use crate::export::{self, ExportFormat};
use crate::session;
use crate::AppState;

/// Counter block answered by `/request/stats`.
#[derive(Debug, Serialize)]
struct StatsPayload {
    average: f64,
    #[serde(rename = "averageNew")]
    average_new: f64,
    #[serde(rename = "deletedCount")]
    deleted_count: u32,
    #[serde(rename = "registeredCount")]
    registered_count: u32,
    #[serde(rename = "registeredNewCount")]
    registered_new_count: u32,
}

/// POST /command
pub async fn run_command(State(state): State<AppState>, body: String) -> Response {
    let trimmed = body.trim();
    let parts: Vec<&str> = trimmed.trim_start_matches('/').split('/').collect();

    match parts.first().copied() {
        Some("export") => run_export(&state, parts.get(1).copied()).await,
        Some("event") => run_event(&state, &parts).await,
        Some("request") if parts.get(1) == Some(&"stats") => stats(&state).await,
        Some(other) => format!("ERR: Invalid command [{}]", other).into_response(),
        None => "ERR: Invalid command []".into_response(),
    }
}

async fn run_export(state: &AppState, token: Option<&str>) -> Response {
    let Some(format) = token.and_then(ExportFormat::parse) else {
        return "ERR: Invalid export type.".into_response();
    };

    match export::run(state, format).await {
        Ok(()) => {
            info!("Database exported through '{}' command", format.as_str());

            // A successful store sync also refreshes the session sheet so a
            // spreadsheet copy of the event always exists on disk.
            if format == ExportFormat::Relational {
                if let Err(e) = export::run(state, ExportFormat::Sheet).await {
                    warn!("Post-sync sheet export failed: {}", e);
                }
            }
            "success".into_response()
        }
        Err(e) => format!("ERR: There was an error exporting the data: {}", e).into_response(),
    }
}

async fn run_event(state: &AppState, parts: &[&str]) -> Response {
    match parts.get(1).copied() {
        Some("name") => {
            let encoded = parts.get(2).copied().unwrap_or_default();
            if encoded.is_empty() {
                return "ERR: Invalid event action.".into_response();
            }
            let name = urlencoding::decode(encoded)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| encoded.to_string());
            rename_session(state, &name).await
        }
        Some("delete") => match parts.get(2).copied() {
            Some(end @ ("top" | "bottom")) => delete_recent(state, end).await,
            _ => "ERR: Invalid event action.".into_response(),
        },
        _ => "ERR: Invalid event action.".into_response(),
    }
}

async fn rename_session(state: &AppState, name: &str) -> Response {
    let key = {
        let mut session = state.session.write().await;
        match &state.db {
            Some(pool) => {
                if let Err(e) = session.rename(pool, name).await {
                    return format!("ERR: There was an error renaming the event: {}", e)
                        .into_response();
                }
            }
            None => session.set_name(name),
        }
        session.key().to_string()
    };

    state.bus.emit_lossy(AppEvent::SessionRenamed {
        key: key.clone(),
        name: name.to_string(),
    });

    // Refresh the session metadata mirrored on the aggregation server
    let sync = state.sync.clone();
    let name = name.to_string();
    tokio::spawn(async move {
        sync.send(
            "eventmetadata",
            json!({
                "eventId": key,
                "eventName": name,
                "semester": session::current_semester(),
                "year": session::current_year(),
            }),
        )
        .await;
    });

    "success".into_response()
}

async fn delete_recent(state: &AppState, end: &str) -> Response {
    // Snapshot the target before mutating so the attendance row can be
    // cleared first, the way the durable store is the record of truth.
    let target = {
        let roster = state.roster.read().await;
        let idx = if end == "top" {
            roster.recent_first()
        } else {
            roster.recent_last()
        };
        idx.and_then(|i| {
            roster
                .get(i)
                .map(|e| (i, e.id.clone(), e.in_session_table))
        })
    };

    if let Some((_, id, true)) = &target {
        if let Some(pool) = &state.db {
            let session_key = state.session.read().await.key().to_string();
            if let Err(e) = crate::db::attendance::delete_row(pool, &session_key, id).await {
                return Json(json!({ "error": e.to_string() })).into_response();
            }
        }
    }

    let mut roster = state.roster.write().await;
    match roster.remove(target.map(|(idx, _, _)| idx)) {
        Ok(()) => "success".into_response(),
        Err(e) => Json(json!({ "error": e.to_string() })).into_response(),
    }
}

async fn stats(state: &AppState) -> Response {
    let stats = state.roster.read().await.stats();
    let session = state.session.read().await;

    Json(json!({
        "data": {
            "stats": StatsPayload {
                average: session.average,
                average_new: session.average_new,
                deleted_count: stats.deleted,
                registered_count: stats.registered,
                registered_new_count: stats.registered_new,
            },
            "length": stats.registered,
        }
    }))
    .into_response()
}
