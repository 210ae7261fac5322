//! Check-in and register-new handlers
//!
//! Both answer JSON to the scanning client. Missing participants and
//! validation failures are reported through response flags, never as HTTP
//! errors.

use axum::extract::State;
use axum::{Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::events::AppEvent;
use crate::store::{CheckIn, NewParticipant};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInForm {
    pub id: String,
}

#[derive(Debug, Default, Serialize)]
pub struct CheckInResponse {
    pub id: String,
    pub registered: bool,
    #[serde(rename = "alreadyRegistered", skip_serializing_if = "Option::is_none")]
    pub already_registered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lname: Option<String>,
}

/// POST /register, body `id=<value>`
///
/// Idempotent per session: a repeat scan answers
/// `{registered: true, alreadyRegistered: true}` and changes nothing.
pub async fn check_in(
    State(state): State<AppState>,
    Form(form): Form<CheckInForm>,
) -> Json<CheckInResponse> {
    let mut response = CheckInResponse {
        id: form.id.clone(),
        ..Default::default()
    };

    let outcome = {
        let mut roster = state.roster.write().await;
        let outcome = roster.check_in(&form.id);
        if let CheckIn::Registered(idx) | CheckIn::AlreadyRegistered(idx) = outcome {
            if let Some(entry) = roster.get(idx) {
                response.registered = true;
                response.fname = Some(entry.first.clone());
                response.lname = Some(entry.last.clone());
            }
        }
        outcome
    };

    match outcome {
        CheckIn::Registered(_) => {
            info!("Checked in participant {}", form.id);
            state.bus.emit_lossy(AppEvent::ParticipantRegistered {
                id: form.id,
                is_new: false,
                timestamp: Utc::now(),
            });
        }
        CheckIn::AlreadyRegistered(_) => {
            response.already_registered = Some(true);
        }
        CheckIn::NotFound => {}
    }

    Json(response)
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterNewForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub last: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RegisterNewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub registered: bool,
    #[serde(rename = "registerError", skip_serializing_if = "Option::is_none")]
    pub register_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lname: Option<String>,
}

/// POST /register/new, form-encoded participant fields
///
/// Always creates a new record; duplicate pre-checks are the client's job.
/// Missing id or first name is a validation flag in the response, not an
/// error.
pub async fn register_new(
    State(state): State<AppState>,
    Form(form): Form<RegisterNewForm>,
) -> Json<RegisterNewResponse> {
    if form.id.trim().is_empty() || form.first.trim().is_empty() {
        return Json(RegisterNewResponse {
            registered: false,
            register_error: Some(true),
            ..Default::default()
        });
    }

    info!("Registering '{} {}' with id {}", form.first, form.last, form.id);

    {
        let mut roster = state.roster.write().await;
        roster.register_new(NewParticipant {
            id: form.id.clone(),
            first: form.first.clone(),
            last: form.last.clone(),
            year: form.year,
            major: form.major,
            email: form.email,
        });
    }

    state.bus.emit_lossy(AppEvent::ParticipantRegistered {
        id: form.id.clone(),
        is_new: true,
        timestamp: Utc::now(),
    });

    Json(RegisterNewResponse {
        id: Some(form.id),
        registered: true,
        fname: Some(form.first),
        lname: Some(form.last),
        ..Default::default()
    })
}
