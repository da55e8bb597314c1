//! Outbound send endpoints and contact queries.
//!
//! All routes require the `X-Internal-Secret` header.

use super::{AppState, errors::ApiError, guard};
use crate::{
    api::{self, SendError, dispatcher::TemplateSend, session_window::WindowState},
    models::message::Message,
};
use chrono::Utc;
use ntex::web;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

#[derive(Debug, Deserialize)]
pub struct SendTextPayload {
    pub organization_id: i64,
    /// Sending number, the organization's default outgoing account if omitted
    pub phone_id: Option<String>,
    pub to: String,
    pub body: String,
    /// Caller deadline for the provider call
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SendTemplatePayload {
    pub organization_id: i64,
    pub phone_id: Option<String>,
    pub to: String,
    pub template_name: String,
    pub language: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ContactWindowResponse {
    pub contact_id: i64,
    #[serde(flatten)]
    pub window: WindowState,
}

fn deadline(timeout_ms: Option<u64>) -> Option<Duration> {
    timeout_ms.map(Duration::from_millis)
}

fn require_recipient(to: &str) -> Result<(), ApiError> {
    if to.trim().is_empty() {
        return Err(SendError::InvalidRequest("recipient is required".to_string()).into());
    }
    Ok(())
}

/// Free-form text send. `409` with `window_closed` outside the window.
#[web::post("/messages")]
pub async fn send_text(
    req: web::HttpRequest,
    payload: web::types::Json<SendTextPayload>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    require_recipient(&payload.to)?;

    let account = api::account::resolve_sending_account(
        &app_state.repo,
        &app_state.account_cache,
        payload.organization_id,
        payload.phone_id.as_deref(),
    )
    .await
    .map_err(ApiError::from)?;

    // A contact we never heard from has no open window
    let contact = app_state
        .repo
        .get_contact_by_phone(account.id, &payload.to)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::Send(SendError::WindowClosed))?;

    let message = api::dispatcher::send_text(
        &app_state.repo,
        &app_state.whatsapp_client,
        &account,
        &contact,
        &payload.body,
        deadline(payload.timeout_ms),
        Utc::now(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&message))
}

/// Template send, allowed regardless of the session window.
#[web::post("/messages/template")]
pub async fn send_template(
    req: web::HttpRequest,
    payload: web::types::Json<SendTemplatePayload>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    require_recipient(&payload.to)?;

    let payload = payload.into_inner();
    let account = api::account::resolve_sending_account(
        &app_state.repo,
        &app_state.account_cache,
        payload.organization_id,
        payload.phone_id.as_deref(),
    )
    .await
    .map_err(ApiError::from)?;

    let contact = app_state
        .repo
        .upsert_contact(account.id, &payload.to, None)
        .await
        .map_err(ApiError::from)?;

    let request = TemplateSend {
        name: payload.template_name,
        language: payload.language,
        variables: payload.variables,
    };

    let message = api::dispatcher::send_template(
        &app_state.repo,
        &app_state.whatsapp_client,
        &account,
        &contact,
        &request,
        deadline(payload.timeout_ms),
        Utc::now(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&message))
}

#[web::get("/contacts/{contact_id}/window")]
pub async fn contact_window(
    req: web::HttpRequest,
    path: web::types::Path<(i64,)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let contact_id = path.0;

    app_state
        .repo
        .get_contact(contact_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("contact {contact_id} not found")))?;

    let window = api::session_window::window_state(&app_state.repo, contact_id, Utc::now())
        .await
        .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&ContactWindowResponse { contact_id, window }))
}

#[web::get("/contacts/{contact_id}/messages")]
pub async fn contact_messages(
    req: web::HttpRequest,
    path: web::types::Path<(i64,)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;

    let messages: Vec<Message> = app_state
        .repo
        .list_contact_messages(path.0)
        .await
        .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&messages))
}
