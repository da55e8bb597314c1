//! WhatsApp webhook endpoint handlers
//!
//! One endpoint receives the deliveries of every account. The verification
//! handshake (GET) accepts any configured account's verify token, and each
//! delivery (POST) is authenticated against the app secrets of the accounts
//! it references.

use super::{handler, schemas, security};
use crate::{
    api, consts, metric,
    models::account::Account,
    server::{AppState, errors::ApiError},
};
use futures::future::join_all;
use ntex::{util::Bytes, web};
use serde::Deserialize;
use std::collections::HashMap;

/// Query parameters for webhook verification
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// The mode parameter, should be "subscribe"
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    /// The challenge string to echo back
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Webhook verification endpoint (GET)
///
/// # Returns
/// - 200 with the challenge if the mode is `subscribe` and the token belongs
///   to a configured account
/// - 403 otherwise
#[web::get("")]
pub async fn verify(
    query: web::types::Query<VerifyQuery>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    if query.mode.as_deref() != Some("subscribe") {
        return Err(ApiError::Unauthenticated.into());
    }

    let verify_token = query.verify_token.as_deref().unwrap_or_default();
    if verify_token.is_empty()
        || !app_state
            .repo
            .exists_account_with_verify_token(verify_token)
            .await
            .map_err(ApiError::from)?
    {
        logfire::warn!("Webhook verification failed: unknown verify token");
        return Err(ApiError::Unauthenticated.into());
    }

    Ok(web::HttpResponse::Ok()
        .content_type("text/plain")
        .body(query.challenge.clone().unwrap_or_default()))
}

/// Resolves the accounts referenced by the batch and keeps those whose app
/// secret verifies the signature. Each distinct secret is checked once.
async fn trusted_accounts(
    app_state: &AppState,
    signature: &str,
    body: &[u8],
    payload: &serde_json::Value,
) -> anyhow::Result<HashMap<String, Account>> {
    let phone_ids = schemas::phone_ids(payload);

    let resolved = join_all(phone_ids.iter().map(|phone_id| {
        api::account::resolve_account(&app_state.repo, &app_state.account_cache, phone_id)
    }))
    .await;

    let mut verified_secrets: HashMap<String, bool> = HashMap::new();
    let mut trusted = HashMap::new();

    for (phone_id, account) in phone_ids.into_iter().zip(resolved) {
        let Some(account) = account? else {
            logfire::warn!(
                "Account not found for phone id {phone_id}",
                phone_id = phone_id.clone()
            );
            continue;
        };

        let verified = *verified_secrets
            .entry(account.app_secret.clone())
            .or_insert_with(|| security::verify_signature(signature, body, &account.app_secret));

        if verified {
            trusted.insert(phone_id, account);
        }
    }

    Ok(trusted)
}

fn reject(reason: &str, body_len: usize) -> web::Error {
    metric::incr_signature_rejected_statds(reason);
    logfire::warn!(
        "Rejected webhook delivery ({reason}), payload of {body_len} bytes redacted",
        reason = reason.to_string(),
        body_len = body_len.to_string()
    );
    ApiError::Unauthenticated.into()
}

/// Webhook receiver endpoint (POST)
///
/// # Returns
/// - 200 for any authenticated batch, whatever happened to its events
/// - 403 when no referenced account verifies the signature
/// - 500 when the body is not JSON
#[web::post("")]
pub async fn receive(
    req: web::HttpRequest,
    body: Bytes,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    let _span = logfire::span!("whatsapp_webhook").entered();

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            logfire::error!(
                "Failed to parse webhook payload: {error}",
                error = e.to_string()
            );
            return Err(ApiError::InternalServerError("webhook body is not JSON".into()).into());
        }
    };

    let Some(signature) = req
        .headers()
        .get(consts::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(reject("missing_signature", body.len()));
    };

    let accounts = trusted_accounts(&app_state, signature, &body, &payload)
        .await
        .map_err(ApiError::from)?;

    if accounts.is_empty() {
        return Err(reject("invalid_signature", body.len()));
    }

    let report = handler::process_events(
        &app_state.repo,
        &app_state.whatsapp_client,
        &accounts,
        schemas::parse(&payload),
    )
    .await;

    logfire::info!(
        "Processed webhook batch: {stored} stored, {duplicates} duplicates, {statuses} statuses, {failed} failed",
        stored = report.stored.to_string(),
        duplicates = report.duplicates.to_string(),
        statuses = report.statuses_applied.to_string(),
        failed = report.failed.to_string()
    );

    Ok(web::HttpResponse::Ok().json(&serde_json::json!({
        "status": "received"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{fixtures::create_test_account, message::MessageStatus},
        repo::{GatewayRepo, sqlite::memory_repo},
        server::test_state::app_state,
        webhook::{
            routes,
            whatsapp::{
                client::{ImplWhatsAppApi, MockWhatsAppApi},
                schemas::samples,
                security::sign_payload,
            },
        },
    };
    use ntex::{http, web::test};

    fn idle_client() -> ImplWhatsAppApi {
        Box::new(MockWhatsAppApi::new())
    }

    async fn state_with_account() -> AppState {
        let state = app_state(idle_client()).await;
        state
            .repo
            .insert_account(&create_test_account(0, "1001"))
            .await
            .unwrap();
        state
    }

    #[test]
    fn test_verify_query_deserialization() {
        let json = r#"{"hub.mode":"subscribe","hub.verify_token":"test123","hub.challenge":"challenge123"}"#;
        let query: VerifyQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.mode.as_deref(), Some("subscribe"));
        assert_eq!(query.verify_token.as_deref(), Some("test123"));
        assert_eq!(query.challenge.as_deref(), Some("challenge123"));
    }

    #[ntex::test]
    async fn test_verify_handshake() {
        let state = state_with_account().await;
        let app = test::init_service(web::App::new().state(state).configure(routes::whatsapp)).await;

        let req = test::TestRequest::get()
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify&hub.challenge=1158201444")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(test::read_body(resp).await, Bytes::from_static(b"1158201444"));

        for uri in [
            "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
            "/webhook?hub.mode=unsubscribe&hub.verify_token=verify&hub.challenge=1",
            "/webhook?hub.challenge=1",
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
        }
    }

    #[ntex::test]
    async fn test_signed_delivery_is_stored_once() {
        let store = memory_repo().await;
        let account_id = store
            .insert_account(&create_test_account(0, "1001"))
            .await
            .unwrap();
        let mut state = app_state(idle_client()).await;
        state.repo = Box::new(store.clone());
        let app = test::init_service(web::App::new().state(state).configure(routes::whatsapp)).await;
        let body = samples::text_message("1001", "5215550001", "wamid.IN1", 1_700_000_000, "Hi")
            .to_string();
        let signature = sign_payload(body.as_bytes(), "app-secret");

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/webhook")
                .header("X-Hub-Signature-256", signature.as_str())
                .set_payload(body.clone())
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), http::StatusCode::OK);
        }

        let contact = store
            .get_contact_by_phone(account_id, "5215550001")
            .await
            .unwrap()
            .unwrap();
        let history = store.list_contact_messages(contact.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].provider_message_id, "wamid.IN1");
    }

    #[ntex::test]
    async fn test_wrong_secret_is_rejected_without_processing() {
        let state = state_with_account().await;
        let body = samples::text_message("1001", "5215550001", "wamid.IN1", 1_700_000_000, "Hi")
            .to_string();
        let signature = sign_payload(body.as_bytes(), "another-secret");

        let accounts = trusted_accounts(
            &state,
            &signature,
            body.as_bytes(),
            &serde_json::from_str(&body).unwrap(),
        )
        .await
        .unwrap();
        assert!(accounts.is_empty());

        let app = test::init_service(web::App::new().state(state).configure(routes::whatsapp)).await;
        let req = test::TestRequest::post()
            .uri("/webhook")
            .header("X-Hub-Signature-256", signature.as_str())
            .set_payload(body.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
    }

    #[ntex::test]
    async fn test_missing_signature_and_invalid_json() {
        let state = state_with_account().await;
        let app = test::init_service(web::App::new().state(state).configure(routes::whatsapp)).await;
        let body = samples::status("1001", "wamid.OUT1", "delivered", 1_700_000_000).to_string();

        let req = test::TestRequest::post()
            .uri("/webhook")
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/webhook")
            .header("X-Hub-Signature-256", sign_payload(b"not json", "app-secret").as_str())
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[ntex::test]
    async fn test_unknown_phone_id_is_rejected() {
        let state = state_with_account().await;
        let app = test::init_service(web::App::new().state(state).configure(routes::whatsapp)).await;
        let body = samples::text_message("9999", "5215550001", "wamid.IN1", 1_700_000_000, "Hi")
            .to_string();

        let req = test::TestRequest::post()
            .uri("/webhook")
            .header(
                "X-Hub-Signature-256",
                sign_payload(body.as_bytes(), "app-secret").as_str(),
            )
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
    }

    #[ntex::test]
    async fn test_only_verified_accounts_are_processed() {
        let state = state_with_account().await;
        let mut other = create_test_account(0, "2002");
        other.organization_id = 2;
        other.app_secret = "other-secret".into();
        state.repo.insert_account(&other).await.unwrap();

        let mut payload =
            samples::text_message("1001", "5215550001", "wamid.IN1", 1_700_000_000, "Hi");
        let foreign = samples::text_message("2002", "5215550002", "wamid.IN2", 1_700_000_000, "Yo");
        payload["entry"]
            .as_array_mut()
            .unwrap()
            .extend(foreign["entry"].as_array().unwrap().iter().cloned());
        let body = payload.to_string();
        let signature = sign_payload(body.as_bytes(), "app-secret");

        let accounts = trusted_accounts(&state, &signature, body.as_bytes(), &payload)
            .await
            .unwrap();

        assert_eq!(accounts.len(), 1);
        assert!(accounts.contains_key("1001"));

        let report = handler::process_events(
            &state.repo,
            &state.whatsapp_client,
            &accounts,
            schemas::parse(&payload),
        )
        .await;
        assert_eq!(report.stored, 1);
        assert_eq!(report.skipped, 1);
        let foreign_message = state.repo.get_message_by_provider_id("wamid.IN2").await.unwrap();
        assert!(foreign_message.is_none());
        let stored = state
            .repo
            .get_message_by_provider_id("wamid.IN1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, MessageStatus::Received);
    }
}
