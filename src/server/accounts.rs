//! Account administration endpoints, mounted under
//! `/organizations/{organization_id}/accounts`.
//!
//! Credentials are accepted on create and update but never returned.

use super::{AppState, errors::ApiError, guard};
use crate::{
    api::{
        self,
        account::{NewAccountRequest, UpdateAccountRequest},
    },
    models::account::AccountResponse,
};
use ntex::web;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TemplateSyncResponse {
    pub synced: usize,
}

#[web::post("")]
pub async fn create_account(
    req: web::HttpRequest,
    path: web::types::Path<(i64,)>,
    payload: web::types::Json<NewAccountRequest>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;

    let account = api::account::create_account(
        &app_state.repo,
        &app_state.account_cache,
        path.0,
        payload.into_inner(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Created().json(&AccountResponse::from(&account)))
}

#[web::get("")]
pub async fn list_accounts(
    req: web::HttpRequest,
    path: web::types::Path<(i64,)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;

    let accounts = api::account::list_accounts(&app_state.repo, path.0)
        .await
        .map_err(ApiError::from)?
        .iter()
        .map(AccountResponse::from)
        .collect::<Vec<_>>();

    Ok(web::HttpResponse::Ok().json(&accounts))
}

#[web::get("/{account_id}")]
pub async fn get_account(
    req: web::HttpRequest,
    path: web::types::Path<(i64, i64)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let (organization_id, account_id) = path.into_inner();

    let account = api::account::get_account(&app_state.repo, organization_id, account_id)
        .await
        .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&AccountResponse::from(&account)))
}

#[web::put("/{account_id}")]
pub async fn update_account(
    req: web::HttpRequest,
    path: web::types::Path<(i64, i64)>,
    payload: web::types::Json<UpdateAccountRequest>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let (organization_id, account_id) = path.into_inner();

    let account = api::account::update_account(
        &app_state.repo,
        &app_state.account_cache,
        organization_id,
        account_id,
        payload.into_inner(),
    )
    .await
    .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&AccountResponse::from(&account)))
}

#[web::delete("/{account_id}")]
pub async fn delete_account(
    req: web::HttpRequest,
    path: web::types::Path<(i64, i64)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let (organization_id, account_id) = path.into_inner();

    api::account::delete_account(
        &app_state.repo,
        &app_state.account_cache,
        organization_id,
        account_id,
    )
    .await
    .map_err(ApiError::from)?;

    Ok(web::HttpResponse::NoContent().finish())
}

/// Probes the provider with the stored credentials.
#[web::post("/{account_id}/test")]
pub async fn test_connection(
    req: web::HttpRequest,
    path: web::types::Path<(i64, i64)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let (organization_id, account_id) = path.into_inner();

    let account = api::account::get_account(&app_state.repo, organization_id, account_id)
        .await
        .map_err(ApiError::from)?;
    let report = api::account::test_connection(&app_state.whatsapp_client, &account).await;

    Ok(web::HttpResponse::Ok().json(&report))
}

#[web::post("/{account_id}/templates/sync")]
pub async fn sync_templates(
    req: web::HttpRequest,
    path: web::types::Path<(i64, i64)>,
    app_state: web::types::State<AppState>,
) -> Result<impl web::Responder, web::Error> {
    guard::require_internal_secret(&req, &app_state)?;
    let (organization_id, account_id) = path.into_inner();

    let account = api::account::get_account(&app_state.repo, organization_id, account_id)
        .await
        .map_err(ApiError::from)?;
    let synced =
        api::template::sync_templates(&app_state.repo, &app_state.whatsapp_client, &account)
            .await
            .map_err(ApiError::from)?;

    Ok(web::HttpResponse::Ok().json(&TemplateSyncResponse { synced }))
}
