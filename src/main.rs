//! # WhatsApp Cloud API Gateway
//!
//! Main entry point. Receives provider webhooks for every configured
//! account, keeps conversation history and delivery status in SQLite, and
//! exposes an internal API to send messages and manage accounts.

pub mod api;
pub mod config;
pub mod consts;
pub mod logger;
pub mod metric;
pub mod models;
pub mod repo;
pub mod server;
pub mod services;
pub mod utils;
pub mod webhook;

use anyhow::Context;
use logfire::config::MetricsOptions;
use ntex::web;
use std::sync::Arc;

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    config::init_config()?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Initialize logging and metrics. Without a token spans stay local.
    let send_to_logfire = if app_config.logfire_token.is_some() {
        logfire::config::SendToLogfire::Yes
    } else {
        logfire::config::SendToLogfire::No
    };
    let mut logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(send_to_logfire);
    if let Some(token) = &app_config.logfire_token {
        logfire_config = logfire_config.with_token(token);
    }
    let shutdown_handler = logfire_config.finish()?;

    // Crate `log` records go to the console on local runs
    if app_config.logfire_token.is_none()
        && let Err(e) = logger::setup_simple_logger(!app_config.is_prod())
    {
        tracing::warn!("Console logger not installed: {}", e);
    }

    // Initialize database connection pool
    let sqlite_repo = repo::sqlite::SqlxSqliteRepo {
        db_pool: utils::setup_sqlite_db_pool().await?,
    };
    sqlite_repo.init_schema().await?;

    let account_cache: services::ImplAccountCache = if app_config.account_cache_enabled {
        Arc::new(services::account_cache::DashMapAccountCache::new())
    } else {
        Arc::new(services::account_cache::NoopAccountCache)
    };

    let whatsapp_client = webhook::whatsapp::client::WhatsAppClient::from_config()?;

    configure_and_run_server(sqlite_repo, account_cache, whatsapp_client).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Creates application state from the provided services
fn create_app_state(
    sqlite_repo: repo::sqlite::SqlxSqliteRepo,
    account_cache: services::ImplAccountCache,
    whatsapp_client: webhook::whatsapp::client::WhatsAppClient,
    internal_api_secret: String,
) -> server::AppState {
    server::AppState {
        repo: Box::new(sqlite_repo),
        account_cache,
        whatsapp_client: Box::new(whatsapp_client),
        internal_api_secret,
    }
}

/// Configures and starts the web server
async fn configure_and_run_server(
    sqlite_repo: repo::sqlite::SqlxSqliteRepo,
    account_cache: services::ImplAccountCache,
    whatsapp_client: webhook::whatsapp::client::WhatsAppClient,
) -> anyhow::Result<()> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let server_addr = app_config.server_addr();
    let internal_api_secret = app_config.internal_api_secret.clone();

    tracing::info!(
        "Starting wa-gateway on {}:{} ({})",
        server_addr.0,
        server_addr.1,
        app_config.env
    );

    // Workers share the cache so invalidations are seen by all of them
    web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(create_app_state(
                sqlite_repo.clone(),
                account_cache.clone(),
                whatsapp_client.clone(),
                internal_api_secret.clone(),
            ))
            .configure(webhook::routes::whatsapp)
            .configure(server::routes::messages)
            .configure(server::routes::accounts)
    })
    .bind(server_addr)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
