//! # HTTP Server Module
//!
//! Shared application state and the HTTP endpoints of the gateway, except
//! the provider webhook which lives in [`crate::webhook`].
//!
//! ## Modules
//!
//! - [`accounts`] - Account administration, connection test and template sync
//! - [`errors`] - JSON error responses
//! - [`guard`] - Internal API secret check
//! - [`messages`] - Outbound sends and contact queries
//! - [`routes`] - Route groups registered by `main`

pub mod accounts;
pub mod errors;
pub mod guard;
pub mod messages;
pub mod routes;

use crate::{repo, services, webhook};

pub struct AppState {
    pub repo: repo::ImplGatewayRepo,
    pub account_cache: services::ImplAccountCache,
    pub whatsapp_client: webhook::whatsapp::client::ImplWhatsAppApi,
    /// Expected `X-Internal-Secret` header value
    pub internal_api_secret: String,
}

#[cfg(test)]
pub mod test_state {
    use super::*;
    use crate::{repo::sqlite::memory_repo, services::account_cache::DashMapAccountCache};
    use std::sync::Arc;

    pub const TEST_INTERNAL_SECRET: &str = "internal-secret";

    pub async fn app_state(whatsapp_client: webhook::whatsapp::client::ImplWhatsAppApi) -> AppState {
        AppState {
            repo: Box::new(memory_repo().await),
            account_cache: Arc::new(DashMapAccountCache::new()),
            whatsapp_client,
            internal_api_secret: TEST_INTERNAL_SECRET.to_string(),
        }
    }
}
