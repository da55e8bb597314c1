//! Application configuration management with security considerations.
//!
//! Every value is read once from the environment at startup. Per-account
//! provider credentials (access tokens, app secrets, verify tokens) are NOT
//! configuration: they live in the `account` table and are resolved through
//! the account cache.
//!
//! # Security Notes
//! - Sensitive fields are clearly marked and should never be logged
//! - Production environments should use secure secret management systems

use anyhow::{Context, anyhow};
use envconfig::Envconfig;
use std::sync::OnceLock;

/// Application configuration with security-aware field management.
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Database host value (NON-SENSITIVE)
    /// Example: "sqlite:data/gateway.db"
    pub db_host: String,

    /// Host address for web server binding (NON-SENSITIVE)
    #[envconfig(default = "0.0.0.0")]
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    #[envconfig(default = "8080")]
    pub web_server_port: u16,

    /// Graph API base url (NON-SENSITIVE)
    #[envconfig(default = "https://graph.facebook.com")]
    pub whatsapp_api_base_url: String,

    /// Graph API version used when an account does not set one (NON-SENSITIVE)
    #[envconfig(default = "v21.0")]
    pub whatsapp_api_version: String,

    /// Upper bound for a single provider http call, in seconds (NON-SENSITIVE)
    #[envconfig(default = "30")]
    pub whatsapp_request_timeout_secs: u64,

    /// Disables the in-process account cache when false (NON-SENSITIVE)
    #[envconfig(default = "true")]
    pub account_cache_enabled: bool,

    /// 🔒 SENSITIVE: shared secret expected in the `X-Internal-Secret` header
    /// of the internal send/admin endpoints
    pub internal_api_secret: String,

    /// 🔒 SENSITIVE: Logfire write token. Spans stay on the console when unset.
    pub logfire_token: Option<String>,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// Address the web server binds to
    pub fn server_addr(&self) -> (String, u16) {
        (self.web_server_host.clone(), self.web_server_port)
    }

    pub fn whatsapp_request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.whatsapp_request_timeout_secs)
    }
}

/// Global application configuration, set once by [`init_config`].
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from the environment into [`APP_CONFIG`].
pub fn init_config() -> anyhow::Result<()> {
    let app_config = AppConfig::init_from_env()
        .context("failed to load app config, check environment variables")?;

    if app_config.internal_api_secret.trim().is_empty() {
        return Err(anyhow!("INTERNAL_API_SECRET must not be empty"));
    }

    APP_CONFIG
        .set(app_config)
        .map_err(|_| anyhow!("app config was already initialized"))
}
