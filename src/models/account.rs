use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    // Provisioned but the phone number still needs the two-step registration
    #[default]
    #[display("pending_registration")]
    PendingRegistration,
    #[display("active")]
    Active,
}

impl FromStr for AccountStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending_registration" => Ok(AccountStatus::PendingRegistration),
            "active" => Ok(AccountStatus::Active),
            other => Err(anyhow::anyhow!("unknown account status: {other}")),
        }
    }
}

/// Tenant-scoped WhatsApp Business identity.
///
/// `access_token` and `app_secret` are secrets: they are used to talk to the
/// provider and to verify webhook signatures, and never leave the process in
/// plaintext (see [`AccountResponse`]).
#[derive(Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub app_id: String,
    pub phone_id: String,
    pub business_id: String,
    pub access_token: String,
    pub app_secret: String,
    pub webhook_verify_token: String,
    pub api_version: String,
    pub is_default_incoming: bool,
    pub is_default_outgoing: bool,
    pub auto_read_receipt: bool,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status.eq(&AccountStatus::Active)
    }

    pub fn has_app_secret(&self) -> bool {
        !self.app_secret.is_empty()
    }
}

// Secrets are redacted so accounts can be logged safely.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("organization_id", &self.organization_id)
            .field("name", &self.name)
            .field("phone_id", &self.phone_id)
            .field("business_id", &self.business_id)
            .field("access_token", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Account as returned to API clients, without credentials.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: i64,
    pub organization_id: i64,
    pub name: String,
    pub app_id: String,
    pub phone_id: String,
    pub business_id: String,
    pub webhook_verify_token: String,
    pub api_version: String,
    pub is_default_incoming: bool,
    pub is_default_outgoing: bool,
    pub auto_read_receipt: bool,
    pub status: AccountStatus,
    pub has_access_token: bool,
    pub has_app_secret: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            organization_id: account.organization_id,
            name: account.name.clone(),
            app_id: account.app_id.clone(),
            phone_id: account.phone_id.clone(),
            business_id: account.business_id.clone(),
            webhook_verify_token: account.webhook_verify_token.clone(),
            api_version: account.api_version.clone(),
            is_default_incoming: account.is_default_incoming,
            is_default_outgoing: account.is_default_outgoing,
            auto_read_receipt: account.auto_read_receipt,
            status: account.status.clone(),
            has_access_token: !account.access_token.is_empty(),
            has_app_secret: account.has_app_secret(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Result of probing the provider with an account's credentials.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messaging_limit_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verification_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub is_test_number: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ConnectionReport {
    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            display_phone_number: None,
            verified_name: None,
            quality_rating: None,
            messaging_limit_tier: None,
            code_verification_status: None,
            account_mode: None,
            business_name: None,
            is_test_number: false,
            warning: None,
        }
    }

    /// Marks a partially filled report as failed.
    pub fn fail(mut self, error: String) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }
}
