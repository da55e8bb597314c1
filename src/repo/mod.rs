pub mod sqlite;
pub mod sqlite_queries;

use crate::models;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayRepo: Send + Sync {
    async fn get_account_by_phone_id(
        &self,
        phone_id: &str,
    ) -> anyhow::Result<Option<models::account::Account>>;

    async fn get_account(
        &self,
        organization_id: i64,
        account_id: i64,
    ) -> anyhow::Result<Option<models::account::Account>>;

    async fn get_default_outgoing_account(
        &self,
        organization_id: i64,
    ) -> anyhow::Result<Option<models::account::Account>>;

    async fn list_accounts(
        &self,
        organization_id: i64,
    ) -> anyhow::Result<Vec<models::account::Account>>;

    /// Inserts the account, clearing the default flags it claims on the
    /// organization's other accounts in the same transaction.
    async fn insert_account(&self, account: &models::account::Account) -> anyhow::Result<i64>;

    /// Same default flag handling as [`GatewayRepo::insert_account`].
    async fn update_account(&self, account: &models::account::Account) -> anyhow::Result<()>;

    async fn delete_account(&self, organization_id: i64, account_id: i64) -> anyhow::Result<bool>;

    async fn exists_account_with_verify_token(&self, verify_token: &str) -> anyhow::Result<bool>;

    async fn get_contact(&self, contact_id: i64) -> anyhow::Result<Option<models::contact::Contact>>;

    async fn get_contact_by_phone(
        &self,
        account_id: i64,
        phone_number: &str,
    ) -> anyhow::Result<Option<models::contact::Contact>>;

    /// Creates the contact or refreshes its profile name when one is given.
    async fn upsert_contact(
        &self,
        account_id: i64,
        phone_number: &str,
        profile_name: Option<String>,
    ) -> anyhow::Result<models::contact::Contact>;

    /// Provider timestamp of the contact's latest incoming message.
    async fn get_last_inbound_timestamp(&self, contact_id: i64) -> anyhow::Result<Option<i64>>;

    /// Returns `None` when the provider message id is already stored.
    async fn insert_message(
        &self,
        message: &models::message::NewMessage,
    ) -> anyhow::Result<Option<models::message::Message>>;

    /// Moves an outgoing message of the account to `status` only if it ranks
    /// strictly higher than the stored one. Returns whether a row changed.
    async fn update_message_status(
        &self,
        account_id: i64,
        provider_message_id: &str,
        status: models::message::MessageStatus,
        timestamp: i64,
        error_message: Option<String>,
    ) -> anyhow::Result<bool>;

    async fn get_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<models::message::Message>>;

    /// Conversation history ordered by local sequence.
    async fn list_contact_messages(
        &self,
        contact_id: i64,
    ) -> anyhow::Result<Vec<models::message::Message>>;

    async fn get_template(
        &self,
        account_id: i64,
        name: &str,
        language: &str,
    ) -> anyhow::Result<Option<models::template::Template>>;

    async fn upsert_templates(
        &self,
        account_id: i64,
        templates: &[models::template::NewTemplate],
    ) -> anyhow::Result<usize>;
}

pub type ImplGatewayRepo = Box<dyn GatewayRepo>;
