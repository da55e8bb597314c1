use crate::models;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Row, SqlitePool, sqlite::SqliteRow};
use std::str::FromStr;

use super::{GatewayRepo, sqlite_queries};

#[derive(Clone)]
pub struct SqlxSqliteRepo {
    pub db_pool: SqlitePool,
}

impl SqlxSqliteRepo {
    /// Creates the tables when missing. Safe to run on every startup.
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(sqlite_queries::SCHEMA)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }
}

fn decode_err(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

impl FromRow<'_, SqliteRow> for models::account::Account {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            organization_id: row.try_get("organization_id")?,
            name: row.try_get("name")?,
            app_id: row.try_get("app_id")?,
            phone_id: row.try_get("phone_id")?,
            business_id: row.try_get("business_id")?,
            access_token: row.try_get("access_token")?,
            app_secret: row.try_get("app_secret")?,
            webhook_verify_token: row.try_get("webhook_verify_token")?,
            api_version: row.try_get("api_version")?,
            is_default_incoming: row.try_get("is_default_incoming")?,
            is_default_outgoing: row.try_get("is_default_outgoing")?,
            auto_read_receipt: row.try_get("auto_read_receipt")?,
            status: models::account::AccountStatus::from_str(row.try_get("status")?)
                .map_err(decode_err)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for models::message::Message {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            contact_id: row.try_get("contact_id")?,
            direction: models::message::Direction::from_str(row.try_get("direction")?)
                .map_err(decode_err)?,
            msg_type: row.try_get("msg_type")?,
            content: serde_json::from_str(row.try_get("content")?).map_err(decode_err)?,
            status: models::message::MessageStatus::from_str(row.try_get("status")?)
                .map_err(decode_err)?,
            provider_message_id: row.try_get("provider_message_id")?,
            provider_timestamp: row.try_get("provider_timestamp")?,
            status_updated_at: row.try_get("status_updated_at")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Clears the default flags `account` claims on the other accounts of its
/// organization.
async fn clear_other_defaults(
    transaction: &mut sqlx::SqliteConnection,
    account: &models::account::Account,
    account_id: i64,
) -> anyhow::Result<()> {
    if account.is_default_incoming {
        sqlx::query(sqlite_queries::QUERY_CLEAR_DEFAULT_INCOMING)
            .bind(account.organization_id)
            .bind(account_id)
            .execute(&mut *transaction)
            .await?;
    }

    if account.is_default_outgoing {
        sqlx::query(sqlite_queries::QUERY_CLEAR_DEFAULT_OUTGOING)
            .bind(account.organization_id)
            .bind(account_id)
            .execute(&mut *transaction)
            .await?;
    }

    Ok(())
}

#[async_trait]
impl GatewayRepo for SqlxSqliteRepo {
    async fn get_account_by_phone_id(
        &self,
        phone_id: &str,
    ) -> anyhow::Result<Option<models::account::Account>> {
        Ok(sqlx::query_as::<_, models::account::Account>(
            sqlite_queries::QUERY_GET_ACCOUNT_BY_PHONE_ID,
        )
        .bind(phone_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn get_account(
        &self,
        organization_id: i64,
        account_id: i64,
    ) -> anyhow::Result<Option<models::account::Account>> {
        Ok(
            sqlx::query_as::<_, models::account::Account>(sqlite_queries::QUERY_GET_ACCOUNT)
                .bind(organization_id)
                .bind(account_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn get_default_outgoing_account(
        &self,
        organization_id: i64,
    ) -> anyhow::Result<Option<models::account::Account>> {
        Ok(sqlx::query_as::<_, models::account::Account>(
            sqlite_queries::QUERY_GET_DEFAULT_OUTGOING_ACCOUNT,
        )
        .bind(organization_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn list_accounts(
        &self,
        organization_id: i64,
    ) -> anyhow::Result<Vec<models::account::Account>> {
        Ok(
            sqlx::query_as::<_, models::account::Account>(sqlite_queries::QUERY_LIST_ACCOUNTS)
                .bind(organization_id)
                .fetch_all(&self.db_pool)
                .await?,
        )
    }

    async fn insert_account(&self, account: &models::account::Account) -> anyhow::Result<i64> {
        let mut transaction = self.db_pool.begin().await?;

        let account_id = sqlx::query(sqlite_queries::QUERY_INSERT_ACCOUNT)
            .bind(account.organization_id)
            .bind(&account.name)
            .bind(&account.app_id)
            .bind(&account.phone_id)
            .bind(&account.business_id)
            .bind(&account.access_token)
            .bind(&account.app_secret)
            .bind(&account.webhook_verify_token)
            .bind(&account.api_version)
            .bind(account.is_default_incoming)
            .bind(account.is_default_outgoing)
            .bind(account.auto_read_receipt)
            .bind(account.status.to_string())
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&mut *transaction)
            .await?
            .last_insert_rowid();

        clear_other_defaults(&mut transaction, account, account_id).await?;

        transaction.commit().await?;

        Ok(account_id)
    }

    async fn update_account(&self, account: &models::account::Account) -> anyhow::Result<()> {
        let mut transaction = self.db_pool.begin().await?;

        sqlx::query(sqlite_queries::QUERY_UPDATE_ACCOUNT)
            .bind(account.organization_id)
            .bind(account.id)
            .bind(&account.name)
            .bind(&account.app_id)
            .bind(&account.phone_id)
            .bind(&account.business_id)
            .bind(&account.access_token)
            .bind(&account.app_secret)
            .bind(&account.webhook_verify_token)
            .bind(&account.api_version)
            .bind(account.is_default_incoming)
            .bind(account.is_default_outgoing)
            .bind(account.auto_read_receipt)
            .bind(account.status.to_string())
            .bind(account.updated_at)
            .execute(&mut *transaction)
            .await?;

        clear_other_defaults(&mut transaction, account, account.id).await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn delete_account(&self, organization_id: i64, account_id: i64) -> anyhow::Result<bool> {
        Ok(
            sqlx::query("DELETE FROM account WHERE organization_id=$1 AND id=$2;")
                .bind(organization_id)
                .bind(account_id)
                .execute(&self.db_pool)
                .await?
                .rows_affected()
                > 0,
        )
    }

    async fn exists_account_with_verify_token(&self, verify_token: &str) -> anyhow::Result<bool> {
        Ok(sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM account WHERE webhook_verify_token=$1);",
        )
        .bind(verify_token)
        .fetch_one(&self.db_pool)
        .await?)
    }

    async fn get_contact(&self, contact_id: i64) -> anyhow::Result<Option<models::contact::Contact>> {
        Ok(sqlx::query_as::<_, models::contact::Contact>(
            "SELECT id,account_id,phone_number,profile_name,created_at FROM contact WHERE id=$1;",
        )
        .bind(contact_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn get_contact_by_phone(
        &self,
        account_id: i64,
        phone_number: &str,
    ) -> anyhow::Result<Option<models::contact::Contact>> {
        Ok(sqlx::query_as::<_, models::contact::Contact>(
            "SELECT id,account_id,phone_number,profile_name,created_at FROM contact WHERE account_id=$1 AND phone_number=$2;",
        )
        .bind(account_id)
        .bind(phone_number)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn upsert_contact(
        &self,
        account_id: i64,
        phone_number: &str,
        profile_name: Option<String>,
    ) -> anyhow::Result<models::contact::Contact> {
        Ok(
            sqlx::query_as::<_, models::contact::Contact>(sqlite_queries::QUERY_UPSERT_CONTACT)
                .bind(account_id)
                .bind(phone_number)
                .bind(profile_name)
                .bind(Utc::now())
                .fetch_one(&self.db_pool)
                .await?,
        )
    }

    async fn get_last_inbound_timestamp(&self, contact_id: i64) -> anyhow::Result<Option<i64>> {
        Ok(
            sqlx::query_scalar::<_, Option<i64>>(sqlite_queries::QUERY_GET_LAST_INBOUND_TIMESTAMP)
                .bind(contact_id)
                .fetch_one(&self.db_pool)
                .await?,
        )
    }

    async fn insert_message(
        &self,
        message: &models::message::NewMessage,
    ) -> anyhow::Result<Option<models::message::Message>> {
        Ok(
            sqlx::query_as::<_, models::message::Message>(sqlite_queries::QUERY_INSERT_MESSAGE)
                .bind(message.account_id)
                .bind(message.contact_id)
                .bind(message.direction.to_string())
                .bind(&message.msg_type)
                .bind(message.content.to_string())
                .bind(message.status.to_string())
                .bind(&message.provider_message_id)
                .bind(message.provider_timestamp)
                .bind(Utc::now())
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn update_message_status(
        &self,
        account_id: i64,
        provider_message_id: &str,
        status: models::message::MessageStatus,
        timestamp: i64,
        error_message: Option<String>,
    ) -> anyhow::Result<bool> {
        Ok(sqlx::query(sqlite_queries::QUERY_UPDATE_MESSAGE_STATUS)
            .bind(provider_message_id)
            .bind(status.to_string())
            .bind(timestamp)
            .bind(error_message)
            .bind(status.rank())
            .bind(account_id)
            .execute(&self.db_pool)
            .await?
            .rows_affected()
            > 0)
    }

    async fn get_message_by_provider_id(
        &self,
        provider_message_id: &str,
    ) -> anyhow::Result<Option<models::message::Message>> {
        Ok(sqlx::query_as::<_, models::message::Message>(
            sqlite_queries::QUERY_GET_MESSAGE_BY_PROVIDER_ID,
        )
        .bind(provider_message_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn list_contact_messages(
        &self,
        contact_id: i64,
    ) -> anyhow::Result<Vec<models::message::Message>> {
        Ok(sqlx::query_as::<_, models::message::Message>(
            sqlite_queries::QUERY_LIST_CONTACT_MESSAGES,
        )
        .bind(contact_id)
        .fetch_all(&self.db_pool)
        .await?)
    }

    async fn get_template(
        &self,
        account_id: i64,
        name: &str,
        language: &str,
    ) -> anyhow::Result<Option<models::template::Template>> {
        Ok(
            sqlx::query_as::<_, models::template::Template>(sqlite_queries::QUERY_GET_TEMPLATE)
                .bind(account_id)
                .bind(name)
                .bind(language)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn upsert_templates(
        &self,
        account_id: i64,
        templates: &[models::template::NewTemplate],
    ) -> anyhow::Result<usize> {
        let mut transaction = self.db_pool.begin().await?;
        let now = Utc::now();

        for template in templates {
            sqlx::query(sqlite_queries::QUERY_UPSERT_TEMPLATE)
                .bind(account_id)
                .bind(&template.name)
                .bind(&template.language)
                .bind(&template.category)
                .bind(&template.status)
                .bind(&template.header_text)
                .bind(&template.body_text)
                .bind(&template.footer_text)
                .bind(now)
                .execute(&mut *transaction)
                .await?;
        }

        transaction.commit().await?;

        Ok(templates.len())
    }
}

/// Single connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn memory_repo() -> SqlxSqliteRepo {
    let db_pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let repo = SqlxSqliteRepo { db_pool };
    repo.init_schema().await.unwrap();
    repo
}
