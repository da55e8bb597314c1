//! # Account API Module
//!
//! Account resolution for webhook deliveries and sends, plus the account
//! administration operations. Every mutation invalidates the cache entries
//! of the phone ids it touched before returning.

use super::SendError;
use crate::{
    config, consts,
    models::account::{Account, AccountStatus, ConnectionReport},
    repo, services, utils,
    webhook::whatsapp::client::ImplWhatsAppApi,
};
use chrono::Utc;
use derive_more::{Display, Error};
use serde::Deserialize;

#[derive(Debug, Display, Error)]
pub enum AccountError {
    #[display("account not found")]
    NotFound,
    #[display("phone id {_0} is already registered")]
    PhoneIdTaken(#[error(not(source))] String),
    #[display("{_0}")]
    Invalid(#[error(not(source))] String),
    #[display("storage error: {_0}")]
    Storage(#[error(not(source))] anyhow::Error),
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        AccountError::Storage(err)
    }
}

/// Resolves the account owning `phone_id`, through the cache.
///
/// The cache generation is read before the store so a concurrent
/// invalidation makes the populate a no-op instead of caching a stale row.
pub async fn resolve_account(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    phone_id: &str,
) -> anyhow::Result<Option<Account>> {
    if let Some(account) = cache.get(phone_id) {
        return Ok(Some(account));
    }

    let generation = cache.generation(phone_id);
    let Some(account) = repo.get_account_by_phone_id(phone_id).await? else {
        return Ok(None);
    };

    cache.insert(account.clone(), generation);

    Ok(Some(account))
}

/// Account used to send for an organization: the one owning `phone_id`, or
/// the organization's default outgoing account when none is given.
pub async fn resolve_sending_account(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    organization_id: i64,
    phone_id: Option<&str>,
) -> Result<Account, SendError> {
    let account = match phone_id.filter(|phone_id| !phone_id.is_empty()) {
        Some(phone_id) => resolve_account(repo, cache, phone_id)
            .await?
            .filter(|account| account.organization_id == organization_id),
        None => repo.get_default_outgoing_account(organization_id).await?,
    };

    let account = account.ok_or(SendError::AccountNotFound)?;

    if !account.is_active() {
        return Err(SendError::AccountNotActive(account.phone_id));
    }

    Ok(account)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccountRequest {
    pub name: String,
    #[serde(default)]
    pub app_id: String,
    pub phone_id: String,
    pub business_id: String,
    pub access_token: String,
    #[serde(default)]
    pub app_secret: String,
    pub webhook_verify_token: Option<String>,
    pub api_version: Option<String>,
    #[serde(default)]
    pub is_default_incoming: bool,
    #[serde(default)]
    pub is_default_outgoing: bool,
    #[serde(default)]
    pub auto_read_receipt: bool,
    pub status: Option<AccountStatus>,
}

/// Only the provided fields change. Empty secrets keep the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub app_id: Option<String>,
    pub phone_id: Option<String>,
    pub business_id: Option<String>,
    pub access_token: Option<String>,
    pub app_secret: Option<String>,
    pub webhook_verify_token: Option<String>,
    pub api_version: Option<String>,
    pub is_default_incoming: Option<bool>,
    pub is_default_outgoing: Option<bool>,
    pub auto_read_receipt: Option<bool>,
    pub status: Option<AccountStatus>,
}

fn require(field: &str, value: &str) -> Result<(), AccountError> {
    if value.trim().is_empty() {
        return Err(AccountError::Invalid(format!("{field} is required")));
    }
    Ok(())
}

fn default_api_version() -> String {
    config::APP_CONFIG
        .get()
        .map(|app_config| app_config.whatsapp_api_version.clone())
        .unwrap_or_else(|| "v21.0".to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// A unique violation on insert or update means another request registered
/// the phone id after our check.
fn storage_error(err: anyhow::Error, phone_id: &str) -> AccountError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
            AccountError::PhoneIdTaken(phone_id.to_string())
        }
        _ => AccountError::Storage(err),
    }
}

/// Clearing a default flag on the organization's other accounts changes
/// their rows too, so their cache entries go as well.
async fn invalidate_organization(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    organization_id: i64,
) -> anyhow::Result<()> {
    for account in repo.list_accounts(organization_id).await? {
        cache.invalidate(&account.phone_id);
    }
    Ok(())
}

pub async fn create_account(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    organization_id: i64,
    request: NewAccountRequest,
) -> Result<Account, AccountError> {
    require("name", &request.name)?;
    require("phone_id", &request.phone_id)?;
    require("business_id", &request.business_id)?;
    require("access_token", &request.access_token)?;

    if repo
        .get_account_by_phone_id(&request.phone_id)
        .await?
        .is_some()
    {
        return Err(AccountError::PhoneIdTaken(request.phone_id));
    }

    let now = Utc::now();
    let mut account = Account {
        id: 0,
        organization_id,
        name: request.name,
        app_id: request.app_id,
        phone_id: request.phone_id,
        business_id: request.business_id,
        access_token: request.access_token,
        app_secret: request.app_secret,
        webhook_verify_token: non_empty(request.webhook_verify_token)
            .unwrap_or_else(utils::generate_verify_token),
        api_version: non_empty(request.api_version).unwrap_or_else(default_api_version),
        is_default_incoming: request.is_default_incoming,
        is_default_outgoing: request.is_default_outgoing,
        auto_read_receipt: request.auto_read_receipt,
        status: request.status.unwrap_or(AccountStatus::Active),
        created_at: now,
        updated_at: now,
    };

    account.id = repo
        .insert_account(&account)
        .await
        .map_err(|e| storage_error(e, &account.phone_id))?;

    cache.invalidate(&account.phone_id);
    if account.is_default_incoming || account.is_default_outgoing {
        invalidate_organization(repo, cache, organization_id).await?;
    }

    logfire::info!(
        "Created account {account_id} for organization {organization_id}",
        account_id = account.id.to_string(),
        organization_id = organization_id.to_string()
    );

    Ok(account)
}

pub async fn get_account(
    repo: &repo::ImplGatewayRepo,
    organization_id: i64,
    account_id: i64,
) -> Result<Account, AccountError> {
    repo.get_account(organization_id, account_id)
        .await?
        .ok_or(AccountError::NotFound)
}

pub async fn list_accounts(
    repo: &repo::ImplGatewayRepo,
    organization_id: i64,
) -> anyhow::Result<Vec<Account>> {
    repo.list_accounts(organization_id).await
}

pub async fn update_account(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    organization_id: i64,
    account_id: i64,
    request: UpdateAccountRequest,
) -> Result<Account, AccountError> {
    let current = get_account(repo, organization_id, account_id).await?;
    let mut account = current.clone();

    if let Some(name) = request.name {
        require("name", &name)?;
        account.name = name;
    }
    if let Some(app_id) = request.app_id {
        account.app_id = app_id;
    }
    if let Some(phone_id) = non_empty(request.phone_id) {
        if phone_id != current.phone_id
            && repo.get_account_by_phone_id(&phone_id).await?.is_some()
        {
            return Err(AccountError::PhoneIdTaken(phone_id));
        }
        account.phone_id = phone_id;
    }
    if let Some(business_id) = non_empty(request.business_id) {
        account.business_id = business_id;
    }
    if let Some(access_token) = non_empty(request.access_token) {
        account.access_token = access_token;
    }
    if let Some(app_secret) = non_empty(request.app_secret) {
        account.app_secret = app_secret;
    }
    if let Some(verify_token) = non_empty(request.webhook_verify_token) {
        account.webhook_verify_token = verify_token;
    }
    if let Some(api_version) = non_empty(request.api_version) {
        account.api_version = api_version;
    }
    if let Some(is_default_incoming) = request.is_default_incoming {
        account.is_default_incoming = is_default_incoming;
    }
    if let Some(is_default_outgoing) = request.is_default_outgoing {
        account.is_default_outgoing = is_default_outgoing;
    }
    if let Some(auto_read_receipt) = request.auto_read_receipt {
        account.auto_read_receipt = auto_read_receipt;
    }
    if let Some(status) = request.status {
        account.status = status;
    }
    account.updated_at = Utc::now();

    repo.update_account(&account)
        .await
        .map_err(|e| storage_error(e, &account.phone_id))?;

    cache.invalidate(&current.phone_id);
    cache.invalidate(&account.phone_id);
    if account.is_default_incoming || account.is_default_outgoing {
        invalidate_organization(repo, cache, organization_id).await?;
    }

    Ok(account)
}

pub async fn delete_account(
    repo: &repo::ImplGatewayRepo,
    cache: &services::ImplAccountCache,
    organization_id: i64,
    account_id: i64,
) -> Result<(), AccountError> {
    let account = get_account(repo, organization_id, account_id).await?;

    if !repo.delete_account(organization_id, account_id).await? {
        return Err(AccountError::NotFound);
    }
    cache.invalidate(&account.phone_id);

    logfire::info!(
        "Deleted account {account_id} for organization {organization_id}",
        account_id = account_id.to_string(),
        organization_id = organization_id.to_string()
    );

    Ok(())
}

/// Probes the provider with the account credentials.
///
/// Fails when the number's code verification is `NOT_VERIFIED` or `EXPIRED`
/// (except for sandbox numbers), when the business id is unknown to the
/// provider, or when the phone number is not registered under that business.
pub async fn test_connection(client: &ImplWhatsAppApi, account: &Account) -> ConnectionReport {
    let info = match client.fetch_phone_number_info(account).await {
        Ok(info) => info,
        Err(e) => {
            return ConnectionReport::failed(format!("invalid phone_id or access_token: {e}"));
        }
    };

    let is_test_number = info.account_mode.as_deref() == Some(consts::SANDBOX_ACCOUNT_MODE);
    let unverified_status = info
        .code_verification_status
        .as_deref()
        .filter(|status| consts::UNVERIFIED_CODE_STATUSES.contains(status))
        .filter(|_| !is_test_number)
        .map(str::to_string);

    let mut report = ConnectionReport {
        success: true,
        error: None,
        warning: is_test_number
            .then(|| "This is a test/sandbox number. Not suitable for production use.".to_string()),
        is_test_number,
        display_phone_number: info.display_phone_number,
        verified_name: info.verified_name,
        quality_rating: info.quality_rating,
        messaging_limit_tier: info.messaging_limit_tier,
        code_verification_status: info.code_verification_status,
        account_mode: info.account_mode,
        business_name: None,
    };

    if let Some(status) = unverified_status {
        return report.fail(format!("phone number is not verified (status: {status})"));
    }

    match client.fetch_business_info(account).await {
        Ok(business) => report.business_name = business.name,
        Err(e) => return report.fail(format!("invalid business_id: {e}")),
    }

    match client.fetch_business_phone_numbers(account).await {
        Ok(numbers) if numbers.iter().any(|number| number.id == account.phone_id) => report,
        Ok(_) => report.fail(format!(
            "phone_id {} does not belong to business_id {}",
            account.phone_id, account.business_id
        )),
        Err(e) => report.fail(format!("failed to verify phone-business relationship: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::fixtures::create_test_account,
        repo::{MockGatewayRepo, sqlite::memory_repo},
        services::account_cache::DashMapAccountCache,
        webhook::whatsapp::{
            client::{MockWhatsAppApi, ProviderError},
            outgoing_schemas::{BusinessInfo, BusinessPhoneNumber, PhoneNumberInfo},
        },
    };
    use mockall::predicate::*;
    use std::sync::Arc;

    fn new_cache() -> services::ImplAccountCache {
        Arc::new(DashMapAccountCache::new())
    }

    fn new_account_request(phone_id: &str) -> NewAccountRequest {
        NewAccountRequest {
            name: "Support line".into(),
            app_id: "app-1".into(),
            phone_id: phone_id.into(),
            business_id: "waba-1".into(),
            access_token: "T1".into(),
            app_secret: "app-secret".into(),
            webhook_verify_token: None,
            api_version: None,
            is_default_incoming: false,
            is_default_outgoing: false,
            auto_read_receipt: false,
            status: None,
        }
    }

    #[ntex::test]
    async fn test_resolve_account_populates_cache() {
        let mut mock_repo = MockGatewayRepo::new();
        mock_repo
            .expect_get_account_by_phone_id()
            .with(eq("1001"))
            .times(1)
            .returning(|_| Ok(Some(create_test_account(1, "1001"))));
        let mock_repo: repo::ImplGatewayRepo = Box::new(mock_repo);
        let cache = new_cache();

        let first = resolve_account(&mock_repo, &cache, "1001").await.unwrap();
        let second = resolve_account(&mock_repo, &cache, "1001").await.unwrap();

        assert_eq!(first, second);
        assert!(cache.get("1001").is_some());
    }

    #[ntex::test]
    async fn test_resolve_unknown_account() {
        let mut mock_repo = MockGatewayRepo::new();
        mock_repo
            .expect_get_account_by_phone_id()
            .returning(|_| Ok(None));
        let mock_repo: repo::ImplGatewayRepo = Box::new(mock_repo);
        let cache = new_cache();

        assert!(resolve_account(&mock_repo, &cache, "404").await.unwrap().is_none());
        assert!(cache.get("404").is_none());
    }

    #[ntex::test]
    async fn test_token_rotation_is_visible_after_update() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        let account = create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();
        let resolved = resolve_account(&repo, &cache, "1001").await.unwrap().unwrap();
        assert_eq!(resolved.access_token, "T1");

        update_account(
            &repo,
            &cache,
            1,
            account.id,
            UpdateAccountRequest {
                access_token: Some("T2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let resolved = resolve_account(&repo, &cache, "1001").await.unwrap().unwrap();
        assert_eq!(resolved.access_token, "T2");
    }

    #[ntex::test]
    async fn test_phone_id_change_invalidates_old_and_new_keys() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        let account = create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();
        resolve_account(&repo, &cache, "1001").await.unwrap();

        update_account(
            &repo,
            &cache,
            1,
            account.id,
            UpdateAccountRequest {
                phone_id: Some("1002".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(resolve_account(&repo, &cache, "1001").await.unwrap().is_none());
        assert_eq!(
            resolve_account(&repo, &cache, "1002")
                .await
                .unwrap()
                .map(|a| a.id),
            Some(account.id)
        );
    }

    #[ntex::test]
    async fn test_create_account_defaults() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        let account = create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();

        assert_eq!(account.webhook_verify_token.len(), 64);
        assert!(account
            .webhook_verify_token
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
        assert_eq!(account.api_version, "v21.0");
        assert_eq!(account.status, AccountStatus::Active);
    }

    #[ntex::test]
    async fn test_create_account_rejects_duplicates_and_blank_fields() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();

        assert!(matches!(
            create_account(&repo, &cache, 2, new_account_request("1001")).await,
            Err(AccountError::PhoneIdTaken(_))
        ));

        let mut blank = new_account_request("1002");
        blank.access_token = " ".into();
        assert!(matches!(
            create_account(&repo, &cache, 1, blank).await,
            Err(AccountError::Invalid(_))
        ));
    }

    #[ntex::test]
    async fn test_update_keeps_secrets_when_empty() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();
        let account = create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();

        let updated = update_account(
            &repo,
            &cache,
            1,
            account.id,
            UpdateAccountRequest {
                name: Some("Sales".into()),
                access_token: Some(String::new()),
                app_secret: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Sales");
        assert_eq!(updated.access_token, "T1");
        assert_eq!(updated.app_secret, "app-secret");
    }

    #[ntex::test]
    async fn test_default_outgoing_moves_between_accounts() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        let mut request = new_account_request("1001");
        request.is_default_outgoing = true;
        let first = create_account(&repo, &cache, 1, request).await.unwrap();
        let mut request = new_account_request("1002");
        request.is_default_outgoing = true;
        let second = create_account(&repo, &cache, 1, request).await.unwrap();

        let sender = resolve_sending_account(&repo, &cache, 1, None).await.unwrap();
        assert_eq!(sender.id, second.id);

        let first = get_account(&repo, 1, first.id).await.unwrap();
        assert!(!first.is_default_outgoing);
    }

    #[ntex::test]
    async fn test_resolve_sending_account_checks_organization_and_status() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();

        let mut request = new_account_request("1001");
        request.status = Some(AccountStatus::PendingRegistration);
        create_account(&repo, &cache, 1, request).await.unwrap();

        assert!(matches!(
            resolve_sending_account(&repo, &cache, 2, Some("1001")).await,
            Err(SendError::AccountNotFound)
        ));
        assert!(matches!(
            resolve_sending_account(&repo, &cache, 1, Some("1001")).await,
            Err(SendError::AccountNotActive(_))
        ));
        assert!(matches!(
            resolve_sending_account(&repo, &cache, 1, None).await,
            Err(SendError::AccountNotFound)
        ));
    }

    #[ntex::test]
    async fn test_delete_account_invalidates_cache() {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let cache = new_cache();
        let account = create_account(&repo, &cache, 1, new_account_request("1001"))
            .await
            .unwrap();
        resolve_account(&repo, &cache, "1001").await.unwrap();

        delete_account(&repo, &cache, 1, account.id).await.unwrap();

        assert!(cache.get("1001").is_none());
        assert!(resolve_account(&repo, &cache, "1001").await.unwrap().is_none());
        assert!(matches!(
            delete_account(&repo, &cache, 1, account.id).await,
            Err(AccountError::NotFound)
        ));
    }

    fn business_with_numbers(mock_client: &mut MockWhatsAppApi, phone_ids: &'static [&'static str]) {
        mock_client.expect_fetch_business_info().returning(|_| {
            Ok(BusinessInfo {
                id: "waba-1".into(),
                name: Some("Acme Support".into()),
            })
        });
        mock_client
            .expect_fetch_business_phone_numbers()
            .returning(move |_| {
                Ok(phone_ids
                    .iter()
                    .map(|id| BusinessPhoneNumber {
                        id: id.to_string(),
                        ..Default::default()
                    })
                    .collect())
            });
    }

    #[ntex::test]
    async fn test_connection_flags_sandbox_numbers() {
        let mut mock_client = MockWhatsAppApi::new();
        business_with_numbers(&mut mock_client, &["1001"]);
        mock_client.expect_fetch_phone_number_info().returning(|_| {
            Ok(PhoneNumberInfo {
                display_phone_number: Some("+1 555 000 1111".into()),
                code_verification_status: Some("NOT_VERIFIED".into()),
                account_mode: Some("SANDBOX".into()),
                ..Default::default()
            })
        });
        let mock_client: ImplWhatsAppApi = Box::new(mock_client);

        let report = test_connection(&mock_client, &create_test_account(1, "1001")).await;

        assert!(report.success);
        assert!(report.is_test_number);
        assert!(report.warning.is_some());
        assert_eq!(report.business_name.as_deref(), Some("Acme Support"));
    }

    #[ntex::test]
    async fn test_connection_fails_for_unverified_live_numbers() {
        let mut mock_client = MockWhatsAppApi::new();
        mock_client.expect_fetch_phone_number_info().returning(|_| {
            Ok(PhoneNumberInfo {
                code_verification_status: Some("EXPIRED".into()),
                account_mode: Some("LIVE".into()),
                ..Default::default()
            })
        });
        mock_client.expect_fetch_business_info().never();
        let mock_client: ImplWhatsAppApi = Box::new(mock_client);

        let report = test_connection(&mock_client, &create_test_account(1, "1001")).await;

        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("phone number is not verified (status: EXPIRED)")
        );
    }

    #[ntex::test]
    async fn test_connection_reports_provider_errors() {
        let mut mock_client = MockWhatsAppApi::new();
        mock_client
            .expect_fetch_phone_number_info()
            .returning(|_| Err(ProviderError::Transport("connection refused".into())));
        let mock_client: ImplWhatsAppApi = Box::new(mock_client);

        let report = test_connection(&mock_client, &create_test_account(1, "1001")).await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("connection refused"));
    }

    #[ntex::test]
    async fn test_connection_fails_for_phone_outside_business() {
        let mut mock_client = MockWhatsAppApi::new();
        mock_client
            .expect_fetch_phone_number_info()
            .returning(|_| Ok(PhoneNumberInfo::default()));
        business_with_numbers(&mut mock_client, &["2002", "3003"]);
        let mock_client: ImplWhatsAppApi = Box::new(mock_client);

        let report = test_connection(&mock_client, &create_test_account(1, "1001")).await;

        assert!(!report.success);
        assert_eq!(
            report.error.as_deref(),
            Some("phone_id 1001 does not belong to business_id waba-1")
        );
    }

    #[ntex::test]
    async fn test_connection_fails_for_unknown_business() {
        let mut mock_client = MockWhatsAppApi::new();
        mock_client
            .expect_fetch_phone_number_info()
            .returning(|_| Ok(PhoneNumberInfo::default()));
        mock_client.expect_fetch_business_info().returning(|_| {
            Err(ProviderError::Rejected {
                status: 400,
                code: Some(100),
                message: "Object with ID 'waba-1' does not exist".into(),
            })
        });
        mock_client.expect_fetch_business_phone_numbers().never();
        let mock_client: ImplWhatsAppApi = Box::new(mock_client);

        let report = test_connection(&mock_client, &create_test_account(1, "1001")).await;

        assert!(!report.success);
        assert!(report.error.unwrap().starts_with("invalid business_id"));
    }

    #[ntex::test]
    async fn test_rotation_is_visible_when_organization_sweep_fails() {
        let mut mock_repo = MockGatewayRepo::new();
        mock_repo
            .expect_get_account()
            .returning(|_, _| Ok(Some(create_test_account(1, "1001"))));
        mock_repo.expect_update_account().times(1).returning(|_| Ok(()));
        mock_repo
            .expect_list_accounts()
            .returning(|_| Err(anyhow::anyhow!("database is locked")));
        let mock_repo: repo::ImplGatewayRepo = Box::new(mock_repo);
        let cache = new_cache();
        let mut cached = create_test_account(1, "1001");
        cached.access_token = "T1".into();
        cache.insert(cached, cache.generation("1001"));

        let result = update_account(
            &mock_repo,
            &cache,
            1,
            1,
            UpdateAccountRequest {
                access_token: Some("T2".into()),
                is_default_outgoing: Some(true),
                ..Default::default()
            },
        )
        .await;

        assert!(matches!(result, Err(AccountError::Storage(_))));
        assert!(cache.get("1001").is_none());
    }

    #[ntex::test]
    async fn test_racing_create_maps_unique_violation_to_conflict() {
        let store: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        store
            .insert_account(&create_test_account(0, "1001"))
            .await
            .unwrap();
        let unique_violation = store
            .insert_account(&create_test_account(0, "1001"))
            .await
            .unwrap_err();

        // The existence check ran before the other request committed
        let mut mock_repo = MockGatewayRepo::new();
        mock_repo
            .expect_get_account_by_phone_id()
            .returning(|_| Ok(None));
        mock_repo
            .expect_insert_account()
            .return_once(move |_| Err(unique_violation));
        let mock_repo: repo::ImplGatewayRepo = Box::new(mock_repo);

        let result = create_account(&mock_repo, &new_cache(), 1, new_account_request("1001")).await;

        assert!(matches!(result, Err(AccountError::PhoneIdTaken(phone_id)) if phone_id == "1001"));
    }
}
