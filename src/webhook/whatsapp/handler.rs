//! # WhatsApp Webhook Handler
//!
//! Applies the events of an authenticated webhook batch. Each event is
//! handled on its own: a failure is logged and counted, and the rest of the
//! batch still goes through.

use super::{
    client::ImplWhatsAppApi,
    schemas::{InboundMessage, StatusUpdate, WebhookEvent},
};
use crate::{
    api::{
        inbound,
        reconciler::{self, StatusOutcome},
    },
    metric,
    models::account::Account,
    repo,
};
use std::collections::HashMap;

/// What happened to each event of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub stored: usize,
    pub duplicates: usize,
    pub statuses_applied: usize,
    pub statuses_ignored: usize,
    pub statuses_not_found: usize,
    pub unrecognized: usize,
    /// Events of phone ids without a trusted account
    pub skipped: usize,
    pub failed: usize,
}

async fn handle_inbound(
    repo: &repo::ImplGatewayRepo,
    client: &ImplWhatsAppApi,
    account: &Account,
    message: &InboundMessage,
    report: &mut BatchReport,
) -> anyhow::Result<()> {
    let Some(stored) = inbound::store_inbound_message(repo, account, message).await? else {
        report.duplicates += 1;
        return Ok(());
    };
    report.stored += 1;

    if account.auto_read_receipt {
        if let Err(e) = client
            .mark_as_read(account, &stored.provider_message_id)
            .await
        {
            logfire::warn!(
                "Failed to send read receipt for {message_id}: {error}",
                message_id = stored.provider_message_id.clone(),
                error = e.to_string()
            );
        }
    }

    Ok(())
}

async fn handle_status(
    repo: &repo::ImplGatewayRepo,
    account: &Account,
    update: &StatusUpdate,
    report: &mut BatchReport,
) -> anyhow::Result<()> {
    let outcome = reconciler::apply_status(
        repo,
        account.id,
        &update.provider_message_id,
        update.status,
        update.timestamp,
        update.error.clone(),
    )
    .await?;

    match outcome {
        StatusOutcome::Applied => report.statuses_applied += 1,
        StatusOutcome::Ignored => report.statuses_ignored += 1,
        StatusOutcome::NotFound => {
            logfire::info!(
                "Status {status} for unknown message {message_id}",
                status = update.status.to_string(),
                message_id = update.provider_message_id.clone()
            );
            report.statuses_not_found += 1;
        }
    }

    Ok(())
}

/// Processes the events of a batch whose signature verified for `accounts`,
/// keyed by phone id.
pub async fn process_events(
    repo: &repo::ImplGatewayRepo,
    client: &ImplWhatsAppApi,
    accounts: &HashMap<String, Account>,
    events: Vec<WebhookEvent>,
) -> BatchReport {
    let mut report = BatchReport::default();

    for event in events {
        metric::incr_webhook_event_statds(event.kind());

        let account = event.phone_id().and_then(|phone_id| accounts.get(phone_id));

        let result = match (&event, account) {
            (WebhookEvent::Unrecognized { reason }, _) => {
                logfire::warn!("Skipping webhook entry: {reason}", reason = reason.clone());
                report.unrecognized += 1;
                Ok(())
            }
            (_, None) => {
                logfire::warn!(
                    "Account not found for phone id {phone_id}",
                    phone_id = event.phone_id().unwrap_or_default().to_string()
                );
                report.skipped += 1;
                Ok(())
            }
            (WebhookEvent::InboundMessage(message), Some(account)) => {
                handle_inbound(repo, client, account, message, &mut report).await
            }
            (WebhookEvent::StatusUpdate(update), Some(account)) => {
                handle_status(repo, account, update, &mut report).await
            }
        };

        if let Err(e) = result {
            logfire::error!(
                "Failed to process {kind} event: {error}",
                kind = event.kind().to_string(),
                error = e.to_string()
            );
            report.failed += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            fixtures::create_test_account,
            message::{Direction, MessageStatus, NewMessage},
        },
        repo::{MockGatewayRepo, sqlite::memory_repo},
        webhook::whatsapp::{client::MockWhatsAppApi, schemas},
    };
    use mockall::predicate::*;
    use serde_json::json;

    fn inbound_event(phone_id: &str, id: &str) -> WebhookEvent {
        WebhookEvent::InboundMessage(InboundMessage {
            phone_id: phone_id.into(),
            contact_phone: "5215550001".into(),
            contact_name: Some("Alice".into()),
            msg_type: "text".into(),
            content: json!({"body": "Hi"}),
            provider_timestamp: 1_700_000_000,
            provider_message_id: id.into(),
        })
    }

    async fn setup(auto_read_receipt: bool) -> (repo::ImplGatewayRepo, HashMap<String, Account>) {
        let repo: repo::ImplGatewayRepo = Box::new(memory_repo().await);
        let mut account = create_test_account(0, "1001");
        account.auto_read_receipt = auto_read_receipt;
        account.id = repo.insert_account(&account).await.unwrap();
        (repo, HashMap::from([(account.phone_id.clone(), account)]))
    }

    #[ntex::test]
    async fn test_redelivered_batch_is_stored_once() {
        let (repo, accounts) = setup(false).await;
        let client: ImplWhatsAppApi = Box::new(MockWhatsAppApi::new());
        let payload = schemas::samples::text_message("1001", "5215550001", "wamid.IN1", 1_700_000_000, "Hi");

        let first = process_events(&repo, &client, &accounts, schemas::parse(&payload)).await;
        let second = process_events(&repo, &client, &accounts, schemas::parse(&payload)).await;

        assert_eq!(first.stored, 1);
        assert_eq!(second.stored, 0);
        assert_eq!(second.duplicates, 1);
    }

    #[ntex::test]
    async fn test_auto_read_receipt_for_new_messages_only() {
        let (repo, accounts) = setup(true).await;
        let mut mock_client = MockWhatsAppApi::new();
        mock_client
            .expect_mark_as_read()
            .withf(|account, message_id| account.phone_id == "1001" && message_id == "wamid.IN1")
            .times(1)
            .returning(|_, _| Ok(()));
        let client: ImplWhatsAppApi = Box::new(mock_client);

        process_events(&repo, &client, &accounts, vec![inbound_event("1001", "wamid.IN1")]).await;
        let report =
            process_events(&repo, &client, &accounts, vec![inbound_event("1001", "wamid.IN1")]).await;

        assert_eq!(report.duplicates, 1);
    }

    #[ntex::test]
    async fn test_read_receipt_failure_does_not_fail_the_event() {
        let (repo, accounts) = setup(true).await;
        let mut mock_client = MockWhatsAppApi::new();
        mock_client.expect_mark_as_read().returning(|_, _| {
            Err(crate::webhook::whatsapp::client::ProviderError::Transport(
                "connection reset".into(),
            ))
        });
        let client: ImplWhatsAppApi = Box::new(mock_client);

        let report =
            process_events(&repo, &client, &accounts, vec![inbound_event("1001", "wamid.IN1")]).await;

        assert_eq!(report.stored, 1);
        assert_eq!(report.failed, 0);
    }

    #[ntex::test]
    async fn test_untrusted_and_unrecognized_events_are_skipped() {
        let (repo, accounts) = setup(false).await;
        let client: ImplWhatsAppApi = Box::new(MockWhatsAppApi::new());

        let report = process_events(
            &repo,
            &client,
            &accounts,
            vec![
                inbound_event("2002", "wamid.OTHER"),
                WebhookEvent::Unrecognized {
                    reason: "unsupported field account_update".into(),
                },
                inbound_event("1001", "wamid.IN1"),
            ],
        )
        .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.unrecognized, 1);
        assert_eq!(report.stored, 1);
        assert!(repo.get_message_by_provider_id("wamid.OTHER").await.unwrap().is_none());
    }

    #[ntex::test]
    async fn test_statuses_are_reconciled() {
        let (repo, accounts) = setup(false).await;
        let account = &accounts["1001"];
        let contact = repo
            .upsert_contact(account.id, "5215550001", None)
            .await
            .unwrap();
        repo.insert_message(&NewMessage {
            account_id: account.id,
            contact_id: contact.id,
            direction: Direction::Outgoing,
            msg_type: "text".into(),
            content: json!({"body": "On its way"}),
            status: MessageStatus::Sent,
            provider_message_id: "wamid.OUT1".into(),
            provider_timestamp: 1_700_000_000,
        })
        .await
        .unwrap();
        let client: ImplWhatsAppApi = Box::new(MockWhatsAppApi::new());

        let events = [
            schemas::samples::status("1001", "wamid.OUT1", "read", 1_700_000_020),
            schemas::samples::status("1001", "wamid.OUT1", "delivered", 1_700_000_010),
            schemas::samples::status("1001", "wamid.UNKNOWN", "delivered", 1_700_000_010),
        ]
        .iter()
        .flat_map(schemas::parse)
        .collect();

        let report = process_events(&repo, &client, &accounts, events).await;

        assert_eq!(report.statuses_applied, 1);
        assert_eq!(report.statuses_ignored, 1);
        assert_eq!(report.statuses_not_found, 1);
        let message = repo
            .get_message_by_provider_id("wamid.OUT1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.status, MessageStatus::Read);
    }

    #[ntex::test]
    async fn test_status_for_another_accounts_message_is_not_applied() {
        let (repo, mut accounts) = setup(false).await;
        let owner = accounts.remove("1001").unwrap();
        let contact = repo
            .upsert_contact(owner.id, "5215550001", None)
            .await
            .unwrap();
        repo.insert_message(&NewMessage {
            account_id: owner.id,
            contact_id: contact.id,
            direction: Direction::Outgoing,
            msg_type: "text".into(),
            content: json!({"body": "On its way"}),
            status: MessageStatus::Sent,
            provider_message_id: "wamid.OUT1".into(),
            provider_timestamp: 1_700_000_000,
        })
        .await
        .unwrap();

        let mut other = create_test_account(0, "2002");
        other.organization_id = 2;
        other.app_secret = "other-secret".into();
        other.id = repo.insert_account(&other).await.unwrap();
        let trusted = HashMap::from([(other.phone_id.clone(), other)]);
        let client: ImplWhatsAppApi = Box::new(MockWhatsAppApi::new());

        let events = schemas::parse(&schemas::samples::status(
            "2002",
            "wamid.OUT1",
            "failed",
            1_700_000_010,
        ));
        let report = process_events(&repo, &client, &trusted, events).await;

        assert_eq!(report.statuses_applied, 0);
        assert_eq!(report.statuses_not_found, 1);
        let message = repo
            .get_message_by_provider_id("wamid.OUT1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
    }

    #[ntex::test]
    async fn test_storage_failure_is_isolated_per_event() {
        let mut mock_repo = MockGatewayRepo::new();
        mock_repo
            .expect_upsert_contact()
            .returning(|_, _, _| Err(anyhow::anyhow!("database is locked")));
        mock_repo
            .expect_update_message_status()
            .with(eq(1), eq("wamid.OUT1"), eq(MessageStatus::Delivered), always(), always())
            .returning(|_, _, _, _, _| Ok(true));
        let repo: repo::ImplGatewayRepo = Box::new(mock_repo);
        let client: ImplWhatsAppApi = Box::new(MockWhatsAppApi::new());
        let accounts = HashMap::from([("1001".to_string(), create_test_account(1, "1001"))]);

        let mut events = vec![inbound_event("1001", "wamid.IN1")];
        events.extend(schemas::parse(&schemas::samples::status(
            "1001",
            "wamid.OUT1",
            "delivered",
            1_700_000_010,
        )));

        let report = process_events(&repo, &client, &accounts, events).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.statuses_applied, 1);
    }
}
