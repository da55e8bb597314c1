//! Applies provider delivery statuses to stored outgoing messages.

use crate::{models::message::MessageStatus, repo};
use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StatusOutcome {
    #[display("applied")]
    Applied,
    /// Duplicate or regression of the stored status
    #[display("ignored")]
    Ignored,
    #[display("not_found")]
    NotFound,
}

/// Moves the account's message to `status` when it ranks strictly above the
/// stored one (`sent < delivered < read < failed`). Only `failed` keeps
/// `error`. A message of another account is `NotFound`.
pub async fn apply_status(
    repo: &repo::ImplGatewayRepo,
    account_id: i64,
    provider_message_id: &str,
    status: MessageStatus,
    timestamp: i64,
    error: Option<String>,
) -> anyhow::Result<StatusOutcome> {
    let error = error.filter(|_| status == MessageStatus::Failed);

    if repo
        .update_message_status(account_id, provider_message_id, status, timestamp, error)
        .await?
    {
        return Ok(StatusOutcome::Applied);
    }

    // Nothing changed: tell an unknown id apart from a stale update
    match repo.get_message_by_provider_id(provider_message_id).await? {
        Some(message) if message.account_id == account_id => Ok(StatusOutcome::Ignored),
        _ => Ok(StatusOutcome::NotFound),
    }
}
