//! Storage of customer-initiated messages.

use crate::{
    models::{
        account::Account,
        message::{Direction, Message, MessageStatus, NewMessage},
    },
    repo,
    webhook::whatsapp::schemas::InboundMessage,
};

/// Stores the inbound message under its contact, creating the contact on
/// first contact. Returns `None` for a re-delivered provider message id.
pub async fn store_inbound_message(
    repo: &repo::ImplGatewayRepo,
    account: &Account,
    inbound: &InboundMessage,
) -> anyhow::Result<Option<Message>> {
    let contact = repo
        .upsert_contact(
            account.id,
            &inbound.contact_phone,
            inbound.contact_name.clone(),
        )
        .await?;

    repo.insert_message(&NewMessage {
        account_id: account.id,
        contact_id: contact.id,
        direction: Direction::Incoming,
        msg_type: inbound.msg_type.clone(),
        content: inbound.content.clone(),
        status: MessageStatus::Received,
        provider_message_id: inbound.provider_message_id.clone(),
        provider_timestamp: inbound.provider_timestamp,
    })
    .await
}
