//! # Outbound Dispatcher
//!
//! Free-form and template sends. A message row is written only once the
//! provider has accepted the send and returned its message id, so every
//! failure path leaves the store untouched.

use super::{SendError, session_window, template as template_api};
use crate::{
    consts, metric,
    models::{
        account::Account,
        contact::Contact,
        message::{Direction, Message, MessageStatus, NewMessage},
    },
    repo,
    webhook::whatsapp::{client::ImplWhatsAppApi, outgoing_schemas::OutgoingMessage},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::{collections::BTreeMap, time::Duration};

/// Template send request, after the account and contact are resolved.
#[derive(Debug, Clone)]
pub struct TemplateSend {
    pub name: String,
    pub language: Option<String>,
    pub variables: BTreeMap<String, String>,
}

fn ensure_active(account: &Account) -> Result<(), SendError> {
    if !account.is_active() {
        return Err(SendError::AccountNotActive(account.phone_id.clone()));
    }
    Ok(())
}

/// Calls the provider, dropping the call when `deadline` elapses first.
async fn deliver(
    client: &ImplWhatsAppApi,
    account: &Account,
    message: &OutgoingMessage,
    deadline: Option<Duration>,
) -> Result<String, SendError> {
    let send = client.send_message(account, message);

    let provider_message_id = match deadline {
        Some(deadline) => tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| SendError::DeadlineExceeded)??,
        None => send.await?,
    };

    Ok(provider_message_id)
}

async fn record_sent(
    repo: &repo::ImplGatewayRepo,
    account: &Account,
    contact: &Contact,
    message: &OutgoingMessage,
    content: serde_json::Value,
    provider_message_id: String,
    now: DateTime<Utc>,
) -> Result<Message, SendError> {
    let new_message = NewMessage {
        account_id: account.id,
        contact_id: contact.id,
        direction: Direction::Outgoing,
        msg_type: message.msg_type().to_string(),
        content,
        status: MessageStatus::Sent,
        provider_message_id: provider_message_id.clone(),
        provider_timestamp: now.timestamp(),
    };

    repo.insert_message(&new_message).await?.ok_or_else(|| {
        SendError::Storage(anyhow::anyhow!(
            "provider message id {provider_message_id} is already stored"
        ))
    })
}

fn track<T>(result: Result<T, SendError>) -> Result<T, SendError> {
    match &result {
        Ok(_) => metric::incr_send_outcome_statds("sent"),
        Err(e) => {
            metric::incr_send_outcome_statds(e.kind());
            logfire::warn!("Send failed: {error}", error = e.to_string());
        }
    }
    result
}

/// Sends a free-form text. Only allowed while the contact's window is open.
pub async fn send_text(
    repo: &repo::ImplGatewayRepo,
    client: &ImplWhatsAppApi,
    account: &Account,
    contact: &Contact,
    body: &str,
    deadline: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<Message, SendError> {
    track(
        async {
            ensure_active(account)?;

            if body.trim().is_empty() {
                return Err(SendError::InvalidRequest("message body is empty".to_string()));
            }

            if !session_window::window_state(repo, contact.id, now)
                .await?
                .is_open()
            {
                return Err(SendError::WindowClosed);
            }

            let message = OutgoingMessage::text(contact.phone_number.clone(), body.to_string());
            let provider_message_id = deliver(client, account, &message, deadline).await?;

            record_sent(
                repo,
                account,
                contact,
                &message,
                json!({ "body": body }),
                provider_message_id,
                now,
            )
            .await
        }
        .await,
    )
}

/// Sends an approved template. Not subject to the session window.
pub async fn send_template(
    repo: &repo::ImplGatewayRepo,
    client: &ImplWhatsAppApi,
    account: &Account,
    contact: &Contact,
    request: &TemplateSend,
    deadline: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<Message, SendError> {
    track(
        async {
            ensure_active(account)?;

            let language = request
                .language
                .as_deref()
                .filter(|language| !language.is_empty())
                .unwrap_or(consts::DEFAULT_TEMPLATE_LANGUAGE);

            let template = repo
                .get_template(account.id, &request.name, language)
                .await?
                .ok_or_else(|| SendError::TemplateNotFound(format!("{}/{language}", request.name)))?;

            if !template.is_approved() {
                return Err(SendError::TemplateNotApproved(template.name));
            }

            template_api::validate_variables(&template, &request.variables)?;

            let message = OutgoingMessage::template(
                contact.phone_number.clone(),
                template_api::build_template_content(&template, &request.variables),
            );
            let provider_message_id = deliver(client, account, &message, deadline).await?;

            let content = json!({
                "name": template.name,
                "language": template.language,
                "variables": request.variables,
                "rendered": template.render(&request.variables),
            });

            record_sent(
                repo,
                account,
                contact,
                &message,
                content,
                provider_message_id,
                now,
            )
            .await
        }
        .await,
    )
}
