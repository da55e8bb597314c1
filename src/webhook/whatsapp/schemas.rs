//! # WhatsApp Webhook Schemas
//!
//! Inbound deliveries look like
//! `entry[].changes[].value.{metadata,contacts[],messages[],statuses[]}`.
//! Every message and status is decoded on its own into a [`WebhookEvent`],
//! so one malformed sub-entry cannot fail the rest of the batch.

use crate::models::message::MessageStatus;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Internal event decoded from one webhook sub-entry.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    InboundMessage(InboundMessage),
    StatusUpdate(StatusUpdate),
    Unrecognized { reason: String },
}

impl WebhookEvent {
    /// Metric/log label of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookEvent::InboundMessage(_) => "inbound_message",
            WebhookEvent::StatusUpdate(_) => "status_update",
            WebhookEvent::Unrecognized { .. } => "unrecognized",
        }
    }

    pub fn phone_id(&self) -> Option<&str> {
        match self {
            WebhookEvent::InboundMessage(message) => Some(&message.phone_id),
            WebhookEvent::StatusUpdate(status) => Some(&status.phone_id),
            WebhookEvent::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub phone_id: String,
    pub contact_phone: String,
    pub contact_name: Option<String>,
    pub msg_type: String,
    pub content: Value,
    pub provider_timestamp: i64,
    pub provider_message_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub phone_id: String,
    pub provider_message_id: String,
    pub status: MessageStatus,
    pub timestamp: i64,
    pub error: Option<String>,
}

/// Metadata about the receiving business phone number
#[derive(Debug, Deserialize)]
struct Metadata {
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct Contact {
    wa_id: String,
    profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    from: String,
    id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: i64,
    #[serde(rename = "type")]
    msg_type: String,
    /// Type specific body, keyed by the type name (`text`, `image`, ...)
    #[serde(flatten)]
    body: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    status: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: i64,
    #[serde(default)]
    errors: Vec<StatusError>,
}

#[derive(Debug, Deserialize)]
struct StatusError {
    code: Option<i64>,
    title: Option<String>,
    message: Option<String>,
}

impl StatusError {
    fn describe(&self) -> String {
        let text = self
            .message
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("unknown error");

        match self.code {
            Some(code) => format!("({code}) {text}"),
            None => text.to_string(),
        }
    }
}

/// The provider sends unix seconds as a string; plain numbers are accepted too.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn changes(payload: &Value) -> impl Iterator<Item = &Value> {
    payload
        .get("entry")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("changes").and_then(Value::as_array))
        .flatten()
}

fn change_phone_id(change: &Value) -> Option<String> {
    change
        .get("value")
        .and_then(|value| value.get("metadata"))
        .cloned()
        .and_then(|metadata| serde_json::from_value::<Metadata>(metadata).ok())
        .map(|metadata| metadata.phone_number_id)
        .filter(|phone_id| !phone_id.is_empty())
}

/// Distinct business phone ids referenced by the payload, in order of appearance.
pub fn phone_ids(payload: &Value) -> Vec<String> {
    let mut phone_ids: Vec<String> = Vec::new();
    for phone_id in changes(payload).filter_map(change_phone_id) {
        if !phone_ids.contains(&phone_id) {
            phone_ids.push(phone_id);
        }
    }
    phone_ids
}

fn decode_message(phone_id: &str, contacts: &[Contact], raw: &Value) -> WebhookEvent {
    let message = match serde_json::from_value::<Message>(raw.clone()) {
        Ok(message) => message,
        Err(e) => {
            return WebhookEvent::Unrecognized {
                reason: format!("malformed message: {e}"),
            };
        }
    };

    let contact_name = contacts
        .iter()
        .find(|contact| contact.wa_id == message.from)
        .or(contacts.first())
        .and_then(|contact| contact.profile.as_ref())
        .and_then(|profile| profile.name.clone());

    let content = message
        .body
        .get(&message.msg_type)
        .cloned()
        .unwrap_or(Value::Null);

    WebhookEvent::InboundMessage(InboundMessage {
        phone_id: phone_id.to_string(),
        contact_phone: message.from,
        contact_name,
        msg_type: message.msg_type,
        content,
        provider_timestamp: message.timestamp,
        provider_message_id: message.id,
    })
}

fn decode_status(phone_id: &str, raw: &Value) -> WebhookEvent {
    let status = match serde_json::from_value::<Status>(raw.clone()) {
        Ok(status) => status,
        Err(e) => {
            return WebhookEvent::Unrecognized {
                reason: format!("malformed status: {e}"),
            };
        }
    };

    let parsed = match MessageStatus::from_str(&status.status) {
        Ok(MessageStatus::Received) | Err(_) => {
            return WebhookEvent::Unrecognized {
                reason: format!("unsupported status value: {}", status.status),
            };
        }
        Ok(parsed) => parsed,
    };

    WebhookEvent::StatusUpdate(StatusUpdate {
        phone_id: phone_id.to_string(),
        provider_message_id: status.id,
        status: parsed,
        timestamp: status.timestamp,
        error: status.errors.first().map(StatusError::describe),
    })
}

/// Decodes every message and status of the payload.
pub fn parse(payload: &Value) -> Vec<WebhookEvent> {
    let mut events = Vec::new();

    if payload.get("entry").and_then(Value::as_array).is_none() {
        events.push(WebhookEvent::Unrecognized {
            reason: "payload has no entry array".to_string(),
        });
        return events;
    }

    for change in changes(payload) {
        let field = change.get("field").and_then(Value::as_str).unwrap_or_default();
        if field != "messages" {
            events.push(WebhookEvent::Unrecognized {
                reason: format!("unsupported change field: {field}"),
            });
            continue;
        }

        let Some(phone_id) = change_phone_id(change) else {
            events.push(WebhookEvent::Unrecognized {
                reason: "change without metadata.phone_number_id".to_string(),
            });
            continue;
        };

        let value = &change["value"];
        let contacts = value
            .get("contacts")
            .cloned()
            .and_then(|contacts| serde_json::from_value::<Vec<Contact>>(contacts).ok())
            .unwrap_or_default();

        let messages = value.get("messages").and_then(Value::as_array);
        for raw in messages.into_iter().flatten() {
            events.push(decode_message(&phone_id, &contacts, raw));
        }

        let statuses = value.get("statuses").and_then(Value::as_array);
        for raw in statuses.into_iter().flatten() {
            events.push(decode_status(&phone_id, raw));
        }
    }

    events
}

#[cfg(test)]
pub mod samples {
    use serde_json::{Value, json};

    pub fn text_message(phone_id: &str, from: &str, id: &str, timestamp: i64, body: &str) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "15550001111", "phone_number_id": phone_id},
                        "contacts": [{"profile": {"name": "Alice"}, "wa_id": from}],
                        "messages": [{
                            "from": from,
                            "id": id,
                            "timestamp": timestamp.to_string(),
                            "type": "text",
                            "text": {"body": body}
                        }]
                    }
                }]
            }]
        })
    }

    pub fn status(phone_id: &str, id: &str, status: &str, timestamp: i64) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "waba-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "15550001111", "phone_number_id": phone_id},
                        "statuses": [{
                            "id": id,
                            "status": status,
                            "timestamp": timestamp.to_string(),
                            "recipient_id": "5215550001"
                        }]
                    }
                }]
            }]
        })
    }
}
