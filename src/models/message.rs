use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[display("incoming")]
    Incoming,
    #[display("outgoing")]
    Outgoing,
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(anyhow::anyhow!("unknown message direction: {other}")),
        }
    }
}

/// Delivery state of a message.
///
/// Outgoing messages only move forward along `sent < delivered < read <
/// failed`; incoming messages stay `received`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[display("received")]
    Received,
    #[display("sent")]
    Sent,
    #[display("delivered")]
    Delivered,
    #[display("read")]
    Read,
    #[display("failed")]
    Failed,
}

impl MessageStatus {
    pub fn rank(&self) -> i64 {
        match self {
            MessageStatus::Received => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 4,
        }
    }
}

impl FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "received" => Ok(MessageStatus::Received),
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(anyhow::anyhow!("unknown message status: {other}")),
        }
    }
}

/// Stored message. Only the status fields change after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Local monotonic sequence, used for history ordering
    pub id: i64,
    pub account_id: i64,
    pub contact_id: i64,
    pub direction: Direction,
    pub msg_type: String,
    pub content: serde_json::Value,
    pub status: MessageStatus,
    pub provider_message_id: String,
    /// Unix seconds reported by the provider (local send time for outgoing)
    pub provider_timestamp: i64,
    pub status_updated_at: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values needed to insert a message row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub account_id: i64,
    pub contact_id: i64,
    pub direction: Direction,
    pub msg_type: String,
    pub content: serde_json::Value,
    pub status: MessageStatus,
    pub provider_message_id: String,
    pub provider_timestamp: i64,
}
