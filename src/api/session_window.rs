//! Customer service window.
//!
//! A contact's window is open while less than 24h have passed since the
//! provider timestamp of its latest inbound message. Nothing is persisted:
//! the state is derived from committed message rows on every evaluation.

use crate::{consts, repo};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WindowState {
    /// Free-form messages allowed until `expires_at`
    Open { expires_at: DateTime<Utc> },
    /// Templates only
    Closed,
}

impl WindowState {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowState::Open { .. })
    }
}

/// Strict: an inbound message exactly 24h old no longer keeps the window open.
pub fn is_open(last_inbound: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_inbound < consts::SESSION_WINDOW
}

/// Window state for the latest inbound provider timestamp, in unix seconds.
pub fn evaluate(last_inbound_ts: Option<i64>, now: DateTime<Utc>) -> WindowState {
    let Some(last_inbound) = last_inbound_ts.and_then(|ts| DateTime::from_timestamp(ts, 0)) else {
        return WindowState::Closed;
    };

    if is_open(last_inbound, now) {
        WindowState::Open {
            expires_at: last_inbound + consts::SESSION_WINDOW,
        }
    } else {
        WindowState::Closed
    }
}

pub async fn window_state(
    repo: &repo::ImplGatewayRepo,
    contact_id: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<WindowState> {
    Ok(evaluate(
        repo.get_last_inbound_timestamp(contact_id).await?,
        now,
    ))
}
