//! # API Module
//!
//! Gateway business logic, independent of the HTTP layer.
//!
//! ## Modules
//!
//! - [`account`] - Account resolution through the cache and account administration
//! - [`dispatcher`] - Outbound text and template sends
//! - [`inbound`] - Storage of inbound customer messages
//! - [`reconciler`] - Delivery status callbacks applied to stored messages
//! - [`session_window`] - 24h customer service window evaluation
//! - [`template`] - Template variable validation, rendering and sync

pub mod account;
pub mod dispatcher;
pub mod inbound;
pub mod reconciler;
pub mod session_window;
pub mod template;

use crate::webhook::whatsapp::client::ProviderError;
use derive_more::{Display, Error};

/// Failure of an operation that talks to the provider on behalf of an account.
///
/// No message row exists for a send that ends in any of these.
#[derive(Debug, Display, Error)]
pub enum SendError {
    #[display("account not found")]
    AccountNotFound,
    #[display("account {_0} is not active")]
    AccountNotActive(#[error(not(source))] String),
    #[display("the customer service window is closed, send a template instead")]
    WindowClosed,
    #[display("template {_0} not found")]
    TemplateNotFound(#[error(not(source))] String),
    #[display("template {_0} is not approved")]
    TemplateNotApproved(#[error(not(source))] String),
    #[display("{_0}")]
    MissingVariable(#[error(not(source))] String),
    #[display("{_0}")]
    InvalidRequest(#[error(not(source))] String),
    #[display("provider rejected the request with status {status}: {message}")]
    ProviderRejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[display("invalid provider response: {_0}")]
    InvalidProviderResponse(#[error(not(source))] String),
    #[display("provider unreachable: {_0}")]
    Transport(#[error(not(source))] String),
    #[display("send deadline exceeded")]
    DeadlineExceeded,
    #[display("storage error: {_0}")]
    Storage(#[error(not(source))] anyhow::Error),
}

impl SendError {
    /// Stable label used in metrics and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            SendError::AccountNotFound => "account_not_found",
            SendError::AccountNotActive(_) => "account_not_active",
            SendError::WindowClosed => "window_closed",
            SendError::TemplateNotFound(_) => "template_not_found",
            SendError::TemplateNotApproved(_) => "template_not_approved",
            SendError::MissingVariable(_) => "missing_variable",
            SendError::InvalidRequest(_) => "invalid_request",
            SendError::ProviderRejected { .. } => "provider_rejected",
            SendError::InvalidProviderResponse(_) => "invalid_provider_response",
            SendError::Transport(_) => "transport",
            SendError::DeadlineExceeded => "deadline_exceeded",
            SendError::Storage(_) => "storage",
        }
    }
}

impl From<ProviderError> for SendError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected {
                status,
                code,
                message,
            } => SendError::ProviderRejected {
                status,
                code,
                message,
            },
            ProviderError::Transport(reason) => SendError::Transport(reason),
            ProviderError::InvalidResponse(reason) => SendError::InvalidProviderResponse(reason),
        }
    }
}

impl From<anyhow::Error> for SendError {
    fn from(err: anyhow::Error) -> Self {
        SendError::Storage(err)
    }
}
