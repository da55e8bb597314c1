use crate::api::{SendError, account::AccountError};
use derive_more::{Display, Error};
use log::error;
use ntex::{http, web};
use serde::Serialize;

#[derive(Debug, Display, Error)]
pub enum ApiError {
    /// Signature, verify token or internal secret mismatch
    #[display("unauthenticated")]
    Unauthenticated,
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),
    #[display("{_0}")]
    BadRequest(#[error(not(source))] String),
    #[display("{_0}")]
    Conflict(#[error(not(source))] String),
    Send(SendError),
    #[display("{_0}")]
    InternalServerError(#[error(not(source))] String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<i64>,
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "invalid_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Send(e) => e.kind(),
            ApiError::InternalServerError(_) => "internal_error",
        }
    }

    fn action(&self) -> Option<&'static str> {
        match self {
            ApiError::Send(SendError::WindowClosed) => Some("send_template"),
            ApiError::Send(SendError::Transport(_) | SendError::DeadlineExceeded) => Some("retry"),
            _ => None,
        }
    }

    fn body(&self) -> ErrorBody {
        let provider_code = match self {
            ApiError::Send(SendError::ProviderRejected { code, .. }) => *code,
            _ => None,
        };

        // Storage details stay in the logs
        let message = match self {
            ApiError::Send(SendError::Storage(_)) | ApiError::InternalServerError(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        ErrorBody {
            error: self.kind().to_string(),
            message,
            action: self.action().map(str::to_string),
            provider_code,
        }
    }
}

impl web::error::WebResponseError for ApiError {
    fn error_response(&self, _: &web::HttpRequest) -> web::HttpResponse {
        if self.status_code().is_server_error() {
            error!("{}", self);
        }

        web::HttpResponse::build(self.status_code()).json(&self.body())
    }

    fn status_code(&self) -> http::StatusCode {
        match self {
            ApiError::Unauthenticated => http::StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => http::StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => http::StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => http::StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Send(e) => match e {
                SendError::AccountNotFound => http::StatusCode::NOT_FOUND,
                SendError::AccountNotActive(_) | SendError::WindowClosed => {
                    http::StatusCode::CONFLICT
                }
                SendError::TemplateNotFound(_)
                | SendError::TemplateNotApproved(_)
                | SendError::MissingVariable(_)
                | SendError::InvalidRequest(_) => http::StatusCode::BAD_REQUEST,
                SendError::ProviderRejected { .. } | SendError::InvalidProviderResponse(_) => {
                    http::StatusCode::BAD_GATEWAY
                }
                SendError::Transport(_) | SendError::DeadlineExceeded => {
                    http::StatusCode::GATEWAY_TIMEOUT
                }
                SendError::Storage(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<SendError> for ApiError {
    fn from(err: SendError) -> Self {
        ApiError::Send(err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound => ApiError::NotFound(err.to_string()),
            AccountError::PhoneIdTaken(_) => ApiError::Conflict(err.to_string()),
            AccountError::Invalid(msg) => ApiError::BadRequest(msg),
            AccountError::Storage(e) => ApiError::InternalServerError(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}
