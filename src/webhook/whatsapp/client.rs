//! # WhatsApp API Client
//!
//! Talks to the Graph API on behalf of an [`Account`]: every call uses the
//! account's API version, phone/business id and bearer token.
//!
//! Timeouts and connection failures are retried once with the identical
//! request; every other failure is returned as is.

use super::outgoing_schemas::{
    BusinessInfo, BusinessPhoneNumber, BusinessPhoneNumbers, GraphErrorEnvelope,
    MessageTemplatesPage, OutgoingMessage, PhoneNumberInfo, ProviderTemplate, ReadReceipt,
    WhatsAppMessageResponse,
};
use crate::{config, consts, models::account::Account};
use anyhow::Context;
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Display, Error, PartialEq)]
pub enum ProviderError {
    #[display("provider rejected the request with status {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[display("provider transport error: {_0}")]
    Transport(#[error(not(source))] String),
    #[display("invalid provider response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WhatsAppApi: Send + Sync {
    /// Sends the message and returns the provider message id.
    async fn send_message(
        &self,
        account: &Account,
        message: &OutgoingMessage,
    ) -> Result<String, ProviderError>;

    async fn mark_as_read(&self, account: &Account, message_id: &str) -> Result<(), ProviderError>;

    async fn fetch_phone_number_info(
        &self,
        account: &Account,
    ) -> Result<PhoneNumberInfo, ProviderError>;

    async fn fetch_business_info(&self, account: &Account) -> Result<BusinessInfo, ProviderError>;

    /// Phone numbers registered under the account's business.
    async fn fetch_business_phone_numbers(
        &self,
        account: &Account,
    ) -> Result<Vec<BusinessPhoneNumber>, ProviderError>;

    /// Every template of the account's business, following pagination.
    async fn fetch_message_templates(
        &self,
        account: &Account,
    ) -> Result<Vec<ProviderTemplate>, ProviderError>;
}

pub type ImplWhatsAppApi = Box<dyn WhatsAppApi>;

/// reqwest backed [`WhatsAppApi`]
#[derive(Clone)]
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
}

impl WhatsAppClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("failed to build WhatsApp http client")?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config() -> anyhow::Result<Self> {
        let app_config = config::APP_CONFIG
            .get()
            .context("failed to get app config")?;

        Self::new(
            &app_config.whatsapp_api_base_url,
            app_config.whatsapp_request_timeout(),
        )
    }

    fn url(&self, account: &Account, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, account.api_version, path)
    }

    /// Sends the request built by `build`, rebuilding and resending it once
    /// on timeout or connection failure.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        match build().send().await {
            Ok(response) => Ok(response),
            Err(e) if e.is_timeout() || e.is_connect() => {
                logfire::warn!(
                    "WhatsApp API transport failure, retrying once: {error}",
                    error = e.to_string()
                );
                build()
                    .send()
                    .await
                    .map_err(|e| ProviderError::Transport(e.to_string()))
            }
            Err(e) => Err(ProviderError::Transport(e.to_string())),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<GraphErrorEnvelope>(&body) {
                Ok(envelope) => ProviderError::Rejected {
                    status: status.as_u16(),
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => ProviderError::Rejected {
                    status: status.as_u16(),
                    code: None,
                    message: body,
                },
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl WhatsAppApi for WhatsAppClient {
    async fn send_message(
        &self,
        account: &Account,
        message: &OutgoingMessage,
    ) -> Result<String, ProviderError> {
        let url = self.url(account, &format!("{}/messages", account.phone_id));
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .bearer_auth(&account.access_token)
                    .json(message)
            })
            .await?;

        let response: WhatsAppMessageResponse = Self::decode(response).await?;

        response
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::InvalidResponse("response without message id".into()))
    }

    async fn mark_as_read(&self, account: &Account, message_id: &str) -> Result<(), ProviderError> {
        let url = self.url(account, &format!("{}/messages", account.phone_id));
        let receipt = ReadReceipt::new(message_id.to_string());
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .bearer_auth(&account.access_token)
                    .json(&receipt)
            })
            .await?;

        Self::decode::<serde_json::Value>(response).await.map(|_| ())
    }

    async fn fetch_phone_number_info(
        &self,
        account: &Account,
    ) -> Result<PhoneNumberInfo, ProviderError> {
        let url = self.url(account, &account.phone_id);
        let response = self
            .send_with_retry(|| {
                self.client
                    .get(&url)
                    .query(&[("fields", consts::PHONE_NUMBER_INFO_FIELDS)])
                    .bearer_auth(&account.access_token)
            })
            .await?;

        Self::decode(response).await
    }

    async fn fetch_business_info(&self, account: &Account) -> Result<BusinessInfo, ProviderError> {
        let url = self.url(account, &account.business_id);
        let response = self
            .send_with_retry(|| {
                self.client
                    .get(&url)
                    .query(&[("fields", consts::BUSINESS_INFO_FIELDS)])
                    .bearer_auth(&account.access_token)
            })
            .await?;

        Self::decode(response).await
    }

    async fn fetch_business_phone_numbers(
        &self,
        account: &Account,
    ) -> Result<Vec<BusinessPhoneNumber>, ProviderError> {
        let url = self.url(account, &format!("{}/phone_numbers", account.business_id));
        let response = self
            .send_with_retry(|| self.client.get(&url).bearer_auth(&account.access_token))
            .await?;

        let numbers: BusinessPhoneNumbers = Self::decode(response).await?;
        Ok(numbers.data)
    }

    async fn fetch_message_templates(
        &self,
        account: &Account,
    ) -> Result<Vec<ProviderTemplate>, ProviderError> {
        let first_url = self.url(account, &format!("{}/message_templates", account.business_id));
        let limit = consts::MESSAGE_TEMPLATES_PAGE_LIMIT.to_string();

        let mut templates = Vec::new();
        let mut next_url: Option<String> = None;

        for _ in 0..consts::MESSAGE_TEMPLATES_MAX_PAGES {
            let response = match &next_url {
                // `next` already carries the query string and cursor
                Some(url) => {
                    self.send_with_retry(|| {
                        self.client.get(url).bearer_auth(&account.access_token)
                    })
                    .await?
                }
                None => {
                    self.send_with_retry(|| {
                        self.client
                            .get(&first_url)
                            .query(&[
                                ("fields", consts::MESSAGE_TEMPLATE_FIELDS),
                                ("limit", limit.as_str()),
                            ])
                            .bearer_auth(&account.access_token)
                    })
                    .await?
                }
            };

            let page: MessageTemplatesPage = Self::decode(response).await?;
            templates.extend(page.data);

            match page.paging.and_then(|paging| paging.next) {
                Some(next) => next_url = Some(next),
                None => return Ok(templates),
            }
        }

        logfire::warn!(
            "Stopped following template pages for business {business_id} after {pages} pages",
            business_id = account.business_id.clone(),
            pages = consts::MESSAGE_TEMPLATES_MAX_PAGES.to_string()
        );

        Ok(templates)
    }
}
