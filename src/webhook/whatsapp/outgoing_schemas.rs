//! # WhatsApp Outgoing Message Schemas
//!
//! Payloads sent to the Cloud API and the responses it returns.

use crate::{consts, models::template::NewTemplate};
use serde::{Deserialize, Serialize};

/// Message sent to `POST /{version}/{phone_id}/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Messaging product, always "whatsapp"
    pub messaging_product: String,
    pub recipient_type: String,
    /// Recipient's WhatsApp ID (phone number)
    pub to: String,
    #[serde(flatten)]
    pub body: OutgoingBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutgoingBody {
    Text { text: OutgoingTextContent },
    Template { template: OutgoingTemplateContent },
}

impl OutgoingMessage {
    fn new(to: String, body: OutgoingBody) -> Self {
        Self {
            messaging_product: consts::MESSAGING_PRODUCT.to_string(),
            recipient_type: "individual".to_string(),
            to,
            body,
        }
    }

    /// Creates a new text message
    pub fn text(to: String, body: String) -> Self {
        Self::new(
            to,
            OutgoingBody::Text {
                text: OutgoingTextContent {
                    body,
                    preview_url: false,
                },
            },
        )
    }

    /// Creates a new template message
    pub fn template(to: String, template: OutgoingTemplateContent) -> Self {
        Self::new(to, OutgoingBody::Template { template })
    }

    /// Value stored in `message.msg_type`
    pub fn msg_type(&self) -> &'static str {
        match self.body {
            OutgoingBody::Text { .. } => "text",
            OutgoingBody::Template { .. } => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTextContent {
    pub body: String,
    pub preview_url: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingTemplateContent {
    pub name: String,
    pub language: TemplateLanguage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<TemplateComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLanguage {
    pub code: String,
}

/// Parameters for one template section (`header` or `body`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateComponent {
    #[serde(rename = "type")]
    pub component_type: String,
    pub parameters: Vec<TemplateParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    #[serde(rename = "type")]
    pub parameter_type: String,
    pub text: String,
    /// Only set for named (`{{first_name}}`) placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
}

impl TemplateParameter {
    pub fn positional(text: String) -> Self {
        Self {
            parameter_type: "text".to_string(),
            text,
            parameter_name: None,
        }
    }

    pub fn named(name: String, text: String) -> Self {
        Self {
            parameter_type: "text".to_string(),
            text,
            parameter_name: Some(name),
        }
    }
}

/// Marks an inbound message as read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub messaging_product: String,
    pub status: String,
    pub message_id: String,
}

impl ReadReceipt {
    pub fn new(message_id: String) -> Self {
        Self {
            messaging_product: consts::MESSAGING_PRODUCT.to_string(),
            status: "read".to_string(),
            message_id,
        }
    }
}

/// Response of a successful send
#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessageResponse {
    #[serde(default)]
    pub messages: Vec<WhatsAppMessageId>,
}

impl WhatsAppMessageResponse {
    pub fn message_id(&self) -> Option<&str> {
        self.messages
            .first()
            .map(|message| message.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatsAppMessageId {
    pub id: String,
}

/// Graph API error envelope: `{"error": {"message", "type", "code", ...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphError {
    pub message: String,
    pub code: Option<i64>,
    pub error_subcode: Option<i64>,
    pub fbtrace_id: Option<String>,
}

/// `GET /{version}/{phone_id}` with the fields in [`consts::PHONE_NUMBER_INFO_FIELDS`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PhoneNumberInfo {
    pub display_phone_number: Option<String>,
    pub verified_name: Option<String>,
    pub code_verification_status: Option<String>,
    pub account_mode: Option<String>,
    pub quality_rating: Option<String>,
    pub messaging_limit_tier: Option<String>,
}

/// `GET /{version}/{business_id}` with the fields in [`consts::BUSINESS_INFO_FIELDS`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BusinessInfo {
    pub id: String,
    pub name: Option<String>,
}

/// `GET /{version}/{business_id}/phone_numbers`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessPhoneNumbers {
    #[serde(default)]
    pub data: Vec<BusinessPhoneNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BusinessPhoneNumber {
    pub id: String,
    pub display_phone_number: Option<String>,
    pub verified_name: Option<String>,
}

/// One page of `GET /{version}/{business_id}/message_templates`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplatesPage {
    #[serde(default)]
    pub data: Vec<ProviderTemplate>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderTemplate {
    pub name: String,
    pub language: String,
    pub status: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub components: Vec<ProviderTemplateComponent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderTemplateComponent {
    #[serde(rename = "type")]
    pub component_type: String,
    pub format: Option<String>,
    pub text: Option<String>,
}

impl ProviderTemplate {
    fn component_text(&self, component_type: &str) -> Option<String> {
        self.components
            .iter()
            .find(|component| component.component_type.eq_ignore_ascii_case(component_type))
            .filter(|component| {
                component
                    .format
                    .as_deref()
                    .is_none_or(|format| format.eq_ignore_ascii_case("TEXT"))
            })
            .and_then(|component| component.text.clone())
    }
}

impl From<ProviderTemplate> for NewTemplate {
    fn from(template: ProviderTemplate) -> Self {
        NewTemplate {
            header_text: template.component_text("HEADER"),
            body_text: template.component_text("BODY").unwrap_or_default(),
            footer_text: template.component_text("FOOTER"),
            category: template.category.unwrap_or_default(),
            name: template.name,
            language: template.language,
            status: template.status,
        }
    }
}
