//! Builders shared by the unit tests of every layer.

use super::{account, contact, message, template};
use chrono::Utc;

pub fn create_test_account(id: i64, phone_id: &str) -> account::Account {
    account::Account {
        id,
        organization_id: 1,
        name: format!("account {id}"),
        app_id: "app-1".to_string(),
        phone_id: phone_id.to_string(),
        business_id: "waba-1".to_string(),
        access_token: "EAAG-secret-token".to_string(),
        app_secret: "app-secret".to_string(),
        webhook_verify_token: "verify".to_string(),
        api_version: "v21.0".to_string(),
        is_default_incoming: false,
        is_default_outgoing: false,
        auto_read_receipt: false,
        status: account::AccountStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_test_contact(id: i64, account_id: i64, phone_number: &str) -> contact::Contact {
    contact::Contact {
        id,
        account_id,
        phone_number: phone_number.to_string(),
        profile_name: None,
        created_at: Utc::now(),
    }
}

pub fn create_test_template(account_id: i64, name: &str, body_text: &str) -> template::Template {
    template::Template {
        id: 1,
        account_id,
        name: name.to_string(),
        language: "en_US".to_string(),
        category: "UTILITY".to_string(),
        status: "APPROVED".to_string(),
        header_text: None,
        body_text: body_text.to_string(),
        footer_text: None,
        updated_at: Utc::now(),
    }
}

pub fn create_test_message(id: i64, new_message: message::NewMessage) -> message::Message {
    message::Message {
        id,
        account_id: new_message.account_id,
        contact_id: new_message.contact_id,
        direction: new_message.direction,
        msg_type: new_message.msg_type,
        content: new_message.content,
        status: new_message.status,
        provider_message_id: new_message.provider_message_id,
        provider_timestamp: new_message.provider_timestamp,
        status_updated_at: None,
        error_message: None,
        created_at: Utc::now(),
    }
}
