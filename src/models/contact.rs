use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// End customer of one account, identified by phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    pub account_id: i64,
    pub phone_number: String,
    pub profile_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
