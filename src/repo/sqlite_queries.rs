pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS account (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    organization_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    app_id TEXT NOT NULL DEFAULT '',
    phone_id TEXT NOT NULL UNIQUE,
    business_id TEXT NOT NULL,
    access_token TEXT NOT NULL,
    app_secret TEXT NOT NULL DEFAULT '',
    webhook_verify_token TEXT NOT NULL,
    api_version TEXT NOT NULL,
    is_default_incoming BOOLEAN NOT NULL DEFAULT 0,
    is_default_outgoing BOOLEAN NOT NULL DEFAULT 0,
    auto_read_receipt BOOLEAN NOT NULL DEFAULT 0,
    status VARCHAR(32) NOT NULL DEFAULT 'pending_registration',
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_account_organization_id ON account(organization_id);
CREATE INDEX IF NOT EXISTS idx_account_verify_token ON account(webhook_verify_token);

CREATE TABLE IF NOT EXISTS contact (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE CASCADE,
    phone_number TEXT NOT NULL,
    profile_name TEXT,
    created_at DATETIME NOT NULL,
    UNIQUE(account_id, phone_number)
);

CREATE TABLE IF NOT EXISTS message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE CASCADE,
    contact_id INTEGER NOT NULL REFERENCES contact(id) ON DELETE CASCADE,
    direction VARCHAR(16) NOT NULL,
    msg_type TEXT NOT NULL,
    content TEXT NOT NULL,
    status VARCHAR(16) NOT NULL,
    provider_message_id TEXT NOT NULL UNIQUE,
    provider_timestamp INTEGER NOT NULL,
    status_updated_at INTEGER,
    error_message TEXT,
    created_at DATETIME NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_message_contact_direction
    ON message(contact_id, direction, provider_timestamp);

CREATE TABLE IF NOT EXISTS template (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES account(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    language TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    header_text TEXT,
    body_text TEXT NOT NULL DEFAULT '',
    footer_text TEXT,
    updated_at DATETIME NOT NULL,
    UNIQUE(account_id, name, language)
);
"#;

pub const QUERY_GET_ACCOUNT_BY_PHONE_ID: &str = r#"
SELECT
    id,organization_id,name,app_id,phone_id,business_id,access_token,app_secret,
    webhook_verify_token,api_version,is_default_incoming,is_default_outgoing,
    auto_read_receipt,status,created_at,updated_at
FROM account
WHERE phone_id=$1;
"#;

pub const QUERY_GET_ACCOUNT: &str = r#"
SELECT
    id,organization_id,name,app_id,phone_id,business_id,access_token,app_secret,
    webhook_verify_token,api_version,is_default_incoming,is_default_outgoing,
    auto_read_receipt,status,created_at,updated_at
FROM account
WHERE organization_id=$1 AND id=$2;
"#;

pub const QUERY_GET_DEFAULT_OUTGOING_ACCOUNT: &str = r#"
SELECT
    id,organization_id,name,app_id,phone_id,business_id,access_token,app_secret,
    webhook_verify_token,api_version,is_default_incoming,is_default_outgoing,
    auto_read_receipt,status,created_at,updated_at
FROM account
WHERE organization_id=$1 AND is_default_outgoing=1
LIMIT 1;
"#;

pub const QUERY_LIST_ACCOUNTS: &str = r#"
SELECT
    id,organization_id,name,app_id,phone_id,business_id,access_token,app_secret,
    webhook_verify_token,api_version,is_default_incoming,is_default_outgoing,
    auto_read_receipt,status,created_at,updated_at
FROM account
WHERE organization_id=$1
ORDER BY created_at DESC, id DESC;
"#;

pub const QUERY_INSERT_ACCOUNT: &str = r#"
INSERT INTO account(
    organization_id,name,app_id,phone_id,business_id,access_token,app_secret,
    webhook_verify_token,api_version,is_default_incoming,is_default_outgoing,
    auto_read_receipt,status,created_at,updated_at
) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15);
"#;

pub const QUERY_UPDATE_ACCOUNT: &str = r#"
UPDATE account SET
    name=$3,
    app_id=$4,
    phone_id=$5,
    business_id=$6,
    access_token=$7,
    app_secret=$8,
    webhook_verify_token=$9,
    api_version=$10,
    is_default_incoming=$11,
    is_default_outgoing=$12,
    auto_read_receipt=$13,
    status=$14,
    updated_at=$15
WHERE organization_id=$1 AND id=$2;
"#;

pub const QUERY_CLEAR_DEFAULT_INCOMING: &str = r#"
UPDATE account SET is_default_incoming=0
WHERE organization_id=$1 AND id<>$2 AND is_default_incoming=1;
"#;

pub const QUERY_CLEAR_DEFAULT_OUTGOING: &str = r#"
UPDATE account SET is_default_outgoing=0
WHERE organization_id=$1 AND id<>$2 AND is_default_outgoing=1;
"#;

pub const QUERY_UPSERT_CONTACT: &str = r#"
INSERT INTO contact(account_id,phone_number,profile_name,created_at)
VALUES($1,$2,$3,$4)
ON CONFLICT(account_id,phone_number) DO UPDATE SET
    profile_name=COALESCE(excluded.profile_name, contact.profile_name)
RETURNING id,account_id,phone_number,profile_name,created_at;
"#;

pub const QUERY_GET_LAST_INBOUND_TIMESTAMP: &str = r#"
SELECT MAX(provider_timestamp)
FROM message
WHERE contact_id=$1 AND direction='incoming';
"#;

pub const QUERY_INSERT_MESSAGE: &str = r#"
INSERT INTO message(
    account_id,contact_id,direction,msg_type,content,status,
    provider_message_id,provider_timestamp,created_at
) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9)
ON CONFLICT(provider_message_id) DO NOTHING
RETURNING
    id,account_id,contact_id,direction,msg_type,content,status,provider_message_id,
    provider_timestamp,status_updated_at,error_message,created_at;
"#;

/// Rank order: sent < delivered < read < failed. `$5` is the rank of the new status.
pub const QUERY_UPDATE_MESSAGE_STATUS: &str = r#"
UPDATE message SET
    status=$2,
    status_updated_at=$3,
    error_message=COALESCE($4, error_message)
WHERE
    provider_message_id=$1 AND
    account_id=$6 AND
    direction='outgoing' AND
    (CASE status
        WHEN 'sent' THEN 1
        WHEN 'delivered' THEN 2
        WHEN 'read' THEN 3
        WHEN 'failed' THEN 4
        ELSE 0
    END) < $5;
"#;

pub const QUERY_GET_MESSAGE_BY_PROVIDER_ID: &str = r#"
SELECT
    id,account_id,contact_id,direction,msg_type,content,status,provider_message_id,
    provider_timestamp,status_updated_at,error_message,created_at
FROM message
WHERE provider_message_id=$1;
"#;

pub const QUERY_LIST_CONTACT_MESSAGES: &str = r#"
SELECT
    id,account_id,contact_id,direction,msg_type,content,status,provider_message_id,
    provider_timestamp,status_updated_at,error_message,created_at
FROM message
WHERE contact_id=$1
ORDER BY id ASC, provider_timestamp ASC;
"#;

pub const QUERY_GET_TEMPLATE: &str = r#"
SELECT
    id,account_id,name,language,category,status,header_text,body_text,footer_text,updated_at
FROM template
WHERE account_id=$1 AND name=$2 AND language=$3;
"#;

pub const QUERY_UPSERT_TEMPLATE: &str = r#"
INSERT INTO template(
    account_id,name,language,category,status,header_text,body_text,footer_text,updated_at
) VALUES($1,$2,$3,$4,$5,$6,$7,$8,$9)
ON CONFLICT(account_id,name,language) DO UPDATE SET
    category=excluded.category,
    status=excluded.status,
    header_text=excluded.header_text,
    body_text=excluded.body_text,
    footer_text=excluded.footer_text,
    updated_at=excluded.updated_at;
"#;
