use chrono::TimeDelta;

/// Customer service window opened by every inbound customer message.
pub const SESSION_WINDOW: TimeDelta = TimeDelta::hours(24);

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

pub const MESSAGING_PRODUCT: &str = "whatsapp";
pub const TEMPLATE_APPROVED_STATUS: &str = "APPROVED";
pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "en_US";

pub const PHONE_NUMBER_INFO_FIELDS: &str = "display_phone_number,verified_name,code_verification_status,account_mode,quality_rating,messaging_limit_tier";
pub const BUSINESS_INFO_FIELDS: &str = "id,name";
pub const MESSAGE_TEMPLATE_FIELDS: &str = "name,language,status,category,components";
pub const MESSAGE_TEMPLATES_PAGE_LIMIT: usize = 100;
pub const MESSAGE_TEMPLATES_MAX_PAGES: usize = 20;

pub const SANDBOX_ACCOUNT_MODE: &str = "SANDBOX";
pub const UNVERIFIED_CODE_STATUSES: [&str; 2] = ["NOT_VERIFIED", "EXPIRED"];
