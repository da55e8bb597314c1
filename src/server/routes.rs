//! Route configuration for the internal API.

use super::{accounts, messages};
use ntex::web;

/// Configures outbound send and contact routes.
///
/// # Routes
/// - `POST /messages` - Free-form text send
/// - `POST /messages/template` - Template send
/// - `GET /contacts/{contact_id}/window` - Session window state
/// - `GET /contacts/{contact_id}/messages` - Conversation history
pub fn messages(cfg: &mut web::ServiceConfig) {
    cfg.service((
        messages::send_text,
        messages::send_template,
        messages::contact_window,
        messages::contact_messages,
    ));
}

/// Configures account administration routes.
///
/// # Routes (/organizations/{organization_id}/accounts)
/// - `POST ""` / `GET ""` - Create, list
/// - `GET`, `PUT`, `DELETE /{account_id}` - Read, update, delete
/// - `POST /{account_id}/test` - Connection test
/// - `POST /{account_id}/templates/sync` - Template sync
pub fn accounts(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/organizations/{organization_id}/accounts").service((
            accounts::create_account,
            accounts::list_accounts,
            accounts::get_account,
            accounts::update_account,
            accounts::delete_account,
            accounts::test_connection,
            accounts::sync_templates,
        )),
    );
}
