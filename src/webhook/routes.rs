use ntex::web;

/// Configures webhook routes for the WhatsApp Cloud API.
///
/// These routes are public endpoints authenticated by the verify token
/// (handshake) and the payload signature (deliveries).
///
/// # Routes
/// - `GET /webhook` - Subscription handshake
/// - `POST /webhook` - Event deliveries for every account
pub fn whatsapp(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook").service((super::whatsapp::verify, super::whatsapp::receive)),
    );
}
