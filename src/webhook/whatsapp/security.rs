//! Webhook payload authentication.
//!
//! Meta signs every delivery with HMAC-SHA256 keyed by the app secret of the
//! app that owns the phone number, and sends it as
//! `X-Hub-Signature-256: sha256=<hex>`. The MAC covers the raw body bytes as
//! received, never a re-serialized payload.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Checks `signature_header` against the HMAC of `payload` under `app_secret`.
///
/// An empty app secret never verifies. The comparison is constant-time.
pub fn verify_signature(signature_header: &str, payload: &[u8], app_secret: &str) -> bool {
    if app_secret.is_empty() {
        logfire::warn!("Webhook signature check skipped: account has no app secret");
        return false;
    }

    let Some(signature_hex) = signature_header.trim().strip_prefix("sha256=") else {
        logfire::warn!("Invalid signature header format: expected 'sha256=' prefix");
        return false;
    };

    let expected_signature = match hex::decode(signature_hex) {
        Ok(sig) => sig,
        Err(e) => {
            logfire::warn!(
                "Failed to decode signature hex: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            logfire::error!(
                "Failed to create HMAC instance: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    mac.update(payload);
    let computed_signature = mac.finalize().into_bytes();

    computed_signature.ct_eq(&expected_signature[..]).into()
}

/// `sha256=<hex>` header value for `payload`, as the provider would send it.
#[cfg(test)]
pub fn sign_payload(payload: &[u8], app_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
