//! WhatsApp Cloud API integration
//!
//! ## Submodules
//!
//! - [`client`] - Cloud API client for sends, read receipts, number details and templates
//! - [`handler`] - Application of authenticated webhook events
//! - [`outgoing_schemas`] - Payloads sent to the Cloud API and its responses
//! - [`routes`] - HTTP endpoints for the webhook handshake and deliveries
//! - [`schemas`] - Decoding of webhook deliveries into events
//! - [`security`] - Payload signature verification

pub mod client;
pub mod handler;
pub mod outgoing_schemas;
pub mod routes;
pub mod schemas;
pub mod security;

pub use routes::{receive, verify};
