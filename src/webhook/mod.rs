//! Webhook handlers for external integrations
//!
//! ## Modules
//!
//! - [`routes`] - Route configuration for webhook endpoints
//! - [`whatsapp`] - WhatsApp Cloud API webhook handlers and API client

pub mod routes;
pub mod whatsapp;
