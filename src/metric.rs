use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("wa_gateway_statds")
        .with_description("WhatsApp gateway statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

/// Webhook events by kind: `inbound_message`, `status_update`, `unrecognized`
pub fn incr_webhook_event_statds(kind: &str) {
    incr_statds("webhook_event".to_string(), kind.into())
}

/// Send outcomes: `sent` or a [`crate::api::SendError::kind`]
pub fn incr_send_outcome_statds(outcome: &str) {
    incr_statds("send_outcome".to_string(), outcome.into())
}

pub fn incr_signature_rejected_statds(reason: &str) {
    incr_statds("signature_rejected".to_string(), reason.into())
}
