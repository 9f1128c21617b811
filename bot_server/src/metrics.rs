//! Prometheus metrics for bot observability.

use metrics::{counter, gauge};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook or events-endpoint hit.
pub fn webhook_received(endpoint: &str) {
    counter!("bot_webhooks_received_total", "endpoint" => endpoint.to_string()).increment(1);
}

/// Record a classification result (matched / rejected / no_match).
pub fn message_classified(result: &'static str) {
    counter!("bot_messages_classified_total", "result" => result).increment(1);
}

/// Record a failed chat API call.
pub fn chat_api_error(method: &'static str) {
    counter!("bot_chat_api_errors_total", "method" => method).increment(1);
}

/// Set the current number of tracked prompts.
pub fn tracked_prompts(count: usize) {
    gauge!("bot_tracked_prompts").set(count as f64);
}
