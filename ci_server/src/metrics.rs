//! Prometheus metrics for CI server observability.

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook received event.
pub fn webhook_received(event_type: &str) {
    counter!("ci_webhooks_received_total", "event" => event_type.to_string()).increment(1);
}

/// Record how a webhook delivery was resolved (rejected, ignored, built).
pub fn webhook_outcome(outcome: &'static str) {
    counter!("ci_webhook_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record a pipeline stage transition.
pub fn stage_entered(stage: &'static str) {
    counter!("ci_pipeline_stages_total", "stage" => stage).increment(1);
}

/// Record a finished build.
pub fn build_finished(status: &'static str) {
    counter!("ci_builds_total", "status" => status).increment(1);
}

/// Record build duration.
pub fn build_duration(duration_ms: u64) {
    histogram!("ci_build_duration_ms").record(duration_ms as f64);
}

/// Record step duration.
pub fn step_duration(step_name: &'static str, duration_ms: u64) {
    histogram!("ci_step_duration_ms", "step" => step_name).record(duration_ms as f64);
}

/// Record a failed commit status post.
pub fn status_post_failed(state: &'static str) {
    counter!("ci_status_post_failures_total", "state" => state).increment(1);
}

/// Record an error occurrence.
pub fn error_recorded(category: &'static str) {
    counter!("ci_errors_total", "category" => category).increment(1);
}
