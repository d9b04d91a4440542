//! Prometheus metrics collection for cqbot.
//!
//! Metrics are exposed on the webhook server under `/metrics`.
//!
//! - `cqbot_events_total{post_type}` - Events dispatched by kind
//! - `cqbot_command_total{command}` - Command actions executed
//! - `cqbot_command_duration_seconds{command}` - Command action latency
//! - `cqbot_command_rejections_total{command, reason}` - Policy rejections
//! - `cqbot_pipeline_warnings_total{kind}` - Pipeline integrity violations

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Events dispatched by post type.
pub static EVENTS_DISPATCHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Messages handed to the gateway, by conversation kind.
pub static MESSAGES_SENT: OnceLock<IntCounterVec> = OnceLock::new();

/// Commands executed by name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command rejections by name and reason.
pub static COMMAND_REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Errors that escaped middleware or actions, by error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Pipeline integrity warnings by kind.
pub static PIPELINE_WARNINGS: OnceLock<IntCounterVec> = OnceLock::new();

/// "Did you mean" suggestions offered.
pub static SUGGESTIONS_OFFERED: OnceLock<IntCounter> = OnceLock::new();

/// Webhook requests refused, by HTTP status.
pub static WEBHOOK_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Middleware chains currently running.
pub static ACTIVE_PIPELINES: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Command action latency by name.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(EVENTS_DISPATCHED, IntCounterVec::new(Opts::new("cqbot_events_total", "Events dispatched by post type"), &["post_type"]));
    register!(MESSAGES_SENT, IntCounterVec::new(Opts::new("cqbot_messages_sent_total", "Messages sent through the gateway"), &["kind"]));
    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("cqbot_command_total", "Command actions executed"), &["command"]));
    register!(COMMAND_REJECTIONS, IntCounterVec::new(Opts::new("cqbot_command_rejections_total", "Command invocations refused by policy"), &["command", "reason"]));
    register!(HANDLER_ERRORS, IntCounterVec::new(Opts::new("cqbot_handler_errors_total", "Errors escaping middleware and actions"), &["error"]));
    register!(PIPELINE_WARNINGS, IntCounterVec::new(Opts::new("cqbot_pipeline_warnings_total", "Middleware pipeline integrity warnings"), &["kind"]));
    register!(SUGGESTIONS_OFFERED, IntCounter::new("cqbot_suggestions_offered_total", "Command suggestions offered"));
    register!(WEBHOOK_REJECTED, IntCounterVec::new(Opts::new("cqbot_webhook_rejected_total", "Webhook requests refused"), &["status"]));
    register!(ACTIVE_PIPELINES, IntGauge::new("cqbot_active_pipelines", "Middleware chains currently running"));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("cqbot_command_duration_seconds", "Command action latency by name")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["command"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn inc_vec(metric: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(c) = metric.get() {
        c.with_label_values(labels).inc();
    }
}

/// Record a dispatched event.
#[inline]
pub fn record_event(post_type: &str) {
    inc_vec(&EVENTS_DISPATCHED, &[post_type]);
}

/// Record an outgoing message.
#[inline]
pub fn record_message_sent(kind: &str) {
    inc_vec(&MESSAGES_SENT, &[kind]);
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    inc_vec(&COMMAND_COUNTER, &[command]);
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command rejection.
#[inline]
pub fn record_rejection(command: &str, reason: &str) {
    inc_vec(&COMMAND_REJECTIONS, &[command, reason]);
}

/// Record an error that escaped a middleware or action.
#[inline]
pub fn record_handler_error(error: &str) {
    inc_vec(&HANDLER_ERRORS, &[error]);
}

/// Record a pipeline integrity warning.
#[inline]
pub fn record_pipeline_warning(kind: &str) {
    inc_vec(&PIPELINE_WARNINGS, &[kind]);
}

/// Record an offered suggestion.
#[inline]
pub fn record_suggestion() {
    if let Some(c) = SUGGESTIONS_OFFERED.get() {
        c.inc();
    }
}

/// Record a refused webhook request.
#[inline]
pub fn record_webhook_rejected(status: u16) {
    inc_vec(&WEBHOOK_REJECTED, &[&status.to_string()]);
}

/// Adjust the running pipeline gauge.
#[inline]
pub fn pipeline_started() {
    if let Some(g) = ACTIVE_PIPELINES.get() {
        g.inc();
    }
}

/// Adjust the running pipeline gauge.
#[inline]
pub fn pipeline_finished() {
    if let Some(g) = ACTIVE_PIPELINES.get() {
        g.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_command("echo", 0.001);
        record_rejection("echo", "low_authority");
        record_event("message");

        let output = gather_metrics();
        assert!(output.contains("cqbot_command_total"));
        assert!(output.contains("cqbot_command_rejections_total"));
        assert!(output.contains("cqbot_events_total"));
    }
}
