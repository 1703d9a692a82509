//! Core metrics traits (always compiled, no exporter attached).
//!
//! Provides the `MetricsRecorder` trait and `NoopMetrics` so modules can
//! accept `Arc<dyn MetricsRecorder>` unconditionally. Deployments that do
//! not wire an exporter inject `NoopMetrics` and every call optimises to
//! a no-op.

use std::sync::Arc;

/// Trait for recording application metrics.
///
/// All methods are no-op by default, allowing partial implementation.
/// Implementations must be thread-safe (Send + Sync).
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync {
    // ===== Click recording =====

    /// Record a click event dropped before reaching the sink
    fn inc_clicks_dropped(&self, reason: &str) {}

    /// Record a click buffer flush
    fn inc_clicks_flush(&self, trigger: &str, status: &str) {}

    /// Set current click buffer entry count
    fn set_clicks_buffer_entries(&self, count: f64) {}

    // ===== Resolution =====

    /// Record a resolution outcome (redirect, not_found, expired, ...)
    fn inc_resolution(&self, outcome: &str) {}

    // ===== Domain verification =====

    /// Record a verification check outcome
    fn inc_verify_check(&self, outcome: &str) {}

    /// Record a DNS query timing out against the resolver itself
    fn inc_dns_timeout(&self) {}
}

/// No-op implementation injected when no metrics backend is configured.
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

impl NoopMetrics {
    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(NoopMetrics)
    }
}
