//! Prometheus metrics exposition
//!
//! The library crates emit their own counters (`pool_bans_total`,
//! `control_commands_total`, `checkout_payment_links_total`); this module
//! installs the process-wide recorder that collects them and adds the
//! control-channel counters owned by the service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one control batch and the number of commands it carried.
pub fn record_batch(commands: usize) {
    metrics::counter!("control_batches_total").increment(1);
    metrics::counter!("control_messages_total").increment(commands as u64);
}

/// Record a rejected control payload.
pub fn record_invalid_payload() {
    metrics::counter!("control_invalid_payloads_total").increment(1);
}
