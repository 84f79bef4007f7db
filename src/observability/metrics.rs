//! Metrics collection and exposition.
//!
//! # Metrics
//! - `service_listeners_started_total` (counter): listeners started, by protocol
//! - `service_listener_failures_total` (counter): unrequested listener exits, by protocol
//! - `service_listeners_running` (gauge): accept loops currently running
//! - `service_shutdowns_total` (counter): shutdowns by trigger and outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::shutdown::ShutdownRequest;
use crate::net::listener::Protocol;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_listener_started(protocol: Protocol) {
    ::metrics::counter!("service_listeners_started_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_listener_failure(protocol: Protocol) {
    ::metrics::counter!("service_listener_failures_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_shutdown(request: ShutdownRequest, clean: bool) {
    let outcome = if clean { "clean" } else { "failure" };
    ::metrics::counter!(
        "service_shutdowns_total",
        "trigger" => request.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Keeps `service_listeners_running` up while held by a listener task.
///
/// Dropped when the task ends, including when it is aborted.
#[derive(Debug)]
pub struct RunningListener {
    protocol: Protocol,
}

impl RunningListener {
    pub fn new(protocol: Protocol) -> Self {
        ::metrics::gauge!("service_listeners_running", "protocol" => protocol.as_str()).increment(1.0);
        Self { protocol }
    }
}

impl Drop for RunningListener {
    fn drop(&mut self) {
        ::metrics::gauge!("service_listeners_running", "protocol" => self.protocol.as_str()).decrement(1.0);
    }
}
