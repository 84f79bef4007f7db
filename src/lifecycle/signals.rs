//! OS signal handling.
//!
//! SIGINT and SIGTERM are treated identically: either one asks for graceful
//! shutdown. Handlers are installed up front so a failure to register is a
//! startup error rather than a silent loss of the shutdown path. Signals
//! arriving after the first are ignored; the coordinator drops this source
//! once shutdown begins.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered operator termination signals.
#[cfg(unix)]
#[derive(Debug)]
pub struct OperatorSignals {
    interrupt: Signal,
    terminate: Signal,
}

#[cfg(unix)]
impl OperatorSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolve on the first SIGINT or SIGTERM.
    pub async fn wait(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => tracing::info!(signal = "SIGINT", "Received termination signal"),
            _ = self.terminate.recv() => tracing::info!(signal = "SIGTERM", "Received termination signal"),
        }
    }
}

#[cfg(not(unix))]
#[derive(Debug)]
pub struct OperatorSignals;

#[cfg(not(unix))]
impl OperatorSignals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    /// Resolve on Ctrl+C.
    pub async fn wait(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!(signal = "ctrl-c", "Received termination signal"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}
