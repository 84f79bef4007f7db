//! Termination funnel: the single channel listener failures travel through.
//!
//! Every supervised listener task gets one [`FunnelSender`]. Reporting
//! consumes the sender, so a listener can push at most one event.

use tokio::sync::mpsc;

use crate::net::listener::{ListenerId, ServeError};

/// Upper bound on listeners feeding the funnel (plaintext + TLS).
pub const MAX_LISTENERS: usize = 2;

/// Terminal failure of one listener.
#[derive(Debug)]
pub struct TerminationEvent {
    pub source: ListenerId,
    pub error: ServeError,
}

/// Receiving side, owned by the shutdown coordinator.
#[derive(Debug)]
pub struct TerminationFunnel {
    tx: mpsc::Sender<TerminationEvent>,
    rx: mpsc::Receiver<TerminationEvent>,
}

impl TerminationFunnel {
    pub fn new() -> Self {
        // One slot per producer: a terminating task never waits for room.
        let (tx, rx) = mpsc::channel(MAX_LISTENERS);
        Self { tx, rx }
    }

    /// Hand out the single-use reporting side for a new listener.
    pub fn sender(&self, source: ListenerId) -> FunnelSender {
        FunnelSender {
            source,
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next failure.
    ///
    /// The funnel keeps its own sender alive, so the channel never closes
    /// while the funnel exists and this only returns on a real event.
    pub async fn recv(&mut self) -> TerminationEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    /// Collect events that arrived without being awaited.
    pub fn drain(&mut self) -> Vec<TerminationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for TerminationFunnel {
    fn default() -> Self {
        Self::new()
    }
}

/// Reporting side held by one listener task.
#[derive(Debug)]
pub struct FunnelSender {
    source: ListenerId,
    tx: mpsc::Sender<TerminationEvent>,
}

impl FunnelSender {
    /// Push this listener's terminal failure. Never blocks.
    pub fn report(self, error: ServeError) {
        let event = TerminationEvent {
            source: self.source,
            error,
        };
        if let Err(e) = self.tx.try_send(event) {
            tracing::error!(listener = %self.source, error = %e, "Termination funnel rejected event");
        }
    }
}
