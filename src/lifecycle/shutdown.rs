//! Shutdown coordination for the service.
//!
//! The coordinator owns every started listener and the termination funnel.
//! [`ShutdownCoordinator::run`] races the operator signal against the funnel,
//! then stops all listeners in parallel against one grace-period deadline.

use std::future::Future;
use std::process::ExitCode;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use tokio::sync::watch;

use crate::lifecycle::funnel::{TerminationEvent, TerminationFunnel};
use crate::lifecycle::startup::StartupError;
use crate::net::listener::{ListenerId, ListenerSet, ListenerSpec, StopOutcome};
use crate::observability::metrics;

/// Grace period used when none is configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Coordinator state machine: `Running -> ShuttingDown -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Listeners are serving; waiting for a trigger.
    Running,
    /// A trigger won; listeners are draining.
    ShuttingDown,
    /// Every stop has completed or hit the deadline.
    Stopped,
}

impl CoordinatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorState::Running => "running",
            CoordinatorState::ShuttingDown => "shutting_down",
            CoordinatorState::Stopped => "stopped",
        }
    }
}

/// What moved the coordinator out of `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    OperatorSignal,
    ListenerFailed,
}

impl ShutdownRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownRequest::OperatorSignal => "signal",
            ShutdownRequest::ListenerFailed => "listener_failure",
        }
    }
}

/// Everything that happened during shutdown; decides the exit status.
#[derive(Debug)]
pub struct ShutdownReport {
    pub request: ShutdownRequest,
    /// The funnel event that triggered shutdown, if a listener failed.
    pub failure: Option<TerminationEvent>,
    /// One entry per started listener.
    pub stops: Vec<StopOutcome>,
    /// Failures that reached the funnel after another trigger had won.
    pub late_failures: Vec<TerminationEvent>,
}

impl ShutdownReport {
    /// Clean only for an operator signal where every listener drained in time
    /// and none failed.
    pub fn is_clean(&self) -> bool {
        self.request == ShutdownRequest::OperatorSignal
            && self.failure.is_none()
            && self.late_failures.is_empty()
            && self.stops.iter().all(|stop| stop.result.is_ok())
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    /// Stop outcome for `listener`, if it was started.
    pub fn stop_for(&self, listener: ListenerId) -> Option<&StopOutcome> {
        self.stops.iter().find(|stop| stop.listener == listener)
    }
}

/// Owns the listener set and the termination funnel for the process lifetime.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    listeners: ListenerSet,
    funnel: TerminationFunnel,
    grace_period: Duration,
    state: watch::Sender<CoordinatorState>,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Running);
        Self {
            listeners: ListenerSet::new(),
            funnel: TerminationFunnel::new(),
            grace_period,
            state,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.borrow()
    }

    /// Observe state transitions (the health endpoint reports from this).
    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Bind and start a listener that reports into this coordinator's funnel.
    pub async fn start_listener(
        &mut self,
        spec: &ListenerSpec,
        handler: Router,
    ) -> Result<ListenerId, StartupError> {
        self.listeners.start(spec, handler, &self.funnel).await
    }

    /// Supervise a custom serve future as one of this coordinator's listeners.
    pub fn supervise_listener<F>(
        &mut self,
        id: ListenerId,
        handle: Handle,
        serve: F,
    ) -> Result<ListenerId, StartupError>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        self.listeners.supervise(id, handle, serve, &self.funnel)
    }

    /// Wait for the first trigger, then shut every listener down.
    ///
    /// `signal` resolves when the operator asks for termination. Only the
    /// first trigger counts; `signal` is dropped once shutdown begins.
    pub async fn run<S>(self, signal: S) -> ShutdownReport
    where
        S: Future<Output = ()>,
    {
        let Self {
            listeners,
            mut funnel,
            grace_period,
            state,
        } = self;

        tracing::info!(listeners = listeners.len(), "Waiting for shutdown trigger");

        let (request, failure) = tokio::select! {
            // Operator intent wins a tie.
            biased;
            () = signal => {
                tracing::info!("Shutdown signal received");
                (ShutdownRequest::OperatorSignal, None)
            }
            event = funnel.recv() => {
                tracing::error!(listener = %event.source, error = %event.error, "Listener failed, shutting down");
                (ShutdownRequest::ListenerFailed, Some(event))
            }
        };

        state.send_replace(CoordinatorState::ShuttingDown);
        tracing::info!(
            trigger = request.as_str(),
            grace_period_ms = grace_period.as_millis() as u64,
            "Stopping listeners"
        );

        let stops = listeners.stop_all(grace_period).await;
        let late_failures = funnel.drain();
        for event in &late_failures {
            tracing::error!(listener = %event.source, error = %event.error, "Listener failed during shutdown");
        }

        state.send_replace(CoordinatorState::Stopped);

        let report = ShutdownReport {
            request,
            failure,
            stops,
            late_failures,
        };
        let clean = report.is_clean();
        metrics::record_shutdown(request, clean);
        if clean {
            tracing::info!("Shutdown complete");
        } else {
            tracing::error!(trigger = request.as_str(), "Shutdown finished with failures");
        }
        report
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}
