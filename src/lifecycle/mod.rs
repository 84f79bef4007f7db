//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve addresses → Start HTTP listener → Probe TLS → Start HTTPS listener
//!
//! Runtime:
//!     Listener task exits unexpectedly → funnel.rs (one event per listener)
//!     SIGTERM/SIGINT → signals.rs
//!
//! Shutdown (shutdown.rs):
//!     First of (signal, funnel event) → Stop accepting → Drain until deadline
//!     → Force-close stragglers → Exit code
//! ```
//!
//! # Design Decisions
//! - Single arbitration point: the coordinator selects on both sources once
//! - All listeners stop in parallel against one shared deadline
//! - Any failure anywhere makes the exit non-zero

pub mod funnel;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use funnel::{TerminationEvent, TerminationFunnel};
pub use shutdown::{CoordinatorState, ShutdownCoordinator, ShutdownReport, ShutdownRequest};
pub use signals::OperatorSignals;
pub use startup::{launch, Launched, StartupError};
