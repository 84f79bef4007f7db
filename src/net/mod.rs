//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → tls.rs (probe cert.pem / key.pem, load rustls config)
//!     → listener.rs (bind, supervised accept loop per protocol)
//!     → shared axum Router handles every connection
//! ```
//!
//! # Design Decisions
//! - Bind errors surface synchronously as startup errors
//! - TLS is optional; its absence is a logged degradation
//! - Stop consumes the listener, so no listener is stopped twice

pub mod listener;
pub mod tls;

pub use listener::{ListenerId, ListenerSet, ListenerSpec, Protocol, ServeError, ServerInstance, StopError, StopOutcome};
pub use tls::{probe_tls_material, TlsMaterial};
