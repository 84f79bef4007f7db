//! Group service process lifecycle.
//!
//! Brings up a plaintext HTTP listener and, when TLS material is present, an
//! HTTPS listener serving the same router, then waits for an operator signal
//! or a listener failure and drains both within a fixed grace period.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use lifecycle::{ShutdownCoordinator, ShutdownReport};
