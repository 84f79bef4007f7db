//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (net::listener)
//!     → server.rs (request ID, tracing, timeout, body limit)
//!     → /health or the injected application router
//!     → Send to client
//! ```

pub mod server;

pub use server::{default_app, service_router};
