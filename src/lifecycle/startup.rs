//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve bind addresses from configuration
//! - Start the plaintext listener (always)
//! - Probe TLS material and start the HTTPS listener when present
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and never retried
//! - Missing TLS material degrades to plaintext only
//! - Listeners start last (traffic only when ready)

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use axum::Router;

use crate::config::ListenerConfig;
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::net::listener::{ListenerSpec, Protocol};
use crate::net::tls::probe_tls_material;

/// Misconfiguration detected before any traffic is served.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid bind address {host:?} (port {port})")]
    InvalidAddress { host: String, port: u16 },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to load TLS material {}: {source}", .cert_path.display())]
    Tls {
        cert_path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("a {0} listener is already running")]
    DuplicateListener(Protocol),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),
}

/// Addresses the listeners actually bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launched {
    pub plain: SocketAddr,
    /// `None` when TLS material was absent.
    pub tls: Option<SocketAddr>,
}

/// Combine the configured host with a port.
pub fn bind_address(host: &str, port: u16) -> Result<SocketAddr, StartupError> {
    let ip: IpAddr = host.parse().map_err(|_| StartupError::InvalidAddress {
        host: host.to_string(),
        port,
    })?;
    Ok(SocketAddr::new(ip, port))
}

/// Start the plaintext listener and, if TLS material is present, the HTTPS
/// listener, both serving `handler`.
pub async fn launch(
    config: &ListenerConfig,
    handler: Router,
    coordinator: &mut ShutdownCoordinator,
) -> Result<Launched, StartupError> {
    let plain_spec = ListenerSpec::plain(bind_address(&config.host, config.http_port)?);
    let plain = coordinator.start_listener(&plain_spec, handler.clone()).await?;

    let tls = match probe_tls_material(&config.cert_dir) {
        Some(material) => {
            let tls_spec = ListenerSpec::tls(bind_address(&config.host, config.https_port)?, material);
            let tls = coordinator.start_listener(&tls_spec, handler).await?;
            Some(tls.addr())
        }
        None => None,
    };

    Ok(Launched {
        plain: plain.addr(),
        tls,
    })
}
