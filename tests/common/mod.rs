//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use group_service::config::ListenerConfig;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Self-signed `localhost` certificate and key.
const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/tls");

/// The test client pulls in a second rustls provider, so pick one explicitly
/// before any server config is built.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// A directory containing `cert.pem` and `key.pem`.
pub fn tls_dir() -> TempDir {
    install_crypto_provider();
    let dir = tempfile::tempdir().unwrap();
    for name in ["cert.pem", "key.pem"] {
        fs::copy(Path::new(FIXTURES).join(name), dir.path().join(name)).unwrap();
    }
    dir
}

/// A directory with no TLS material.
pub fn empty_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Loopback listeners on OS-assigned ports.
pub fn listener_config(cert_dir: &Path) -> ListenerConfig {
    ListenerConfig {
        host: "127.0.0.1".into(),
        http_port: 0,
        https_port: 0,
        cert_dir: cert_dir.to_path_buf(),
    }
}

/// Application router: `/` answers immediately, `/slow` outlives any test grace period.
pub fn test_app() -> Router {
    Router::new()
        .route("/", get(|| async { "hello" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        )
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// A manually fired stand-in for the operator signal.
pub fn operator_signal() -> (oneshot::Sender<()>, impl Future<Output = ()> + Send + 'static) {
    let (tx, rx) = oneshot::channel();
    (tx, async move {
        let _ = rx.await;
    })
}

pub async fn get_text(url: String) -> (u16, String) {
    let res = client().get(url).send().await.expect("listener unreachable");
    let status = res.status().as_u16();
    (status, res.text().await.unwrap())
}
