//! TLS material discovery and certificate loading.

use std::fs::File;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

/// Certificate file name expected inside the TLS directory.
pub const CERT_FILE: &str = "cert.pem";
/// Private key file name expected inside the TLS directory.
pub const KEY_FILE: &str = "key.pem";

/// Paths to a certificate and private key that were found readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Look for `cert.pem` and `key.pem` in `dir`.
///
/// Returns `None` when either file is missing or unreadable; the secure
/// listener is then skipped and the service runs plaintext only.
pub fn probe_tls_material(dir: &Path) -> Option<TlsMaterial> {
    let cert_path = dir.join(CERT_FILE);
    let key_path = dir.join(KEY_FILE);

    for path in [&cert_path, &key_path] {
        if let Err(e) = File::open(path) {
            tracing::warn!(
                cert_dir = %dir.display(),
                missing = %path.display(),
                error = %e,
                "TLS material unavailable, HTTPS listener will not start"
            );
            return None;
        }
    }

    tracing::debug!(cert_dir = %dir.display(), "TLS material found");
    Some(TlsMaterial {
        cert_path,
        key_path,
    })
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(material: &TlsMaterial) -> Result<RustlsConfig, std::io::Error> {
    RustlsConfig::from_pem_file(&material.cert_path, &material.key_path).await
}
