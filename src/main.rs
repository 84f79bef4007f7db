use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use group_service::config::{loader, validate_config, ConfigError, ServiceConfig};
use group_service::http::{default_app, service_router};
use group_service::lifecycle::{launch, OperatorSignals, ShutdownCoordinator, ShutdownReport, StartupError};
use group_service::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "group-service")]
#[command(about = "Serves the group API over HTTP and, when certificates are present, HTTPS", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "GROUP_SERVICE_CONFIG")]
    config: Option<PathBuf>,

    /// Plaintext HTTP port
    #[arg(long, env = "HTTP_PORT")]
    http_port: Option<u16>,

    /// HTTPS port
    #[arg(long, env = "HTTPS_PORT")]
    https_port: Option<u16>,

    /// Directory containing cert.pem and key.pem
    #[arg(long, env = "CERT_DIR")]
    cert_dir: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(port) = self.http_port {
            config.listener.http_port = port;
        }
        if let Some(port) = self.https_port {
            config.listener.https_port = port;
        }
        if let Some(dir) = &self.cert_dir {
            config.listener.cert_dir = dir.clone();
        }
    }

    fn resolve(&self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => loader::read_config(path)?,
            None => ServiceConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

async fn run(config: ServiceConfig) -> Result<ShutdownReport, StartupError> {
    tracing::info!(
        http_port = config.listener.http_port,
        https_port = config.listener.https_port,
        cert_dir = %config.listener.cert_dir.display(),
        grace_period_secs = config.shutdown.grace_period_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|e| StartupError::Metrics(e.to_string()))?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
    }

    let signals = OperatorSignals::install().map_err(StartupError::Signals)?;

    let mut coordinator = ShutdownCoordinator::new(config.shutdown.grace_period());
    let handler = service_router(&config.http, coordinator.subscribe_state(), default_app());
    launch(&config.listener, handler, &mut coordinator).await?;

    Ok(coordinator.run(signals.wait()).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("group-service: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.observability) {
        eprintln!("group-service: failed to initialise logging: {e}");
    }

    tracing::info!("group-service v{} starting", env!("CARGO_PKG_VERSION"));

    match run(config).await {
        Ok(report) => report.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use group_service::config::ValidationError;
    use std::io::Write;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "group-service",
            "--http-port",
            "9080",
            "--https-port",
            "9443",
            "--cert-dir",
            "/srv/tls/",
        ]);

        let config = args.resolve().unwrap();
        assert_eq!(config.listener.http_port, 9080);
        assert_eq!(config.listener.https_port, 9443);
        assert_eq!(config.listener.cert_dir, PathBuf::from("/srv/tls/"));
    }

    #[test]
    fn flags_override_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[listener]\nhttp_port = 7000\nhttps_port = 7443").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from(["group-service", "--config", &path, "--http-port", "7001"]);
        let config = args.resolve().unwrap();

        assert_eq!(config.listener.http_port, 7001);
        assert_eq!(config.listener.https_port, 7443);
    }

    #[test]
    fn grace_period_beyond_limit_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[shutdown]\ngrace_period_secs = 9223372036854775807").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from(["group-service", "--config", &path]);
        match args.resolve() {
            Err(ConfigError::Validation(errors)) => assert_eq!(
                errors,
                vec![ValidationError::GracePeriodTooLong(i64::MAX as u64)]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn overrides_are_validated() {
        let args = Args::parse_from(["group-service", "--http-port", "9000", "--https-port", "9000"]);
        assert!(matches!(args.resolve(), Err(ConfigError::Validation(_))));
    }
}
