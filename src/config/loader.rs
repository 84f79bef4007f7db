//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServiceConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read a TOML file without validating it, so overrides can be applied first.
pub fn read_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[listener]\nhttp_port = 8000\ncert_dir = \"/etc/group-service/tls\"\n\n[shutdown]\ngrace_period_secs = 10"
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.listener.http_port, 8000);
        assert_eq!(config.shutdown.grace_period_secs, 10);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn out_of_range_values_still_parse() {
        let config = parse_config("[shutdown]\ngrace_period_secs = 9223372036854775807").unwrap();
        assert_eq!(config.shutdown.grace_period_secs, i64::MAX as u64);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            parse_config("[listener\nhttp_port = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
