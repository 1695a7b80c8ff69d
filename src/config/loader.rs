//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
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

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read and parse a TOML file without validating it, for callers that
/// adjust the result before checking it.
pub fn read_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runtime]\nworker_threads = 2").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.runtime.worker_threads, 2);
    }

    #[test]
    fn read_config_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runtime]\nworker_threads = 0").unwrap();

        assert!(matches!(load_config(file.path()), Err(ConfigError::Validation(_))));
        let config = read_config(file.path()).unwrap();
        assert_eq!(config.runtime.worker_threads, 0);
    }

    #[test]
    fn validation_message_lists_every_field() {
        let err = parse_config("[runtime]\nworker_threads = 0\n[limits]\nread_buffer_size = 0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: runtime.worker_threads: must be greater than 0, \
             limits.read_buffer_size: must be greater than 0"
        );
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[listener\nbind_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_error_is_reported() {
        let err = parse_config("[listener]\nmax_connections = 0").unwrap_err();
        assert!(err.to_string().contains("listener.max_connections"));
    }
}
