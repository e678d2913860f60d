//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration (file or defaults)
//! - Apply command-line overrides, then validate the result
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides are validated like file values, never trusted

use std::path::Path;

use crate::config::validation::validate_config;
use crate::config::{load_config, ConfigError, MoxConfig};

/// Values given on the command line that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target_url: Option<String>,
    pub bind_address: Option<String>,
}

/// Produce the effective, validated configuration.
pub fn prepare_config(path: Option<&Path>, overrides: Overrides) -> Result<MoxConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => MoxConfig::default(),
    };

    if let Some(target_url) = overrides.target_url {
        config.target_url = target_url;
    }
    if let Some(bind_address) = overrides.bind_address {
        config.listener.bind_address = bind_address;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_overrides() {
        let config = prepare_config(
            None,
            Overrides {
                target_url: Some("http://api.internal:8080".into()),
                bind_address: Some("127.0.0.1:4000".into()),
            },
        )
        .unwrap();
        assert_eq!(config.target_url, "http://api.internal:8080");
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let result = prepare_config(
            None,
            Overrides {
                target_url: Some("ftp://nope".into()),
                bind_address: None,
            },
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = prepare_config(Some(Path::new("/nonexistent/mox.toml")), Overrides::default());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
