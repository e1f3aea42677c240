// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, bounded timeouts and consistent filters.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::LablabConfig;

/// Upper bound for the probe deadline.
const MAX_PROBE_TIMEOUT_MS: u64 = 10 * 60 * 1000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LablabConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.plugins.default_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "plugins.default_path must not be empty".to_string(),
        });
    }

    for (i, path) in config.plugins.paths.iter().enumerate() {
        if path.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("plugins.paths[{i}] must not be empty"),
            });
        }
    }

    let timeout = config.plugins.probe_timeout_ms;
    if timeout == 0 || timeout > MAX_PROBE_TIMEOUT_MS {
        errors.push(ConfigError::Validation {
            message: format!(
                "plugins.probe_timeout_ms must be between 1 and {MAX_PROBE_TIMEOUT_MS}, got {timeout}"
            ),
        });
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    // Ids are compared case-insensitively, like the loader does.
    let included: HashSet<String> = config
        .plugins
        .include
        .iter()
        .map(|id| id.trim().to_ascii_lowercase())
        .collect();
    for id in &config.plugins.exclude {
        if included.contains(&id.trim().to_ascii_lowercase()) {
            errors.push(ConfigError::Validation {
                message: format!("plugin id `{id}` is both included and excluded"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = LablabConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_default_path_fails_validation() {
        let mut config = LablabConfig::default();
        config.plugins.default_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("default_path"))));
    }

    #[test]
    fn zero_probe_timeout_fails_validation() {
        let mut config = LablabConfig::default();
        config.plugins.probe_timeout_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("probe_timeout_ms"))));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = LablabConfig::default();
        config.logging.level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn overlapping_filters_fail_validation() {
        let mut config = LablabConfig::default();
        config.plugins.include = vec!["Media".to_string()];
        config.plugins.exclude = vec!["media".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("both included and excluded"))
        ));
    }

    #[test]
    fn collects_every_error() {
        let mut config = LablabConfig::default();
        config.plugins.default_path = String::new();
        config.plugins.probe_timeout_ms = 0;
        config.plugins.paths = vec![String::new()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
