// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lablab plugin host.

use thiserror::Error;

/// The primary error type returned by plugins, contracts, and host commands.
#[derive(Debug, Error)]
pub enum LablabError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A plugin reported a failure from one of its lifecycle steps or contracts.
    #[error("{message}")]
    Plugin {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A contract operation was asked for something the plugin does not support.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Plugin health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Filesystem errors.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LablabError {
    /// Shorthand for a plugin failure carrying only a message.
    pub fn plugin(message: impl Into<String>) -> Self {
        LablabError::Plugin {
            message: message.into(),
            source: None,
        }
    }
}
