// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy of the plugin subsystem.
//!
//! Manifest, load and probe errors are recovered where they occur and end up
//! as data in records and reports. Only [`ExportError`] is fatal to a caller.

use std::path::PathBuf;

use lablab_core::LablabError;
use thiserror::Error;

/// A plugin descriptor could not be turned into a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed manifest: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("manifest is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid version `{version}`: {source}")]
    InvalidVersion {
        version: String,
        source: semver::Error,
    },
}

/// A module file could not be read or resolved to an entry type.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("cannot read module {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bad magic")]
    BadMagic,

    #[error("module body is not valid UTF-8")]
    Encoding,

    #[error("malformed module header: {0}")]
    Header(#[from] toml::de::Error),

    #[error("unknown entry type '{0}'")]
    UnknownEntryType(String),
}

/// A plugin was discovered but could not be brought up.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no loadable module found in {0}")]
    NoEntryModule(PathBuf),

    #[error("ambiguous entry module: {count} candidates in {dir}")]
    AmbiguousEntryModule { dir: PathBuf, count: usize },

    #[error("entry module not found: {0}")]
    EntryModuleMissing(PathBuf),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("failed to construct plugin: {0}")]
    Construct(#[source] LablabError),

    #[error("initialization failed: {0}")]
    Initialize(#[source] LablabError),

    #[error("capability registration failed: {0}")]
    Register(#[source] LablabError),

    #[error("plugin panicked: {0}")]
    Panicked(String),
}

/// A contract probe operation did not complete successfully.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        source: LablabError,
    },

    #[error("timed out during '{operation}'")]
    Timeout { operation: &'static str },

    #[error("{operation} panicked: {message}")]
    Panicked {
        operation: &'static str,
        message: String,
    },
}

/// The health snapshot could not be written.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<ExportError> for LablabError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::CreateDir { source, .. } | ExportError::Write { source, .. } => {
                LablabError::Io(source)
            }
            ExportError::Serialize(e) => LablabError::Internal(e.to_string()),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_magic_renders_verbatim_through_load_error() {
        let err = LoadError::from(ModuleError::BadMagic);
        assert_eq!(err.to_string(), "bad magic");
    }

    #[test]
    fn missing_field_names_the_field() {
        assert_eq!(
            ManifestError::MissingField("version").to_string(),
            "manifest is missing required field `version`"
        );
    }

    #[test]
    fn timeout_names_the_operation() {
        let err = ProbeError::Timeout {
            operation: "collect_data",
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("collect_data"));
    }

    #[test]
    fn panic_message_extracts_str_and_string() {
        let a: Box<dyn std::any::Any + Send> = Box::new("boom");
        let b: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(a.as_ref()), "boom");
        assert_eq!(panic_message(b.as_ref()), "bang");
        assert_eq!(panic_message(c.as_ref()), "unknown panic payload");
    }
}
