// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manifest parsing from `plugin.json` files.
//!
//! A manifest is the descriptor a plugin directory carries next to its
//! module file. Only `id`, `name` and `version` are required; everything
//! else is optional metadata used for display and probe bookkeeping.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;

/// Parsed plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique identifier. Compared case-insensitively.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semantic version string, validated at parse time.
    pub version: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Module file to load, relative to the plugin directory.
    pub entry_module: Option<String>,
    /// Contract names the plugin claims to provide (e.g. `["DiagnosticProvider"]`).
    pub capabilities: Vec<String>,
}

impl PluginManifest {
    /// Case-folded id used for duplicate detection and filtering.
    pub fn id_key(&self) -> String {
        self.id.to_ascii_lowercase()
    }

    /// Whether the manifest claims the named contract.
    pub fn declares(&self, contract: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(contract))
    }
}

/// Intermediate JSON deserialization struct for `plugin.json`.
///
/// Required fields are optional here so a missing one can be reported by name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginManifestFile {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    author: Option<String>,
    entry_module: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ManifestError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ManifestError::MissingField(field)),
    }
}

/// Parse a plugin manifest from JSON content.
pub fn parse_manifest(json: &str) -> Result<PluginManifest, ManifestError> {
    let file: PluginManifestFile = serde_json::from_str(json)?;

    let id = required(file.id, "id")?;
    let name = required(file.name, "name")?;
    let version = required(file.version, "version")?;

    semver::Version::parse(&version).map_err(|source| ManifestError::InvalidVersion {
        version: version.clone(),
        source,
    })?;

    Ok(PluginManifest {
        id,
        name,
        version,
        description: file.description,
        author: file.author,
        entry_module: file.entry_module.filter(|m| !m.trim().is_empty()),
        capabilities: file.capabilities,
    })
}

/// Read and parse the manifest at `path`.
pub async fn parse_manifest_file(path: &Path) -> Result<PluginManifest, ManifestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_manifest(&content)
}
