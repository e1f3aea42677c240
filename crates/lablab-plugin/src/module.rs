// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Module files and how they become plugin instances.
//!
//! A module file (`*.lbmod`) starts with the `LBMOD/1` magic line followed by
//! a TOML body:
//!
//! ```toml
//! LBMOD/1
//! entry_type = "lablab.process-diagnostics"
//!
//! [config]
//! max_events = 128
//! ```
//!
//! The [`ModuleLoader`] trait is the seam between discovery and instance
//! construction; [`CatalogModuleLoader`] resolves entry types against a
//! [`PluginCatalog`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lablab_core::{Plugin, MODULE_EXTENSION, MODULE_MAGIC};
use serde::Deserialize;

use crate::catalog::PluginCatalog;
use crate::error::{LoadError, ModuleError};
use crate::manifest::PluginManifest;

/// Header of a parsed module file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleHeader {
    pub entry_type: String,
    /// `[config]` table converted to JSON. Empty object when absent.
    pub config: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleBody {
    entry_type: String,
    #[serde(default = "empty_object")]
    config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Parse module file bytes.
pub fn parse_module(bytes: &[u8]) -> Result<ModuleHeader, ModuleError> {
    let magic = MODULE_MAGIC.as_bytes();
    let rest = bytes.strip_prefix(magic).ok_or(ModuleError::BadMagic)?;
    let body = match rest {
        [] => rest,
        [b'\n', tail @ ..] => tail,
        [b'\r', b'\n', tail @ ..] => tail,
        _ => return Err(ModuleError::BadMagic),
    };
    let body = std::str::from_utf8(body).map_err(|_| ModuleError::Encoding)?;
    let parsed: ModuleBody = toml::from_str(body)?;
    Ok(ModuleHeader {
        entry_type: parsed.entry_type,
        config: parsed.config,
    })
}

/// Locate the module file for a plugin directory.
///
/// A declared `entryModule` wins, with the module extension appended when it
/// has none. Otherwise the directory must contain exactly one module file.
pub async fn resolve_entry_module(
    dir: &Path,
    manifest: &PluginManifest,
) -> Result<PathBuf, LoadError> {
    if let Some(declared) = &manifest.entry_module {
        let mut path = dir.join(declared);
        if path.extension().is_none() {
            path.set_extension(MODULE_EXTENSION);
        }
        return match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(LoadError::EntryModuleMissing(path)),
        };
    }

    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| ModuleError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| ModuleError::Io {
            path: dir.to_path_buf(),
            source,
        })?
    {
        let path = entry.path();
        let is_module = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MODULE_EXTENSION));
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_module && is_file {
            found.push(path);
        }
    }

    match found.len() {
        0 => Err(LoadError::NoEntryModule(dir.to_path_buf())),
        1 => Ok(found.remove(0)),
        count => Err(LoadError::AmbiguousEntryModule {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// A constructed, not yet initialized plugin.
pub struct LoadedModule {
    pub entry_type: String,
    pub config: serde_json::Value,
    pub plugin: Box<dyn Plugin>,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("entry_type", &self.entry_type)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Turns a module file into a plugin instance.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedModule, LoadError>;
}

/// Module loader backed by a catalog of compiled-in factories.
#[derive(Debug, Clone)]
pub struct CatalogModuleLoader {
    catalog: Arc<PluginCatalog>,
}

impl CatalogModuleLoader {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }
}

#[async_trait]
impl ModuleLoader for CatalogModuleLoader {
    async fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let header = parse_module(&bytes)?;
        let factory = self
            .catalog
            .get(&header.entry_type)
            .ok_or_else(|| ModuleError::UnknownEntryType(header.entry_type.clone()))?;
        let plugin = factory.create().map_err(LoadError::Construct)?;
        Ok(LoadedModule {
            entry_type: header.entry_type,
            config: header.config,
            plugin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;

    fn manifest(entry: Option<&str>) -> PluginManifest {
        let mut m = parse_manifest(r#"{"id":"t","name":"T","version":"1.0.0"}"#).unwrap();
        m.entry_module = entry.map(str::to_string);
        m
    }

    #[test]
    fn parse_module_with_config() {
        let header = parse_module(
            b"LBMOD/1\nentry_type = \"demo\"\n\n[config]\nmax_events = 4\nlabel = \"x\"\n",
        )
        .unwrap();
        assert_eq!(header.entry_type, "demo");
        assert_eq!(header.config["max_events"], 4);
        assert_eq!(header.config["label"], "x");
    }

    #[test]
    fn parse_module_without_config_yields_empty_object() {
        let header = parse_module(b"LBMOD/1\r\nentry_type = \"demo\"\r\n").unwrap();
        assert_eq!(header.config, serde_json::json!({}));
    }

    #[test]
    fn wrong_magic_is_bad_magic() {
        let cases: [&[u8]; 4] = [
            b"MZ\x90\x00garbage",
            b"",
            b"LBMOD/2\nentry_type = \"x\"",
            b"LBMOD/10\n",
        ];
        for bytes in cases {
            let err = parse_module(bytes).unwrap_err();
            assert_eq!(err.to_string(), "bad magic");
        }
    }

    #[test]
    fn malformed_body_is_header_error() {
        let err = parse_module(b"LBMOD/1\nentry_type = \n").unwrap_err();
        assert!(matches!(err, ModuleError::Header(_)));
        let err = parse_module(b"LBMOD/1\n").unwrap_err();
        assert!(matches!(err, ModuleError::Header(_)));
    }

    #[test]
    fn non_utf8_body_is_encoding_error() {
        let err = parse_module(b"LBMOD/1\n\xff\xfe").unwrap_err();
        assert!(matches!(err, ModuleError::Encoding));
    }

    #[tokio::test]
    async fn declared_entry_gets_extension_appended() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.lbmod"), "LBMOD/1\n").unwrap();
        let path = resolve_entry_module(dir.path(), &manifest(Some("main")))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("main.lbmod"));
    }

    #[tokio::test]
    async fn declared_entry_missing_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_entry_module(dir.path(), &manifest(Some("gone.lbmod")))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::EntryModuleMissing(_)));
    }

    #[tokio::test]
    async fn sole_module_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("only.lbmod"), "LBMOD/1\n").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "hi").unwrap();
        let path = resolve_entry_module(dir.path(), &manifest(None)).await.unwrap();
        assert_eq!(path, dir.path().join("only.lbmod"));
    }

    #[tokio::test]
    async fn zero_or_many_module_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_entry_module(dir.path(), &manifest(None))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::NoEntryModule(_)));

        std::fs::write(dir.path().join("a.lbmod"), "LBMOD/1\n").unwrap();
        std::fs::write(dir.path().join("b.lbmod"), "LBMOD/1\n").unwrap();
        let err = resolve_entry_module(dir.path(), &manifest(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::AmbiguousEntryModule { count: 2, .. }
        ));
    }

    #[tokio::test]
    async fn catalog_loader_rejects_unknown_entry_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lbmod");
        std::fs::write(&path, "LBMOD/1\nentry_type = \"nope\"\n").unwrap();
        let loader = CatalogModuleLoader::new(PluginCatalog::new());
        let err = loader.load(&path).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown entry type 'nope'");
    }

    #[tokio::test]
    async fn catalog_loader_constructs_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lbmod");
        std::fs::write(
            &path,
            format!(
                "LBMOD/1\nentry_type = \"{}\"\n",
                crate::builtin::PROCESS_DIAGNOSTICS_ENTRY_TYPE
            ),
        )
        .unwrap();
        let loader = CatalogModuleLoader::new(crate::catalog::builtin_catalog());
        let module = loader.load(&path).await.unwrap();
        assert_eq!(
            module.entry_type,
            crate::builtin::PROCESS_DIAGNOSTICS_ENTRY_TYPE
        );
    }
}
