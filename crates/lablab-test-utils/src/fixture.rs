// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk plugin directories for discovery and loading tests.

use std::path::{Path, PathBuf};

use lablab_core::{MANIFEST_FILE_NAME, MODULE_EXTENSION, MODULE_MAGIC};
use serde_json::{Map, Value};
use tempfile::TempDir;

use crate::mock_plugin::MockBehavior;

/// A temporary search path. Removed when dropped.
pub struct PluginFixture {
    dir: TempDir,
}

impl PluginFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create fixture directory"),
        }
    }

    /// The search path to hand to the loader.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Start a plugin in subdirectory `dir_name`. Its id and name default to `dir_name`.
    pub fn plugin(&self, dir_name: &str) -> PluginDirBuilder {
        PluginDirBuilder::new(self.root().join(dir_name), dir_name)
    }

    /// Start a plugin that lives directly in the search path root.
    pub fn root_plugin(&self, id: &str) -> PluginDirBuilder {
        PluginDirBuilder::new(self.root().to_path_buf(), id)
    }
}

impl Default for PluginFixture {
    fn default() -> Self {
        Self::new()
    }
}

enum ManifestSource {
    Fields(Map<String, Value>),
    Raw(String),
}

/// Builder for one plugin directory.
pub struct PluginDirBuilder {
    dir: PathBuf,
    manifest: ManifestSource,
    modules: Vec<(String, Vec<u8>)>,
}

impl PluginDirBuilder {
    fn new(dir: PathBuf, id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(id));
        fields.insert("name".into(), Value::from(id));
        fields.insert("version".into(), Value::from("1.0.0"));
        Self {
            dir,
            manifest: ManifestSource::Fields(fields),
            modules: Vec::new(),
        }
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        if let ManifestSource::Fields(fields) = &mut self.manifest {
            fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.set("id", Value::from(id))
    }

    pub fn name(self, name: &str) -> Self {
        self.set("name", Value::from(name))
    }

    pub fn version(self, version: &str) -> Self {
        self.set("version", Value::from(version))
    }

    pub fn entry_module(self, entry: &str) -> Self {
        self.set("entryModule", Value::from(entry))
    }

    pub fn capabilities(self, capabilities: &[&str]) -> Self {
        self.set("capabilities", Value::from(capabilities.to_vec()))
    }

    /// Drop a manifest field, e.g. to produce an invalid manifest.
    pub fn omit(mut self, key: &str) -> Self {
        if let ManifestSource::Fields(fields) = &mut self.manifest {
            fields.remove(key);
        }
        self
    }

    /// Replace the manifest with literal content.
    pub fn raw_manifest(mut self, content: &str) -> Self {
        self.manifest = ManifestSource::Raw(content.to_string());
        self
    }

    /// Add a module file running the mock plugin `behavior`.
    pub fn module(self, behavior: MockBehavior) -> Self {
        self.module_entry_type(behavior.entry_type())
    }

    /// Add a mock module with a `[config]` table body.
    pub fn module_with_config(self, behavior: MockBehavior, config: &str) -> Self {
        let body = format!(
            "{MODULE_MAGIC}\nentry_type = \"{}\"\n\n[config]\n{config}\n",
            behavior.entry_type()
        );
        let file = self.default_module_file();
        self.raw_module(&file, body.as_bytes())
    }

    /// Add a module file naming an arbitrary entry type.
    pub fn module_entry_type(self, entry_type: &str) -> Self {
        let body = format!("{MODULE_MAGIC}\nentry_type = \"{entry_type}\"\n");
        let file = self.default_module_file();
        self.raw_module(&file, body.as_bytes())
    }

    /// Add a module file with literal bytes.
    pub fn raw_module(mut self, file_name: &str, bytes: &[u8]) -> Self {
        self.modules.push((file_name.to_string(), bytes.to_vec()));
        self
    }

    fn default_module_file(&self) -> String {
        let stem = self
            .dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("plugin");
        format!("{stem}.{MODULE_EXTENSION}")
    }

    /// Write everything to disk and return the plugin directory.
    pub fn write(self) -> PathBuf {
        std::fs::create_dir_all(&self.dir).expect("create plugin directory");
        let manifest = match self.manifest {
            ManifestSource::Fields(fields) => {
                serde_json::to_string_pretty(&Value::Object(fields)).expect("serialize manifest")
            }
            ManifestSource::Raw(raw) => raw,
        };
        std::fs::write(self.dir.join(MANIFEST_FILE_NAME), manifest).expect("write manifest");
        for (file_name, bytes) in &self.modules {
            std::fs::write(self.dir.join(file_name), bytes).expect("write module");
        }
        self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_manifest_and_module() {
        let fixture = PluginFixture::new();
        let dir = fixture
            .plugin("demo")
            .version("2.0.0")
            .capabilities(&["DiagnosticProvider"])
            .module(MockBehavior::Healthy)
            .write();

        let manifest: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("plugin.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["id"], "demo");
        assert_eq!(manifest["version"], "2.0.0");
        assert_eq!(manifest["capabilities"][0], "DiagnosticProvider");

        let module = std::fs::read_to_string(dir.join("demo.lbmod")).unwrap();
        assert!(module.starts_with("LBMOD/1\n"));
        assert!(module.contains(MockBehavior::Healthy.entry_type()));
    }

    #[test]
    fn omit_and_raw_manifest() {
        let fixture = PluginFixture::new();
        let dir = fixture.plugin("partial").omit("version").write();
        let text = std::fs::read_to_string(dir.join("plugin.json")).unwrap();
        assert!(!text.contains("version"));

        let dir = fixture.plugin("raw").raw_manifest("{ broken").write();
        assert_eq!(
            std::fs::read_to_string(dir.join("plugin.json")).unwrap(),
            "{ broken"
        );
    }
}
