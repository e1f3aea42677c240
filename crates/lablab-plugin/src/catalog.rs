// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog of compiled-in plugin factories.
//!
//! Module files name an entry type. The catalog maps entry types to the
//! factories able to construct them.

use std::collections::BTreeMap;
use std::sync::Arc;

use lablab_core::PluginFactory;
use tracing::warn;

use crate::builtin::ProcessDiagnosticsFactory;

/// Entry type -> factory lookup.
#[derive(Default, Clone)]
pub struct PluginCatalog {
    factories: BTreeMap<String, Arc<dyn PluginFactory>>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory. A later factory for the same entry type replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn PluginFactory>) {
        let entry_type = factory.entry_type().to_string();
        if self.factories.insert(entry_type.clone(), factory).is_some() {
            warn!(entry_type = %entry_type, "replacing existing plugin factory");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn get(&self, entry_type: &str) -> Option<&Arc<dyn PluginFactory>> {
        self.factories.get(entry_type)
    }

    /// Known entry types, sorted.
    pub fn entry_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("entry_types", &self.entry_types())
            .finish()
    }
}

/// Catalog of the factories compiled into the host binary.
pub fn builtin_catalog() -> PluginCatalog {
    PluginCatalog::new().with(Arc::new(ProcessDiagnosticsFactory))
}
