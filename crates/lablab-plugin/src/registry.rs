// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability registry indexed by contract.
//!
//! Registration happens on a [`CapabilityRegistryBuilder`] while plugins load.
//! [`CapabilityRegistryBuilder::publish`] consumes the builder and returns an
//! immutable [`CapabilityRegistry`] that readers share through an `Arc`, so
//! no read can observe a partially populated registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use lablab_core::traits::contract::instance_address;
use lablab_core::{CapabilityRegistration, Contract};
use tracing::debug;

/// Where an instance came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Plugin(String),
    Host,
}

#[derive(Debug, Clone)]
struct Entry {
    registration: CapabilityRegistration,
    origin: Origin,
}

/// Mutable registration phase of the registry.
#[derive(Debug, Default)]
pub struct CapabilityRegistryBuilder {
    entries: Vec<Entry>,
}

impl CapabilityRegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under contract `C`, owned by `plugin_id`.
    pub fn register<C: Contract + ?Sized>(&mut self, instance: Arc<C>, plugin_id: &str) {
        self.register_erased(
            CapabilityRegistration::new(instance),
            Some(plugin_id.to_string()),
        );
    }

    /// Register an instance supplied by the host rather than a plugin.
    ///
    /// Host instances are probed like any other but are never attributed.
    pub fn register_host<C: Contract + ?Sized>(&mut self, instance: Arc<C>) {
        self.register_erased(CapabilityRegistration::new(instance), None);
    }

    /// Register an already type-erased instance. `None` marks a host instance.
    pub fn register_erased(&mut self, registration: CapabilityRegistration, owner: Option<String>) {
        let origin = owner.map_or(Origin::Host, Origin::Plugin);
        self.entries.push(Entry {
            registration,
            origin,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close registration and freeze the registry.
    pub fn publish(self) -> Arc<CapabilityRegistry> {
        let mut by_contract: HashMap<TypeId, Vec<usize>> = HashMap::new();
        let mut contract_order: Vec<(TypeId, &'static str)> = Vec::new();
        let mut origins: HashMap<usize, Vec<Origin>> = HashMap::new();

        for (index, entry) in self.entries.iter().enumerate() {
            let contract = entry.registration.contract();
            let slots = by_contract.entry(contract).or_default();
            if slots.is_empty() {
                contract_order.push((contract, entry.registration.contract_name()));
            }
            slots.push(index);

            let seen = origins.entry(entry.registration.address()).or_default();
            if !seen.contains(&entry.origin) {
                seen.push(entry.origin.clone());
            }
        }

        let owners = origins
            .into_iter()
            .filter_map(|(address, seen)| match seen.as_slice() {
                [Origin::Plugin(id)] => Some((address, id.clone())),
                [Origin::Host] => None,
                _ => {
                    debug!(
                        address = format_args!("{address:#x}"),
                        origins = seen.len(),
                        "capability instance registered by several owners, leaving unattributed"
                    );
                    None
                }
            })
            .collect();

        Arc::new(CapabilityRegistry {
            entries: self.entries,
            by_contract,
            contract_order,
            owners,
        })
    }
}

/// A contract together with how many instances were registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSummary {
    pub name: &'static str,
    pub instances: usize,
}

/// Published, read-only capability registry.
#[derive(Debug)]
pub struct CapabilityRegistry {
    entries: Vec<Entry>,
    by_contract: HashMap<TypeId, Vec<usize>>,
    contract_order: Vec<(TypeId, &'static str)>,
    owners: HashMap<usize, String>,
}

impl CapabilityRegistry {
    /// A published registry with nothing in it.
    pub fn empty() -> Arc<Self> {
        CapabilityRegistryBuilder::new().publish()
    }

    /// All instances of contract `C`, in registration order.
    pub fn get_all<C: Contract + ?Sized>(&self) -> Vec<Arc<C>> {
        self.slots::<C>()
            .filter_map(|entry| entry.registration.downcast::<C>())
            .collect()
    }

    /// All instances of contract `C` paired with their owning plugin id.
    pub fn attributed<C: Contract + ?Sized>(&self) -> Vec<(Arc<C>, Option<String>)> {
        self.slots::<C>()
            .filter_map(|entry| {
                let instance = entry.registration.downcast::<C>()?;
                let owner = self.owners.get(&entry.registration.address()).cloned();
                Some((instance, owner))
            })
            .collect()
    }

    /// Plugin that registered `instance`.
    ///
    /// `None` for host instances, for instances registered by more than one
    /// plugin, and for instances this registry has never seen.
    pub fn owner_of<C: ?Sized>(&self, instance: &Arc<C>) -> Option<&str> {
        self.owners
            .get(&instance_address(instance))
            .map(String::as_str)
    }

    /// Registered contracts in first-registration order.
    pub fn contracts(&self) -> Vec<ContractSummary> {
        self.contract_order
            .iter()
            .map(|&(type_id, name)| ContractSummary {
                name,
                instances: self.by_contract.get(&type_id).map_or(0, Vec::len),
            })
            .collect()
    }

    /// Total number of registrations across all contracts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slots<C: Contract + ?Sized>(&self) -> impl Iterator<Item = &Entry> {
        self.by_contract
            .get(&TypeId::of::<C>())
            .into_iter()
            .flatten()
            .map(|&index| &self.entries[index])
    }
}
