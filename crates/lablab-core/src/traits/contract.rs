// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract marker trait and the capability set plugins register into.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// Marks a trait object type as a capability contract.
///
/// Implemented for `dyn Trait` types, e.g. `impl Contract for dyn DiagnosticProvider`.
pub trait Contract: Send + Sync + 'static {
    /// Stable contract name used in reports and snapshots.
    const NAME: &'static str;
}

/// One capability instance handed over by a plugin, with its contract erased.
#[derive(Clone)]
pub struct CapabilityRegistration {
    contract: TypeId,
    contract_name: &'static str,
    address: usize,
    instance: Arc<dyn Any + Send + Sync>,
}

impl CapabilityRegistration {
    /// Wrap a typed instance.
    pub fn new<C: Contract + ?Sized>(instance: Arc<C>) -> Self {
        Self {
            contract: TypeId::of::<C>(),
            contract_name: C::NAME,
            address: instance_address(&instance),
            instance: Arc::new(instance),
        }
    }

    pub fn contract(&self) -> TypeId {
        self.contract
    }

    pub fn contract_name(&self) -> &'static str {
        self.contract_name
    }

    /// Identity of the underlying instance, stable for its lifetime.
    pub fn address(&self) -> usize {
        self.address
    }

    /// Recover the typed instance if `C` is the registered contract.
    pub fn downcast<C: Contract + ?Sized>(&self) -> Option<Arc<C>> {
        self.instance.downcast_ref::<Arc<C>>().cloned()
    }
}

impl std::fmt::Debug for CapabilityRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistration")
            .field("contract", &self.contract_name)
            .field("address", &format_args!("{:#x}", self.address))
            .finish()
    }
}

/// Address of the data behind an `Arc`, with any vtable metadata dropped.
pub fn instance_address<C: ?Sized>(instance: &Arc<C>) -> usize {
    Arc::as_ptr(instance).cast::<()>() as usize
}

/// Collects the capabilities a plugin exposes during registration.
#[derive(Debug, Default)]
pub struct CapabilitySet {
    registrations: Vec<CapabilityRegistration>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `instance` implements contract `C`.
    pub fn register<C: Contract + ?Sized>(&mut self, instance: Arc<C>) {
        self.registrations.push(CapabilityRegistration::new(instance));
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registrations in declaration order.
    pub fn into_registrations(self) -> Vec<CapabilityRegistration> {
        self.registrations
    }
}
