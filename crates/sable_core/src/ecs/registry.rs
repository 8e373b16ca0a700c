//! # System Registry
//!
//! Owns every system and maps names and ids to them. Registration order is
//! the update order.

use std::collections::HashMap;

use tracing::{debug, error, info};

use super::system::{ComponentSystem, SystemId, TableSystem};
use crate::error::{EcsError, EcsResult};

struct Slot {
    id: SystemId,
    name: &'static str,
    /// `None` while the system is running its update.
    system: Option<Box<dyn ComponentSystem>>,
}

/// Catalogue of registered systems.
#[derive(Default)]
pub struct SystemRegistry {
    slots: Vec<Slot>,
    index: HashMap<SystemId, usize>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system, appending it to the update order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register<S: ComponentSystem>(&mut self, system: S) -> EcsResult<SystemId> {
        self.register_boxed(Box::new(system))
    }

    /// Registers an already boxed system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register_boxed(&mut self, system: Box<dyn ComponentSystem>) -> EcsResult<SystemId> {
        let id = system.id();
        let name = system.name();
        if self.index.contains_key(&id) {
            error!(system = name, "system is already registered");
            return Err(EcsError::DuplicateSystem(name));
        }
        self.index.insert(id, self.slots.len());
        self.slots.push(Slot {
            id,
            name,
            system: Some(system),
        });
        info!(system = name, "registered system");
        Ok(id)
    }

    /// Removes a system, returning it.
    ///
    /// Returns `None` if no such system is registered or it is currently
    /// running its update.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn ComponentSystem>> {
        let slot = *self.index.get(&SystemId::of(name))?;
        if self.slots[slot].system.is_none() {
            error!(system = name, "cannot unregister a running system");
            return None;
        }
        let removed = self.slots.remove(slot);
        self.index.clear();
        for (i, slot) in self.slots.iter().enumerate() {
            self.index.insert(slot.id, i);
        }
        info!(system = name, "unregistered system");
        removed.system
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true if a system with this id is registered.
    #[must_use]
    pub fn contains(&self, id: SystemId) -> bool {
        self.index.contains_key(&id)
    }

    /// System names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|slot| slot.name)
    }

    /// System ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.slots.iter().map(|slot| slot.id)
    }

    /// Resolves an id back to its registered name.
    #[must_use]
    pub fn name_of(&self, id: SystemId) -> Option<&'static str> {
        self.index.get(&id).map(|&slot| self.slots[slot].name)
    }

    /// Looks up a system by id.
    #[must_use]
    pub fn by_id(&self, id: SystemId) -> Option<&dyn ComponentSystem> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].system.as_deref()
    }

    /// Looks up a system by id, mutably.
    pub fn by_id_mut(&mut self, id: SystemId) -> Option<&mut (dyn ComponentSystem + 'static)> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].system.as_deref_mut()
    }

    /// Looks up a system by name. Unknown names are logged.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&dyn ComponentSystem> {
        let found = self.by_id(SystemId::of(name));
        if found.is_none() {
            error!(system = name, "system does not exist");
        }
        found
    }

    /// Looks up a system by name, mutably. Unknown names are logged.
    pub fn named_mut(&mut self, name: &str) -> Option<&mut (dyn ComponentSystem + 'static)> {
        if !self.index.contains_key(&SystemId::of(name)) {
            error!(system = name, "system does not exist");
            return None;
        }
        self.by_id_mut(SystemId::of(name))
    }

    /// Looks up a system by name without logging a miss.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut (dyn ComponentSystem + 'static)> {
        self.by_id_mut(SystemId::of(name))
    }

    /// Typed access to a registered system.
    #[must_use]
    pub fn get<S: TableSystem>(&self) -> Option<&S> {
        self.by_id(S::ID)?.as_any().downcast_ref::<S>()
    }

    /// Typed mutable access to a registered system.
    pub fn get_mut<S: TableSystem>(&mut self) -> Option<&mut S> {
        self.by_id_mut(S::ID)?.as_any_mut().downcast_mut::<S>()
    }

    /// Typed access that reports a missing system as an error.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn expect_mut<S: TableSystem>(&mut self) -> EcsResult<&mut S> {
        self.get_mut::<S>()
            .ok_or_else(|| EcsError::UnknownSystem(S::NAME.to_owned()))
    }

    /// Takes the system `id` out for its update pass.
    pub(crate) fn take(&mut self, id: SystemId) -> Option<Box<dyn ComponentSystem>> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].system.take()
    }

    /// Puts a system back after its update pass, wherever its slot moved.
    ///
    /// Returns the system if its slot no longer exists.
    pub(crate) fn restore(
        &mut self,
        system: Box<dyn ComponentSystem>,
    ) -> Option<Box<dyn ComponentSystem>> {
        match self.index.get(&system.id()) {
            Some(&slot) if self.slots[slot].system.is_none() => {
                self.slots[slot].system = Some(system);
                None
            }
            _ => {
                debug!(system = system.name(), "no empty slot for returning system");
                Some(system)
            }
        }
    }

    /// Calls `f` on every system not currently running.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut dyn ComponentSystem)) {
        for slot in &mut self.slots {
            if let Some(system) = slot.system.as_deref_mut() {
                f(system);
            }
        }
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
