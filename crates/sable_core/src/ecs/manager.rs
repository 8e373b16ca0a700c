//! # Entity Manager
//!
//! Entity lifecycle across all tables. The manager keeps a ledger of which
//! systems hold data for each entity so it can delete, enumerate and
//! snapshot entities without probing every table. Each table remains the
//! authority for its own records.

use std::collections::BTreeMap;

use tracing::{debug, error, trace};

use super::entity::{Entity, EntityKind};
use super::registry::SystemRegistry;
use super::system::{ComponentSystem, SystemId};
use crate::error::{EcsError, EcsResult};

#[derive(Debug, Clone, Default)]
pub(crate) struct EntityRecord {
    pub(crate) kind: EntityKind,
    pub(crate) systems: Vec<SystemId>,
}

/// Creates and destroys entities and tracks their components.
#[derive(Debug)]
pub struct EntityManager {
    next_entity: u64,
    /// Keyed by handle, so iteration follows creation order.
    pub(crate) ledger: BTreeMap<Entity, EntityRecord>,
    /// Deletes aimed at the system that is running its update.
    deferred: Vec<(SystemId, Entity)>,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityManager {
    /// Creates an empty manager. The first entity will be `1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_entity: 1,
            ledger: BTreeMap::new(),
            deferred: Vec::new(),
        }
    }

    /// Creates a new entity with no components.
    pub fn create_entity(&mut self, kind: EntityKind) -> Entity {
        let entity = Entity::from_raw(self.next_entity);
        self.next_entity += 1;
        self.ledger.insert(
            entity,
            EntityRecord {
                kind,
                systems: Vec::new(),
            },
        );
        trace!(%entity, ?kind, "created entity");
        entity
    }

    /// Registers `entity` with a known id, advancing the id counter past it.
    pub(crate) fn restore_entity(&mut self, entity: Entity, kind: EntityKind) {
        self.ledger.entry(entity).or_default().kind = kind;
        self.next_entity = self.next_entity.max(entity.raw().saturating_add(1));
    }

    /// Deletes `entity` and every component it holds.
    ///
    /// The component held by the system currently running its update is
    /// removed once that update returns.
    ///
    /// Returns false if the entity did not exist.
    pub fn delete_entity(&mut self, entity: Entity, registry: &mut SystemRegistry) -> bool {
        let Some(record) = self.ledger.remove(&entity) else {
            debug!(%entity, "delete of unknown entity");
            return false;
        };
        for id in record.systems {
            self.delete_from(id, entity, registry);
        }
        trace!(%entity, "deleted entity");
        true
    }

    fn delete_from(&mut self, id: SystemId, entity: Entity, registry: &mut SystemRegistry) -> bool {
        if let Some(system) = registry.by_id_mut(id) {
            return system.delete_component(entity);
        }
        if registry.contains(id) {
            trace!(%entity, ?id, "deferring delete until the update returns");
            self.deferred.push((id, entity));
            return true;
        }
        trace!(%entity, ?id, "system no longer registered");
        false
    }

    /// Takes the deletes deferred for the system `id`, minus entities whose
    /// component was attached again afterwards.
    pub(crate) fn take_deferred(&mut self, id: SystemId) -> Vec<Entity> {
        let mut taken = Vec::new();
        self.deferred.retain(|&(held, entity)| {
            if held == id {
                taken.push(entity);
                false
            } else {
                true
            }
        });
        taken.retain(|entity| {
            !self
                .ledger
                .get(entity)
                .is_some_and(|record| record.systems.contains(&id))
        });
        taken
    }

    /// Deletes every entity and clears every table, including the running
    /// system's once its update returns.
    pub fn delete_all_entities(&mut self, registry: &mut SystemRegistry) {
        registry.for_each_mut(|system| system.clear_components());
        let ledger = std::mem::take(&mut self.ledger);
        for (entity, record) in ledger {
            for id in record.systems {
                if registry.by_id(id).is_none() && registry.contains(id) {
                    self.deferred.push((id, entity));
                }
            }
        }
        debug!("deleted all entities");
    }

    /// Attaches a default component from `system` to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if the entity is unknown or already has this component.
    pub fn add_component(
        &mut self,
        entity: Entity,
        system: &mut dyn ComponentSystem,
    ) -> EcsResult<()> {
        if !self.ledger.contains_key(&entity) {
            error!(%entity, system = system.name(), "add component to unknown entity");
            return Err(EcsError::UnknownEntity(entity));
        }
        system.add_component(entity)?;
        self.record_component(entity, system.id())
    }

    /// Attaches a default component from the system called `name`.
    ///
    /// # Errors
    ///
    /// Fails if the system or entity is unknown, or the component exists.
    pub fn add_component_named(
        &mut self,
        entity: Entity,
        name: &str,
        registry: &mut SystemRegistry,
    ) -> EcsResult<()> {
        let system = registry
            .named_mut(name)
            .ok_or_else(|| EcsError::UnknownSystem(name.to_owned()))?;
        self.add_component(entity, system)
    }

    /// Records that the system `id` holds a component for `entity`.
    ///
    /// Used when a system created the record itself.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownEntity`] if the entity does not exist.
    pub fn record_component(&mut self, entity: Entity, id: SystemId) -> EcsResult<()> {
        let record = self
            .ledger
            .get_mut(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        if !record.systems.contains(&id) {
            record.systems.push(id);
        }
        Ok(())
    }

    /// Detaches a single component from `entity`.
    ///
    /// Returns true if a component was removed, or will be once the running
    /// system's update returns.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        id: SystemId,
        registry: &mut SystemRegistry,
    ) -> bool {
        let Some(record) = self.ledger.get_mut(&entity) else {
            return false;
        };
        record.systems.retain(|&held| held != id);
        self.delete_from(id, entity, registry)
    }

    /// All live entities in creation order.
    pub fn all_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.ledger.keys().copied()
    }

    /// Systems holding a component for `entity`, in attach order.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> Option<&[SystemId]> {
        self.ledger.get(&entity).map(|record| record.systems.as_slice())
    }

    /// Returns true if `entity` is alive.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.ledger.contains_key(&entity)
    }

    /// Lifetime class of `entity`.
    #[must_use]
    pub fn kind(&self, entity: Entity) -> Option<EntityKind> {
        self.ledger.get(&entity).map(|record| record.kind)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    /// Returns true if there are no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// The handle the next `create_entity` call will return.
    #[must_use]
    pub fn next_entity(&self) -> Entity {
        Entity::from_raw(self.next_entity)
    }
}
