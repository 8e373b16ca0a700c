//! # ECS World
//!
//! The central container for all systems and entities.
//!
//! The world owns the [`SystemRegistry`] and the [`EntityManager`] and runs
//! every system once per tick, in registration order, on the calling thread.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use super::entity::{Entity, EntityKind};
use super::manager::EntityManager;
use super::registry::SystemRegistry;
use super::snapshot::SnapshotReport;
use super::system::{ComponentSystem, SystemId, TableSystem, UpdateContext};
use crate::error::{EcsError, EcsResult};

/// The ECS World - container for all game state.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new();
/// world.register(TransformSystem::new())?;
///
/// let entity = world.create_entity(EntityKind::Persistent);
/// world.add_component::<TransformSystem>(entity)?.position = Vec2::new(3.0, 4.0);
/// world.tick(0.016);
/// ```
#[derive(Debug, Default)]
pub struct World {
    registry: SystemRegistry,
    entities: EntityManager,
    update_times: HashMap<SystemId, Duration>,
    ticks: u64,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system at the end of the update order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register<S: ComponentSystem>(&mut self, system: S) -> EcsResult<SystemId> {
        self.registry.register(system)
    }

    /// Removes a system. Entities keep their ledger entries for it.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn ComponentSystem>> {
        self.update_times.remove(&SystemId::of(name));
        self.registry.unregister(name)
    }

    /// Runs every system once, in registration order.
    ///
    /// Systems unregistered during the pass are skipped. Entities deleted
    /// by a system during its own update lose that component once the
    /// update returns.
    pub fn tick(&mut self, dt: f32) {
        let order: Vec<SystemId> = self.registry.ids().collect();
        for id in order {
            let Some(mut system) = self.registry.take(id) else {
                trace!(?id, "system left the registry during tick");
                continue;
            };
            let start = Instant::now();
            {
                let mut ctx = UpdateContext {
                    registry: &mut self.registry,
                    entities: &mut self.entities,
                };
                system.update(dt, &mut ctx);
            }
            let elapsed = start.elapsed();
            for entity in self.entities.take_deferred(id) {
                system.delete_component(entity);
            }
            trace!(system = system.name(), ?elapsed, "system updated");
            self.update_times.insert(id, elapsed);
            if let Some(orphan) = self.registry.restore(system) {
                warn!(system = orphan.name(), "dropping system with no slot");
            }
        }
        self.ticks += 1;
    }

    /// Number of completed ticks.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Wall time the named system spent in its last update.
    #[must_use]
    pub fn last_update_time(&self, name: &str) -> Option<Duration> {
        self.update_times.get(&SystemId::of(name)).copied()
    }

    /// Creates a new entity.
    pub fn create_entity(&mut self, kind: EntityKind) -> Entity {
        self.entities.create_entity(kind)
    }

    /// Deletes an entity and all its components.
    pub fn delete_entity(&mut self, entity: Entity) -> bool {
        self.entities.delete_entity(entity, &mut self.registry)
    }

    /// Deletes every entity.
    pub fn delete_all_entities(&mut self) {
        self.entities.delete_all_entities(&mut self.registry);
    }

    /// Attaches a default `S` component to `entity` and returns it.
    ///
    /// # Errors
    ///
    /// Fails if `S` is not registered, the entity is unknown, or the entity
    /// already has the component.
    pub fn add_component<S: TableSystem>(&mut self, entity: Entity) -> EcsResult<&mut S::Component> {
        let system = self.registry.expect_mut::<S>()?;
        self.entities.add_component(entity, &mut *system)?;
        system.table_mut().get_mut(entity)
    }

    /// Attaches a default component from the system called `name`.
    ///
    /// # Errors
    ///
    /// Fails if the system or entity is unknown or the component exists.
    pub fn add_component_named(&mut self, entity: Entity, name: &str) -> EcsResult<()> {
        self.entities
            .add_component_named(entity, name, &mut self.registry)
    }

    /// Fetches the `S` component of `entity`.
    ///
    /// # Errors
    ///
    /// Fails if `S` is not registered or the entity has no such component.
    pub fn component<S: TableSystem>(&self, entity: Entity) -> EcsResult<&S::Component> {
        self.registry
            .get::<S>()
            .ok_or_else(|| EcsError::UnknownSystem(S::NAME.to_owned()))?
            .table()
            .get(entity)
    }

    /// Fetches the `S` component of `entity` mutably.
    ///
    /// # Errors
    ///
    /// Fails if `S` is not registered or the entity has no such component.
    pub fn component_mut<S: TableSystem>(&mut self, entity: Entity) -> EcsResult<&mut S::Component> {
        self.registry.expect_mut::<S>()?.table_mut().get_mut(entity)
    }

    /// Typed access to a registered system.
    #[must_use]
    pub fn system<S: TableSystem>(&self) -> Option<&S> {
        self.registry.get::<S>()
    }

    /// Typed mutable access to a registered system.
    pub fn system_mut<S: TableSystem>(&mut self) -> Option<&mut S> {
        self.registry.get_mut::<S>()
    }

    /// The system registry.
    #[must_use]
    pub const fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    /// The entity manager.
    #[must_use]
    pub const fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Both halves mutably, for operations that need the two together.
    pub fn split_mut(&mut self) -> (&mut SystemRegistry, &mut EntityManager) {
        (&mut self.registry, &mut self.entities)
    }

    /// Snapshots every persistent entity.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        self.entities.serialize(&self.registry)
    }

    /// Restores a snapshot produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Truncated`] on malformed input.
    pub fn deserialize(&mut self, bytes: &[u8]) -> EcsResult<SnapshotReport> {
        self.entities.deserialize(&mut self.registry, bytes)
    }

    /// Saves the internal state of every system, such as cameras.
    #[must_use]
    pub fn serialize_system_states(&self) -> Vec<u8> {
        self.registry.serialize_states()
    }

    /// Restores states produced by
    /// [`serialize_system_states`](Self::serialize_system_states).
    ///
    /// # Errors
    ///
    /// Fails on malformed input.
    pub fn deserialize_system_states(&mut self, bytes: &[u8]) -> EcsResult<usize> {
        self.registry.deserialize_states(bytes)
    }
}
