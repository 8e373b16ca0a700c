//! # Systems
//!
//! A system owns exactly one component table and runs one update pass per
//! tick. Systems are stored type-erased in the [`SystemRegistry`] so the
//! entity manager, snapshots and network replication can reach any table by
//! name without knowing its record type.
//!
//! Concrete systems implement [`TableSystem`]; the blanket implementation
//! provides every type-erased [`ComponentSystem`] operation on top of the
//! system's table.
//!
//! [`SystemRegistry`]: super::SystemRegistry

use std::any::Any;
use std::fmt;

use super::component::Component;
use super::entity::Entity;
use super::manager::EntityManager;
use super::registry::SystemRegistry;
use super::storage::ComponentTable;
use crate::error::EcsResult;

/// Stable identifier of a system: the 64-bit FNV-1a hash of its name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(u64);

impl SystemId {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Hashes a system name.
    #[must_use]
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Returns the raw hash.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({:#018x})", self.0)
    }
}

/// Everything an update pass may touch besides its own table.
///
/// The running system has been taken out of `registry` for the duration of
/// its update, so looking itself up returns `None`.
pub struct UpdateContext<'a> {
    /// Every other registered system.
    pub registry: &'a mut SystemRegistry,
    /// Entity lifecycle and component ledger.
    pub entities: &'a mut EntityManager,
}

/// Type-erased system interface.
///
/// Object safe; the registry stores `Box<dyn ComponentSystem>`.
pub trait ComponentSystem: Any + Send {
    /// Unique system name.
    fn name(&self) -> &'static str;

    /// Hash of [`name`](Self::name).
    fn id(&self) -> SystemId;

    /// Runs one update pass.
    fn update(&mut self, dt: f32, ctx: &mut UpdateContext<'_>);

    /// Attaches a default record to `entity`.
    ///
    /// # Errors
    ///
    /// Fails if the entity already has one.
    fn add_component(&mut self, entity: Entity) -> EcsResult<()>;

    /// Detaches the record for `entity`. Returns false if there was none.
    fn delete_component(&mut self, entity: Entity) -> bool;

    /// Returns true if `entity` has a record.
    fn has_component(&self, entity: Entity) -> bool;

    /// Removes every record.
    fn clear_components(&mut self);

    /// Number of stored records.
    fn component_count(&self) -> usize;

    /// Size of one encoded record.
    fn encoded_size(&self) -> usize;

    /// Encodes the record for `entity`.
    ///
    /// # Errors
    ///
    /// Fails if the entity has no record.
    fn serialize_component(&self, entity: Entity) -> EcsResult<Vec<u8>>;

    /// Rebuilds and stores the record for `entity`.
    ///
    /// # Errors
    ///
    /// Reports a size mismatch after storing the best-effort record.
    fn deserialize_component(&mut self, entity: Entity, blob: &[u8]) -> EcsResult<()>;

    /// Encodes state kept outside the table, or `None` if there is none.
    fn save_state(&self) -> Option<Vec<u8>>;

    /// Restores state written by [`save_state`](Self::save_state).
    ///
    /// # Errors
    ///
    /// Fails on a malformed blob.
    fn restore_state(&mut self, blob: &[u8]) -> EcsResult<()>;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A system backed by a single [`ComponentTable`].
pub trait TableSystem: Send + 'static {
    /// Record type stored by this system.
    type Component: Component;

    /// Unique system name; also the key written into snapshots.
    const NAME: &'static str;

    /// Precomputed name hash.
    const ID: SystemId = SystemId::of(Self::NAME);

    /// The system's table.
    fn table(&self) -> &ComponentTable<Self::Component>;

    /// The system's table, mutably.
    fn table_mut(&mut self) -> &mut ComponentTable<Self::Component>;

    /// Runs one update pass.
    fn update(&mut self, dt: f32, ctx: &mut UpdateContext<'_>);

    /// Internal state saved next to the entity snapshot. None by default.
    fn save_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restores a blob written by [`save_state`](Self::save_state).
    ///
    /// # Errors
    ///
    /// Fails on a malformed blob.
    fn restore_state(&mut self, _blob: &[u8]) -> EcsResult<()> {
        Ok(())
    }
}

impl<S: TableSystem> ComponentSystem for S {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn id(&self) -> SystemId {
        S::ID
    }

    fn update(&mut self, dt: f32, ctx: &mut UpdateContext<'_>) {
        <S as TableSystem>::update(self, dt, ctx);
    }

    fn add_component(&mut self, entity: Entity) -> EcsResult<()> {
        self.table_mut().add(entity).map(|_| ())
    }

    fn delete_component(&mut self, entity: Entity) -> bool {
        self.table_mut().delete(entity).is_some()
    }

    fn has_component(&self, entity: Entity) -> bool {
        self.table().contains(entity)
    }

    fn clear_components(&mut self) {
        self.table_mut().clear();
    }

    fn component_count(&self) -> usize {
        self.table().len()
    }

    fn encoded_size(&self) -> usize {
        S::Component::ENCODED_SIZE
    }

    fn serialize_component(&self, entity: Entity) -> EcsResult<Vec<u8>> {
        self.table().serialize(entity)
    }

    fn deserialize_component(&mut self, entity: Entity, blob: &[u8]) -> EcsResult<()> {
        self.table_mut().deserialize(entity, blob).map(|_| ())
    }

    fn save_state(&self) -> Option<Vec<u8>> {
        <S as TableSystem>::save_state(self)
    }

    fn restore_state(&mut self, blob: &[u8]) -> EcsResult<()> {
        <S as TableSystem>::restore_state(self, blob)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(SystemId::of("").raw(), 0xcbf2_9ce4_8422_2325);
        assert_eq!(SystemId::of("a").raw(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_id_is_const() {
        const TRANSFORM: SystemId = SystemId::of("transform");
        assert_eq!(TRANSFORM, SystemId::of("transform"));
        assert_ne!(TRANSFORM, SystemId::of("rendering"));
    }
}
