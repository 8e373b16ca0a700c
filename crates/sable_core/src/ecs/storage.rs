//! # Component Storage
//!
//! Dense component storage keyed by entity.
//!
//! The table uses a sparse-index/dense-array strategy:
//! - Values and their owning entities live in two parallel contiguous columns
//! - A hash index maps an entity to its slot
//! - Deletion swaps the last slot into the hole, keeping the columns packed
//! - Iteration walks the dense columns only
//!
//! A one-entry lookup cache remembers the last `(entity, slot)` pair. Update
//! passes tend to query the same entity several times in a row, so this skips
//! the hash probe. Every delete and clear invalidates it.

use std::cell::Cell;
use std::collections::HashMap;

use tracing::error;

use super::component::Component;
use super::entity::Entity;
use crate::codec::ByteReader;
use crate::error::{EcsError, EcsResult};

/// Dense storage for every instance of one component kind.
///
/// # Example
///
/// ```rust,ignore
/// let mut table: ComponentTable<Health> = ComponentTable::new("health");
/// table.add(entity)?.current = 10.0;
/// assert_eq!(table.get(entity)?.current, 10.0);
/// ```
pub struct ComponentTable<T: Component> {
    /// Name of the owning system, used in error reports.
    system: &'static str,
    values: Vec<T>,
    owners: Vec<Entity>,
    index: HashMap<Entity, usize>,
    last_lookup: Cell<Option<(Entity, usize)>>,
}

impl<T: Component> ComponentTable<T> {
    /// Creates an empty table owned by `system`.
    #[must_use]
    pub fn new(system: &'static str) -> Self {
        Self::with_capacity(system, 0)
    }

    /// Creates an empty table with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(system: &'static str, capacity: usize) -> Self {
        Self {
            system,
            values: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            last_lookup: Cell::new(None),
        }
    }

    /// Returns the owning system's name.
    #[inline]
    #[must_use]
    pub const fn system(&self) -> &'static str {
        self.system
    }

    /// Returns the number of stored records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the table holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if `entity` has a record in this table.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    fn slot(&self, entity: Entity) -> Option<usize> {
        if let Some((cached, slot)) = self.last_lookup.get() {
            if cached == entity {
                return Some(slot);
            }
        }
        let slot = *self.index.get(&entity)?;
        self.last_lookup.set(Some((entity, slot)));
        Some(slot)
    }

    fn missing(&self, entity: Entity) -> EcsError {
        error!(system = self.system, %entity, "component does not exist");
        EcsError::MissingComponent {
            entity,
            system: self.system,
        }
    }

    /// Attaches a default-constructed record to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyAttached`] if the entity already has one.
    pub fn add(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.insert(entity, T::default())
    }

    /// Attaches a caller-built record to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyAttached`] if the entity already has one.
    pub fn insert(&mut self, entity: Entity, value: T) -> EcsResult<&mut T> {
        if self.index.contains_key(&entity) {
            error!(system = self.system, %entity, "component already exists");
            return Err(EcsError::AlreadyAttached {
                entity,
                system: self.system,
            });
        }
        Ok(self.push(entity, value))
    }

    fn push(&mut self, entity: Entity, value: T) -> &mut T {
        let slot = self.values.len();
        self.values.push(value);
        self.owners.push(entity);
        self.index.insert(entity, slot);
        &mut self.values[slot]
    }

    /// Stores `value` for `entity`, replacing any existing record.
    pub fn put(&mut self, entity: Entity, value: T) -> &mut T {
        match self.slot(entity) {
            Some(slot) => {
                self.values[slot] = value;
                &mut self.values[slot]
            }
            None => self.push(entity, value),
        }
    }

    /// Fetches the record for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if none exists.
    pub fn get(&self, entity: Entity) -> EcsResult<&T> {
        match self.slot(entity) {
            Some(slot) => Ok(&self.values[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Fetches the record for `entity` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if none exists.
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        match self.slot(entity) {
            Some(slot) => Ok(&mut self.values[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Fetches the record for `entity` without logging a miss.
    #[inline]
    #[must_use]
    pub fn try_get(&self, entity: Entity) -> Option<&T> {
        self.slot(entity).map(|slot| &self.values[slot])
    }

    /// Detaches and returns the record for `entity`. No-op when absent.
    pub fn delete(&mut self, entity: Entity) -> Option<T> {
        self.last_lookup.set(None);
        let slot = self.index.remove(&entity)?;
        let value = self.values.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(&moved) = self.owners.get(slot) {
            self.index.insert(moved, slot);
        }
        Some(value)
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.last_lookup.set(None);
        self.values.clear();
        self.owners.clear();
        self.index.clear();
    }

    /// Entities holding a record, in storage order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Iterates `(entity, record)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.owners.iter().copied().zip(self.values.iter())
    }

    /// Iterates `(entity, record)` pairs mutably in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.owners.iter().copied().zip(self.values.iter_mut())
    }

    /// Encodes the record for `entity` into a fixed-size blob.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if none exists.
    pub fn serialize(&self, entity: Entity) -> EcsResult<Vec<u8>> {
        self.get(entity).map(|value| value.to_bytes())
    }

    /// Rebuilds the record for `entity` from `blob` and stores it.
    ///
    /// The record is always stored. Missing trailing fields keep their
    /// defaults and surplus bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SizeMismatch`] after storing if `blob` is not
    /// exactly `T::ENCODED_SIZE` bytes.
    pub fn deserialize(&mut self, entity: Entity, blob: &[u8]) -> EcsResult<&mut T> {
        let value = T::decode(&mut ByteReader::new(blob));
        self.put(entity, value);
        if blob.len() != T::ENCODED_SIZE {
            return Err(EcsError::SizeMismatch {
                entity,
                system: self.system,
                expected: T::ENCODED_SIZE,
                actual: blob.len(),
            });
        }
        self.get_mut(entity)
    }
}

impl<T: Component> std::fmt::Debug for ComponentTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTable")
            .field("system", &self.system)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
