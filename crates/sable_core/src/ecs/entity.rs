//! # Entity Handles
//!
//! Entities are opaque identifiers. They carry no data of their own: what an
//! entity *is* comes entirely from which component tables hold a record for it.
//!
//! Handles are assigned monotonically by the entity manager and are never
//! reused, so a stale handle can never alias a newer entity.

use std::fmt;

/// Unique identifier for an entity.
///
/// `0` is reserved as the null handle; the first live entity is `1`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(0);

    /// Creates an entity handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this handle.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity handle is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifetime class of an entity.
///
/// Only persistent entities are written to world snapshots; volatile ones
/// (effects, network mirrors, debug helpers) are rebuilt at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Runtime-only entity, skipped by snapshots.
    #[default]
    Volatile,
    /// Entity saved and restored with the world.
    Persistent,
}
