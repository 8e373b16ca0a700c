//! # Core Error Types
//!
//! All errors that can occur in the entity/component core.

use thiserror::Error;

use crate::ecs::{Entity, SystemId};

/// Errors that can occur in the entity/component core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Tried to add a component to an entity that already has one.
    #[error("entity {entity} already has a '{system}' component")]
    AlreadyAttached {
        /// The entity.
        entity: Entity,
        /// The system owning the component kind.
        system: &'static str,
    },

    /// Tried to fetch a component that was never added.
    #[error("entity {entity} has no '{system}' component")]
    MissingComponent {
        /// The entity.
        entity: Entity,
        /// The system owning the component kind.
        system: &'static str,
    },

    /// A serialized component did not match the live record size.
    ///
    /// The component is still restored best-effort when this is reported.
    #[error("size mismatch for '{system}' on entity {entity}: got {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// The entity that was restored.
        entity: Entity,
        /// The system owning the component kind.
        system: &'static str,
        /// Expected encoded size.
        expected: usize,
        /// Size of the received blob.
        actual: usize,
    },

    /// No system is registered under this name.
    #[error("system with name '{0}' does not exist")]
    UnknownSystem(String),

    /// No system is registered under this id.
    #[error("system with id {0:?} does not exist")]
    UnknownSystemId(SystemId),

    /// A system with the same name is already registered.
    #[error("system '{0}' is already registered")]
    DuplicateSystem(&'static str),

    /// The entity is not known to the entity manager.
    #[error("entity {0} does not exist")]
    UnknownEntity(Entity),

    /// A snapshot ended before all declared data was read.
    #[error("truncated snapshot at byte {offset}: {context}")]
    Truncated {
        /// Byte offset where decoding stopped.
        offset: usize,
        /// What was being read.
        context: &'static str,
    },
}

/// Result type for core operations.
pub type EcsResult<T> = Result<T, EcsError>;
