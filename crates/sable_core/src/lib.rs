//! # Sable Core
//!
//! Entity/component core of the Sable 2D engine:
//! - Typed, dense component tables keyed by opaque entity handles
//! - A registry of systems reachable by name for snapshots and replication
//! - Whole-world snapshot save/restore with a fixed little-endian layout
//!
//! ## Architecture Rules
//!
//! 1. **Systems own their tables** - nothing else stores component records
//! 2. **One thread** - every system runs sequentially on the simulation thread
//! 3. **Explicit layouts** - persistence goes through declared field lists,
//!    never memory images
//!
//! ## Example
//!
//! ```rust,ignore
//! use sable_core::{EntityKind, TransformSystem, World};
//!
//! let mut world = World::new();
//! world.register(TransformSystem::new())?;
//! let e = world.create_entity(EntityKind::Persistent);
//! world.add_component::<TransformSystem>(e)?;
//! world.tick(0.016);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod ecs;
pub mod error;
pub mod math;
pub mod systems;

pub use codec::{ByteReader, ByteWriter, FieldCodec};
pub use ecs::{
    Component, ComponentSystem, ComponentTable, Entity, EntityKind, EntityManager,
    SnapshotReport, SystemId, SystemRegistry, TableSystem, UpdateContext, World,
};
pub use error::{EcsError, EcsResult};
pub use math::{Color, Vec2};
pub use systems::{Anchor, TransformComponent, TransformSystem};
