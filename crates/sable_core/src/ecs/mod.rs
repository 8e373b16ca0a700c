//! # Entity Component System
//!
//! Entities are bare handles, components are plain records owned by one
//! system's table, and systems run once per tick in registration order.
//!
//! ## Layout
//!
//! - [`ComponentTable`]: dense per-kind storage with a one-entry lookup cache
//! - [`SystemRegistry`]: owns every system, looked up by name or [`SystemId`]
//! - [`EntityManager`]: entity lifecycle, component ledger and snapshots
//! - [`World`]: owns the two above and drives the update loop

mod component;
mod entity;
mod manager;
mod registry;
mod snapshot;
mod storage;
mod system;
mod world;

pub use component::Component;
pub use entity::{Entity, EntityKind};
pub use manager::EntityManager;
pub use registry::SystemRegistry;
pub use snapshot::SnapshotReport;
pub use storage::ComponentTable;
pub use system::{ComponentSystem, SystemId, TableSystem, UpdateContext};
pub use world::World;
