//! Built-in systems shared by every game.

pub mod transform;

pub use transform::{Anchor, TransformComponent, TransformSystem};
