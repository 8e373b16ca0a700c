//! # Transform System
//!
//! Local placement of every entity and its resolved world placement.
//!
//! An entity with a null parent is an orphan: its world placement is its
//! local placement. A child's world position is its local position rotated
//! by the parent's world rotation and offset by the parent's world position.
//! Rotations add up along the chain and children inherit their root's depth.

use tracing::warn;

use crate::ecs::{ComponentTable, Entity, TableSystem, UpdateContext};
use crate::math::Vec2;

/// Longest parent chain followed before assuming a cycle.
const MAX_PARENT_DEPTH: usize = 64;

/// Placement of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Local position (center).
    pub position: Vec2,
    /// Full width and height.
    pub size: Vec2,
    /// Local rotation in radians, counter-clockwise.
    pub rotation: f32,
    /// Depth. Higher values are drawn in front.
    pub z: f32,
    /// Parent entity, or [`Entity::NULL`].
    pub parent: Entity,

    /// Resolved world position.
    pub world_position: Vec2,
    /// Resolved world rotation.
    pub world_rotation: f32,
    /// Resolved depth.
    pub world_z: f32,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::ONE,
            rotation: 0.0,
            z: 0.0,
            parent: Entity::NULL,
            world_position: Vec2::ZERO,
            world_rotation: 0.0,
            world_z: 0.0,
        }
    }
}

crate::component_fields!(TransformComponent {
    position: Vec2,
    size: Vec2,
    rotation: f32,
    z: f32,
    parent: Entity,
});

/// Reference point used when placing an entity by one of its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Top left corner.
    NorthWest,
    /// Top edge center.
    North,
    /// Top right corner.
    NorthEast,
    /// Left edge center.
    West,
    /// Center.
    Center,
    /// Right edge center.
    East,
    /// Bottom left corner.
    SouthWest,
    /// Bottom edge center.
    South,
    /// Bottom right corner.
    SouthEast,
}

impl TransformComponent {
    /// Places the entity so that its `anchor` point sits at `point`.
    pub fn set_position_anchored(&mut self, point: Vec2, anchor: Anchor) {
        let half = self.size * 0.5;
        self.position.x = match anchor {
            Anchor::NorthWest | Anchor::West | Anchor::SouthWest => point.x + half.x,
            Anchor::North | Anchor::Center | Anchor::South => point.x,
            Anchor::NorthEast | Anchor::East | Anchor::SouthEast => point.x - half.x,
        };
        self.position.y = match anchor {
            Anchor::NorthWest | Anchor::North | Anchor::NorthEast => point.y - half.y,
            Anchor::West | Anchor::Center | Anchor::East => point.y,
            Anchor::SouthWest | Anchor::South | Anchor::SouthEast => point.y + half.y,
        };
    }
}

/// Resolves world placement for every transform.
#[derive(Debug)]
pub struct TransformSystem {
    table: ComponentTable<TransformComponent>,
}

impl Default for TransformSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformSystem {
    /// Creates an empty system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: ComponentTable::new(Self::NAME),
        }
    }

    /// World placement of `entity` computed from local placements only.
    fn resolve(&self, entity: Entity) -> Option<(Vec2, f32, f32)> {
        let mut chain = Vec::new();
        let mut current = entity;
        loop {
            let tc = self.table.try_get(current)?;
            chain.push(tc);
            if tc.parent.is_null() {
                break;
            }
            if chain.len() > MAX_PARENT_DEPTH {
                warn!(%entity, "parent chain too deep or cyclic");
                return None;
            }
            current = tc.parent;
        }

        let root = chain.pop()?;
        let mut position = root.position;
        let mut rotation = root.rotation;
        let z = root.z;
        while let Some(tc) = chain.pop() {
            position += tc.position.rotate(rotation);
            rotation += tc.rotation;
        }
        Some((position, rotation, z))
    }
}

impl TableSystem for TransformSystem {
    type Component = TransformComponent;
    const NAME: &'static str = "Transformation";

    fn table(&self) -> &ComponentTable<TransformComponent> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<TransformComponent> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, _ctx: &mut UpdateContext<'_>) {
        let mut resolved = Vec::with_capacity(self.table.len());
        for (entity, tc) in self.table.iter() {
            if tc.parent.is_null() {
                resolved.push((entity, Some((tc.position, tc.rotation, tc.z))));
            } else {
                resolved.push((entity, self.resolve(entity)));
            }
        }

        for (entity, placement) in resolved {
            let Some((position, rotation, z)) = placement else {
                continue;
            };
            if let Ok(tc) = self.table.get_mut(entity) {
                tc.world_position = position;
                tc.world_rotation = rotation;
                tc.world_z = z;
            }
        }
    }
}
