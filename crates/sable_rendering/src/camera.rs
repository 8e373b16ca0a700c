//! Orthographic 2D cameras.

use sable_core::{ByteReader, ByteWriter, FieldCodec, TransformComponent, Vec2};

use crate::command::FrameMarker;

/// A view of the world mapped onto part of the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Center of the view in world space.
    pub world_position: Vec2,
    /// Visible world extent.
    pub world_size: Vec2,
    /// Viewport origin, normalized.
    pub screen_position: Vec2,
    /// Viewport size, normalized.
    pub screen_size: Vec2,
    /// Flip vertically when presenting.
    pub mirror_y: bool,
    /// Disabled cameras produce no run.
    pub enabled: bool,
}

impl Camera {
    /// Creates an enabled camera.
    #[must_use]
    pub const fn new(
        world_position: Vec2,
        world_size: Vec2,
        screen_position: Vec2,
        screen_size: Vec2,
    ) -> Self {
        Self {
            world_position,
            world_size,
            screen_position,
            screen_size,
            mirror_y: false,
            enabled: true,
        }
    }

    /// Full-screen camera centered on the origin.
    #[must_use]
    pub const fn full_screen(world_size: Vec2) -> Self {
        Self::new(Vec2::ZERO, world_size, Vec2::ZERO, Vec2::ONE)
    }

    /// World x coordinate of the left edge.
    #[must_use]
    pub fn left(&self) -> f32 {
        self.world_position.x - self.world_size.x * 0.5
    }

    /// World x coordinate of the right edge.
    #[must_use]
    pub fn right(&self) -> f32 {
        self.world_position.x + self.world_size.x * 0.5
    }

    /// Axis-aligned overlap test between the transform's box and the view.
    ///
    /// Rotation is ignored; the unrotated box is tested.
    #[must_use]
    pub fn is_visible(&self, tc: &TransformComponent) -> bool {
        let half = tc.size * 0.5;
        let pos = tc.world_position - self.world_position;
        let cam_half = self.world_size * 0.5;

        !(pos.x + half.x < -cam_half.x
            || pos.x - half.x > cam_half.x
            || pos.y + half.y < -cam_half.y
            || pos.y - half.y > cam_half.y)
    }

    /// Marker opening this camera's run in `frame`.
    #[must_use]
    pub const fn marker(&self, camera: usize, frame: u64) -> FrameMarker {
        FrameMarker {
            camera,
            world_position: self.world_position,
            world_size: self.world_size,
            screen_position: self.screen_position,
            screen_size: self.screen_size,
            mirror_y: self.mirror_y,
            frame,
        }
    }
}

impl FieldCodec for Camera {
    const SIZE: usize = 4 * Vec2::SIZE + 2;

    fn write(&self, out: &mut ByteWriter) {
        self.world_position.write(out);
        self.world_size.write(out);
        self.screen_position.write(out);
        self.screen_size.write(out);
        self.mirror_y.write(out);
        self.enabled.write(out);
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        Some(Self {
            world_position: Vec2::read(input)?,
            world_size: Vec2::read(input)?,
            screen_position: Vec2::read(input)?,
            screen_size: Vec2::read(input)?,
            mirror_y: bool::read(input)?,
            enabled: bool::read(input)?,
        })
    }
}
