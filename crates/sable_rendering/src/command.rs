//! Draw commands and the frame markers that delimit them in the queue.

use bitflags::bitflags;
use sable_core::{Color, Entity, Vec2};

/// Handle to a registered texture. `0` means "no texture".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureRef(pub u32);

impl TextureRef {
    /// Untextured (flat color) draw.
    pub const INVALID: Self = Self(0);

    /// Returns true for [`TextureRef::INVALID`].
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

/// Handle to a shader effect. `0` is the default effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectRef(pub u32);

impl EffectRef {
    /// The built-in effect.
    pub const DEFAULT: Self = Self(0);
}

bitflags! {
    /// Per-draw GPU state.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct RenderFlags: u8 {
        /// Write to the depth buffer.
        const Z_WRITE = 0b001;
        /// Alpha blending enabled.
        const BLENDING = 0b010;
        /// Write to the color buffer.
        const COLOR_WRITE = 0b100;
    }
}

impl RenderFlags {
    /// Depth-only pre-pass.
    pub const Z_PRE_PASS: Self = Self::Z_WRITE;
    /// Fully opaque draw.
    pub const OPAQUE: Self = Self::Z_WRITE.union(Self::COLOR_WRITE);
    /// Blended draw.
    pub const TRANSLUCENT: Self = Self::BLENDING.union(Self::COLOR_WRITE);
}

/// One textured quad, fully resolved for the GPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderCommand {
    /// Depth key. Higher is closer to the viewer.
    pub z: f32,
    /// Texture to bind.
    pub texture: TextureRef,
    /// Effect to bind.
    pub effect: EffectRef,
    /// Center in world space.
    pub position: Vec2,
    /// Rotation in radians.
    pub rotation: f32,
    /// Half width and half height.
    pub half_size: Vec2,
    /// UV rectangle origin, relative to the texture.
    pub uv_offset: Vec2,
    /// UV rectangle size, relative to the texture.
    pub uv_size: Vec2,
    /// Tint.
    pub color: Color,
    /// Horizontal mirroring.
    pub mirror_h: bool,
    /// Entity the command was built from.
    pub entity: Entity,
    /// GPU state.
    pub flags: RenderFlags,
}

impl Default for RenderCommand {
    fn default() -> Self {
        Self {
            z: 0.0,
            texture: TextureRef::INVALID,
            effect: EffectRef::DEFAULT,
            position: Vec2::ZERO,
            rotation: 0.0,
            half_size: Vec2::new(0.5, 0.5),
            uv_offset: Vec2::ZERO,
            uv_size: Vec2::ONE,
            color: Color::WHITE,
            mirror_h: false,
            entity: Entity::NULL,
            flags: RenderFlags::TRANSLUCENT,
        }
    }
}

/// Camera parameters opening one camera's run of draws.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMarker {
    /// Index of the camera in the rendering system.
    pub camera: usize,
    /// Camera center in world space.
    pub world_position: Vec2,
    /// Visible world extent.
    pub world_size: Vec2,
    /// Viewport origin, normalized.
    pub screen_position: Vec2,
    /// Viewport size, normalized.
    pub screen_size: Vec2,
    /// Flip vertically when presenting.
    pub mirror_y: bool,
    /// Producer frame number.
    pub frame: u64,
}

/// An entry of the render queue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QueuedCommand {
    /// Start of a camera run.
    BeginFrame(FrameMarker),
    /// A draw inside the current run.
    Draw(RenderCommand),
    /// End of a camera run, carrying the frame number.
    EndFrame(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_presets() {
        assert!(RenderFlags::OPAQUE.contains(RenderFlags::Z_WRITE));
        assert!(!RenderFlags::OPAQUE.contains(RenderFlags::BLENDING));
        assert!(!RenderFlags::Z_PRE_PASS.contains(RenderFlags::COLOR_WRITE));
        assert!(RenderFlags::TRANSLUCENT.contains(RenderFlags::BLENDING));
    }

    #[test]
    fn test_texture_ref_order() {
        assert!(TextureRef(1) < TextureRef(2));
        assert!(TextureRef::INVALID.is_invalid());
    }
}
