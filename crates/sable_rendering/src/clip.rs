//! Quad trimming and camera clipping.
//!
//! Regions are given in normalized quad coordinates: `(0, 0)` is the
//! bottom-left corner of the untransformed quad and `(1, 1)` the top-right.

use sable_core::Vec2;

use crate::command::{RenderCommand, RenderFlags};
use crate::texture::TextureInfo;

/// Clips an unrotated command against the camera's left and right edges,
/// shrinking its quad and UV rectangle to the visible part.
///
/// Returns false if nothing is left to draw. Rotated commands are kept as is.
pub fn clip_horizontal(left: f32, right: f32, command: &mut RenderCommand) -> bool {
    if command.rotation != 0.0 {
        return true;
    }

    let cut_left = left - (command.position.x - command.half_size.x);
    if cut_left > 0.0 {
        let width = 2.0 * command.half_size.x;
        if cut_left >= width {
            return false;
        }
        let proportion = cut_left / width;
        if !command.mirror_h {
            command.uv_offset.x += proportion * command.uv_size.x;
        }
        command.uv_size.x *= 1.0 - proportion;
        command.half_size.x *= 1.0 - proportion;
        command.position.x += 0.5 * cut_left;
    }

    let cut_right = (command.position.x + command.half_size.x) - right;
    if cut_right > 0.0 {
        let width = 2.0 * command.half_size.x;
        if cut_right >= width {
            return false;
        }
        let proportion = cut_right / width;
        if command.mirror_h {
            command.uv_offset.x += proportion * command.uv_size.x;
        }
        command.uv_size.x *= 1.0 - proportion;
        command.half_size.x *= 1.0 - proportion;
        command.position.x -= 0.5 * cut_right;
    }

    true
}

/// Shrinks the quad to a sub-region, keeping the UV rectangle.
///
/// Used to drop the fully transparent margin of trimmed atlas images.
pub fn trim_to_region(command: &mut RenderCommand, offset: Vec2, size: Vec2) {
    let half = command.half_size;
    let center = offset.scale(half * 2.0) + size.scale(half);
    let shift = (center - half).rotate(command.rotation);
    let sign = if command.mirror_h { -1.0 } else { 1.0 };
    command.position += Vec2::new(sign * shift.x, shift.y);
    command.half_size = size.scale(half);
}

/// Shrinks the quad to a sub-region and maps the UV rectangle onto it.
pub fn crop_to_region(command: &mut RenderCommand, offset: Vec2, size: Vec2) {
    trim_to_region(command, offset, size);
    command.uv_offset = offset;
    command.uv_size = size;
}

/// Pieces of a draw split around its texture's opaque box.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueSplit {
    /// The opaque box, drawn with depth writes.
    pub core: RenderCommand,
    /// Translucent strips surrounding the core.
    pub borders: Vec<RenderCommand>,
}

/// Splits a draw into its opaque core and up to four translucent borders.
///
/// Returns `None` if the texture declares no opaque box.
#[must_use]
pub fn split_opaque(command: &RenderCommand, info: &TextureInfo) -> Option<OpaqueSplit> {
    if !info.has_opaque_region() {
        return None;
    }

    let start = info.opaque_start;
    let size = info.opaque_size;
    let left_border = start.x;
    let right_border = start.x + size.x;
    let top_border = start.y + size.y;
    let inner_width = right_border - left_border;

    let mut core = *command;
    crop_to_region(&mut core, start, size);
    core.flags = RenderFlags::OPAQUE;

    let mut regions = Vec::with_capacity(4);
    if left_border > 0.0 {
        regions.push((Vec2::ZERO, Vec2::new(left_border, 1.0)));
    }
    if right_border < 1.0 {
        regions.push((Vec2::new(right_border, 0.0), Vec2::new(1.0 - right_border, 1.0)));
    }
    if start.y > 0.0 {
        regions.push((Vec2::new(left_border, 0.0), Vec2::new(inner_width, start.y)));
    }
    if top_border < 1.0 {
        regions.push((
            Vec2::new(left_border, top_border),
            Vec2::new(inner_width, 1.0 - top_border),
        ));
    }

    let borders = regions
        .into_iter()
        .map(|(offset, size)| {
            let mut border = *command;
            crop_to_region(&mut border, offset, size);
            border
        })
        .collect();

    Some(OpaqueSplit { core, borders })
}
