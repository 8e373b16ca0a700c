//! Draw ordering.
//!
//! Opaque draws go front to back so the depth test rejects hidden pixels
//! early. Translucent draws go back to front so blending composes correctly.
//!
//! Translucent depths closer than an epsilon are treated as one layer and
//! ordered by state (effect, texture, flags, color) to batch binds. Plain
//! "within epsilon means equal" is not transitive, so depths are first
//! clustered into runs whose neighbouring gaps are within epsilon, and the
//! run index is compared instead.

use std::cmp::Ordering;

use crate::command::RenderCommand;

/// Default depth epsilon for translucent layering.
pub const DEFAULT_SORT_EPSILON: f32 = 0.0001;

fn state_order(a: &RenderCommand, b: &RenderCommand) -> Ordering {
    a.effect
        .cmp(&b.effect)
        .then_with(|| a.texture.cmp(&b.texture))
}

/// Sorts opaque draws: higher depth first, then by effect and texture.
pub fn sort_opaque(commands: &mut [RenderCommand]) {
    commands.sort_by(|a, b| b.z.total_cmp(&a.z).then_with(|| state_order(a, b)));
}

/// Sorts translucent draws: lower depth layer first, then by effect,
/// texture, flags (descending) and color.
pub fn sort_translucent(commands: &mut Vec<RenderCommand>, epsilon: f32) {
    if commands.len() < 2 {
        return;
    }
    commands.sort_by(|a, b| a.z.total_cmp(&b.z));

    let mut layered = Vec::with_capacity(commands.len());
    let mut layer = 0u32;
    let mut previous = commands[0].z;
    for command in commands.drain(..) {
        if command.z - previous > epsilon {
            layer += 1;
        }
        previous = command.z;
        layered.push((layer, command));
    }

    layered.sort_by(|(la, a), (lb, b)| {
        la.cmp(lb)
            .then_with(|| state_order(a, b))
            .then_with(|| b.flags.bits().cmp(&a.flags.bits()))
            .then_with(|| a.color.total_cmp(&b.color))
    });
    commands.extend(layered.into_iter().map(|(_, command)| command));
}
