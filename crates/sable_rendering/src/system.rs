//! # Rendering System
//!
//! Turns Rendering + Transform components into one frame of draw commands
//! per tick and publishes it to the [`RenderQueue`].
//!
//! For every enabled camera, last to first:
//!
//! 1. Filter: not hidden, alpha above zero, camera bit set, box visible.
//! 2. Build the command from the resolved transform.
//! 3. Textured draws drop the transparent margin of their atlas image and,
//!    when eligible, split into an opaque core and translucent borders.
//! 4. Clip against the camera's horizontal bounds.
//! 5. Sort each list and append the camera run to the frame.

use std::collections::HashMap;
use std::sync::Arc;

use sable_core::{
    ByteReader, ByteWriter, Color, ComponentTable, EcsError, EcsResult, Entity, FieldCodec,
    TableSystem, TransformComponent, TransformSystem, UpdateContext,
};
use tracing::{debug, trace, warn};

use crate::camera::Camera;
use crate::clip::{clip_horizontal, split_opaque, trim_to_region};
use crate::command::{EffectRef, QueuedCommand, RenderCommand, RenderFlags, TextureRef};
use crate::queue::RenderQueue;
use crate::sort::{sort_opaque, sort_translucent, DEFAULT_SORT_EPSILON};
use crate::texture::{read_name, write_name, TextureLibrary};

/// How a draw blends with what is behind it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Opacity {
    /// Blended; may contain an opaque region.
    #[default]
    NonOpaque,
    /// Every pixel is opaque.
    FullOpaque,
}

impl FieldCodec for Opacity {
    const SIZE: usize = 1;

    fn write(&self, out: &mut ByteWriter) {
        out.write_u8(match self {
            Self::NonOpaque => 0,
            Self::FullOpaque => 1,
        });
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u8().map(|b| match b {
            1 => Self::FullOpaque,
            _ => Self::NonOpaque,
        })
    }
}

impl FieldCodec for TextureRef {
    const SIZE: usize = 4;

    fn write(&self, out: &mut ByteWriter) {
        out.write_u32(self.0);
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u32().map(Self)
    }
}

impl FieldCodec for EffectRef {
    const SIZE: usize = 4;

    fn write(&self, out: &mut ByteWriter) {
        out.write_u32(self.0);
    }

    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        input.read_u32().map(Self)
    }
}

/// Appearance of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingComponent {
    /// Texture, or [`TextureRef::INVALID`] for a flat quad.
    pub texture: TextureRef,
    /// Shader effect.
    pub effect: EffectRef,
    /// Tint. Alpha zero hides the entity.
    pub color: Color,
    /// Skip this entity.
    pub hide: bool,
    /// Draw mirrored horizontally.
    pub mirror_h: bool,
    /// Depth-only pass.
    pub z_pre_pass: bool,
    /// Skip horizontal clipping.
    pub fast_culling: bool,
    /// Blending mode.
    pub opacity: Opacity,
    /// Bit `i` makes the entity visible to camera `i`.
    pub camera_bitmask: u32,
}

impl Default for RenderingComponent {
    fn default() -> Self {
        Self {
            texture: TextureRef::INVALID,
            effect: EffectRef::DEFAULT,
            color: Color::WHITE,
            hide: false,
            mirror_h: false,
            z_pre_pass: false,
            fast_culling: false,
            opacity: Opacity::NonOpaque,
            camera_bitmask: 1,
        }
    }
}

sable_core::component_fields!(RenderingComponent {
    texture: TextureRef,
    effect: EffectRef,
    color: Color,
    hide: bool,
    mirror_h: bool,
    z_pre_pass: bool,
    fast_culling: bool,
    opacity: Opacity,
    camera_bitmask: u32,
});

impl RenderingComponent {
    /// GPU state for this component's draws.
    #[must_use]
    pub fn flags(&self) -> RenderFlags {
        if self.z_pre_pass {
            RenderFlags::Z_PRE_PASS
        } else if self.opacity == Opacity::FullOpaque {
            RenderFlags::OPAQUE
        } else {
            RenderFlags::TRANSLUCENT
        }
    }

    /// Returns true if camera `camera` may draw this entity.
    #[must_use]
    pub fn seen_by(&self, camera: usize) -> bool {
        u32::try_from(camera)
            .ok()
            .and_then(|shift| 1u32.checked_shl(shift))
            .is_some_and(|bit| self.camera_bitmask & bit != 0)
    }

    fn is_drawable(&self) -> bool {
        !self.hide && self.color.a > 0.0
    }
}

/// Tunables of the rendering pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Depth distance under which translucent draws share a layer.
    pub sort_epsilon: f32,
    /// Initial entry capacity of each queue buffer.
    pub initial_queue_capacity: usize,
    /// Whether the queue accepts frames before the first resume.
    pub start_writable: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sort_epsilon: DEFAULT_SORT_EPSILON,
            initial_queue_capacity: 1024,
            start_writable: true,
        }
    }
}

/// Builds and publishes draw commands.
#[derive(Debug)]
pub struct RenderingSystem {
    table: ComponentTable<RenderingComponent>,
    cameras: Vec<Camera>,
    queue: Arc<RenderQueue>,
    textures: Arc<TextureLibrary>,
    settings: RenderSettings,
    effects: HashMap<String, EffectRef>,
    frame: u64,
    frames_skipped: u64,
    opaque: Vec<RenderCommand>,
    translucent: Vec<RenderCommand>,
}

impl Default for RenderingSystem {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl RenderingSystem {
    /// Creates a system with its own queue and texture library.
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        let queue = Arc::new(RenderQueue::with_capacity(
            settings.initial_queue_capacity,
            settings.start_writable,
        ));
        Self::with_shared(queue, Arc::new(TextureLibrary::new()), settings)
    }

    /// Creates a system publishing to an existing queue and library.
    #[must_use]
    pub fn with_shared(
        queue: Arc<RenderQueue>,
        textures: Arc<TextureLibrary>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            table: ComponentTable::new(Self::NAME),
            cameras: Vec::new(),
            queue,
            textures,
            settings,
            effects: HashMap::new(),
            frame: 0,
            frames_skipped: 0,
            opaque: Vec::new(),
            translucent: Vec::new(),
        }
    }

    /// Handle to the queue, for the render thread.
    #[must_use]
    pub fn queue(&self) -> Arc<RenderQueue> {
        Arc::clone(&self.queue)
    }

    /// Handle to the texture library.
    #[must_use]
    pub fn textures(&self) -> Arc<TextureLibrary> {
        Arc::clone(&self.textures)
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Adds a camera and returns its index.
    pub fn add_camera(&mut self, camera: Camera) -> usize {
        self.cameras.push(camera);
        self.cameras.len() - 1
    }

    /// All cameras, by index.
    #[must_use]
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Mutable cameras.
    pub fn cameras_mut(&mut self) -> &mut [Camera] {
        &mut self.cameras
    }

    /// Resolves an effect name, assigning a new handle on first use.
    pub fn load_effect(&mut self, name: &str) -> EffectRef {
        let next = EffectRef(u32::try_from(self.effects.len() + 1).unwrap_or(u32::MAX));
        *self.effects.entry(name.to_owned()).or_insert_with(|| {
            debug!(effect = name, id = next.0, "registered effect");
            next
        })
    }

    /// Frames built so far.
    #[must_use]
    pub fn frames_built(&self) -> u64 {
        self.frame
    }

    /// Ticks that produced no frame because the queue was suspended.
    #[must_use]
    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Returns true if `entity` would be drawn by camera `camera`.
    #[must_use]
    pub fn is_entity_visible(
        &self,
        entity: Entity,
        transforms: &TransformSystem,
        camera: usize,
    ) -> bool {
        let (Some(rc), Some(tc), Some(cam)) = (
            self.table.try_get(entity),
            transforms.table().try_get(entity),
            self.cameras.get(camera),
        ) else {
            return false;
        };
        cam.enabled && rc.is_drawable() && rc.seen_by(camera) && cam.is_visible(tc)
    }
}

/// Inputs shared by every camera of a frame.
struct FrameSource<'a> {
    components: &'a ComponentTable<RenderingComponent>,
    transforms: &'a ComponentTable<TransformComponent>,
    textures: &'a TextureLibrary,
}

impl FrameSource<'_> {
    fn collect(
        &self,
        index: usize,
        camera: &Camera,
        opaque: &mut Vec<RenderCommand>,
        translucent: &mut Vec<RenderCommand>,
    ) {
        let (left, right) = (camera.left(), camera.right());

        for (entity, rc) in self.components.iter() {
            if !rc.is_drawable() || !rc.seen_by(index) {
                continue;
            }
            let Some(tc) = self.transforms.try_get(entity) else {
                trace!(%entity, "rendering component without transform");
                continue;
            };
            if !camera.is_visible(tc) {
                continue;
            }

            let mut command = RenderCommand {
                z: tc.world_z,
                texture: rc.texture,
                effect: rc.effect,
                position: tc.world_position,
                rotation: tc.world_rotation,
                half_size: tc.size * 0.5,
                color: rc.color,
                mirror_h: rc.mirror_h,
                entity,
                flags: rc.flags(),
                ..RenderCommand::default()
            };

            if let Some(info) = (!command.texture.is_invalid())
                .then(|| self.textures.info(command.texture))
                .flatten()
            {
                if let Some(atlas) = info.atlas {
                    if !self.textures.is_atlas_loaded(atlas) && self.textures.request_atlas_load(atlas)
                    {
                        warn!(atlas, name = ?self.textures.atlas_name(atlas), "requested atlas load");
                    }
                }
                trim_to_region(&mut command, info.redux_start, info.redux_size);

                let splittable =
                    rc.opacity != Opacity::FullOpaque && command.color.a >= 1.0 && !rc.z_pre_pass;
                if let Some(split) = splittable.then(|| split_opaque(&command, &info)).flatten() {
                    let mut core = split.core;
                    if clip_horizontal(left, right, &mut core) {
                        opaque.push(core);
                    }
                    for mut border in split.borders {
                        if clip_horizontal(left, right, &mut border) {
                            translucent.push(border);
                        }
                    }
                    continue;
                }
            }

            if !rc.fast_culling && !clip_horizontal(left, right, &mut command) {
                continue;
            }
            match rc.opacity {
                Opacity::NonOpaque => translucent.push(command),
                Opacity::FullOpaque => opaque.push(command),
            }
        }
    }
}

impl TableSystem for RenderingSystem {
    type Component = RenderingComponent;
    const NAME: &'static str = "Rendering";

    fn table(&self) -> &ComponentTable<RenderingComponent> {
        &self.table
    }

    fn table_mut(&mut self) -> &mut ComponentTable<RenderingComponent> {
        &mut self.table
    }

    fn update(&mut self, _dt: f32, ctx: &mut UpdateContext<'_>) {
        let Some(transforms) = ctx.registry.get::<TransformSystem>() else {
            warn!("rendering pass needs the transform system");
            return;
        };
        let Some(mut writer) = self.queue.begin_frame() else {
            self.frames_skipped += 1;
            trace!(frame = self.frame, "queue not writable, frame skipped");
            return;
        };

        let source = FrameSource {
            components: &self.table,
            transforms: transforms.table(),
            textures: &self.textures,
        };
        let frame = self.frame;
        for (index, camera) in self.cameras.iter().enumerate().rev() {
            if !camera.enabled {
                continue;
            }
            self.opaque.clear();
            self.translucent.clear();
            source.collect(index, camera, &mut self.opaque, &mut self.translucent);
            sort_opaque(&mut self.opaque);
            sort_translucent(&mut self.translucent, self.settings.sort_epsilon);

            writer.push(QueuedCommand::BeginFrame(camera.marker(index, frame)));
            writer.extend(
                self.opaque
                    .iter()
                    .chain(self.translucent.iter())
                    .copied()
                    .map(QueuedCommand::Draw),
            );
            writer.push(QueuedCommand::EndFrame(frame));
        }

        trace!(frame, commands = writer.len(), "built frame");
        if writer.publish() {
            self.frame += 1;
        } else {
            self.frames_skipped += 1;
            trace!(frame, "queue suspended before publish, frame skipped");
        }
    }

    /// Cameras, effect names and the texture catalogue.
    fn save_state(&self) -> Option<Vec<u8>> {
        let mut out = ByteWriter::with_capacity(8 + self.cameras.len() * Camera::SIZE);
        out.write_u32(self.cameras.len() as u32);
        for camera in &self.cameras {
            camera.write(&mut out);
        }

        let mut effects: Vec<_> = self.effects.iter().collect();
        effects.sort_unstable_by_key(|&(_, effect)| *effect);
        out.write_u32(effects.len() as u32);
        for (name, effect) in effects {
            write_name(&mut out, name);
            effect.write(&mut out);
        }

        self.textures.save_catalogue(&mut out);
        Some(out.into_bytes())
    }

    fn restore_state(&mut self, blob: &[u8]) -> EcsResult<()> {
        let mut input = ByteReader::new(blob);
        let truncated = |input: &ByteReader<'_>, context: &'static str| EcsError::Truncated {
            offset: input.position(),
            context,
        };

        let count = input
            .read_u32()
            .ok_or_else(|| truncated(&input, "camera count"))?;
        let mut cameras = Vec::new();
        for _ in 0..count {
            cameras.push(Camera::read(&mut input).ok_or_else(|| truncated(&input, "camera"))?);
        }

        let count = input
            .read_u32()
            .ok_or_else(|| truncated(&input, "effect count"))?;
        let mut effects = HashMap::new();
        for _ in 0..count {
            let name = read_name(&mut input).ok_or_else(|| truncated(&input, "effect name"))?;
            let effect = EffectRef::read(&mut input).ok_or_else(|| truncated(&input, "effect"))?;
            effects.insert(name, effect);
        }

        let textures = self
            .textures
            .restore_catalogue(&mut input)
            .ok_or_else(|| truncated(&input, "texture catalogue"))?;

        debug!(cameras = cameras.len(), effects = effects.len(), textures, "restored rendering state");
        self.cameras = cameras;
        self.effects = effects;
        Ok(())
    }
}
