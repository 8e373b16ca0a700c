//! # Texture Library
//!
//! Catalogue of textures and atlases shared by the simulation thread (which
//! resolves names and requests loads) and the render thread (which owns the
//! GPU context and runs the delayed job pass).
//!
//! GPU work is never done on the simulation thread. Requests are queued
//! under their own lock and resolved by [`TextureLibrary::process_delayed_jobs`]
//! in a fixed order: texture loads, then atlas loads, then deletes. The job
//! lock is released around every backend call.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};
use sable_core::{ByteReader, ByteWriter, FieldCodec, Vec2};
use tracing::{debug, error, info, warn};

use crate::command::TextureRef;
use crate::error::{RenderError, RenderResult};

/// GPU handles of a loaded texture: a color plane and an optional alpha plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GpuTexture {
    /// Color texture name.
    pub color: u32,
    /// Alpha texture name, `0` if none.
    pub alpha: u32,
}

/// Platform texture loader. Failures are reported as `None`.
pub trait TextureBackend {
    /// Uploads the image of an atlas.
    fn load_atlas(&mut self, name: &str) -> Option<GpuTexture>;

    /// Uploads a standalone texture.
    fn load_texture(&mut self, name: &str) -> Option<GpuTexture>;

    /// Releases GPU memory.
    fn delete_texture(&mut self, texture: GpuTexture);
}

/// Placement of one image inside an atlas, in atlas pixels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AtlasEntry {
    /// Asset name.
    pub name: String,
    /// Size of the untrimmed source image.
    pub original_size: Vec2,
    /// Offset of the trimmed region inside the source image.
    pub redux_offset: Vec2,
    /// Position of the trimmed region in the atlas.
    pub position_in_atlas: Vec2,
    /// Size of the trimmed region in the atlas.
    pub size_in_atlas: Vec2,
    /// The region is stored rotated by a quarter turn.
    pub rotated: bool,
    /// Top-left of the fully opaque box, relative to the trimmed region.
    pub opaque_start: Vec2,
    /// Bottom-right of the fully opaque box.
    pub opaque_end: Vec2,
}

/// Geometry of a registered texture.
///
/// All regions are normalized to `[0, 1]` relative to the drawn quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureInfo {
    /// Owning atlas, or `None` for a standalone texture.
    pub atlas: Option<usize>,
    /// Handles of a standalone texture once loaded.
    pub gpu: Option<GpuTexture>,
    /// Bottom-left UV inside the atlas.
    pub atlas_uv_min: Vec2,
    /// Top-right UV inside the atlas.
    pub atlas_uv_max: Vec2,
    /// The atlas region is rotated.
    pub rotate_uv: bool,
    /// Untrimmed image size in pixels.
    pub original_size: Vec2,
    /// Start of the non-transparent (trimmed) region.
    pub redux_start: Vec2,
    /// Size of the non-transparent region.
    pub redux_size: Vec2,
    /// Start of the fully opaque box.
    pub opaque_start: Vec2,
    /// Size of the fully opaque box; zero if none.
    pub opaque_size: Vec2,
}

impl TextureInfo {
    /// Texture covering its whole quad, with no opaque region.
    #[must_use]
    pub const fn standalone() -> Self {
        Self {
            atlas: None,
            gpu: None,
            atlas_uv_min: Vec2::ZERO,
            atlas_uv_max: Vec2::ONE,
            rotate_uv: false,
            original_size: Vec2::ZERO,
            redux_start: Vec2::ZERO,
            redux_size: Vec2::ONE,
            opaque_start: Vec2::ZERO,
            opaque_size: Vec2::ZERO,
        }
    }

    /// Geometry of an atlas entry.
    #[must_use]
    pub fn from_atlas_entry(atlas: usize, atlas_size: Vec2, entry: &AtlasEntry) -> Self {
        let mut info = Self {
            atlas: Some(atlas),
            ..Self::standalone()
        };
        if entry.original_size == Vec2::ZERO {
            return info;
        }

        let pos = entry.position_in_atlas;
        let size = entry.size_in_atlas;
        info.atlas_uv_min = Vec2::new(
            pos.x / atlas_size.x,
            1.0 - (pos.y + size.y) / atlas_size.y,
        );
        info.atlas_uv_max = Vec2::new((pos.x + size.x) / atlas_size.x, 1.0 - pos.y / atlas_size.y);
        info.rotate_uv = entry.rotated;
        info.original_size = entry.original_size;

        let trimmed = if entry.rotated {
            Vec2::new(size.y, size.x)
        } else {
            size
        };
        if trimmed.x > 0.0 && trimmed.y > 0.0 {
            let opaque = entry.opaque_end - entry.opaque_start;
            info.opaque_size = Vec2::new(opaque.x / trimmed.x, opaque.y / trimmed.y);
            info.opaque_start = Vec2::new(
                entry.opaque_start.x / trimmed.x,
                1.0 - (info.opaque_size.y + entry.opaque_start.y / trimmed.y),
            );

            let original = entry.original_size;
            info.redux_size = Vec2::new(trimmed.x / original.x, trimmed.y / original.y);
            info.redux_start = Vec2::new(
                entry.redux_offset.x / original.x,
                1.0 - (info.redux_size.y + entry.redux_offset.y / original.y),
            );
        }
        info
    }

    /// Returns true if the texture declares a fully opaque box.
    #[must_use]
    pub fn has_opaque_region(&self) -> bool {
        self.opaque_size != Vec2::ZERO
    }
}

impl FieldCodec for TextureInfo {
    const SIZE: usize = 4 + 7 * Vec2::SIZE + 1;

    fn write(&self, out: &mut ByteWriter) {
        let atlas = self.atlas.and_then(|a| i32::try_from(a).ok()).unwrap_or(-1);
        atlas.write(out);
        self.atlas_uv_min.write(out);
        self.atlas_uv_max.write(out);
        self.rotate_uv.write(out);
        self.original_size.write(out);
        self.redux_start.write(out);
        self.redux_size.write(out);
        self.opaque_start.write(out);
        self.opaque_size.write(out);
    }

    /// GPU handles are never encoded; a decoded info has none.
    fn read(input: &mut ByteReader<'_>) -> Option<Self> {
        let atlas = i32::read(input)?;
        Some(Self {
            atlas: usize::try_from(atlas).ok(),
            gpu: None,
            atlas_uv_min: Vec2::read(input)?,
            atlas_uv_max: Vec2::read(input)?,
            rotate_uv: bool::read(input)?,
            original_size: Vec2::read(input)?,
            redux_start: Vec2::read(input)?,
            redux_size: Vec2::read(input)?,
            opaque_start: Vec2::read(input)?,
            opaque_size: Vec2::read(input)?,
        })
    }
}

/// Writes a `u16` length-prefixed name.
pub(crate) fn write_name(out: &mut ByteWriter, name: &str) {
    let len = u16::try_from(name.len()).unwrap_or(u16::MAX);
    out.write_u16(len);
    out.write_bytes(&name.as_bytes()[..usize::from(len)]);
}

/// Reads a name written by [`write_name`].
pub(crate) fn read_name(input: &mut ByteReader<'_>) -> Option<String> {
    let len = input.read_u16()?;
    let bytes = input.read_bytes(usize::from(len))?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

#[derive(Debug)]
struct Atlas {
    name: String,
    gpu: Option<GpuTexture>,
}

#[derive(Debug)]
struct Catalogue {
    atlases: Vec<Atlas>,
    names: HashMap<String, TextureRef>,
    infos: HashMap<TextureRef, TextureInfo>,
    next_ref: u32,
}

#[derive(Debug, Default)]
struct DelayedJobs {
    texture_loads: BTreeSet<String>,
    atlas_loads: BTreeSet<usize>,
    deletes: Vec<GpuTexture>,
}

enum Job {
    LoadTexture(String),
    LoadAtlas(usize),
    Delete(GpuTexture),
}

impl DelayedJobs {
    fn pop(&mut self) -> Option<Job> {
        if let Some(name) = self.texture_loads.pop_first() {
            return Some(Job::LoadTexture(name));
        }
        if let Some(atlas) = self.atlas_loads.pop_first() {
            return Some(Job::LoadAtlas(atlas));
        }
        self.deletes.pop().map(Job::Delete)
    }

    fn len(&self) -> usize {
        self.texture_loads.len() + self.atlas_loads.len() + self.deletes.len()
    }
}

/// Outcome of one delayed job pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayedJobStats {
    /// Standalone textures uploaded.
    pub textures_loaded: u32,
    /// Atlases uploaded.
    pub atlases_loaded: u32,
    /// Textures released.
    pub deleted: u32,
    /// Backend loads that returned nothing.
    pub failures: u32,
}

/// Thread-safe texture catalogue with a delayed GPU job queue.
#[derive(Debug)]
pub struct TextureLibrary {
    catalogue: RwLock<Catalogue>,
    jobs: Mutex<DelayedJobs>,
}

impl Default for TextureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalogue: RwLock::new(Catalogue {
                atlases: Vec::new(),
                names: HashMap::new(),
                infos: HashMap::new(),
                next_ref: 1,
            }),
            jobs: Mutex::new(DelayedJobs::default()),
        }
    }

    /// Registers an atlas and all its images. The atlas is not uploaded
    /// until first drawn.
    ///
    /// Returns the atlas index.
    pub fn register_atlas(&self, name: &str, atlas_size: Vec2, entries: &[AtlasEntry]) -> usize {
        let mut catalogue = self.catalogue.write();
        let index = catalogue.atlases.len();
        catalogue.atlases.push(Atlas {
            name: name.to_owned(),
            gpu: None,
        });
        for entry in entries {
            let texture = TextureRef(catalogue.next_ref);
            catalogue.next_ref += 1;
            catalogue.names.insert(entry.name.clone(), texture);
            catalogue
                .infos
                .insert(texture, TextureInfo::from_atlas_entry(index, atlas_size, entry));
        }
        info!(atlas = name, index, images = entries.len(), "registered atlas");
        index
    }

    /// Resolves a texture name.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownTexture`] if the name is not registered.
    pub fn texture_ref(&self, name: &str) -> RenderResult<TextureRef> {
        self.catalogue.read().names.get(name).copied().ok_or_else(|| {
            error!(texture = name, "texture is not registered");
            RenderError::UnknownTexture(name.to_owned())
        })
    }

    /// Resolves a texture name, registering it as a standalone texture and
    /// queueing its upload if unknown.
    pub fn load_texture_file(&self, name: &str) -> TextureRef {
        let mut catalogue = self.catalogue.write();
        if let Some(&texture) = catalogue.names.get(name) {
            return texture;
        }
        let texture = TextureRef(catalogue.next_ref);
        catalogue.next_ref += 1;
        catalogue.names.insert(name.to_owned(), texture);
        catalogue.infos.insert(texture, TextureInfo::standalone());
        drop(catalogue);

        self.jobs.lock().texture_loads.insert(name.to_owned());
        debug!(texture = name, ?texture, "requested texture load");
        texture
    }

    /// Geometry of a texture.
    #[must_use]
    pub fn info(&self, texture: TextureRef) -> Option<TextureInfo> {
        self.catalogue.read().infos.get(&texture).copied()
    }

    /// Untrimmed pixel size of a named texture.
    #[must_use]
    pub fn texture_size(&self, name: &str) -> Option<Vec2> {
        let catalogue = self.catalogue.read();
        let texture = catalogue.names.get(name)?;
        catalogue.infos.get(texture).map(|info| info.original_size)
    }

    /// GPU handles to bind for `texture`, if uploaded.
    #[must_use]
    pub fn gpu_texture(&self, texture: TextureRef) -> Option<GpuTexture> {
        let catalogue = self.catalogue.read();
        let info = catalogue.infos.get(&texture)?;
        match info.atlas {
            Some(atlas) => catalogue.atlases.get(atlas)?.gpu,
            None => info.gpu,
        }
    }

    /// Returns true if the atlas image is uploaded.
    #[must_use]
    pub fn is_atlas_loaded(&self, atlas: usize) -> bool {
        self.catalogue
            .read()
            .atlases
            .get(atlas)
            .is_some_and(|a| a.gpu.is_some())
    }

    /// Name of an atlas.
    #[must_use]
    pub fn atlas_name(&self, atlas: usize) -> Option<String> {
        self.catalogue.read().atlases.get(atlas).map(|a| a.name.clone())
    }

    /// Queues an atlas upload. Returns true if it was not already queued.
    pub fn request_atlas_load(&self, atlas: usize) -> bool {
        self.jobs.lock().atlas_loads.insert(atlas)
    }

    /// Releases an atlas image. Its textures stay registered and reload on
    /// next use.
    ///
    /// Returns false if no atlas has this name.
    pub fn unload_atlas(&self, name: &str) -> bool {
        let released = {
            let mut catalogue = self.catalogue.write();
            let Some(atlas) = catalogue.atlases.iter_mut().find(|a| a.name == name) else {
                warn!(atlas = name, "unload of unknown atlas");
                return false;
            };
            atlas.gpu.take()
        };
        if let Some(gpu) = released {
            self.jobs.lock().deletes.push(gpu);
        }
        info!(atlas = name, "unloaded atlas");
        true
    }

    /// Forgets a texture and queues the release of its GPU memory.
    ///
    /// Atlas images can only be released with `allow_atlas`, which unloads
    /// the whole atlas.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::AtlasTexture`] for an atlas image without
    /// `allow_atlas`.
    pub fn unload_texture(&self, texture: TextureRef, allow_atlas: bool) -> RenderResult<()> {
        let released = {
            let mut catalogue = self.catalogue.write();
            let Some(info) = catalogue.infos.get(&texture).copied() else {
                error!(?texture, "unload of unknown texture");
                return Ok(());
            };
            if info.atlas.is_some() && !allow_atlas {
                error!(?texture, "cannot unload a texture that belongs to an atlas");
                return Err(RenderError::AtlasTexture(texture));
            }
            catalogue.names.retain(|_, t| *t != texture);
            catalogue.infos.remove(&texture);
            match info.atlas {
                Some(atlas) => catalogue
                    .atlases
                    .get_mut(atlas)
                    .and_then(|a| a.gpu.take()),
                None => info.gpu,
            }
        };
        if let Some(gpu) = released {
            self.jobs.lock().deletes.push(gpu);
        }
        Ok(())
    }

    /// Marks every GPU handle as lost (e.g. after a context loss) and
    /// queues standalone textures for upload again. Atlases reload on next
    /// use.
    pub fn invalidate_gpu_textures(&self) {
        let mut reload = Vec::new();
        {
            let mut catalogue = self.catalogue.write();
            for atlas in &mut catalogue.atlases {
                atlas.gpu = None;
            }
            let Catalogue { names, infos, .. } = &mut *catalogue;
            for (name, texture) in names.iter() {
                if let Some(info) = infos.get_mut(texture) {
                    if info.atlas.is_none() {
                        info.gpu = None;
                        reload.push(name.clone());
                    }
                }
            }
        }
        self.jobs.lock().texture_loads.extend(reload);
        info!("invalidated GPU textures");
    }

    /// Writes the name catalogue and texture geometry, ordered by handle.
    ///
    /// Atlases and GPU handles are not written; atlases are registered
    /// from asset data before a restore.
    pub fn save_catalogue(&self, out: &mut ByteWriter) {
        let catalogue = self.catalogue.read();
        let mut entries: Vec<_> = catalogue
            .names
            .iter()
            .filter_map(|(name, &texture)| {
                catalogue.infos.get(&texture).map(|info| (texture, name, info))
            })
            .collect();
        entries.sort_unstable_by_key(|&(texture, ..)| texture);

        out.write_u32(entries.len() as u32);
        for (texture, name, info) in entries {
            write_name(out, name);
            out.write_u32(texture.0);
            info.write(out);
        }
    }

    /// Replaces the catalogue with one written by
    /// [`save_catalogue`](Self::save_catalogue).
    ///
    /// Handles keep their saved values. Standalone textures are queued for
    /// upload again. Atlas images whose atlas is not registered are dropped.
    ///
    /// Returns the number of textures restored, or `None` if the input is
    /// malformed, in which case the catalogue is left untouched.
    pub fn restore_catalogue(&self, input: &mut ByteReader<'_>) -> Option<usize> {
        let count = input.read_u32()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let name = read_name(input)?;
            let texture = TextureRef(input.read_u32()?);
            let info = TextureInfo::read(input)?;
            entries.push((name, texture, info));
        }

        let mut reload = Vec::new();
        let (restored, released) = {
            let mut catalogue = self.catalogue.write();
            let released: Vec<GpuTexture> = catalogue
                .infos
                .values()
                .filter(|info| info.atlas.is_none())
                .filter_map(|info| info.gpu)
                .collect();
            catalogue.names.clear();
            catalogue.infos.clear();
            catalogue.next_ref = 1;
            for (name, texture, info) in entries {
                if info.atlas.is_some_and(|atlas| atlas >= catalogue.atlases.len()) {
                    warn!(texture = %name, atlas = ?info.atlas, "atlas not registered, texture dropped");
                    continue;
                }
                if info.atlas.is_none() {
                    reload.push(name.clone());
                }
                catalogue.next_ref = catalogue.next_ref.max(texture.0.saturating_add(1));
                catalogue.names.insert(name, texture);
                catalogue.infos.insert(texture, info);
            }
            (catalogue.names.len(), released)
        };
        {
            let mut jobs = self.jobs.lock();
            jobs.texture_loads.extend(reload);
            jobs.deletes.extend(released);
        }
        info!(textures = restored, "restored texture catalogue");
        Some(restored)
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Runs every queued job against `backend`.
    ///
    /// Must be called from the thread owning the GPU context.
    pub fn process_delayed_jobs(&self, backend: &mut dyn TextureBackend) -> DelayedJobStats {
        let mut stats = DelayedJobStats::default();
        loop {
            // The guard is a temporary, so the lock is released here
            let Some(job) = self.jobs.lock().pop() else {
                break;
            };
            match job {
                Job::LoadTexture(name) => match backend.load_texture(&name) {
                    Some(gpu) => {
                        let stored = {
                            let mut catalogue = self.catalogue.write();
                            let texture = catalogue.names.get(&name).copied();
                            match texture.and_then(|t| catalogue.infos.get_mut(&t)) {
                                Some(info) => {
                                    info.gpu = Some(gpu);
                                    true
                                }
                                None => false,
                            }
                        };
                        if stored {
                            stats.textures_loaded += 1;
                        } else {
                            debug!(texture = %name, "texture unloaded before upload finished");
                            backend.delete_texture(gpu);
                            stats.deleted += 1;
                        }
                    }
                    None => {
                        warn!(texture = %name, "texture upload failed");
                        stats.failures += 1;
                    }
                },
                Job::LoadAtlas(atlas) => {
                    let Some(name) = self.atlas_name(atlas) else {
                        warn!(atlas, "load requested for unknown atlas");
                        continue;
                    };
                    match backend.load_atlas(&name) {
                        Some(gpu) => {
                            if let Some(entry) = self.catalogue.write().atlases.get_mut(atlas) {
                                entry.gpu = Some(gpu);
                            }
                            stats.atlases_loaded += 1;
                            debug!(atlas = %name, ?gpu, "atlas loaded");
                        }
                        None => {
                            warn!(atlas = %name, "atlas upload failed");
                            stats.failures += 1;
                        }
                    }
                }
                Job::Delete(gpu) => {
                    backend.delete_texture(gpu);
                    stats.deleted += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeBackend {
        next: u32,
        log: Vec<String>,
        fail: bool,
    }

    impl TextureBackend for FakeBackend {
        fn load_atlas(&mut self, name: &str) -> Option<GpuTexture> {
            self.log.push(format!("atlas:{name}"));
            if self.fail {
                return None;
            }
            self.next += 1;
            Some(GpuTexture {
                color: self.next,
                alpha: 0,
            })
        }

        fn load_texture(&mut self, name: &str) -> Option<GpuTexture> {
            self.log.push(format!("texture:{name}"));
            self.next += 1;
            Some(GpuTexture {
                color: self.next,
                alpha: 0,
            })
        }

        fn delete_texture(&mut self, texture: GpuTexture) {
            self.log.push(format!("delete:{}", texture.color));
        }
    }

    fn entry(name: &str) -> AtlasEntry {
        AtlasEntry {
            name: name.to_owned(),
            original_size: Vec2::new(64.0, 64.0),
            redux_offset: Vec2::new(16.0, 8.0),
            position_in_atlas: Vec2::new(0.0, 0.0),
            size_in_atlas: Vec2::new(32.0, 48.0),
            rotated: false,
            opaque_start: Vec2::new(8.0, 12.0),
            opaque_end: Vec2::new(24.0, 36.0),
        }
    }

    #[test]
    fn test_atlas_entry_geometry() {
        let info = TextureInfo::from_atlas_entry(0, Vec2::new(128.0, 128.0), &entry("hero"));
        assert_eq!(info.redux_size, Vec2::new(0.5, 0.75));
        assert_eq!(info.redux_start, Vec2::new(0.25, 1.0 - (0.75 + 0.125)));
        assert_eq!(info.opaque_size, Vec2::new(0.5, 0.5));
        assert_eq!(info.opaque_start, Vec2::new(0.25, 1.0 - (0.5 + 0.25)));
        assert!(info.has_opaque_region());
    }

    #[test]
    fn test_atlas_loads_on_request() {
        let library = TextureLibrary::new();
        let atlas = library.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero")]);
        let hero = library.texture_ref("hero").unwrap();
        assert!(library.gpu_texture(hero).is_none());

        assert!(library.request_atlas_load(atlas));
        assert!(!library.request_atlas_load(atlas));

        let mut backend = FakeBackend::default();
        let stats = library.process_delayed_jobs(&mut backend);
        assert_eq!(stats.atlases_loaded, 1);
        assert!(library.is_atlas_loaded(atlas));
        assert_eq!(library.gpu_texture(hero).unwrap().color, 1);
        assert_eq!(library.pending_jobs(), 0);
    }

    #[test]
    fn test_job_order_is_loads_then_atlases_then_deletes() {
        let library = TextureLibrary::new();
        let atlas = library.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero")]);
        let mut backend = FakeBackend::default();
        library.request_atlas_load(atlas);
        library.process_delayed_jobs(&mut backend);
        backend.log.clear();

        library.unload_atlas("sprites");
        library.request_atlas_load(atlas);
        library.load_texture_file("background");
        library.process_delayed_jobs(&mut backend);

        assert_eq!(
            backend.log,
            vec!["texture:background", "atlas:sprites", "delete:1"]
        );
    }

    #[test]
    fn test_catalogue_survives_save_and_restore() {
        let source = TextureLibrary::new();
        source.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero"), entry("crate")]);
        let background = source.load_texture_file("background");
        let mut out = ByteWriter::new();
        source.save_catalogue(&mut out);
        let bytes = out.into_bytes();

        let target = TextureLibrary::new();
        target.register_atlas("sprites", Vec2::new(128.0, 128.0), &[]);
        let mut backend = FakeBackend::default();
        target.load_texture_file("splash");
        target.process_delayed_jobs(&mut backend);
        backend.log.clear();

        assert_eq!(target.restore_catalogue(&mut ByteReader::new(&bytes)), Some(3));
        for name in ["hero", "crate", "background"] {
            let texture = source.texture_ref(name).unwrap();
            assert_eq!(target.texture_ref(name), Ok(texture));
            assert_eq!(target.info(texture), source.info(texture));
        }
        assert!(target.texture_ref("splash").is_err());
        assert_eq!(target.load_texture_file("fresh"), TextureRef(background.0 + 1));

        // The standalone texture reloads and the replaced one is released
        target.process_delayed_jobs(&mut backend);
        assert_eq!(backend.log, vec!["texture:background", "texture:fresh", "delete:1"]);
        assert!(target.gpu_texture(background).is_some());
    }

    #[test]
    fn test_catalogue_restore_drops_unregistered_atlases() {
        let source = TextureLibrary::new();
        source.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero")]);
        let mut out = ByteWriter::new();
        source.save_catalogue(&mut out);
        let bytes = out.into_bytes();

        let target = TextureLibrary::new();
        assert_eq!(target.restore_catalogue(&mut ByteReader::new(&bytes)), Some(0));
        assert!(target.texture_ref("hero").is_err());

        let cut = &bytes[..bytes.len() - 1];
        target.load_texture_file("kept");
        assert_eq!(target.restore_catalogue(&mut ByteReader::new(cut)), None);
        assert!(target.texture_ref("kept").is_ok());
    }

    #[test]
    fn test_unknown_texture_name() {
        let library = TextureLibrary::new();
        assert_eq!(
            library.texture_ref("missing"),
            Err(RenderError::UnknownTexture("missing".to_owned()))
        );
    }

    #[test]
    fn test_atlas_texture_cannot_be_unloaded_alone() {
        let library = TextureLibrary::new();
        library.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero")]);
        let hero = library.texture_ref("hero").unwrap();
        assert_eq!(
            library.unload_texture(hero, false),
            Err(RenderError::AtlasTexture(hero))
        );
        assert!(library.unload_texture(hero, true).is_ok());
        assert!(library.info(hero).is_none());
    }

    #[test]
    fn test_failed_atlas_upload_is_counted() {
        let library = TextureLibrary::new();
        let atlas = library.register_atlas("sprites", Vec2::new(128.0, 128.0), &[entry("hero")]);
        library.request_atlas_load(atlas);
        let mut backend = FakeBackend {
            fail: true,
            ..FakeBackend::default()
        };
        let stats = library.process_delayed_jobs(&mut backend);
        assert_eq!(stats.failures, 1);
        assert!(!library.is_atlas_loaded(atlas));
    }

    #[test]
    fn test_invalidate_requeues_standalone_textures() {
        let library = TextureLibrary::new();
        let bg = library.load_texture_file("background");
        let mut backend = FakeBackend::default();
        library.process_delayed_jobs(&mut backend);
        assert!(library.gpu_texture(bg).is_some());

        library.invalidate_gpu_textures();
        assert!(library.gpu_texture(bg).is_none());
        assert_eq!(library.pending_jobs(), 1);
    }
}
