//! # SABLE Headless
//!
//! Runs a small scene without a window or GPU. The render thread drives a
//! backend that only counts what it would have drawn.
//!
//! ```bash
//! sable_headless                  # default config, 600 ticks
//! sable_headless sable.toml 120   # config file, 120 ticks
//! RUST_LOG=sable=debug sable_headless
//! ```

use std::process::ExitCode;

use sable_core::{EntityKind, TableSystem, TransformSystem, Vec2, World};
use sable_networking::{LoopbackLink, NetworkSystem};
use sable_rendering::{
    Camera, FrameMarker, GpuTexture, RenderBackend, RenderCommand, RenderingSystem,
    TextureBackend,
};
use sable::{Engine, EngineConfig, EngineResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKS: u64 = 600;
const SPRITES: usize = 64;

/// Backend that hands out fake texture names and counts draws.
#[derive(Debug, Default)]
struct HeadlessBackend {
    next_texture: u32,
    cameras: u64,
    draws: u64,
}

impl TextureBackend for HeadlessBackend {
    fn load_atlas(&mut self, name: &str) -> Option<GpuTexture> {
        self.load_texture(name)
    }

    fn load_texture(&mut self, _name: &str) -> Option<GpuTexture> {
        self.next_texture += 1;
        Some(GpuTexture {
            color: self.next_texture,
            alpha: 0,
        })
    }

    fn delete_texture(&mut self, _texture: GpuTexture) {}
}

impl RenderBackend for HeadlessBackend {
    fn begin_camera(&mut self, _marker: &FrameMarker) {
        self.cameras += 1;
    }

    fn draw(&mut self, _command: &RenderCommand, _texture: Option<GpuTexture>) {
        self.draws += 1;
    }

    fn end_camera(&mut self, _frame: u64) {}
}

/// Builds the scene. With networking enabled, returns a second world that
/// mirrors the sprites over a loopback link.
fn build_scene(engine: &mut Engine) -> EngineResult<Option<World>> {
    let rendering = engine.rendering_mut()?;
    rendering.add_camera(Camera::full_screen(Vec2::new(32.0, 18.0)));
    let sprite = rendering.textures().load_texture_file("sprite.png");

    let world = engine.world_mut();
    let mut sprites = Vec::with_capacity(SPRITES);
    for i in 0..SPRITES {
        let e = world.create_entity(EntityKind::Persistent);
        let tc = world.add_component::<TransformSystem>(e)?;
        tc.position = Vec2::new((i % 16) as f32 * 2.0 - 15.0, (i / 16) as f32 * 2.0 - 3.0);
        tc.z = i as f32 * 0.01;
        world.add_component::<RenderingSystem>(e)?.texture = sprite;
        sprites.push(e);
    }

    if !engine.config().network.enabled {
        return Ok(None);
    }

    let (link, peer) = LoopbackLink::pair();
    engine.set_network_api(Box::new(link))?;
    for &e in &sprites {
        engine.replicate(e, TransformSystem::NAME)?;
    }

    let mut mirror = World::new();
    mirror.register(TransformSystem::new())?;
    let mut network = NetworkSystem::new();
    network.set_api(Box::new(peer));
    mirror.register(network)?;
    Ok(Some(mirror))
}

fn run() -> EngineResult<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let ticks = args
        .next()
        .and_then(|t| t.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    let mut engine = Engine::new(config)?;
    let mut mirror = build_scene(&mut engine)?;

    let render = engine.spawn_render_thread(HeadlessBackend::default())?;
    let dt = engine.config().fixed_delta();
    for _ in 0..ticks {
        engine.step(dt);
        if let Some(mirror) = mirror.as_mut() {
            mirror.tick(dt);
        }
    }
    let queue = engine.queue().stats();
    let (backend, render_stats) = render.shutdown()?;

    engine.stats().log_summary();
    info!(
        published = queue.frames_published,
        consumed = queue.frames_consumed,
        stale = queue.stale_frames,
        producer_waits = queue.producer_waits,
        "render queue"
    );
    info!(
        frames = render_stats.total_frames,
        draws = backend.draws,
        cameras = backend.cameras,
        avg_us = render_stats.avg_frame_time_us,
        textures = render_stats.textures_loaded,
        "render thread"
    );
    if let Some(network) = mirror.as_ref().and_then(|w| w.system::<NetworkSystem>()) {
        info!(
            mirrored = network.remote_entities().len(),
            packets = network.stats().packets_received,
            "loopback mirror"
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sable=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "headless run failed");
            ExitCode::FAILURE
        }
    }
}
