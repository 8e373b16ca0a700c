//! Engine-level tests: configuration, the render thread and replication
//! between two engines.

use sable_core::{EntityKind, TableSystem, TransformSystem, Vec2};
use sable_networking::{LoopbackLink, NetworkSystem};
use sable_rendering::{
    Camera, FrameMarker, GpuTexture, RenderBackend, RenderCommand, RenderingSystem,
    TextureBackend,
};
use sable::{Engine, EngineConfig, EngineError};

#[derive(Debug, Default)]
struct CountingBackend {
    uploads: u32,
    cameras: u64,
    draws: u64,
}

impl TextureBackend for CountingBackend {
    fn load_atlas(&mut self, _name: &str) -> Option<GpuTexture> {
        None
    }

    fn load_texture(&mut self, _name: &str) -> Option<GpuTexture> {
        self.uploads += 1;
        Some(GpuTexture {
            color: self.uploads,
            alpha: 0,
        })
    }

    fn delete_texture(&mut self, _texture: GpuTexture) {}
}

impl RenderBackend for CountingBackend {
    fn begin_camera(&mut self, _marker: &FrameMarker) {
        self.cameras += 1;
    }

    fn draw(&mut self, _command: &RenderCommand, _texture: Option<GpuTexture>) {
        self.draws += 1;
    }

    fn end_camera(&mut self, _frame: u64) {}
}

fn scene(config: EngineConfig, sprites: usize) -> Engine {
    let mut engine = Engine::new(config).unwrap();
    let rendering = engine.rendering_mut().unwrap();
    rendering.add_camera(Camera::full_screen(Vec2::new(40.0, 40.0)));
    let texture = rendering.textures().load_texture_file("tile.png");

    let world = engine.world_mut();
    for i in 0..sprites {
        let e = world.create_entity(EntityKind::Persistent);
        world.add_component::<TransformSystem>(e).unwrap().position = Vec2::new(i as f32, 0.0);
        world.add_component::<RenderingSystem>(e).unwrap().texture = texture;
    }
    engine
}

#[test]
fn test_render_thread_draws_published_frames() {
    let mut engine = scene(EngineConfig::default(), 10);
    let render = engine.spawn_render_thread(CountingBackend::default()).unwrap();
    assert!(render.is_running());

    engine.run_fixed(50);
    let (backend, stats) = render.shutdown().unwrap();
    let queue = engine.queue().stats();

    assert_eq!(engine.frame_count(), 50);
    assert_eq!(queue.frames_published, 50);
    assert_eq!(queue.frames_consumed, stats.total_frames);
    assert_eq!(backend.draws, stats.total_draws);
    assert_eq!(backend.cameras, stats.total_frames);
    assert_eq!(stats.total_draws, stats.total_frames * 10);
    assert_eq!(backend.uploads, 1);
}

#[test]
fn test_hidden_surface_skips_frames() {
    let mut engine = scene(EngineConfig::default(), 3);
    let render = engine.spawn_render_thread(CountingBackend::default()).unwrap();

    engine.set_visible(false);
    engine.run_fixed(5);
    assert_eq!(engine.queue().stats().frames_published, 0);

    engine.set_visible(true);
    engine.run_fixed(4);
    let (_backend, _stats) = render.shutdown().unwrap();

    let rendering = engine.world().system::<RenderingSystem>().unwrap();
    assert_eq!(rendering.frames_skipped(), 5);
    assert_eq!(rendering.frames_built(), 4);
    assert_eq!(engine.queue().stats().frames_published, 4);
}

#[test]
fn test_start_hidden_from_config() {
    let config = EngineConfig::from_toml_str("[render]\nstart_writable = false").unwrap();
    let mut engine = scene(config, 1);
    engine.run_fixed(3);
    assert_eq!(
        engine.world().system::<RenderingSystem>().unwrap().frames_skipped(),
        3
    );
}

#[test]
fn test_dropping_render_thread_closes_queue() {
    let engine = scene(EngineConfig::default(), 1);
    let queue = engine.queue();
    drop(engine.spawn_render_thread(CountingBackend::default()).unwrap());
    assert!(queue.is_closed());
}

#[test]
fn test_config_file_roundtrip() {
    let path = std::env::temp_dir().join(format!("sable-engine-test-{}.toml", std::process::id()));
    std::fs::write(&path, "target_fps = 120\nmax_delta_seconds = 0.05\n").unwrap();
    let config = EngineConfig::from_file(&path);
    std::fs::remove_file(&path).unwrap();

    let config = config.unwrap();
    assert_eq!(config.target_fps, 120);
    let mut engine = Engine::new(config).unwrap();
    let stats = engine.step(1.0);
    assert!(stats.clamped);
    assert!((stats.delta_time - 0.05).abs() < f32::EPSILON);
}

#[test]
fn test_invalid_config_is_rejected_by_engine() {
    let config = EngineConfig {
        max_delta_seconds: 0.0,
        ..EngineConfig::default()
    };
    assert!(matches!(
        Engine::new(config),
        Err(EngineError::InvalidConfig {
            key: "max_delta_seconds",
            ..
        })
    ));
}

#[test]
fn test_two_engines_replicate_over_loopback() {
    let mut config = EngineConfig::default();
    config.network.enabled = true;
    config.network.default_update_period = 0.0;

    let mut master = scene(config.clone(), 0);
    let mut other = scene(config, 0);
    let (a, b) = LoopbackLink::pair();
    master.set_network_api(Box::new(a)).unwrap();
    other.set_network_api(Box::new(b)).unwrap();

    let hero = master.world_mut().create_entity(EntityKind::Persistent);
    master
        .world_mut()
        .add_component::<TransformSystem>(hero)
        .unwrap()
        .position = Vec2::new(7.0, -2.0);
    master.replicate(hero, TransformSystem::NAME).unwrap();

    for _ in 0..6 {
        master.step(0.016);
        other.step(0.016);
    }

    let network = other.world().system::<NetworkSystem>().unwrap();
    let remotes = network.remote_entities();
    assert_eq!(remotes.len(), 1);
    let tc = other
        .world()
        .component::<TransformSystem>(remotes[0])
        .unwrap();
    assert_eq!(tc.position, Vec2::new(7.0, -2.0));
}
