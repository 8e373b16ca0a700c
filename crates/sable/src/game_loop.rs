//! # Sable Game Loop
//!
//! ```text
//! Tick N (simulation thread):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. CLAMP DELTA                                                      │
//! │    └─ dt = min(dt, max_delta_seconds)                               │
//! │                                                                     │
//! │ 2. UPDATE PASSES (registration order)                               │
//! │    ├─ Transformation: local -> world transforms                     │
//! │    ├─ Rendering: cull, sort, publish a frame to the queue           │
//! │    └─ Network: handshake, replicate owned entities                  │
//! │                                                                     │
//! │ 3. END TICK                                                         │
//! │    └─ Record timing, warn if over the frame budget                  │
//! └─────────────────────────────────────────────────────────────────────┘
//!
//! Render thread (see render_thread.rs):
//!   wait for a published frame -> draw every camera run -> release
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sable_core::{EcsError, Entity, TableSystem, TransformSystem, World};
use sable_networking::{NetworkApi, NetworkSystem};
use sable_rendering::{RenderBackend, RenderQueue, RenderingSystem, TextureLibrary};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::render_thread::RenderThread;

/// Timing of a single tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Tick number, starting at 0.
    pub frame: u64,
    /// Delta handed to the update passes, after clamping.
    pub delta_time: f32,
    /// Whether the requested delta was clamped.
    pub clamped: bool,
    /// Wall time of all update passes in microseconds.
    pub total_us: u64,
}

/// Owns the world and runs its update passes.
pub struct Engine {
    world: World,
    config: EngineConfig,
    queue: Arc<RenderQueue>,
    textures: Arc<TextureLibrary>,
    frame_count: u64,
    stats_accumulator: FrameStatsAccumulator,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame_count", &self.frame_count)
            .field("entities", &self.world.entities().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds a world with the transform and rendering passes, plus the
    /// network pass when enabled.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is out of range.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let mut world = World::new();
        world.register(TransformSystem::new())?;

        let rendering = RenderingSystem::new(config.render_settings());
        let queue = rendering.queue();
        let textures = rendering.textures();
        world.register(rendering)?;

        if config.network.enabled {
            world.register(NetworkSystem::new())?;
        }

        info!(
            target_fps = config.target_fps,
            network = config.network.enabled,
            "engine initialized"
        );

        Ok(Self {
            world,
            config,
            queue,
            textures,
            frame_count: 0,
            stats_accumulator: FrameStatsAccumulator::new(),
        })
    }

    /// Runs every update pass once with `dt` seconds of game time.
    pub fn step(&mut self, dt: f32) -> FrameStats {
        let max = self.config.max_delta_seconds;
        let clamped = dt > max;
        let delta_time = if clamped { max } else { dt.max(0.0) };
        if clamped {
            debug!(requested = dt, used = max, "delta clamped");
        }

        let start = Instant::now();
        self.world.tick(delta_time);
        let elapsed = start.elapsed();

        let stats = FrameStats {
            frame: self.frame_count,
            delta_time,
            clamped,
            total_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        };
        self.end_frame(stats, elapsed);
        stats
    }

    /// Runs `ticks` fixed steps at the target rate without pacing.
    pub fn run_fixed(&mut self, ticks: u64) {
        let dt = self.config.fixed_delta();
        for _ in 0..ticks {
            self.step(dt);
        }
    }

    fn end_frame(&mut self, stats: FrameStats, elapsed: Duration) {
        let budget = self.config.frame_budget();
        self.frame_count += 1;
        self.stats_accumulator.record(stats, budget);

        if self.config.log_slow_frames && elapsed > budget {
            warn!(
                frame = stats.frame,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = budget.as_secs_f64() * 1000.0,
                "tick exceeded frame budget"
            );
        }
    }

    /// Suspends frame production while the surface is hidden, and resumes
    /// it once visible again.
    pub fn set_visible(&self, visible: bool) {
        info!(visible, "surface visibility changed");
        self.queue.set_writable(visible);
    }

    /// Starts a render thread consuming this engine's queue.
    ///
    /// # Errors
    ///
    /// Fails if the thread cannot be spawned.
    pub fn spawn_render_thread<B: RenderBackend + Send + 'static>(
        &self,
        backend: B,
    ) -> EngineResult<RenderThread<B>> {
        RenderThread::spawn(Arc::clone(&self.queue), Arc::clone(&self.textures), backend)
    }

    /// Connects the network pass to a peer link.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NetworkDisabled`] if the network pass is not
    /// registered.
    pub fn set_network_api(&mut self, api: Box<dyn NetworkApi>) -> EngineResult<()> {
        let network = self
            .world
            .system_mut::<NetworkSystem>()
            .ok_or(EngineError::NetworkDisabled)?;
        network.set_api(api);
        Ok(())
    }

    /// Replicates `entity`'s component of `system` at the configured
    /// default period, attaching a network component if needed.
    ///
    /// # Errors
    ///
    /// Fails if networking is disabled or the entity is unknown.
    pub fn replicate(&mut self, entity: Entity, system: &str) -> EngineResult<()> {
        let attached = self
            .world
            .system::<NetworkSystem>()
            .ok_or(EngineError::NetworkDisabled)?
            .table()
            .contains(entity);
        if !attached {
            self.world.add_component::<NetworkSystem>(entity)?;
        }

        let period = self.config.network.default_update_period;
        self.world
            .component_mut::<NetworkSystem>(entity)?
            .replicate(system, period);
        Ok(())
    }

    /// Shorthand for the registered rendering pass.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if it was unregistered.
    pub fn rendering_mut(&mut self) -> EngineResult<&mut RenderingSystem> {
        self.world
            .system_mut::<RenderingSystem>()
            .ok_or_else(|| EcsError::UnknownSystem(RenderingSystem::NAME.to_owned()).into())
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The world, mutably.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared render queue.
    #[must_use]
    pub fn queue(&self) -> Arc<RenderQueue> {
        Arc::clone(&self.queue)
    }

    /// Shared texture library.
    #[must_use]
    pub fn textures(&self) -> Arc<TextureLibrary> {
        Arc::clone(&self.textures)
    }

    /// Number of completed ticks.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Accumulated tick statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

/// Accumulator for tick statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameStatsAccumulator {
    /// Ticks recorded.
    pub frames_recorded: u64,
    /// Sum of tick times.
    pub total_us_sum: u64,
    /// Fastest tick.
    pub min_frame_us: u64,
    /// Slowest tick.
    pub max_frame_us: u64,
    /// Ticks over the frame budget.
    pub frames_over_budget: u64,
    /// Ticks whose delta was clamped.
    pub frames_clamped: u64,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            frames_clamped: 0,
        }
    }

    /// Records one tick against `budget`.
    pub fn record(&mut self, stats: FrameStats, budget: Duration) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);

        if u128::from(stats.total_us) > budget.as_micros() {
            self.frames_over_budget += 1;
        }
        if stats.clamped {
            self.frames_clamped += 1;
        }
    }

    /// Average tick time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Share of ticks over budget, in `0.0..=1.0`.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a one-line summary.
    pub fn log_summary(&self) {
        info!(
            frames = self.frames_recorded,
            avg_ms = self.avg_frame_ms(),
            max_us = self.max_frame_us,
            over_budget = self.frames_over_budget,
            clamped = self.frames_clamped,
            "tick statistics"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::EntityKind;

    #[test]
    fn test_engine_creation() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.frame_count(), 0);
        assert!(engine.world().system::<TransformSystem>().is_some());
        assert!(engine.world().system::<RenderingSystem>().is_some());
        assert!(engine.world().system::<NetworkSystem>().is_none());
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let stats = engine.step(5.0);
        assert!(stats.clamped);
        assert!((stats.delta_time - 0.1).abs() < f32::EPSILON);

        let stats = engine.step(0.016);
        assert!(!stats.clamped);
        assert_eq!(stats.frame, 1);
        assert_eq!(engine.stats().frames_clamped, 1);
        assert_eq!(engine.stats().frames_recorded, 2);
    }

    #[test]
    fn test_replicate_requires_network() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let e = engine.world_mut().create_entity(EntityKind::Persistent);
        assert!(matches!(
            engine.replicate(e, TransformSystem::NAME),
            Err(EngineError::NetworkDisabled)
        ));
    }

    #[test]
    fn test_replicate_attaches_once() {
        let mut config = EngineConfig::default();
        config.network.enabled = true;
        let mut engine = Engine::new(config).unwrap();
        let e = engine.world_mut().create_entity(EntityKind::Persistent);

        engine.replicate(e, TransformSystem::NAME).unwrap();
        engine.replicate(e, RenderingSystem::NAME).unwrap();

        let network = engine.world().component::<NetworkSystem>(e).unwrap();
        assert_eq!(network.system_update_period.len(), 2);
    }

    #[test]
    fn test_accumulator_budget() {
        let mut acc = FrameStatsAccumulator::new();
        let budget = Duration::from_millis(16);
        acc.record(
            FrameStats {
                total_us: 20_000,
                ..FrameStats::default()
            },
            budget,
        );
        acc.record(
            FrameStats {
                total_us: 10_000,
                ..FrameStats::default()
            },
            budget,
        );
        assert_eq!(acc.frames_over_budget, 1);
        assert!((acc.avg_frame_ms() - 15.0).abs() < 1e-9);
        assert!((acc.over_budget_ratio() - 0.5).abs() < 1e-9);
        assert_eq!(acc.min_frame_us, 10_000);
    }
}
