//! Render Loop - consumer side of the command queue
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 ITERATION                    │
//! ├──────────────────────────────────────────────┤
//! │  1. Run delayed texture jobs                 │
//! │  2. Wait for a frame                         │
//! │     ├── Frame     -> draw every camera run   │
//! │     ├── Suspended -> block until resumed     │
//! │     └── Closed    -> exit                    │
//! │  3. Release the buffer (render done)         │
//! └──────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace};

use crate::command::{FrameMarker, RenderCommand};
use crate::queue::{FrameGuard, FrameWait, RenderQueue};
use crate::texture::{GpuTexture, TextureBackend, TextureLibrary};

/// Platform renderer driven by the render thread.
pub trait RenderBackend: TextureBackend {
    /// Sets up the viewport and projection of a camera.
    fn begin_camera(&mut self, marker: &FrameMarker);

    /// Issues one draw. `texture` is `None` for flat quads and textures not
    /// uploaded yet.
    fn draw(&mut self, command: &RenderCommand, texture: Option<GpuTexture>);

    /// Finishes a camera run.
    fn end_camera(&mut self, frame: u64);
}

/// Draws every camera run of `frame`. Returns the number of draws issued.
pub fn render_frame<B: RenderBackend>(
    frame: &FrameGuard<'_>,
    textures: &TextureLibrary,
    backend: &mut B,
) -> usize {
    let mut draws = 0;
    for run in frame.runs() {
        backend.begin_camera(&run.marker);
        for command in run.draws() {
            let texture = if command.texture.is_invalid() {
                None
            } else {
                textures.gpu_texture(command.texture)
            };
            backend.draw(command, texture);
            draws += 1;
        }
        backend.end_camera(run.marker.frame);
    }
    draws
}

/// Statistics for the render loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderLoopStats {
    /// Frames drawn
    pub total_frames: u64,
    /// Draw calls issued
    pub total_draws: u64,
    /// Average frame time (microseconds)
    pub avg_frame_time_us: u32,
    /// Worst frame time (microseconds)
    pub worst_frame_time_us: u32,
    /// Times the loop blocked on a suspended queue
    pub suspensions: u32,
    /// Textures and atlases uploaded by the delayed job pass
    pub textures_loaded: u32,
    /// Failed uploads
    pub texture_failures: u32,
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    /// A frame was drawn.
    Rendered {
        /// Draw calls issued.
        draws: usize,
    },
    /// The queue was suspended and has been resumed.
    Resumed,
    /// The queue was closed.
    Closed,
}

/// Render thread driver.
#[derive(Debug)]
pub struct RenderLoop {
    queue: Arc<RenderQueue>,
    textures: Arc<TextureLibrary>,
    stats: RenderLoopStats,
}

impl RenderLoop {
    /// Creates a loop consuming `queue`.
    #[must_use]
    pub fn new(queue: Arc<RenderQueue>, textures: Arc<TextureLibrary>) -> Self {
        Self {
            queue,
            textures,
            stats: RenderLoopStats::default(),
        }
    }

    /// Runs one iteration, blocking until there is something to do.
    pub fn step<B: RenderBackend>(&mut self, backend: &mut B) -> LoopStep {
        let jobs = self.textures.process_delayed_jobs(backend);
        self.stats.textures_loaded += jobs.textures_loaded + jobs.atlases_loaded;
        self.stats.texture_failures += jobs.failures;

        let queue = Arc::clone(&self.queue);
        let step = match queue.wait_frame() {
            FrameWait::Frame(frame) => {
                let start = Instant::now();
                let draws = render_frame(&frame, &self.textures, backend);
                drop(frame);
                self.record_frame(start, draws);
                LoopStep::Rendered { draws }
            }
            FrameWait::Suspended => {
                self.stats.suspensions += 1;
                debug!("render queue suspended");
                if self.queue.wait_resumed() {
                    LoopStep::Resumed
                } else {
                    LoopStep::Closed
                }
            }
            FrameWait::Closed => LoopStep::Closed,
        };
        step
    }

    /// Runs until the queue is closed.
    pub fn run<B: RenderBackend>(mut self, backend: &mut B) -> RenderLoopStats {
        info!("render loop started");
        while self.step(backend) != LoopStep::Closed {}
        info!(
            frames = self.stats.total_frames,
            draws = self.stats.total_draws,
            "render loop stopped"
        );
        self.stats
    }

    /// Statistics so far.
    #[must_use]
    pub fn stats(&self) -> RenderLoopStats {
        self.stats
    }

    fn record_frame(&mut self, start: Instant, draws: usize) {
        let elapsed = u32::try_from(start.elapsed().as_micros()).unwrap_or(u32::MAX);
        let stats = &mut self.stats;
        stats.total_frames += 1;
        stats.total_draws += draws as u64;
        stats.worst_frame_time_us = stats.worst_frame_time_us.max(elapsed);

        // Running average
        let n = stats.total_frames;
        let avg = (u64::from(stats.avg_frame_time_us) * (n - 1) + u64::from(elapsed)) / n;
        stats.avg_frame_time_us = u32::try_from(avg).unwrap_or(u32::MAX);
        trace!(frame = stats.total_frames, draws, elapsed_us = elapsed, "frame drawn");
    }
}
