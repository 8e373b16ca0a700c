//! # Sable Rendering
//!
//! 2D draw command pipeline between the simulation and render threads:
//! - The rendering system builds sorted, clipped draw lists per camera
//! - A double-buffered queue hands each frame to the render thread
//! - The texture library defers every GPU upload to the render thread
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SIMULATION THREAD                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transform + Rendering components                           │
//! │       ↓                                                     │
//! │  Visibility → Trim/Split → Clip → Sort → FrameWriter        │
//! └───────────────────────────────┬─────────────────────────────┘
//!                                 │ publish (swap + frame ready)
//! ┌───────────────────────────────┴─────────────────────────────┐
//! │                      RENDER THREAD                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Delayed texture jobs → FrameGuard → RenderBackend          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - The consumer never mutates commands
//! - Neither side blocks while the queue is suspended
//! - GPU calls only happen on the render thread

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod camera;
pub mod clip;
pub mod command;
pub mod consumer;
pub mod error;
pub mod queue;
pub mod sort;
pub mod system;
pub mod texture;

pub use camera::Camera;
pub use command::{EffectRef, FrameMarker, QueuedCommand, RenderCommand, RenderFlags, TextureRef};
pub use consumer::{render_frame, LoopStep, RenderBackend, RenderLoop, RenderLoopStats};
pub use error::{RenderError, RenderResult};
pub use queue::{
    validate_frame, CameraRun, CameraRuns, FrameGuard, FrameWait, FrameWriter, QueueStats,
    RenderQueue,
};
pub use sort::{sort_opaque, sort_translucent, DEFAULT_SORT_EPSILON};
pub use system::{Opacity, RenderSettings, RenderingComponent, RenderingSystem};
pub use texture::{
    AtlasEntry, DelayedJobStats, GpuTexture, TextureBackend, TextureInfo, TextureLibrary,
};
