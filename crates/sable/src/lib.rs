//! # SABLE Engine
//!
//! Ties the core, rendering and networking crates into a runnable engine.
//!
//! ## Threads
//!
//! ```text
//! SIMULATION THREAD                       RENDER THREAD
//!   Engine::step(dt)                        RenderLoop
//!     Transformation pass                     delayed texture jobs
//!     Rendering pass ── publish ──► queue ──► wait frame, draw runs
//!     Network pass                            release buffer
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sable::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::from_file("sable.toml")?)?;
//! let render = engine.spawn_render_thread(MyBackend::new())?;
//! engine.run_fixed(600);
//! let (_backend, stats) = render.shutdown()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod game_loop;
pub mod render_thread;

pub use config::{EngineConfig, NetworkConfig, RenderConfig};
pub use error::{EngineError, EngineResult};
pub use game_loop::{Engine, FrameStats, FrameStatsAccumulator};
pub use render_thread::{RenderThread, RENDER_THREAD_NAME};

