//! # Render Thread
//!
//! Owns the platform backend on a dedicated thread and drives a
//! [`RenderLoop`] until the queue is closed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use sable_rendering::{RenderBackend, RenderLoop, RenderLoopStats, RenderQueue, TextureLibrary};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// Name given to the spawned thread.
pub const RENDER_THREAD_NAME: &str = "sable-render";

/// Handle to a running render thread.
///
/// Dropping the handle closes the queue and joins the thread.
#[derive(Debug)]
pub struct RenderThread<B: RenderBackend + Send + 'static> {
    queue: Arc<RenderQueue>,
    handle: Option<JoinHandle<(B, RenderLoopStats)>>,
}

impl<B: RenderBackend + Send + 'static> RenderThread<B> {
    /// Moves `backend` onto a new thread consuming `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderThreadSpawn`] if the OS refuses the thread.
    pub fn spawn(
        queue: Arc<RenderQueue>,
        textures: Arc<TextureLibrary>,
        mut backend: B,
    ) -> EngineResult<Self> {
        let render_loop = RenderLoop::new(Arc::clone(&queue), textures);
        let handle = thread::Builder::new()
            .name(RENDER_THREAD_NAME.to_owned())
            .spawn(move || {
                let stats = render_loop.run(&mut backend);
                (backend, stats)
            })
            .map_err(EngineError::RenderThreadSpawn)?;
        info!(thread = RENDER_THREAD_NAME, "render thread spawned");

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// Returns true while the thread has not exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Closes the queue, waits for the thread and hands the backend back.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RenderThreadPanicked`] if the thread panicked.
    pub fn shutdown(mut self) -> EngineResult<(B, RenderLoopStats)> {
        self.join().ok_or(EngineError::RenderThreadPanicked)
    }

    fn join(&mut self) -> Option<(B, RenderLoopStats)> {
        let handle = self.handle.take()?;
        self.queue.close();
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!(thread = RENDER_THREAD_NAME, "render thread panicked");
                None
            }
        }
    }
}

impl<B: RenderBackend + Send + 'static> Drop for RenderThread<B> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}
