//! # Rendering Error Types

use thiserror::Error;

use crate::command::TextureRef;

/// Errors raised by the rendering pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No texture is registered under this name.
    #[error("texture '{0}' is not registered")]
    UnknownTexture(String),

    /// The texture lives in an atlas and cannot be unloaded on its own.
    #[error("texture {0:?} belongs to an atlas")]
    AtlasTexture(TextureRef),

    /// A draw appeared outside a camera run.
    #[error("draw at index {index} outside a camera run")]
    OrphanDraw {
        /// Position in the frame.
        index: usize,
    },

    /// An end marker appeared outside a camera run.
    #[error("end marker at index {index} outside a camera run")]
    UnexpectedEnd {
        /// Position in the frame.
        index: usize,
    },

    /// Begin and end markers of a run carry different frame numbers.
    #[error("camera run opened in frame {begin} but closed in frame {end}")]
    MarkerMismatch {
        /// Frame number of the begin marker.
        begin: u64,
        /// Frame number of the end marker.
        end: u64,
    },

    /// A camera run was never closed.
    #[error("camera run of frame {frame} is not terminated")]
    UnterminatedRun {
        /// Frame number of the open run.
        frame: u64,
    },

    /// The render queue has been shut down.
    #[error("render queue is closed")]
    Closed,
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
