//! Render graph error types.

use thiserror::Error;
use worlds_resources::SlotError;

use crate::handle::RenderImageHandle;

/// Render graph errors.
///
/// All of these describe a malformed graph or exhausted capacity. They abort
/// frame construction and are never retried.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The pass graph contains a cycle.
    #[error("circular dependency detected between passes: {}", .passes.join(" -> "))]
    CircularDependency {
        /// Pass names along the cycle, first pass repeated at the end.
        passes: Vec<String>,
    },

    /// Two passes write the same image.
    #[error("image {handle} is written by both {first} and {second}")]
    MultipleWriters {
        /// Contended image.
        handle: RenderImageHandle,
        /// Earlier writer.
        first: String,
        /// Later writer.
        second: String,
    },

    /// A pass reads an image that nothing wrote or imported.
    #[error("pass {pass} reads image {handle} with undefined layout (no writer or import)")]
    UndefinedLayout {
        /// Image read.
        handle: RenderImageHandle,
        /// Reading pass.
        pass: String,
    },

    /// A pass id from before the last `clear`.
    #[error("stale pass id {index} (generation {generation})")]
    StalePass {
        /// Arena index.
        index: u32,
        /// Generation the id was issued in.
        generation: u32,
    },

    /// A frame graph was recorded before it was built.
    #[error("frame graph recorded before build")]
    NotBuilt,

    /// A pass failed to acquire its resources during setup.
    #[error("pass {pass} setup failed: {source}")]
    Setup {
        /// Pass name.
        pass: String,
        /// Underlying slot error.
        #[source]
        source: SlotError,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GraphError>;
