//! Render pass graph for the Worlds frame core.
//!
//! This crate provides:
//! - [`GraphSolver`], which orders passes by image dependencies and derives barriers
//! - The [`RenderPass`] trait and the standard pass set
//! - [`FrameGraph`], the per-render-target build and record loop
//! - [`EngineContext`], the services passes reach during setup and recording

pub mod barrier;
pub mod context;
pub mod error;
pub mod frame;
pub mod handle;
pub mod pass;
pub mod passes;
pub mod solver;
pub mod usage;

pub use barrier::ImageBarrier;
pub use context::{EngineConfig, EngineContext};
pub use error::{GraphError, Result};
pub use frame::{FrameConfig, FrameGraph, SceneDesc};
pub use handle::{infer_image_aspect, AspectTable, ImageDesc, RenderImageHandle, RenderImages};
pub use pass::{Command, CommandLog, CommandRecorder, DrawCall, RenderCtx, RenderPass, SetupCtx};
pub use solver::{GraphSolver, PassId};
pub use usage::{RenderPassIo, TextureUsage};
