//! The render pass interface and command recording seam.

use crate::barrier::ImageBarrier;
use crate::context::EngineContext;
use crate::error::Result;
use crate::handle::RenderImages;
use crate::usage::RenderPassIo;

/// Context available to a pass while it acquires resources.
pub struct SetupCtx<'a> {
    pub engine: &'a EngineContext,
    pub images: &'a RenderImages,
}

/// Context available to a pass while recording a frame.
pub struct RenderCtx<'a> {
    pub cmd: &'a mut dyn CommandRecorder,
    pub engine: &'a EngineContext,
    pub images: &'a RenderImages,
    pub frame_index: u64,
}

/// A unit of GPU work with declared image inputs and outputs.
pub trait RenderPass: Send {
    /// Debug name.
    fn name(&self) -> &str;

    /// Images read and written. Must not change between setup and recording.
    fn io(&self) -> RenderPassIo;

    /// Acquire pipelines and resources. Called once before the graph is solved.
    fn setup(&mut self, _ctx: &mut SetupCtx<'_>) -> Result<()> {
        Ok(())
    }

    /// Work recorded before any pass's barriers, e.g. uploads.
    fn pre_pass(&mut self, _ctx: &mut RenderCtx<'_>) {}

    /// Record the pass.
    fn execute(&mut self, ctx: &mut RenderCtx<'_>);
}

/// A draw recorded by a geometry pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCall {
    /// Material table slot, `None` for depth-only draws.
    pub material_slot: Option<u32>,
    pub vertex_count: u32,
    pub instance_count: u32,
}

/// Receives the commands a frame records. Implemented by the GPU backend.
pub trait CommandRecorder {
    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier]);
    fn upload(&mut self, label: &str, bytes: usize);
    fn begin_pass(&mut self, name: &str);
    fn end_pass(&mut self);
    fn draw(&mut self, draw: DrawCall);
    fn dispatch(&mut self, groups: [u32; 3]);
}

/// A recorded command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Barrier(Vec<ImageBarrier>),
    Upload { label: String, bytes: usize },
    BeginPass(String),
    EndPass,
    Draw(DrawCall),
    Dispatch([u32; 3]),
}

/// Recorder that stores commands in memory.
#[derive(Debug, Default)]
pub struct CommandLog {
    pub commands: Vec<Command>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of passes in the order they began.
    pub fn pass_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginPass(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl CommandRecorder for CommandLog {
    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier]) {
        self.commands.push(Command::Barrier(barriers.to_vec()));
    }

    fn upload(&mut self, label: &str, bytes: usize) {
        self.commands.push(Command::Upload {
            label: label.to_string(),
            bytes,
        });
    }

    fn begin_pass(&mut self, name: &str) {
        self.commands.push(Command::BeginPass(name.to_string()));
    }

    fn end_pass(&mut self) {
        self.commands.push(Command::EndPass);
    }

    fn draw(&mut self, draw: DrawCall) {
        self.commands.push(Command::Draw(draw));
    }

    fn dispatch(&mut self, groups: [u32; 3]) {
        self.commands.push(Command::Dispatch(groups));
    }
}
