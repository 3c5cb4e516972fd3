//! How a pass uses an image.

use ash::vk;

use crate::handle::RenderImageHandle;

/// Layout, stage and access of one image use by a pass.
///
/// For outputs, `layout` is the layout the image is left in after the pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureUsage {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub handle: RenderImageHandle,
}

impl TextureUsage {
    pub const fn new(
        handle: RenderImageHandle,
        layout: vk::ImageLayout,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        Self {
            layout,
            stage,
            access,
            handle,
        }
    }

    /// Rendered to as a color attachment.
    pub const fn color_attachment_write(handle: RenderImageHandle) -> Self {
        Self::new(
            handle,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        )
    }

    /// Rendered to as a depth attachment.
    pub const fn depth_attachment_write(handle: RenderImageHandle) -> Self {
        Self::new(
            handle,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    }

    /// Sampled in a fragment shader.
    pub const fn fragment_sampled(handle: RenderImageHandle) -> Self {
        Self::new(
            handle,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_READ,
        )
    }

    /// Sampled in a compute shader.
    pub const fn compute_sampled(handle: RenderImageHandle) -> Self {
        Self::new(
            handle,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_READ,
        )
    }

    /// Written as a storage image from a compute shader.
    pub const fn compute_storage_write(handle: RenderImageHandle) -> Self {
        Self::new(
            handle,
            vk::ImageLayout::GENERAL,
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_WRITE,
        )
    }

    /// Contents and layout carried over from outside the graph.
    pub const fn external(handle: RenderImageHandle, layout: vk::ImageLayout) -> Self {
        Self::new(
            handle,
            layout,
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_WRITE,
        )
    }
}

/// Ordered inputs and outputs of a pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderPassIo {
    pub inputs: Vec<TextureUsage>,
    pub outputs: Vec<TextureUsage>,
}

impl RenderPassIo {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn read(mut self, usage: TextureUsage) -> Self {
        self.inputs.push(usage);
        self
    }

    #[must_use]
    pub fn write(mut self, usage: TextureUsage) -> Self {
        self.outputs.push(usage);
        self
    }

    pub fn reads(&self, handle: RenderImageHandle) -> bool {
        self.inputs.iter().any(|usage| usage.handle == handle)
    }

    pub fn writes(&self, handle: RenderImageHandle) -> bool {
        self.outputs.iter().any(|usage| usage.handle == handle)
    }

    /// Whether any output of `self` is an input of `other`.
    pub fn feeds(&self, other: &Self) -> bool {
        self.outputs.iter().any(|usage| other.reads(usage.handle))
    }
}
