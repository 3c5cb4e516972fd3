//! Bloom blur compute pass.

use crate::handle::RenderImageHandle;
use crate::pass::{RenderCtx, RenderPass};
use crate::usage::{RenderPassIo, TextureUsage};

use super::dispatch_size;

/// Blurs the HDR target into a half-resolution bloom image.
#[derive(Debug)]
pub struct BlurPass {
    hdr: RenderImageHandle,
    bloom: RenderImageHandle,
    extent: (u32, u32),
}

impl BlurPass {
    /// `width` and `height` are the bloom image size.
    pub const fn new(
        hdr: RenderImageHandle,
        bloom: RenderImageHandle,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            hdr,
            bloom,
            extent: (width, height),
        }
    }
}

impl RenderPass for BlurPass {
    fn name(&self) -> &str {
        "blur"
    }

    fn io(&self) -> RenderPassIo {
        RenderPassIo::new()
            .read(TextureUsage::compute_sampled(self.hdr))
            .write(TextureUsage::compute_storage_write(self.bloom))
    }

    fn execute(&mut self, ctx: &mut RenderCtx<'_>) {
        ctx.cmd.dispatch(dispatch_size(self.extent.0, self.extent.1));
    }
}
