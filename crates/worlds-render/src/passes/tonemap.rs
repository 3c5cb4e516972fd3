//! Tonemap and composite compute pass.

use crate::handle::RenderImageHandle;
use crate::pass::{RenderCtx, RenderPass};
use crate::usage::{RenderPassIo, TextureUsage};

use super::dispatch_size;

/// Tonemaps HDR, adds bloom if present and composites the UI into the output.
#[derive(Debug)]
pub struct TonemapPass {
    hdr: RenderImageHandle,
    ui: RenderImageHandle,
    bloom: Option<RenderImageHandle>,
    output: RenderImageHandle,
    extent: (u32, u32),
}

impl TonemapPass {
    pub const fn new(
        hdr: RenderImageHandle,
        ui: RenderImageHandle,
        output: RenderImageHandle,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            hdr,
            ui,
            bloom: None,
            output,
            extent: (width, height),
        }
    }

    #[must_use]
    pub const fn with_bloom(mut self, bloom: RenderImageHandle) -> Self {
        self.bloom = Some(bloom);
        self
    }
}

impl RenderPass for TonemapPass {
    fn name(&self) -> &str {
        "tonemap"
    }

    fn io(&self) -> RenderPassIo {
        let mut io = RenderPassIo::new()
            .read(TextureUsage::compute_sampled(self.hdr))
            .read(TextureUsage::compute_sampled(self.ui));
        if let Some(bloom) = self.bloom {
            io = io.read(TextureUsage::compute_sampled(bloom));
        }
        io.write(TextureUsage::compute_storage_write(self.output))
    }

    fn execute(&mut self, ctx: &mut RenderCtx<'_>) {
        ctx.cmd.dispatch(dispatch_size(self.extent.0, self.extent.1));
    }
}
