//! UI overlay pass.

use crate::handle::RenderImageHandle;
use crate::pass::{DrawCall, RenderCtx, RenderPass};
use crate::usage::{RenderPassIo, TextureUsage};

/// Bytes per UI vertex: position, uv and packed color.
const UI_VERTEX_BYTES: usize = 20;

/// Draws UI quads into a separate target composited by the tonemap pass.
#[derive(Debug)]
pub struct UiPass {
    target: RenderImageHandle,
    quads: u32,
}

impl UiPass {
    pub const fn new(target: RenderImageHandle) -> Self {
        Self { target, quads: 0 }
    }

    /// Number of quads drawn each frame.
    pub fn set_quads(&mut self, quads: u32) {
        self.quads = quads;
    }

    const fn vertex_count(&self) -> u32 {
        self.quads * 6
    }
}

impl RenderPass for UiPass {
    fn name(&self) -> &str {
        "ui"
    }

    fn io(&self) -> RenderPassIo {
        RenderPassIo::new().write(TextureUsage::color_attachment_write(self.target))
    }

    fn pre_pass(&mut self, ctx: &mut RenderCtx<'_>) {
        if self.quads > 0 {
            ctx.cmd
                .upload("ui vertices", self.vertex_count() as usize * UI_VERTEX_BYTES);
        }
    }

    fn execute(&mut self, ctx: &mut RenderCtx<'_>) {
        if self.quads > 0 {
            ctx.cmd.draw(DrawCall {
                material_slot: None,
                vertex_count: self.vertex_count(),
                instance_count: 1,
            });
        }
    }
}
