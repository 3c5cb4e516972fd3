//! Depth-only shadow map pass.

use tracing::trace;

use crate::handle::RenderImageHandle;
use crate::pass::{DrawCall, RenderCtx, RenderPass};
use crate::usage::{RenderPassIo, TextureUsage};

/// Renders shadow casters into a depth image.
#[derive(Debug)]
pub struct ShadowMapPass {
    target: RenderImageHandle,
    caster_vertices: u32,
}

impl ShadowMapPass {
    pub const fn new(target: RenderImageHandle) -> Self {
        Self {
            target,
            caster_vertices: 36,
        }
    }

    /// Vertex count of the caster batch.
    #[must_use]
    pub const fn with_caster_vertices(mut self, count: u32) -> Self {
        self.caster_vertices = count;
        self
    }
}

impl RenderPass for ShadowMapPass {
    fn name(&self) -> &str {
        "shadow_map"
    }

    fn io(&self) -> RenderPassIo {
        RenderPassIo::new().write(TextureUsage::depth_attachment_write(self.target))
    }

    fn execute(&mut self, ctx: &mut RenderCtx<'_>) {
        if self.caster_vertices == 0 {
            trace!("no shadow casters");
            return;
        }
        ctx.cmd.draw(DrawCall {
            material_slot: None,
            vertex_count: self.caster_vertices,
            instance_count: 1,
        });
    }
}
