//! Forward opaque geometry pass.

use tracing::{debug, warn};

use crate::error::{GraphError, Result};
use crate::handle::RenderImageHandle;
use crate::pass::{DrawCall, RenderCtx, RenderPass, SetupCtx};
use crate::usage::{RenderPassIo, TextureUsage};

/// Draws opaque geometry into the HDR target, sampling the shadow map.
///
/// Materials and the optional environment cubemap are resolved to slot
/// indices during setup; a draw is recorded per material.
#[derive(Debug)]
pub struct OpaquePass {
    shadow_map: RenderImageHandle,
    hdr: RenderImageHandle,
    materials: Vec<String>,
    environment: Option<String>,
    material_slots: Vec<u32>,
    environment_slot: Option<u32>,
}

impl OpaquePass {
    pub const fn new(shadow_map: RenderImageHandle, hdr: RenderImageHandle) -> Self {
        Self {
            shadow_map,
            hdr,
            materials: Vec::new(),
            environment: None,
            material_slots: Vec::new(),
            environment_slot: None,
        }
    }

    /// Material documents to draw with.
    #[must_use]
    pub fn with_materials<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.materials = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Environment cubemap document used for ambient lighting.
    #[must_use]
    pub fn with_environment(mut self, path: impl Into<String>) -> Self {
        self.environment = Some(path.into());
        self
    }

    /// Material slots resolved by the last setup.
    pub fn material_slots(&self) -> &[u32] {
        &self.material_slots
    }

    /// Cubemap slot resolved by the last setup.
    pub const fn environment_slot(&self) -> Option<u32> {
        self.environment_slot
    }

    fn setup_error(&self, source: worlds_resources::SlotError) -> GraphError {
        GraphError::Setup {
            pass: self.name().to_string(),
            source,
        }
    }
}

impl RenderPass for OpaquePass {
    fn name(&self) -> &str {
        "opaque"
    }

    fn io(&self) -> RenderPassIo {
        RenderPassIo::new()
            .read(TextureUsage::fragment_sampled(self.shadow_map))
            .write(TextureUsage::color_attachment_write(self.hdr))
    }

    fn setup(&mut self, ctx: &mut SetupCtx<'_>) -> Result<()> {
        let resources = &ctx.engine.resources;

        let mut slots = Vec::with_capacity(self.materials.len());
        for path in &self.materials {
            let id = ctx.engine.assets.add_or_get_existing(path);
            let slot = resources
                .materials
                .load_or_get(id)
                .map_err(|err| self.setup_error(err))?;
            slots.push(slot);
        }
        slots.dedup();
        self.material_slots = slots;

        self.environment_slot = match &self.environment {
            Some(path) => {
                let id = ctx.engine.assets.add_or_get_existing(path);
                Some(
                    resources
                        .cubemaps
                        .load_or_get(id)
                        .map_err(|err| self.setup_error(err))?,
                )
            }
            None => None,
        };

        if self.material_slots.is_empty() {
            warn!("opaque pass has no materials");
        }
        debug!(
            materials = ?self.material_slots,
            environment = ?self.environment_slot,
            "opaque pass resolved slots"
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RenderCtx<'_>) {
        for &slot in &self.material_slots {
            ctx.cmd.draw(DrawCall {
                material_slot: Some(slot),
                vertex_count: 36,
                instance_count: 1,
            });
        }
    }
}
