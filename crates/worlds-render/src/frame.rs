//! Per-render-target frame orchestration.
//!
//! A [`FrameGraph`] owns the passes and images of one render target. `build`
//! runs pass setup and solves the graph once; `record` replays the solved
//! order and barriers into a [`CommandRecorder`] every frame.

use ash::vk;
use tracing::{debug, info};

use crate::barrier::ImageBarrier;
use crate::context::EngineContext;
use crate::error::{GraphError, Result};
use crate::handle::{ImageDesc, RenderImageHandle, RenderImages};
use crate::pass::{CommandRecorder, RenderCtx, RenderPass, SetupCtx};
use crate::passes::{BlurPass, OpaquePass, ShadowMapPass, TonemapPass, UiPass};
use crate::solver::{GraphSolver, PassId};
use crate::usage::TextureUsage;

/// Sizes and toggles of the standard frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Shadow map edge length in pixels.
    pub shadow_resolution: u32,
    /// Add the bloom blur pass.
    pub enable_blur: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            shadow_resolution: 2048,
            enable_blur: false,
        }
    }
}

impl FrameConfig {
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub const fn with_blur(mut self, enable: bool) -> Self {
        self.enable_blur = enable;
        self
    }
}

/// Assets drawn by the standard frame graph.
#[derive(Debug, Clone, Default)]
pub struct SceneDesc {
    /// Material document paths.
    pub materials: Vec<String>,
    /// Environment cubemap document path.
    pub environment: Option<String>,
    /// UI quads drawn per frame.
    pub ui_quads: u32,
}

/// Format of the HDR and bloom targets.
pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Format of the shadow map.
pub const SHADOW_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
/// Format of the UI and output targets.
pub const OUTPUT_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Passes, images and solved schedule of one render target.
#[derive(Debug, Default)]
pub struct FrameGraph {
    solver: GraphSolver,
    images: RenderImages,
    order: Vec<PassId>,
    barriers: Vec<Vec<ImageBarrier>>,
    output: Option<RenderImageHandle>,
    built: bool,
    frame_index: u64,
}

impl FrameGraph {
    /// Empty graph. Add images and passes, then call [`FrameGraph::build`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Shadow map, opaque, UI, optional blur and tonemap.
    pub fn standard(config: &FrameConfig) -> Self {
        Self::standard_with_scene(config, SceneDesc::default())
    }

    /// Standard graph drawing `scene`.
    pub fn standard_with_scene(config: &FrameConfig, scene: SceneDesc) -> Self {
        let mut graph = Self::new();
        let (width, height) = (config.width, config.height);

        let shadow = graph.create_image(ImageDesc::new(
            "shadow_map",
            SHADOW_FORMAT,
            config.shadow_resolution,
            config.shadow_resolution,
        ));
        let hdr = graph.create_image(ImageDesc::new("hdr", HDR_FORMAT, width, height));
        let ui = graph.create_image(ImageDesc::new("ui", OUTPUT_FORMAT, width, height));
        let output = graph.create_image(ImageDesc::new("output", OUTPUT_FORMAT, width, height));

        graph.add_pass(ShadowMapPass::new(shadow));

        let mut opaque = OpaquePass::new(shadow, hdr).with_materials(scene.materials);
        if let Some(environment) = scene.environment {
            opaque = opaque.with_environment(environment);
        }
        graph.add_pass(opaque);

        let mut ui_pass = UiPass::new(ui);
        ui_pass.set_quads(scene.ui_quads);
        graph.add_pass(ui_pass);

        let mut tonemap = TonemapPass::new(hdr, ui, output, width, height);
        if config.enable_blur {
            let (bloom_width, bloom_height) = ((width / 2).max(1), (height / 2).max(1));
            let bloom = graph.create_image(ImageDesc::new(
                "bloom",
                HDR_FORMAT,
                bloom_width,
                bloom_height,
            ));
            graph.add_pass(BlurPass::new(hdr, bloom, bloom_width, bloom_height));
            tonemap = tonemap.with_bloom(bloom);
        }
        graph.add_pass(tonemap);

        graph.set_output(output);
        graph
    }

    pub fn create_image(&mut self, desc: ImageDesc) -> RenderImageHandle {
        self.images.create(desc)
    }

    /// Add a pass. The graph must be built again before recording.
    pub fn add_pass(&mut self, pass: impl RenderPass + 'static) -> PassId {
        self.built = false;
        self.solver.add_node(Box::new(pass))
    }

    /// Seed the layout of an image no pass writes.
    pub fn import_image(&mut self, usage: TextureUsage) {
        self.built = false;
        self.solver.import_image(usage);
    }

    /// Image presented after the frame.
    pub fn set_output(&mut self, handle: RenderImageHandle) {
        self.output = Some(handle);
    }

    pub const fn output(&self) -> Option<RenderImageHandle> {
        self.output
    }

    pub const fn images(&self) -> &RenderImages {
        &self.images
    }

    pub const fn solver(&self) -> &GraphSolver {
        &self.solver
    }

    pub const fn is_built(&self) -> bool {
        self.built
    }

    /// Frames recorded so far.
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run every pass's setup, then solve the order and barriers.
    pub fn build(&mut self, engine: &EngineContext) -> Result<()> {
        self.built = false;

        let images = &self.images;
        for pass in self.solver.passes_mut() {
            let mut ctx = SetupCtx { engine, images };
            pass.setup(&mut ctx)?;
        }

        let order = self.solver.solve()?;
        let barriers = self
            .solver
            .create_image_barriers(&order, &self.images.aspect_table())?;

        self.order = order;
        self.barriers = barriers;
        self.built = true;

        info!(
            passes = self.order.len(),
            barriers = self.barriers.iter().map(Vec::len).sum::<usize>(),
            "frame graph built"
        );
        Ok(())
    }

    /// Pass names in execution order.
    pub fn order_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|id| self.solver.pass(*id).ok())
            .map(|pass| pass.name())
            .collect()
    }

    /// Solved pass ids with the barriers issued before each.
    pub fn schedule(&self) -> impl Iterator<Item = (PassId, &[ImageBarrier])> {
        self.order
            .iter()
            .copied()
            .zip(self.barriers.iter().map(Vec::as_slice))
    }

    /// Record one frame.
    ///
    /// Every pass's `pre_pass` runs first, in execution order. Then each pass
    /// gets its barriers followed by its commands.
    pub fn record(&mut self, engine: &EngineContext, cmd: &mut dyn CommandRecorder) -> Result<()> {
        if !self.built {
            return Err(GraphError::NotBuilt);
        }

        let frame_index = self.frame_index;
        for &id in &self.order {
            let pass = self.solver.pass_mut(id)?;
            let mut ctx = RenderCtx {
                cmd: &mut *cmd,
                engine,
                images: &self.images,
                frame_index,
            };
            pass.pre_pass(&mut ctx);
        }

        for (&id, barriers) in self.order.iter().zip(&self.barriers) {
            let pass = self.solver.pass_mut(id)?;
            if !barriers.is_empty() {
                cmd.pipeline_barrier(barriers);
            }
            cmd.begin_pass(pass.name());
            let mut ctx = RenderCtx {
                cmd: &mut *cmd,
                engine,
                images: &self.images,
                frame_index,
            };
            pass.execute(&mut ctx);
            cmd.end_pass();
        }

        debug!(frame = frame_index, "frame recorded");
        self.frame_index += 1;
        Ok(())
    }
}
