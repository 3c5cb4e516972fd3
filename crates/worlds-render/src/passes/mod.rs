//! The standard pass set.

mod blur;
mod opaque;
mod shadowmap;
mod tonemap;
mod ui;

pub use blur::BlurPass;
pub use opaque::OpaquePass;
pub use shadowmap::ShadowMapPass;
pub use tonemap::TonemapPass;
pub use ui::UiPass;

/// Workgroup edge length of the compute passes.
pub const COMPUTE_GROUP_SIZE: u32 = 8;

/// Workgroups needed to cover a `width` x `height` image.
pub const fn dispatch_size(width: u32, height: u32) -> [u32; 3] {
    [
        width.div_ceil(COMPUTE_GROUP_SIZE),
        height.div_ceil(COMPUTE_GROUP_SIZE),
        1,
    ]
}
