//! GPU upload seam used by the texture and cubemap tables.
//!
//! The slot tables only prepare CPU-side pixel data. Creating images, staging
//! buffers and copy commands is the renderer's job, behind [`TextureUploader`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ash::vk::{self, Handle};
use tracing::trace;

use crate::cubemap::CubemapData;
use crate::error::Result;
use crate::texture::TextureData;

/// A GPU image produced by an uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    /// Image handle.
    pub image: vk::Image,
    /// View over all mips and layers.
    pub view: vk::ImageView,
    /// Image format.
    pub format: vk::Format,
    /// Size of mip 0.
    pub extent: vk::Extent3D,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Number of array layers (6 for cubemaps).
    pub array_layers: u32,
}

/// Creates and destroys GPU images for slot table contents.
pub trait TextureUploader: Send + Sync {
    /// Upload a 2D texture.
    fn upload_texture(&self, name: &str, data: &TextureData) -> Result<GpuTexture>;

    /// Upload a cubemap with its precomputed mip chain.
    fn upload_cubemap(&self, name: &str, data: &CubemapData) -> Result<GpuTexture>;

    /// Destroy an image previously returned by this uploader.
    fn destroy(&self, texture: GpuTexture);
}

/// Uploader that allocates fake handles without touching a device.
///
/// Used for tooling and tests; it tracks how many images are alive and how
/// many bytes would have been uploaded.
#[derive(Debug, Default)]
pub struct HeadlessUploader {
    next_handle: AtomicU64,
    live: AtomicUsize,
    bytes_uploaded: AtomicU64,
}

impl HeadlessUploader {
    /// Create an uploader with no live images.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of images created and not yet destroyed.
    pub fn live_images(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Total bytes passed to upload calls.
    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::Relaxed)
    }

    fn allocate(
        &self,
        format: vk::Format,
        size: (u32, u32),
        mip_levels: u32,
        array_layers: u32,
        bytes: usize,
    ) -> GpuTexture {
        // Image and view take consecutive non-null handles
        let raw = self.next_handle.fetch_add(2, Ordering::Relaxed) + 1;
        self.live.fetch_add(1, Ordering::AcqRel);
        self.bytes_uploaded.fetch_add(bytes as u64, Ordering::Relaxed);

        GpuTexture {
            image: vk::Image::from_raw(raw),
            view: vk::ImageView::from_raw(raw + 1),
            format,
            extent: vk::Extent3D {
                width: size.0,
                height: size.1,
                depth: 1,
            },
            mip_levels,
            array_layers,
        }
    }
}

impl TextureUploader for HeadlessUploader {
    fn upload_texture(&self, name: &str, data: &TextureData) -> Result<GpuTexture> {
        trace!(name, width = data.width, height = data.height, "headless texture upload");
        Ok(self.allocate(
            data.format,
            (data.width, data.height),
            data.mip_levels(),
            1,
            data.pixels.len(),
        ))
    }

    fn upload_cubemap(&self, name: &str, data: &CubemapData) -> Result<GpuTexture> {
        trace!(name, size = data.size, mips = data.levels.len(), "headless cubemap upload");
        Ok(self.allocate(
            data.format,
            (data.size, data.size),
            data.levels.len() as u32,
            6,
            data.byte_len(),
        ))
    }

    fn destroy(&self, texture: GpuTexture) {
        trace!(image = texture.image.as_raw(), "headless destroy");
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
