//! Fixed-capacity resource slot tables.
//!
//! This crate provides:
//! - [`ResourceSlots`], a generic key-to-slot cache with stable shader indices
//! - Texture, material and cubemap specializations
//! - The [`TextureUploader`] seam the renderer implements for GPU uploads

pub mod cubemap;
pub mod error;
pub mod material;
pub mod slots;
pub mod texture;
pub mod upload;

use std::sync::Arc;

use worlds_core::AssetDb;
use worlds_jobs::JobSystem;

pub use cubemap::{CubemapData, CubemapLevel, CubemapLoader, CubemapSlots};
pub use error::{LoadError, Result, SlotError};
pub use material::{
    Material, MaterialExtra, MaterialFlags, MaterialLoader, MaterialSlots, PackedMaterial,
    NO_TEXTURE,
};
pub use slots::{ResourceSlots, SlotLoader};
pub use texture::{TextureData, TextureLoader, TextureSlots};
pub use upload::{GpuTexture, HeadlessUploader, TextureUploader};

/// The three slot tables the renderer shares.
#[derive(Clone)]
pub struct ResourceTables {
    pub textures: Arc<TextureSlots>,
    pub materials: Arc<MaterialSlots>,
    pub cubemaps: Arc<CubemapSlots>,
}

impl ResourceTables {
    /// Create empty tables backed by `db`, uploading through `uploader`.
    pub fn new(
        db: &Arc<AssetDb>,
        jobs: &Arc<JobSystem>,
        uploader: &Arc<dyn TextureUploader>,
    ) -> Self {
        let textures = Arc::new(TextureSlots::new(TextureLoader::new(
            Arc::clone(db),
            Arc::clone(uploader),
        )));
        let materials = Arc::new(MaterialSlots::new(MaterialLoader::new(
            Arc::clone(db),
            Arc::clone(&textures),
        )));
        let cubemaps = Arc::new(CubemapSlots::new(CubemapLoader::new(
            Arc::clone(db),
            Arc::clone(jobs),
            Arc::clone(uploader),
        )));

        Self {
            textures,
            materials,
            cubemaps,
        }
    }
}

impl std::fmt::Debug for ResourceTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTables")
            .field("textures", &self.textures.len())
            .field("materials", &self.materials.len())
            .field("cubemaps", &self.cubemaps.len())
            .finish()
    }
}
