//! Core types shared by the Worlds frame core.
//!
//! This crate provides:
//! - Asset identifiers derived from asset paths
//! - The asset database that resolves identifiers back to files
//! - Engine-wide capacity constants
//! - Common error types

pub mod asset;
pub mod error;

pub use asset::{AssetDb, AssetId};
pub use error::{Error, Result};

/// Engine-wide constants
pub mod constants {
    /// Number of texture slots addressable from shaders
    pub const TEXTURE_SLOTS: usize = 256;
    /// Number of material slots addressable from shaders
    pub const MATERIAL_SLOTS: usize = 256;
    /// Number of cubemap slots addressable from shaders
    pub const CUBEMAP_SLOTS: usize = 64;
    /// Upper bound on generated cubemap mip levels
    pub const MAX_CUBEMAP_MIPS: u32 = 5;

    /// Placeholder used when a texture cannot be found or decoded
    pub const MISSING_TEXTURE: &str = "Textures/missing.png";
    /// Placeholder used when a material cannot be found or parsed
    pub const MISSING_MATERIAL: &str = "Materials/missing.json";
    /// Placeholder used when a cubemap cannot be found or parsed
    pub const MISSING_CUBEMAP: &str = "Cubemaps/missing.json";
}
