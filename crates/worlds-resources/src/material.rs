//! Material documents and the material slot table.
//!
//! A material is a JSON object referencing texture paths. Loading a material
//! resolves each path through the texture table, so it may load textures too.

use std::sync::Arc;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Deserialize;
use worlds_core::constants::{MATERIAL_SLOTS, MISSING_MATERIAL};
use worlds_core::{AssetDb, AssetId};

use crate::error::{LoadError, Result};
use crate::slots::{ResourceSlots, SlotLoader};
use crate::texture::TextureSlots;

/// Texture index meaning "no texture bound".
pub const NO_TEXTURE: u32 = u32::MAX;

/// Emissive colors whose components sum below this are treated as black.
const EMISSIVE_EPSILON: f32 = 0.003;

bitflags! {
    /// Shader-visible material flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialFlags: u32 {
        /// Metal/roughness/AO come from one packed map in the roughness slot.
        const USE_PACKED_PBR = 1 << 0;
        /// Alpha cutoff is enabled.
        const ALPHA_TEST = 1 << 1;
    }
}

/// Material data laid out for a shader storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PackedMaterial {
    pub albedo_color: Vec3,
    pub metallic: f32,
    pub emissive_color: Vec3,
    pub roughness: f32,
    pub albedo_tex: u32,
    pub normal_tex: u32,
    pub heightmap_tex: u32,
    pub metal_tex: u32,
    pub rough_tex: u32,
    pub ao_tex: u32,
    /// Raw [`MaterialFlags`] bits.
    pub flags: u32,
    pub alpha_cutoff: f32,
    pub heightmap_scale: f32,
    pub _padding: [u32; 3],
}

impl PackedMaterial {
    /// Decoded flag bits.
    pub const fn flags(&self) -> MaterialFlags {
        MaterialFlags::from_bits_truncate(self.flags)
    }
}

/// Pipeline state that isn't part of the packed shader data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialExtra {
    /// Disable backface culling.
    pub no_cull: bool,
    /// Render as wireframe.
    pub wireframe: bool,
}

/// A resident material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub packed: PackedMaterial,
    pub extra: MaterialExtra,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterialDocument {
    albedo_path: String,
    #[serde(default)]
    metallic: f32,
    #[serde(default = "default_roughness")]
    roughness: f32,
    #[serde(default = "default_albedo_color")]
    albedo_color: [f32; 3],
    #[serde(default)]
    emissive_color: Option<[f32; 3]>,
    #[serde(default)]
    alpha_cutoff: f32,
    normal_map_path: Option<String>,
    heightmap_path: Option<String>,
    #[serde(default)]
    heightmap_scale: f32,
    metal_map_path: Option<String>,
    rough_map_path: Option<String>,
    ao_map_path: Option<String>,
    pbr_map_path: Option<String>,
    cull_off: Option<serde_json::Value>,
    wireframe: Option<serde_json::Value>,
}

const fn default_roughness() -> f32 {
    0.5
}

const fn default_albedo_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// A present flag is on unless explicitly `false`.
fn flag_set(value: Option<&serde_json::Value>) -> bool {
    value.is_some_and(|v| v.as_bool() != Some(false))
}

/// Parses material documents and resolves their textures.
pub struct MaterialLoader {
    db: Arc<AssetDb>,
    textures: Arc<TextureSlots>,
    placeholder: AssetId,
}

impl MaterialLoader {
    /// Create a loader resolving textures through `textures`.
    pub fn new(db: Arc<AssetDb>, textures: Arc<TextureSlots>) -> Self {
        let placeholder = db.add_or_get_existing(MISSING_MATERIAL);
        Self {
            db,
            textures,
            placeholder,
        }
    }

    /// Texture table the materials index into.
    pub fn textures(&self) -> &Arc<TextureSlots> {
        &self.textures
    }

    fn texture(&self, path: Option<&str>, linear: bool) -> Result<u32> {
        let Some(path) = path else {
            return Ok(NO_TEXTURE);
        };
        let id = self.db.add_or_get_existing(path);
        if linear {
            self.textures.loader().mark_linear(id);
        }
        self.textures.load_or_get(id)
    }

    fn build(&self, doc: &MaterialDocument) -> Result<Material> {
        let mut flags = MaterialFlags::empty();
        if doc.alpha_cutoff > 0.0 {
            flags |= MaterialFlags::ALPHA_TEST;
        }

        let emissive_color = doc
            .emissive_color
            .map(Vec3::from_array)
            .filter(|color| color.element_sum() >= EMISSIVE_EPSILON)
            .unwrap_or(Vec3::ZERO);

        let albedo_tex = self.texture(Some(&doc.albedo_path), false)?;
        let normal_tex = self.texture(doc.normal_map_path.as_deref(), true)?;
        let heightmap_tex = self.texture(doc.heightmap_path.as_deref(), true)?;

        let (metal_tex, rough_tex, ao_tex) = if let Some(pbr) = doc.pbr_map_path.as_deref() {
            flags |= MaterialFlags::USE_PACKED_PBR;
            (NO_TEXTURE, self.texture(Some(pbr), true)?, NO_TEXTURE)
        } else {
            (
                self.texture(doc.metal_map_path.as_deref(), true)?,
                self.texture(doc.rough_map_path.as_deref(), true)?,
                self.texture(doc.ao_map_path.as_deref(), true)?,
            )
        };

        Ok(Material {
            packed: PackedMaterial {
                albedo_color: Vec3::from_array(doc.albedo_color),
                metallic: doc.metallic,
                emissive_color,
                roughness: doc.roughness,
                albedo_tex,
                normal_tex,
                heightmap_tex,
                metal_tex,
                rough_tex,
                ao_tex,
                flags: flags.bits(),
                alpha_cutoff: doc.alpha_cutoff,
                heightmap_scale: doc.heightmap_scale,
                _padding: [0; 3],
            },
            extra: MaterialExtra {
                no_cull: flag_set(doc.cull_off.as_ref()),
                wireframe: flag_set(doc.wireframe.as_ref()),
            },
        })
    }
}

impl SlotLoader for MaterialLoader {
    type Key = AssetId;
    type Resource = Material;

    const KIND: &'static str = "material";

    fn placeholder_key(&self) -> AssetId {
        self.placeholder
    }

    fn load(&self, key: AssetId) -> std::result::Result<Material, LoadError> {
        let bytes = self.db.read(key)?;
        let doc: MaterialDocument = serde_json::from_slice(&bytes)
            .map_err(|err| LoadError::Unavailable(format!("invalid material document: {err}")))?;
        Ok(self.build(&doc)?)
    }

    // Textures are shared between materials and stay resident
    fn release(&self, _resource: Material) {}

    fn describe(&self, key: AssetId) -> String {
        self.db.path(key).unwrap_or_else(|| key.to_string())
    }
}

/// Material slot table indexed by shaders.
pub type MaterialSlots = ResourceSlots<MaterialLoader, MATERIAL_SLOTS>;

impl MaterialSlots {
    /// Packed shader data for a resident slot.
    pub fn packed(&self, slot: u32) -> Option<PackedMaterial> {
        self.with_slot(slot, |material| material.packed)
    }

    /// Pipeline state for a resident slot.
    pub fn extra(&self, slot: u32) -> Option<MaterialExtra> {
        self.with_slot(slot, |material| material.extra)
    }
}
