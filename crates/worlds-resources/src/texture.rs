//! Texture decoding and the texture slot table.

use std::sync::Arc;

use ash::vk;
use hashbrown::HashSet;
use parking_lot::RwLock;
use worlds_core::constants::{MISSING_TEXTURE, TEXTURE_SLOTS};
use worlds_core::{AssetDb, AssetId};

use crate::error::LoadError;
use crate::slots::{ResourceSlots, SlotLoader};
use crate::upload::{GpuTexture, TextureUploader};

/// Decoded RGBA8 pixel data for a single 2D image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Format the pixels should be uploaded as.
    pub format: vk::Format,
    /// Tightly packed RGBA8 rows.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an encoded image (PNG, JPEG, ...) into RGBA8.
    pub fn from_bytes(bytes: &[u8], srgb: bool) -> Result<Self, image::ImageError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            format: rgba8_format(srgb),
            pixels: rgba.into_raw(),
        })
    }

    /// Create a single-color texture.
    #[must_use]
    pub fn solid_color(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            format: vk::Format::R8G8B8A8_SRGB,
            pixels,
        }
    }

    /// Number of mips in a full chain for this size.
    #[must_use]
    pub fn mip_levels(&self) -> u32 {
        full_mip_count(self.width, self.height)
    }
}

/// `1 + floor(log2(max(width, height)))`.
#[must_use]
pub const fn full_mip_count(width: u32, height: u32) -> u32 {
    let largest = if width > height { width } else { height };
    if largest == 0 {
        1
    } else {
        32 - largest.leading_zeros()
    }
}

const fn rgba8_format(srgb: bool) -> vk::Format {
    if srgb {
        vk::Format::R8G8B8A8_SRGB
    } else {
        vk::Format::R8G8B8A8_UNORM
    }
}

/// Loads textures from the asset database and uploads them.
///
/// Textures are treated as sRGB unless marked linear with
/// [`TextureLoader::mark_linear`] before their first load.
pub struct TextureLoader {
    db: Arc<AssetDb>,
    uploader: Arc<dyn TextureUploader>,
    placeholder: AssetId,
    linear: RwLock<HashSet<AssetId>>,
}

impl TextureLoader {
    /// Create a loader using the default missing-texture placeholder.
    pub fn new(db: Arc<AssetDb>, uploader: Arc<dyn TextureUploader>) -> Self {
        let placeholder = db.add_or_get_existing(MISSING_TEXTURE);
        Self {
            db,
            uploader,
            placeholder,
            linear: RwLock::new(HashSet::new()),
        }
    }

    /// Upload `key` with a linear (UNORM) format instead of sRGB.
    ///
    /// Has no effect on a texture that is already resident.
    pub fn mark_linear(&self, key: AssetId) {
        self.linear.write().insert(key);
    }

    /// Whether `key` is uploaded as sRGB.
    pub fn is_srgb(&self, key: AssetId) -> bool {
        !self.linear.read().contains(&key)
    }

    /// Asset database used for reads.
    pub fn asset_db(&self) -> &Arc<AssetDb> {
        &self.db
    }
}

impl SlotLoader for TextureLoader {
    type Key = AssetId;
    type Resource = GpuTexture;

    const KIND: &'static str = "texture";

    fn placeholder_key(&self) -> AssetId {
        self.placeholder
    }

    fn load(&self, key: AssetId) -> Result<GpuTexture, LoadError> {
        let bytes = self.db.read(key)?;
        let data = TextureData::from_bytes(&bytes, self.is_srgb(key))
            .map_err(|err| LoadError::Unavailable(format!("decode failed: {err}")))?;

        Ok(self.uploader.upload_texture(&self.describe(key), &data)?)
    }

    fn release(&self, resource: GpuTexture) {
        self.uploader.destroy(resource);
    }

    fn describe(&self, key: AssetId) -> String {
        self.db.path(key).unwrap_or_else(|| key.to_string())
    }
}

/// Texture slot table indexed by shaders.
pub type TextureSlots = ResourceSlots<TextureLoader, TEXTURE_SLOTS>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SlotError;
    use crate::upload::HeadlessUploader;
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn textures() -> (Arc<AssetDb>, Arc<HeadlessUploader>, TextureSlots) {
        let db = Arc::new(AssetDb::in_memory());
        db.insert_bytes(MISSING_TEXTURE, png_bytes(2, 2, [255, 0, 255, 255]));
        let uploader = Arc::new(HeadlessUploader::new());
        let slots = TextureSlots::new(TextureLoader::new(db.clone(), uploader.clone()));
        (db, uploader, slots)
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let data = TextureData::from_bytes(&png_bytes(4, 2, [1, 2, 3, 4]), true).unwrap();
        assert_eq!((data.width, data.height), (4, 2));
        assert_eq!(data.format, vk::Format::R8G8B8A8_SRGB);
        assert_eq!(data.pixels.len(), 4 * 2 * 4);
        assert_eq!(&data.pixels[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn mip_count_matches_largest_side() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(256, 64), 9);
        assert_eq!(full_mip_count(300, 2), 9);
    }

    #[test]
    fn loads_texture_once() {
        let (db, uploader, slots) = textures();
        let rock = db.insert_bytes("Textures/rock.png", png_bytes(8, 8, [90, 90, 90, 255]));

        let a = slots.load_or_get(rock).unwrap();
        let b = slots.load_or_get(rock).unwrap();

        assert_eq!(a, b);
        assert_eq!(uploader.live_images(), 1);
        let mips = slots.with_slot(a, |tex| tex.mip_levels).unwrap();
        assert_eq!(mips, 4);
    }

    #[test]
    fn linear_textures_use_unorm() {
        let (db, _uploader, slots) = textures();
        let normal = db.insert_bytes("Textures/rock_n.png", png_bytes(2, 2, [128, 128, 255, 255]));
        slots.loader().mark_linear(normal);

        let idx = slots.load_or_get(normal).unwrap();
        let format = slots.with_slot(idx, |tex| tex.format).unwrap();
        assert_eq!(format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn missing_and_corrupt_textures_use_placeholder() {
        let (db, uploader, slots) = textures();
        let missing = db.add_or_get_existing("Textures/nope.png");
        let corrupt = db.insert_bytes("Textures/corrupt.png", b"not a png".to_vec());

        let a = slots.load_or_get(missing).unwrap();
        let b = slots.load_or_get(corrupt).unwrap();

        assert_eq!(a, b);
        assert_eq!(slots.key_for_slot(a), Some(slots.loader().placeholder_key()));
        assert_eq!(uploader.live_images(), 1);
    }

    #[test]
    fn missing_placeholder_texture_is_fatal() {
        let db = Arc::new(AssetDb::in_memory());
        let slots = TextureSlots::new(TextureLoader::new(
            db.clone(),
            Arc::new(HeadlessUploader::new()),
        ));
        let missing = db.add_or_get_existing("Textures/nope.png");

        let err = slots.load_or_get(missing).unwrap_err();
        assert!(matches!(err, SlotError::MissingPlaceholder { table: "texture", .. }));
    }

    #[test]
    fn unload_destroys_image() {
        let (db, uploader, slots) = textures();
        let rock = db.insert_bytes("Textures/rock.png", png_bytes(2, 2, [1, 1, 1, 255]));

        let idx = slots.load_or_get(rock).unwrap();
        assert!(slots.unload(idx));
        assert_eq!(uploader.live_images(), 0);
    }
}
