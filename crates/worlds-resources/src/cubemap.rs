//! Cubemap assembly and the cubemap slot table.
//!
//! A cubemap asset is a JSON array of six face image paths in +X, -X, +Y, -Y,
//! +Z, -Z order. Faces are decoded in parallel on the job system, converted
//! from sRGB to linear, and given a box-filtered mip chain.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use parking_lot::Mutex;
use tracing::debug;
use worlds_core::constants::{CUBEMAP_SLOTS, MAX_CUBEMAP_MIPS, MISSING_CUBEMAP};
use worlds_core::{AssetDb, AssetId};
use worlds_jobs::{Job, JobSystem};

use crate::error::LoadError;
use crate::slots::{ResourceSlots, SlotLoader};
use crate::texture::{full_mip_count, TextureData};
use crate::upload::{GpuTexture, TextureUploader};

/// Number of faces in a cubemap.
pub const CUBE_FACES: usize = 6;

/// One mip level of all six faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapLevel {
    /// Edge length of this level in pixels.
    pub size: u32,
    /// RGBA8 pixels per face.
    pub faces: [Vec<u8>; CUBE_FACES],
}

/// CPU-side cubemap with its mip chain, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubemapData {
    /// Edge length of mip 0.
    pub size: u32,
    /// Upload format.
    pub format: vk::Format,
    /// Mip levels, largest first.
    pub levels: Vec<CubemapLevel>,
}

impl CubemapData {
    /// Total bytes over all levels and faces.
    pub fn byte_len(&self) -> usize {
        self.levels
            .iter()
            .flat_map(|level| level.faces.iter())
            .map(Vec::len)
            .sum()
    }
}

/// Number of mips generated for a cubemap face of `size`.
pub fn cubemap_mip_count(size: u32) -> u32 {
    full_mip_count(size, size).min(MAX_CUBEMAP_MIPS)
}

/// sRGB-encoded byte to linear byte (gamma 2.2).
pub fn srgb_to_linear(value: u8) -> u8 {
    // Truncation matches the offline cubemap tools
    ((f32::from(value) / 255.0).powf(2.2) * 255.0) as u8
}

fn linearize_rgba(pixels: &mut [u8]) {
    for pixel in pixels.chunks_exact_mut(4) {
        for channel in &mut pixel[..3] {
            *channel = srgb_to_linear(*channel);
        }
    }
}

/// Halve a square RGBA8 image with a 2x2 box filter.
fn downsample(src: &[u8], size: u32) -> (Vec<u8>, u32) {
    let size = size as usize;
    let half = (size / 2).max(1);
    let mut dst = vec![0u8; half * half * 4];

    for y in 0..half {
        for x in 0..half {
            let x0 = (x * 2).min(size - 1);
            let x1 = (x * 2 + 1).min(size - 1);
            let y0 = (y * 2).min(size - 1);
            let y1 = (y * 2 + 1).min(size - 1);

            for c in 0..4 {
                let sum: u32 = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)]
                    .iter()
                    .map(|&(sx, sy)| u32::from(src[(sy * size + sx) * 4 + c]))
                    .sum();
                dst[(y * half + x) * 4 + c] = ((sum + 2) / 4) as u8;
            }
        }
    }

    (dst, half as u32)
}

/// Linearize a face if needed and build its mip chain.
fn build_face_mips(face: TextureData, mips: u32) -> Vec<Vec<u8>> {
    let mut pixels = face.pixels;
    if face.format == vk::Format::R8G8B8A8_SRGB {
        linearize_rgba(&mut pixels);
    }

    let mut levels = Vec::with_capacity(mips as usize);
    let mut size = face.width;
    for _ in 1..mips {
        let (next, next_size) = downsample(&pixels, size);
        levels.push(pixels);
        pixels = next;
        size = next_size;
    }
    levels.push(pixels);
    levels
}

type FaceResults<T> = Arc<Mutex<[Option<T>; CUBE_FACES]>>;

fn take_faces<T>(results: &FaceResults<T>) -> Result<[T; CUBE_FACES], LoadError> {
    let mut results = results.lock();
    let faces: Vec<T> = results.iter_mut().filter_map(Option::take).collect();
    faces
        .try_into()
        .map_err(|_| LoadError::Unavailable("cubemap face job produced no output".into()))
}

/// Loads cubemaps, using the job system for per-face work.
pub struct CubemapLoader {
    db: Arc<AssetDb>,
    jobs: Arc<JobSystem>,
    uploader: Arc<dyn TextureUploader>,
    placeholder: AssetId,
}

impl CubemapLoader {
    /// Create a loader using the default missing-cubemap placeholder.
    pub fn new(db: Arc<AssetDb>, jobs: Arc<JobSystem>, uploader: Arc<dyn TextureUploader>) -> Self {
        let placeholder = db.add_or_get_existing(MISSING_CUBEMAP);
        Self {
            db,
            jobs,
            uploader,
            placeholder,
        }
    }

    /// Decode all six faces in parallel.
    fn decode_faces(&self, paths: &[String; CUBE_FACES]) -> Result<[TextureData; CUBE_FACES], LoadError> {
        let results: FaceResults<std::result::Result<TextureData, String>> = Arc::default();

        let jobs = paths.iter().enumerate().map(|(index, path)| {
            let db = Arc::clone(&self.db);
            let results = Arc::clone(&results);
            let id = db.add_or_get_existing(path);
            let path = path.clone();
            Job::new(move || {
                let face = db
                    .read(id)
                    .map_err(|err| err.to_string())
                    .and_then(|bytes| {
                        TextureData::from_bytes(&bytes, true)
                            .map_err(|err| format!("{path}: {err}"))
                    });
                results.lock()[index] = Some(face);
            })
        });
        self.jobs.run_batch(jobs)?;

        let faces = take_faces(&results)?;
        let mut decoded = Vec::with_capacity(CUBE_FACES);
        for face in faces {
            decoded.push(face.map_err(LoadError::Unavailable)?);
        }
        decoded
            .try_into()
            .map_err(|_| LoadError::Unavailable("cubemap face count changed".into()))
    }

    /// Linearize faces and build their mip chains in parallel.
    fn assemble(&self, faces: [TextureData; CUBE_FACES]) -> Result<CubemapData, LoadError> {
        let size = faces[0].width;
        if let Some(bad) = faces.iter().find(|f| f.width != size || f.height != size) {
            return Err(LoadError::Unavailable(format!(
                "cubemap faces must share one square size, got {}x{} and {}x{}",
                size, size, bad.width, bad.height
            )));
        }

        let format = if faces[0].format == vk::Format::R8G8B8A8_SRGB {
            vk::Format::R8G8B8A8_UNORM
        } else {
            faces[0].format
        };
        let mips = cubemap_mip_count(size);

        let results: FaceResults<Vec<Vec<u8>>> = Arc::default();
        let jobs = faces.into_iter().enumerate().map(|(index, face)| {
            let results = Arc::clone(&results);
            Job::new(move || {
                let levels = build_face_mips(face, mips);
                results.lock()[index] = Some(levels);
            })
        });
        self.jobs.run_batch(jobs)?;

        let mut per_face = take_faces(&results)?.map(Vec::into_iter);
        let mut levels = Vec::with_capacity(mips as usize);
        let mut level_size = size;
        for _ in 0..mips {
            let mut faces: [Vec<u8>; CUBE_FACES] = Default::default();
            for (dst, src) in faces.iter_mut().zip(per_face.iter_mut()) {
                *dst = src.next().unwrap_or_default();
            }
            levels.push(CubemapLevel {
                size: level_size,
                faces,
            });
            level_size = (level_size / 2).max(1);
        }

        Ok(CubemapData {
            size,
            format,
            levels,
        })
    }

    /// Read, decode and assemble a cubemap without uploading it.
    pub fn load_data(&self, key: AssetId) -> Result<CubemapData, LoadError> {
        let bytes = self.db.read(key)?;
        let paths: Vec<String> = serde_json::from_slice(&bytes)
            .map_err(|err| LoadError::Unavailable(format!("invalid cubemap document: {err}")))?;
        let paths: [String; CUBE_FACES] = paths.try_into().map_err(|paths: Vec<String>| {
            LoadError::Unavailable(format!(
                "cubemap document lists {} faces, expected {CUBE_FACES}",
                paths.len()
            ))
        })?;

        let faces = self.decode_faces(&paths)?;
        self.assemble(faces)
    }
}

impl SlotLoader for CubemapLoader {
    type Key = AssetId;
    type Resource = GpuTexture;

    const KIND: &'static str = "cubemap";

    fn placeholder_key(&self) -> AssetId {
        self.placeholder
    }

    fn load(&self, key: AssetId) -> Result<GpuTexture, LoadError> {
        let start = Instant::now();
        let data = self.load_data(key)?;
        let name = self.describe(key);
        let texture = self.uploader.upload_cubemap(&name, &data)?;

        debug!(
            "Spent {:.3}ms loading cubemap {}",
            start.elapsed().as_secs_f64() * 1000.0,
            name
        );
        Ok(texture)
    }

    fn release(&self, resource: GpuTexture) {
        self.uploader.destroy(resource);
    }

    fn describe(&self, key: AssetId) -> String {
        self.db.path(key).unwrap_or_else(|| key.to_string())
    }
}

/// Cubemap slot table indexed by shaders.
pub type CubemapSlots = ResourceSlots<CubemapLoader, CUBEMAP_SLOTS>;
