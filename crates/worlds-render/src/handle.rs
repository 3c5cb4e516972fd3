//! Render image handles and the image registry.

use std::fmt;

use ash::vk;
use hashbrown::HashMap;

/// Opaque identifier of a render image, independent of its memory.
///
/// Handles are allocated monotonically and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderImageHandle(pub u32);

impl fmt::Display for RenderImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Description of a render image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDesc {
    /// Debug name.
    pub name: String,
    /// Pixel format.
    pub format: vk::Format,
    /// Size in pixels.
    pub extent: vk::Extent2D,
}

impl ImageDesc {
    pub fn new(name: impl Into<String>, format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            format,
            extent: vk::Extent2D { width, height },
        }
    }

    /// Aspect implied by the format.
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_image_aspect(self.format)
    }
}

/// Aspect mask to use for a format.
pub fn infer_image_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Per-image aspect masks consumed by barrier generation.
pub type AspectTable = HashMap<RenderImageHandle, vk::ImageAspectFlags>;

/// Allocates render image handles and remembers their descriptions.
#[derive(Debug, Default)]
pub struct RenderImages {
    next: u32,
    images: HashMap<RenderImageHandle, ImageDesc>,
}

impl RenderImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image and return a fresh handle.
    pub fn create(&mut self, desc: ImageDesc) -> RenderImageHandle {
        let handle = RenderImageHandle(self.next);
        self.next += 1;
        self.images.insert(handle, desc);
        handle
    }

    /// Forget an image. Its handle is not handed out again.
    pub fn release(&mut self, handle: RenderImageHandle) -> Option<ImageDesc> {
        self.images.remove(&handle)
    }

    pub fn get(&self, handle: RenderImageHandle) -> Option<&ImageDesc> {
        self.images.get(&handle)
    }

    /// Debug name of an image, or its handle if unknown.
    pub fn name(&self, handle: RenderImageHandle) -> String {
        self.images
            .get(&handle)
            .map_or_else(|| handle.to_string(), |desc| desc.name.clone())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Aspect masks for every live image.
    pub fn aspect_table(&self) -> AspectTable {
        self.images
            .iter()
            .map(|(handle, desc)| (*handle, desc.aspect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_reused() {
        let mut images = RenderImages::new();
        let a = images.create(ImageDesc::new("a", vk::Format::R8G8B8A8_UNORM, 4, 4));
        images.release(a);
        let b = images.create(ImageDesc::new("b", vk::Format::R8G8B8A8_UNORM, 4, 4));

        assert_ne!(a, b);
        assert_eq!(images.len(), 1);
        assert_eq!(images.name(a), "#0");
    }

    #[test]
    fn aspect_follows_format() {
        let mut images = RenderImages::new();
        let depth = images.create(ImageDesc::new("shadow", vk::Format::D32_SFLOAT, 1024, 1024));
        let color = images.create(ImageDesc::new("hdr", vk::Format::R16G16B16A16_SFLOAT, 8, 8));
        let both = images.create(ImageDesc::new("ds", vk::Format::D24_UNORM_S8_UINT, 8, 8));

        let aspects = images.aspect_table();
        assert_eq!(aspects[&depth], vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspects[&color], vk::ImageAspectFlags::COLOR);
        assert_eq!(
            aspects[&both],
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
