//! Image barriers produced by the graph solver.

use ash::vk;

use crate::handle::RenderImageHandle;

/// Layout, access and stage transition of one image before a pass runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageBarrier {
    pub handle: RenderImageHandle,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub aspect: vk::ImageAspectFlags,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
}

impl ImageBarrier {
    /// Whether the barrier changes the image layout.
    pub fn is_layout_transition(&self) -> bool {
        self.old_layout != self.new_layout
    }

    /// Vulkan barrier covering every mip and layer of `image`.
    pub fn to_vk(&self, image: vk::Image) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .src_stage_mask(self.src_stage)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stage)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn to_vk_copies_transition() {
        let barrier = ImageBarrier {
            handle: RenderImageHandle(3),
            old_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            aspect: vk::ImageAspectFlags::DEPTH,
            src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags2::SHADER_READ,
            src_stage: vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            dst_stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        };

        let vk_barrier = barrier.to_vk(vk::Image::from_raw(42));
        assert!(barrier.is_layout_transition());
        assert_eq!(vk_barrier.image.as_raw(), 42);
        assert_eq!(vk_barrier.old_layout, barrier.old_layout);
        assert_eq!(vk_barrier.new_layout, barrier.new_layout);
        assert_eq!(vk_barrier.src_stage_mask, barrier.src_stage);
        assert_eq!(vk_barrier.dst_access_mask, barrier.dst_access);
        assert_eq!(vk_barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
        assert_eq!(vk_barrier.subresource_range.layer_count, vk::REMAINING_ARRAY_LAYERS);
    }
}
