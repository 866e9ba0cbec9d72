use ash::vk;

/// 单个 mip、单个 layer 的颜色 subresource
const COLOR_SUBRESOURCE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// image barrier 的 builder，不做 queue family 的所有权转移
#[derive(Clone, Copy)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .subresource_range(COLOR_SUBRESOURCE),
        }
    }
}

impl GfxImageBarrier {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn image(self, image: vk::Image) -> Self {
        Self {
            inner: self.inner.image(image),
        }
    }

    #[inline]
    pub fn layout_transfer(self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        Self {
            inner: self.inner.old_layout(old_layout).new_layout(new_layout),
        }
    }

    /// 等待哪些 stage 的哪些写入
    #[inline]
    pub fn src_mask(self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            inner: self.inner.src_stage_mask(stage).src_access_mask(access),
        }
    }

    /// 阻塞哪些 stage 的哪些访问
    #[inline]
    pub fn dst_mask(self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            inner: self.inner.dst_stage_mask(stage).dst_access_mask(access),
        }
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'static> {
        &self.inner
    }
}

/// buffer barrier 的 builder，默认覆盖整个 buffer
#[derive(Clone, Copy)]
pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}

impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2::default()
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .size(vk::WHOLE_SIZE),
        }
    }
}

impl GfxBufferBarrier {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn buffer(self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self {
            inner: self.inner.buffer(buffer).offset(offset).size(size),
        }
    }

    #[inline]
    pub fn src_mask(self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            inner: self.inner.src_stage_mask(stage).src_access_mask(access),
        }
    }

    #[inline]
    pub fn dst_mask(self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            inner: self.inner.dst_stage_mask(stage).dst_access_mask(access),
        }
    }

    #[inline]
    pub fn inner(&self) -> &vk::BufferMemoryBarrier2<'static> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_barrier_defaults_to_single_color_subresource() {
        let barrier = GfxImageBarrier::new()
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL)
            .dst_mask(vk::PipelineStageFlags2::CLEAR, vk::AccessFlags2::TRANSFER_WRITE);
        let inner = barrier.inner();

        assert_eq!(inner.new_layout, vk::ImageLayout::GENERAL);
        assert_eq!(inner.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(inner.subresource_range.level_count, 1);
        assert_eq!(inner.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(inner.dst_stage_mask, vk::PipelineStageFlags2::CLEAR);
    }

    #[test]
    fn buffer_barrier_covers_whole_buffer_by_default() {
        let barrier = GfxBufferBarrier::new();
        assert_eq!(barrier.inner().size, vk::WHOLE_SIZE);
        assert_eq!(barrier.inner().offset, 0);

        let ranged = barrier.buffer(vk::Buffer::null(), 16, 64);
        assert_eq!(ranged.inner().offset, 16);
        assert_eq!(ranged.inner().size, 64);
    }
}
