use ash::vk;
use ash::vk::Handle;
use vk_mem::Alloc;

use crate::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// 由 vma 分配内存的 2D image
///
/// swapchain 的 image 不由这个类型管理
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent3D,
    format: vk::Format,

    name: String,
}
// getter
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn extent_2d(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }
}
// new & init
impl GfxImage {
    pub fn new(
        image_info: &GfxImageCreateInfo,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let allocator = Gfx::get().allocator();
        let gfx_device = Gfx::get().gfx_device();
        let (image, alloc) = unsafe { allocator.create_image(&image_info.inner, alloc_info)? };
        let image = Self {
            handle: image,
            allocation: alloc,
            extent: image_info.inner.extent,
            format: image_info.inner.format,

            name: debug_name.to_string(),
        };
        gfx_device.set_debug_name(&image, debug_name);
        Ok(image)
    }

    /// 根据 RGBA8_UNORM 的 data 创建可采样的 image，同步等待上传完成
    pub fn from_rgba8(width: u32, height: u32, data: &[u8], name: impl AsRef<str>) -> GfxResult<Self> {
        let image_create_info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width, height },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        );
        let image = Self::new(
            &image_create_info,
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            name.as_ref(),
        )?;

        let stage_buffer = GfxBuffer::new_stage_buffer(data.len() as vk::DeviceSize, "image-stage-buffer")
            .and_then(|stage_buffer| {
                stage_buffer.transfer_data_by_mmap(data)?;
                Ok(stage_buffer)
            });
        let upload = stage_buffer.and_then(|stage_buffer| {
            Gfx::get().one_time_exec(|cmd| image.record_upload(cmd, &stage_buffer), name.as_ref())
        });
        if let Err(e) = upload {
            image.destroy();
            return Err(e);
        }

        Ok(image)
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage2D"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
// destroy
impl GfxImage {
    pub fn destroy(mut self) {
        log::debug!("Destroying GfxImage: {}", self.name);
        unsafe { Gfx::get().allocator().destroy_image(self.handle, &mut self.allocation) }
        self.handle = vk::Image::null();
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImage must be destroyed manually: {}", self.name);
    }
}
// tools
impl GfxImage {
    /// 录制从 stage buffer 到 image 的拷贝，结束后 image 处于 SHADER_READ_ONLY_OPTIMAL，可被光追着色器读取
    fn record_upload(&self, command_buffer: &GfxCommandBuffer, stage_buffer: &GfxBuffer) {
        let image_barrier = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        command_buffer.pipeline_barrier(std::slice::from_ref(&image_barrier), &[]);

        let buffer_image_copy = vk::BufferImageCopy2::default()
            .image_extent(self.extent)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            });
        command_buffer.cmd_copy_buffer_to_image(
            &vk::CopyBufferToImageInfo2::default()
                .src_buffer(stage_buffer.vk_buffer())
                .dst_image(self.handle)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&buffer_image_copy)),
        );

        let image_barrier = GfxImageBarrier::new()
            .image(self.handle)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        command_buffer.pipeline_barrier(std::slice::from_ref(&image_barrier), &[]);
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}
impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // 这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_2d_info_is_single_mip_single_layer() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 4, height: 2 },
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::STORAGE,
        );
        assert_eq!(info.inner.extent.depth, 1);
        assert_eq!(info.inner.extent.width, 4);
        assert_eq!(info.inner.mip_levels, 1);
        assert_eq!(info.inner.array_layers, 1);
        assert_eq!(info.inner.initial_layout, vk::ImageLayout::UNDEFINED);
    }
}
