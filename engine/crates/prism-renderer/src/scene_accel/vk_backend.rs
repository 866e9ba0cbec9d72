use ash::vk;
use prism_gfx::{
    raytracing::acceleration::{GfxAcceleration, GfxBlasTriangles},
    resources::{buffer::GfxBuffer, image::GfxImage, image_view::GfxImageView},
};
use prism_scene::texture::TextureImage;

use crate::{
    error::RenderResult,
    scene_accel::backend::{AccelBackend, BufferKind},
};

/// 可以被光追 shader 采样的贴图
pub struct VkTexture {
    pub image: GfxImage,
    pub view: GfxImageView,
}

/// 基于 prism-gfx 的实现，每个操作都会阻塞等待 queue 空闲
#[derive(Default)]
pub struct VkAccelBackend;

impl VkAccelBackend {
    fn buffer_usage(kind: BufferKind) -> (vk::BufferUsageFlags, Option<vk::DeviceSize>) {
        let common = vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            | vk::BufferUsageFlags::TRANSFER_DST;
        match kind {
            BufferKind::Geometry => {
                (common | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR, None)
            }
            BufferKind::IndirectionTable | BufferKind::MaterialTable => (common, None),
            // instance 数组需要 16 字节对齐
            BufferKind::AccelInstances => {
                (common | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR, Some(16))
            }
        }
    }
}

impl AccelBackend for VkAccelBackend {
    type Buffer = GfxBuffer;
    type Accel = GfxAcceleration;
    type Texture = VkTexture;

    fn upload_buffer(&mut self, kind: BufferKind, bytes: &[u8], name: &str) -> RenderResult<GfxBuffer> {
        let _span = tracy_client::span!("VkAccelBackend::upload_buffer");
        let (usage, align) = Self::buffer_usage(kind);
        Ok(GfxBuffer::new_device_buffer_with_data(bytes, usage, align, name)?)
    }

    fn buffer_address(&self, buffer: &GfxBuffer) -> vk::DeviceAddress {
        buffer.device_address()
    }

    fn build_blas(&mut self, triangles: &GfxBlasTriangles, name: &str) -> RenderResult<GfxAcceleration> {
        Ok(GfxAcceleration::build_blas_sync(triangles, vk::BuildAccelerationStructureFlagsKHR::empty(), name)?)
    }

    fn build_tlas(&mut self, instances: &GfxBuffer, instance_count: u32, name: &str) -> RenderResult<GfxAcceleration> {
        Ok(GfxAcceleration::build_tlas_sync(
            instances.device_address(),
            instance_count,
            vk::BuildAccelerationStructureFlagsKHR::empty(),
            name,
        )?)
    }

    fn accel_address(&self, accel: &GfxAcceleration) -> vk::DeviceAddress {
        accel.device_address()
    }

    fn upload_texture(&mut self, texture: &TextureImage, name: &str) -> RenderResult<VkTexture> {
        let _span = tracy_client::span!("VkAccelBackend::upload_texture");
        let image = GfxImage::from_rgba8(texture.width, texture.height, &texture.pixels, name)?;
        let view = match GfxImageView::new_2d(image.handle(), image.format(), name) {
            Ok(view) => view,
            Err(e) => {
                image.destroy();
                return Err(e.into());
            }
        };
        Ok(VkTexture { image, view })
    }

    fn destroy_buffer(&mut self, buffer: GfxBuffer) {
        buffer.destroy();
    }

    fn destroy_accel(&mut self, accel: GfxAcceleration) {
        accel.destroy();
    }

    fn destroy_texture(&mut self, texture: VkTexture) {
        texture.view.destroy();
        texture.image.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_buffers_are_build_inputs() {
        let (usage, align) = VkAccelBackend::buffer_usage(BufferKind::Geometry);
        assert!(usage.contains(
            vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
                | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST
        ));
        assert_eq!(align, None);
    }

    #[test]
    fn instance_buffer_is_16_byte_aligned_storage() {
        let (usage, align) = VkAccelBackend::buffer_usage(BufferKind::AccelInstances);
        assert!(usage.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
        assert!(usage.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR));
        assert_eq!(align, Some(16));
    }

    #[test]
    fn tables_are_not_build_inputs() {
        let (usage, _) = VkAccelBackend::buffer_usage(BufferKind::IndirectionTable);
        assert!(!usage.contains(vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR));
    }
}
