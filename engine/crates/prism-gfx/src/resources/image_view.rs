use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// 单层、单 mip 的 2D color view
///
/// 光追输出图像与材质贴图共用
pub struct GfxImageView {
    handle: vk::ImageView,
}

// 创建与销毁
impl GfxImageView {
    pub fn new_2d(image: vk::Image, format: vk::Format, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        let gfx_device = Gfx::get().gfx_device();
        let view = Self {
            handle: unsafe { gfx_device.create_image_view(&info, None)? },
        };
        gfx_device.set_debug_name(&view, debug_name);
        Ok(view)
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_image_view(self.handle, None) }
    }
}

// getter
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}

impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
