use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// 材质贴图共用的 sampler
///
/// 三个方向使用相同的寻址模式，不开启各向异性过滤，mipmap 不做截断
///
/// # Destroy
/// 需要手动调用 [`GfxSampler::destroy`]
pub struct GfxSampler {
    handle: vk::Sampler,
}

// 创建与销毁
impl GfxSampler {
    pub fn new(filter: vk::Filter, address_mode: vk::SamplerAddressMode, debug_name: &str) -> GfxResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(match filter {
                vk::Filter::NEAREST => vk::SamplerMipmapMode::NEAREST,
                _ => vk::SamplerMipmapMode::LINEAR,
            })
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK);

        let gfx_device = Gfx::get().gfx_device();
        let sampler = Self {
            handle: unsafe { gfx_device.create_sampler(&create_info, None)? },
        };
        gfx_device.set_debug_name(&sampler, debug_name);
        Ok(sampler)
    }

    /// 线性过滤，REPEAT 寻址
    #[inline]
    pub fn new_linear_repeat(debug_name: &str) -> GfxResult<Self> {
        Self::new(vk::Filter::LINEAR, vk::SamplerAddressMode::REPEAT, debug_name)
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_sampler(self.handle, None) }
    }
}

// getter
impl GfxSampler {
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

impl DebugType for GfxSampler {
    fn debug_type_name() -> &'static str {
        "GfxSampler"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
