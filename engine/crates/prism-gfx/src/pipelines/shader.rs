use std::ffi::CStr;
use std::path::{Path, PathBuf};

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

/// # Destroy
///
/// 需要手动调用 `destroy` 方法来释放资源。
pub struct GfxShaderModule {
    handle: vk::ShaderModule,
    destroyed: bool,
}
impl GfxShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(path: &Path) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let shader_load_err = |source| GfxError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_load_err)?;
        let shader_code = ash::util::read_spv(&mut file).map_err(shader_load_err)?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);

        let shader_module = unsafe { gfx_device.create_shader_module(&shader_module_info, None)? };
        let shader_module = Self {
            handle: shader_module,
            destroyed: false,
        };
        gfx_device.set_debug_name(&shader_module, path.to_string_lossy());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    #[inline]
    pub fn destroy(mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_shader_module(self.handle, None);
        }
        self.destroyed = true;
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxShaderModule must be destroyed manually before drop.");
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct GfxShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: PathBuf,
}
impl GfxShaderStageInfo {
    pub fn new(stage: vk::ShaderStageFlags, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            entry_point: c"main",
            path: path.into(),
        }
    }
}

/// 用于 RayTracing Pipeline 的创建
///
/// 在 pipeline create info 的 groups 中，每个 shader group 引用的 stage index
pub struct GfxShaderGroupInfo {
    pub ty: vk::RayTracingShaderGroupTypeKHR,
    pub general: u32,
    pub closest_hit: u32,
    pub any_hit: u32,
    pub intersection: u32,
}
impl GfxShaderGroupInfo {
    pub const fn unused() -> Self {
        Self {
            ty: vk::RayTracingShaderGroupTypeKHR::GENERAL,
            general: vk::SHADER_UNUSED_KHR,
            closest_hit: vk::SHADER_UNUSED_KHR,
            any_hit: vk::SHADER_UNUSED_KHR,
            intersection: vk::SHADER_UNUSED_KHR,
        }
    }

    #[inline]
    pub fn vk_info(&self) -> vk::RayTracingShaderGroupCreateInfoKHR<'static> {
        vk::RayTracingShaderGroupCreateInfoKHR {
            ty: self.ty,
            general_shader: self.general,
            closest_hit_shader: self.closest_hit,
            any_hit_shader: self.any_hit,
            intersection_shader: self.intersection,
            ..Default::default()
        }
    }
}
