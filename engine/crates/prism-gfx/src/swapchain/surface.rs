use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// # Destroy
///
/// 需要在 instance 销毁之前手动调用 `destroy`
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

// new & init
impl GfxSurface {
    pub fn new(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Self> {
        let gfx_core = Gfx::get().gfx_core();
        let surface_pf = ash::khr::surface::Instance::new(&gfx_core.vk_entry, &gfx_core.instance.ash_instance);

        let surface = unsafe {
            ash_window::create_surface(
                &gfx_core.vk_entry,
                &gfx_core.instance.ash_instance,
                raw_display_handle,
                raw_window_handle,
                None,
            )?
        };

        let surface = GfxSurface {
            handle: surface,
            pf: surface_pf,
        };
        gfx_core.gfx_device.set_debug_name(&surface, "main");

        Ok(surface)
    }

    /// surface 所需的 instance 扩展
    pub fn required_instance_exts(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
    ) -> GfxResult<Vec<&'static std::ffi::CStr>> {
        let exts = ash_window::enumerate_required_extensions(raw_display_handle)?;
        Ok(exts.iter().map(|ext| unsafe { std::ffi::CStr::from_ptr(*ext) }).collect())
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn get_capabilities(&self) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        let capabilities = unsafe {
            self.pf
                .get_physical_device_surface_capabilities(Gfx::get().physical_device().vk_handle(), self.handle)?
        };
        Ok(capabilities)
    }

    pub fn get_formats(&self) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.pf.get_physical_device_surface_formats(Gfx::get().physical_device().vk_handle(), self.handle)?
        };
        Ok(formats)
    }

    pub fn get_present_modes(&self) -> GfxResult<Vec<vk::PresentModeKHR>> {
        let present_modes = unsafe {
            self.pf
                .get_physical_device_surface_present_modes(Gfx::get().physical_device().vk_handle(), self.handle)?
        };
        Ok(present_modes)
    }
}

// destroy
impl GfxSurface {
    pub fn destroy(self) {
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}

impl DebugType for GfxSurface {
    fn debug_type_name() -> &'static str {
        "GfxSurface"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
