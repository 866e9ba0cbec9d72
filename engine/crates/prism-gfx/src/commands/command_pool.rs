use ash::vk;

use crate::{
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
    gfx::Gfx,
};

/// 从中分配的 command buffer 只能提交到同一个 queue family 的 queue
///
/// # Destroy
/// 需要手动调用 [`GfxCommandPool::destroy`]，pool 中的 command buffer 会一起释放
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    destroyed: bool,
}

// 创建与销毁
impl GfxCommandPool {
    #[inline]
    pub fn new(queue_family_index: u32, flags: vk::CommandPoolCreateFlags, debug_name: &str) -> GfxResult<Self> {
        Self::new_with_device(Gfx::get().gfx_device(), queue_family_index, flags, debug_name)
    }

    /// Gfx 单例初始化完成之前使用
    pub(crate) fn new_with_device(
        gfx_device: &GfxDevice,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags);
        let pool = Self {
            handle: unsafe { gfx_device.create_command_pool(&create_info, None)? },
            destroyed: false,
        };
        gfx_device.set_debug_name(&pool, debug_name);
        Ok(pool)
    }

    #[inline]
    pub fn destroy(self) {
        self.destroy_with_device(Gfx::get().gfx_device());
    }

    /// Gfx 单例销毁过程中使用
    pub(crate) fn destroy_with_device(mut self, gfx_device: &GfxDevice) {
        unsafe { gfx_device.destroy_command_pool(self.handle, None) };
        self.destroyed = true;
    }
}

// getter
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(self.destroyed, "GfxCommandPool must be destroyed manually");
    }
}
