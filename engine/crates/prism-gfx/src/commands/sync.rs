//! CPU/GPU 与 GPU/GPU 之间的同步对象
//!
//! 两者都不实现 Drop，持有者负责在 GPU 不再使用后调用 `destroy`

use ash::vk;

use crate::{error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// CPU 等待 GPU 完成一次提交
pub struct GfxFence {
    handle: vk::Fence,
}

// 创建与销毁
impl GfxFence {
    /// `signaled` 为 true 时，第一次 wait 会立即返回
    pub fn new(signaled: bool, debug_name: &str) -> GfxResult<Self> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None)? };

        let fence = Self { handle };
        gfx_device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_fence(self.handle, None) };
    }
}

// tools
impl GfxFence {
    /// 没有超时，一直阻塞到 fence 被触发
    pub fn wait(&self) -> GfxResult<()> {
        unsafe { Gfx::get().gfx_device().wait_for_fences(&[self.handle], true, u64::MAX)? };
        Ok(())
    }

    pub fn reset(&self) -> GfxResult<()> {
        unsafe { Gfx::get().gfx_device().reset_fences(&[self.handle])? };
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 二值 semaphore，串联 acquire -> submit -> present
pub struct GfxSemaphore {
    handle: vk::Semaphore,
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };

        let semaphore = Self { handle };
        gfx_device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    pub fn destroy(self) {
        unsafe { Gfx::get().gfx_device().destroy_semaphore(self.handle, None) };
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
