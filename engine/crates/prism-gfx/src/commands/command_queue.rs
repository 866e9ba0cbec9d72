use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{submit_info::GfxSubmitInfo, sync::GfxFence},
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// # destroy
///
/// queue 在 device 销毁时会被销毁
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) gfx_device: Rc<GfxDevice>,
}
impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}

// getter
impl GfxCommandQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxCommandQueue {
    /// 提交单个 batch，`fence` 会在该 batch 执行完毕后触发
    pub fn submit(&self, batch: &GfxSubmitInfo, fence: Option<&GfxFence>) -> GfxResult<()> {
        let fence = fence.map_or(vk::Fence::null(), |f| f.handle());
        unsafe { self.gfx_device.queue_submit2(self.vk_queue, &[batch.vk_info()], fence)? };
        Ok(())
    }

    /// 根据 Vulkan 规范，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.gfx_device.queue_wait_idle(self.vk_queue)? };
        Ok(())
    }
}
