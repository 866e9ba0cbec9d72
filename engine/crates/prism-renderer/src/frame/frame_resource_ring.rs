use ash::vk;
use prism_gfx::{commands::command_pool::GfxCommandPool, gfx::Gfx};

use crate::{
    error::RenderResult,
    frame::{frame_ring::FrameRing, frame_slot::GpuFrameSlot},
};

/// 拥有所有 frame slot 以及分配它们 command buffer 的 command pool
pub struct FrameResourceRing {
    command_pool: GfxCommandPool,
    ring: FrameRing<GpuFrameSlot>,
}

// new & init
impl FrameResourceRing {
    /// slot 数量通常与交换链图像数量一致
    pub fn new(slot_count: usize, extent: vk::Extent2D) -> RenderResult<Self> {
        let command_pool = GfxCommandPool::new(
            Gfx::get().gfx_queue_family().queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame-ring",
        )?;

        let mut slots = Vec::with_capacity(slot_count);
        for slot_index in 0..slot_count.max(1) {
            match GpuFrameSlot::new(&command_pool, slot_index, extent) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    slots.into_iter().for_each(GpuFrameSlot::destroy);
                    command_pool.destroy();
                    return Err(e);
                }
            }
        }
        log::info!(
            "frame resource ring created: {} slots, output {}x{}",
            slots.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            command_pool,
            ring: FrameRing::new(slots),
        })
    }
}

// getter
impl FrameResourceRing {
    #[inline]
    pub fn ring(&self) -> &FrameRing<GpuFrameSlot> {
        &self.ring
    }

    #[inline]
    pub fn ring_mut(&mut self) -> &mut FrameRing<GpuFrameSlot> {
        &mut self.ring
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.ring.slot_count()
    }
}

// destroy
impl FrameResourceRing {
    /// 等待每个 slot 的 fence，再等待 queue 空闲，然后销毁所有资源
    pub fn destroy(mut self) -> RenderResult<()> {
        let drained = self.ring.drain();
        let idle = Gfx::get().gfx_queue().wait_idle();

        self.ring.into_slots().into_iter().for_each(GpuFrameSlot::destroy);
        self.command_pool.destroy();

        drained?;
        Ok(idle?)
    }
}
