use ash::vk;

use crate::commands::{command_buffer::GfxCommandBuffer, sync::GfxSemaphore};

/// 一次 `vkQueueSubmit2` 中的单个 batch：一个 command buffer 及其等待与触发的 binary semaphore
///
/// ```ignore
/// let batch = GfxSubmitInfo::new(&cmd)
///     .wait(&image_acquired, vk::PipelineStageFlags2::TRANSFER)
///     .signal(&render_finished, vk::PipelineStageFlags2::ALL_COMMANDS);
/// queue.submit(&batch, Some(&fence))?;
/// ```
pub struct GfxSubmitInfo {
    command_buffer: [vk::CommandBufferSubmitInfo<'static>; 1],
    waits: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signals: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(command_buffer: &GfxCommandBuffer) -> Self {
        Self {
            command_buffer: [vk::CommandBufferSubmitInfo::default().command_buffer(command_buffer.vk_handle())],
            waits: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// `stage` 之前的命令不会等待该 semaphore
    pub fn wait(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2) -> Self {
        self.waits.push(Self::semaphore_info(semaphore, stage));
        self
    }

    pub fn signal(mut self, semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2) -> Self {
        self.signals.push(Self::semaphore_info(semaphore, stage));
        self
    }

    /// 引用 self 内部的数组，生命周期不能超过 self
    pub fn vk_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default()
            .command_buffer_infos(&self.command_buffer)
            .wait_semaphore_infos(&self.waits)
            .signal_semaphore_infos(&self.signals)
    }

    fn semaphore_info(semaphore: &GfxSemaphore, stage: vk::PipelineStageFlags2) -> vk::SemaphoreSubmitInfo<'static> {
        vk::SemaphoreSubmitInfo::default().semaphore(semaphore.handle()).stage_mask(stage)
    }
}
