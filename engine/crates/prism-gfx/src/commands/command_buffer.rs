use ash::vk;
use itertools::Itertools;

use crate::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        command_pool::GfxCommandPool,
    },
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// primary command buffer
///
/// 所有录制函数都只是对 `vkCmd*` 的薄封装，状态检查交给 validation layer
///
/// ```ignore
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "ray-tracing")?;
/// cmd.cmd_bind_pipeline(vk::PipelineBindPoint::RAY_TRACING_KHR, pipeline);
/// cmd.trace_rays(&raygen, &miss, &hit, &callable, [width, height, 1]);
/// cmd.end()?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    command_pool_handle: vk::CommandPool,
}
// new & init
impl GfxCommandBuffer {
    pub fn new(command_pool: &GfxCommandPool, debug_name: &str) -> GfxResult<Self> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let gfx_device = Gfx::get().gfx_device();
        let handles = unsafe { gfx_device.allocate_command_buffers(&info)? };
        let command_buffer = Self {
            vk_handle: handles[0],
            command_pool_handle: command_pool.handle(),
        };
        gfx_device.set_debug_name(&command_buffer, debug_name);
        Ok(command_buffer)
    }

    /// 归还给分配它的 pool；随 pool 一起销毁时无需调用
    pub fn free(self) {
        unsafe {
            Gfx::get().gfx_device().free_command_buffers(self.command_pool_handle, &[self.vk_handle]);
        }
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}
// 录制的开始与结束
impl GfxCommandBuffer {
    /// 隐式 reset，因此 pool 需要 RESET_COMMAND_BUFFER；整个录制过程包在一个 debug label 中
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> GfxResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(usage_flag);
        unsafe { Gfx::get().gfx_device().begin_command_buffer(self.vk_handle, &begin_info)? };
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 丢弃已经录制的命令，处于录制中的 command buffer 也可以 reset
    pub fn reset(&self) -> GfxResult<()> {
        unsafe {
            Gfx::get()
                .gfx_device()
                .reset_command_buffer(self.vk_handle, vk::CommandBufferResetFlags::empty())?
        };
        Ok(())
    }

    pub fn end(&self) -> GfxResult<()> {
        self.end_label();
        unsafe { Gfx::get().gfx_device().end_command_buffer(self.vk_handle)? };
        Ok(())
    }
}
// 传输
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_copy_buffer(&self, src: &GfxBuffer, dst: &GfxBuffer, regions: &[vk::BufferCopy]) {
        unsafe {
            Gfx::get().gfx_device().cmd_copy_buffer(self.vk_handle, src.vk_buffer(), dst.vk_buffer(), regions);
        }
    }

    #[inline]
    pub fn cmd_copy_buffer_to_image(&self, copy_info: &vk::CopyBufferToImageInfo2) {
        unsafe { Gfx::get().gfx_device().cmd_copy_buffer_to_image2(self.vk_handle, copy_info) }
    }

    /// 清空整个 image 的第 0 层 mip，image 需要处于 GENERAL 或 TRANSFER_DST_OPTIMAL
    pub fn cmd_clear_color_image(&self, image: vk::Image, layout: vk::ImageLayout, color: [f32; 4]) {
        let range = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .level_count(1)
            .layer_count(1);
        unsafe {
            Gfx::get().gfx_device().cmd_clear_color_image(
                self.vk_handle,
                image,
                layout,
                &vk::ClearColorValue { float32: color },
                &[range],
            );
        }
    }

    /// 可以在 blit 的同时完成格式转换，例如 RGBA8 -> BGRA8
    #[inline]
    pub fn cmd_blit_image(&self, blit_info: &vk::BlitImageInfo2) {
        unsafe { Gfx::get().gfx_device().cmd_blit_image2(self.vk_handle, blit_info) }
    }
}
// 管线状态
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { Gfx::get().gfx_device().cmd_bind_pipeline(self.vk_handle, bind_point, pipeline) }
    }

    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        pipeline_layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            Gfx::get().gfx_device().cmd_bind_descriptor_sets(
                self.vk_handle,
                bind_point,
                pipeline_layout,
                first_set,
                descriptor_sets,
                &[],
            );
        }
    }

    #[inline]
    pub fn cmd_push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe { Gfx::get().gfx_device().cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data) }
    }
}
// 光追
impl GfxCommandBuffer {
    /// 一次只构建一个加速结构
    pub fn build_acceleration_structure(
        &self,
        geometry: &vk::AccelerationStructureBuildGeometryInfoKHR,
        ranges: &[vk::AccelerationStructureBuildRangeInfoKHR],
    ) {
        unsafe {
            Gfx::get().gfx_device().acceleration_structure.cmd_build_acceleration_structures(
                self.vk_handle,
                std::slice::from_ref(geometry),
                &[ranges],
            )
        }
    }

    /// `thread_size` 通常为输出图像的 [width, height, 1]
    pub fn trace_rays(
        &self,
        raygen_table: &vk::StridedDeviceAddressRegionKHR,
        miss_table: &vk::StridedDeviceAddressRegionKHR,
        hit_table: &vk::StridedDeviceAddressRegionKHR,
        callable_table: &vk::StridedDeviceAddressRegionKHR,
        thread_size: [u32; 3],
    ) {
        let [width, height, depth] = thread_size;
        unsafe {
            Gfx::get().gfx_device().ray_tracing_pipeline.cmd_trace_rays(
                self.vk_handle,
                raygen_table,
                miss_table,
                hit_table,
                callable_table,
                width,
                height,
                depth,
            );
        }
    }
}
// 同步
impl GfxCommandBuffer {
    /// 一次 vkCmdPipelineBarrier2 提交所有 image 与 buffer barrier
    pub fn pipeline_barrier(&self, image_barriers: &[GfxImageBarrier], buffer_barriers: &[GfxBufferBarrier]) {
        let image_barriers = image_barriers.iter().map(|b| *b.inner()).collect_vec();
        let buffer_barriers = buffer_barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe { Gfx::get().gfx_device().cmd_pipeline_barrier2(self.vk_handle, &dependency_info) }
    }
}
// debug label
impl GfxCommandBuffer {
    /// 名字中含有 `\0` 时不插入 label
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Ok(name) = std::ffi::CString::new(label_name) else {
            return;
        };
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into());
        unsafe { Gfx::get().gfx_device().debug_utils.cmd_begin_debug_utils_label(self.vk_handle, &label) }
    }

    #[inline]
    pub fn end_label(&self) {
        unsafe { Gfx::get().gfx_device().debug_utils.cmd_end_debug_utils_label(self.vk_handle) }
    }
}
impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
