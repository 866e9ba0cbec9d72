use ash::vk;
use prism_gfx::{
    commands::{
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        sync::{GfxFence, GfxSemaphore},
    },
    resources::{
        buffer::GfxBuffer,
        image::{GfxImage, GfxImageCreateInfo},
        image_view::GfxImageView,
    },
};

use crate::{
    camera::RtCamera,
    descriptor::SlotBindings,
    error::RenderResult,
    frame::frame_ring::SlotFence,
};

/// 光追输出图像的格式
pub const OUTPUT_IMAGE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// 一个 frame slot 独占的 GPU 资源
///
/// # Destroy
/// 需要手动调用 [`GpuFrameSlot::destroy`]，调用前 slot 的 fence 必须已经触发
pub struct GpuFrameSlot {
    pub command_buffer: GfxCommandBuffer,
    /// 创建时处于 signaled 状态
    pub fence: GfxFence,
    pub image_acquired: GfxSemaphore,
    pub render_finished: GfxSemaphore,

    pub output_image: GfxImage,
    pub output_view: GfxImageView,

    /// host 可写，每帧写入相机数据后拷贝到 `camera_buffer`
    pub camera_stage_buffer: GfxBuffer,
    pub camera_buffer: GfxBuffer,
}

// new & init
impl GpuFrameSlot {
    pub fn new(command_pool: &GfxCommandPool, slot_index: usize, extent: vk::Extent2D) -> RenderResult<Self> {
        let name = |what: &str| format!("slot-{}-{}", slot_index, what);

        let command_buffer = GfxCommandBuffer::new(command_pool, &name("cmd"))?;
        let fence = GfxFence::new(true, &name("fence"))?;
        let image_acquired = GfxSemaphore::new(&name("image-acquired"))?;
        let render_finished = GfxSemaphore::new(&name("render-finished"))?;

        let output_image = GfxImage::new(
            &GfxImageCreateInfo::new_image_2d_info(
                extent,
                OUTPUT_IMAGE_FORMAT,
                vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST,
            ),
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            &name("output"),
        )?;
        let output_view = GfxImageView::new_2d(output_image.handle(), OUTPUT_IMAGE_FORMAT, name("output-view"))?;

        let camera_size = size_of::<RtCamera>() as vk::DeviceSize;
        let camera_stage_buffer = GfxBuffer::new_stage_buffer(camera_size, name("camera-stage"))?;
        let camera_buffer = GfxBuffer::new(
            camera_size,
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            None,
            false,
            name("camera"),
        )?;

        Ok(Self {
            command_buffer,
            fence,
            image_acquired,
            render_finished,
            output_image,
            output_view,
            camera_stage_buffer,
            camera_buffer,
        })
    }
}

// getter
impl GpuFrameSlot {
    /// 写入描述符集时用到的资源
    #[inline]
    pub fn bindings(&self) -> SlotBindings {
        SlotBindings {
            output_view: self.output_view.handle(),
            camera_buffer: self.camera_buffer.vk_buffer(),
        }
    }

    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        self.output_image.extent_2d()
    }
}

// destroy
impl GpuFrameSlot {
    /// command buffer 随 command pool 一起释放
    pub fn destroy(self) {
        self.camera_buffer.destroy();
        self.camera_stage_buffer.destroy();
        self.output_view.destroy();
        self.output_image.destroy();
        self.render_finished.destroy();
        self.image_acquired.destroy();
        self.fence.destroy();
    }
}

impl SlotFence for GpuFrameSlot {
    fn wait(&self) -> RenderResult<()> {
        Ok(self.fence.wait()?)
    }

    fn reset(&self) -> RenderResult<()> {
        Ok(self.fence.reset()?)
    }
}
