use std::ffi::CStr;

use ash::vk;

use crate::gfx_core::GfxCore;
use crate::{
    commands::{
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        command_queue::{GfxCommandQueue, GfxQueueFamily},
        submit_info::GfxSubmitInfo,
    },
    error::GfxResult,
    foundation::{
        device::GfxDevice, physical_device::GfxPhysicalDevice,
        vmem_allocator::GfxVMemAllocator,
    },
};

/// Vulkan 图形上下文单例
///
/// 管理所有 Vulkan 核心资源，包括实例、设备、队列、内存分配器等。
/// 采用单例模式简化参数传递和生命周期管理，仅适用于单线程环境。
///
/// # 初始化流程
/// ```ignore
/// Gfx::init("MyApp", &extra_extensions, false)?;
/// let device = Gfx::get().gfx_device();
/// // 使用...
/// Gfx::destroy();
/// ```
pub struct Gfx {
    pub(crate) gfx_core: GfxCore,
    pub(crate) vm_allocator: GfxVMemAllocator,

    /// 临时的 graphics command pool，主要用于一次性的命令缓冲区
    pub(crate) temp_graphics_command_pool: GfxCommandPool,
}

// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "Prism";

    fn new(app_name: &str, instance_extra_exts: &[&'static CStr], allow_integrated_gpu: bool) -> GfxResult<Self> {
        let vk_ctx = GfxCore::new(app_name, Self::ENGINE_NAME, instance_extra_exts, allow_integrated_gpu)?;

        // 在初始化过程中单例还不可用，需要显式传入 device
        let gfx_command_pool = GfxCommandPool::new_with_device(
            &vk_ctx.gfx_device,
            vk_ctx.gfx_queue.queue_family.queue_family_index,
            vk::CommandPoolCreateFlags::TRANSIENT,
            "gfx-temp",
        )?;

        let allocator =
            GfxVMemAllocator::new(&vk_ctx.instance.ash_instance, vk_ctx.physical_device.vk_handle, &vk_ctx.gfx_device)?;

        Ok(Self {
            gfx_core: vk_ctx,
            vm_allocator: allocator,
            temp_graphics_command_pool: gfx_command_pool,
        })
    }
}

// 注意：此静态变量仅用于单线程环境
static mut G_GFX: Option<Gfx> = None;

// 单例模式
// - Gfx 自身的生命周期管理比较简单，因此适合使用单例模式
// - 其他类的类型签名也会变得更简单
impl Gfx {
    /// 获取单例实例
    ///
    /// # Panics
    /// 如果 Gfx 还未初始化，此方法会 panic
    ///
    /// # Safety
    /// 此方法仅在单线程环境下安全
    #[inline]
    pub fn get() -> &'static Gfx {
        unsafe {
            // 使用 addr_of! 避免直接对 static mut 创建引用，编译器不允许这种行为
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).as_ref().expect("Gfx not initialized. Call Gfx::init() first.")
        }
    }

    /// 初始化 Gfx 单例
    ///
    /// # Parameters
    /// - `app_name`: 应用程序名称
    /// - `instance_extra_exts`: 额外的 Vulkan 实例扩展（例如 surface 相关的扩展）
    /// - `allow_integrated_gpu`: 没有独立显卡时是否允许使用集成显卡
    ///
    /// # Panics
    /// 如果 Gfx 已经被初始化，此方法会 panic
    pub fn init(app_name: &str, instance_extra_exts: &[&'static CStr], allow_integrated_gpu: bool) -> GfxResult<()> {
        let gfx = Self::new(app_name, instance_extra_exts, allow_integrated_gpu)?;
        unsafe {
            // 使用 addr_of_mut! 避免直接对 static mut 创建可变引用
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            assert!((*ptr).is_none(), "Gfx already initialized");
            *ptr = Some(gfx);
        }
        Ok(())
    }

    /// 销毁 Gfx 单例
    ///
    /// 调用此方法后，不应再使用 Gfx::get()
    pub fn destroy() {
        unsafe {
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            let Some(context) = (*ptr).take() else {
                log::warn!("Gfx::destroy called before Gfx::init");
                return;
            };

            context.vm_allocator.destroy();
            context.temp_graphics_command_pool.destroy_with_device(&context.gfx_core.gfx_device);
            context.gfx_core.destroy();
        }
    }
}

// getter
impl Gfx {
    #[inline]
    pub fn gfx_core(&self) -> &GfxCore {
        &self.gfx_core
    }

    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxVMemAllocator {
        &self.vm_allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> GfxQueueFamily {
        self.gfx_core.gfx_queue.queue_family.clone()
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.gfx_queue
    }

    #[inline]
    pub fn rt_pipeline_props(&self) -> &vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'_> {
        &self.gfx_core.physical_device.rt_pipeline_props
    }

    #[inline]
    pub fn acceleration_structure_props(&self) -> &vk::PhysicalDeviceAccelerationStructurePropertiesKHR<'_> {
        &self.gfx_core.physical_device.acc_struct_props
    }
}

// tools
impl Gfx {
    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let command_buffer =
            GfxCommandBuffer::new(&self.temp_graphics_command_pool, &format!("one-time-{}", name.as_ref()))?;

        let result = (|| -> GfxResult<R> {
            command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref())?;
            let result = func(&command_buffer);
            command_buffer.end()?;

            self.gfx_queue().submit(&GfxSubmitInfo::new(&command_buffer), None)?;
            self.gfx_queue().wait_idle()?;
            Ok(result)
        })();

        command_buffer.free();
        result
    }

    pub fn wait_idle(&self) -> GfxResult<()> {
        self.gfx_device().wait_idle()
    }
}
