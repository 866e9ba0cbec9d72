use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use crate::{
    commands::command_queue::GfxCommandQueue,
    error::{GfxError, GfxResult},
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
};

pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// Vulkan 设备函数指针集合
    ///
    /// queue 等对象在单例初始化之前就需要访问 device，因此通过 Rc 共享
    pub(crate) gfx_device: Rc<GfxDevice>,

    pub(crate) debug_utils: GfxDebugMsger,

    pub(crate) gfx_queue: GfxCommandQueue,
}

// 创建与销毁
impl GfxCore {
    pub fn new(
        app_name: &str,
        engine_name: &str,
        instance_extra_exts: &[&'static CStr],
        allow_integrated_gpu: bool,
    ) -> GfxResult<Self> {
        let vk_pf = unsafe { ash::Entry::load()? };
        let instance = GfxInstance::new(&vk_pf, app_name, engine_name, instance_extra_exts)?;
        let physical_device = GfxPhysicalDevice::select(instance.ash_instance(), allow_integrated_gpu)?;
        let gfx_queue_family = physical_device
            .gfx_queue_family
            .clone()
            .ok_or_else(|| GfxError::NoSuitableGpu("missing graphics queue family".to_string()))?;

        // 只使用一个全能的 queue，加速结构构建、光追与 present 都在这个 queue 上完成
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(gfx_queue_family.queue_family_index)
            .queue_priorities(&[1.0])];

        let device = Rc::new(GfxDevice::new(&instance.ash_instance, physical_device.vk_handle, &queue_create_infos)?);
        let gfx_queue = GfxCommandQueue {
            vk_queue: unsafe { device.get_device_queue(gfx_queue_family.queue_family_index, 0) },
            queue_family: gfx_queue_family,
            gfx_device: device.clone(),
        };

        let debug_utils = GfxDebugMsger::new(&vk_pf, &instance.ash_instance)?;

        log::info!("gfx queue's queue family:\n{:#?}", gfx_queue.queue_family);

        // 在 device 以及 debug_utils 之前创建的 vk::Handle
        {
            device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            device.set_object_debug_name(physical_device.vk_handle, "GfxPhysicalDevice");

            device.set_object_debug_name(device.vk_handle(), "GfxDevice");
            device.set_object_debug_name(gfx_queue.vk_queue, "GfxCommandQueue-gfx");
        }

        Ok(Self {
            vk_entry: vk_pf,
            instance,
            physical_device,
            gfx_device: device,
            debug_utils,
            gfx_queue,
        })
    }

    pub fn destroy(self) {
        let Self {
            vk_entry,
            instance,
            physical_device,
            gfx_device,
            debug_utils,
            gfx_queue,
        } = self;

        drop(gfx_queue);
        debug_utils.destroy();
        gfx_device.destroy();
        physical_device.destroy();
        instance.destroy();
        drop(vk_entry);
    }
}
