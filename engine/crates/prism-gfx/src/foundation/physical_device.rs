use std::{ffi::CStr, ptr::null_mut};

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::command_queue::GfxQueueFamily,
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    /// 当前 gpu 的 ray tracing 属性
    pub(crate) rt_pipeline_props: vk::PhysicalDeviceRayTracingPipelinePropertiesKHR<'static>,

    /// 当前 gpu 的加速结构属性
    pub(crate) acc_struct_props: vk::PhysicalDeviceAccelerationStructurePropertiesKHR<'static>,

    /// 当前 gpu 支持的 device extensions
    device_extensions: Vec<String>,

    pub(crate) gfx_queue_family: Option<GfxQueueFamily>,
}

impl GfxPhysicalDevice {
    /// 选择一张支持光线追踪的物理显卡
    ///
    /// 默认只接受独立显卡；`allow_integrated` 为 true 时，在没有独立显卡的情况下退而选择集成显卡
    pub fn select(instance: &ash::Instance, allow_integrated: bool) -> GfxResult<Self> {
        let candidates = unsafe { instance.enumerate_physical_devices()? }
            .into_iter()
            .map(|pdevice| GfxPhysicalDevice::new(pdevice, instance))
            .collect::<GfxResult<Vec<_>>>()?;

        let usable = |pdevice: &GfxPhysicalDevice| {
            pdevice.gfx_queue_family.is_some()
                && GfxDevice::required_device_exts().iter().all(|ext| pdevice.support_extension(ext))
        };

        let (discrete, others): (Vec<_>, Vec<_>) =
            candidates.into_iter().filter(usable).partition(GfxPhysicalDevice::is_descrete_gpu);

        if let Some(pdevice) = discrete.into_iter().next() {
            return Ok(pdevice);
        }
        if allow_integrated {
            if let Some(pdevice) = others.into_iter().next() {
                log::warn!("no discrete gpu found, fallback to {:?}", pdevice.device_name());
                return Ok(pdevice);
            }
        }

        Err(GfxError::NoSuitableGpu(
            "no discrete gpu with graphics queue and ray tracing extensions".to_string(),
        ))
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> GfxResult<Self> {
        unsafe {
            let rt_props;
            let basic_props;
            let acc_props;
            {
                let mut pdevice_raytracing_props = vk::PhysicalDeviceRayTracingPipelinePropertiesKHR::default();
                let mut pdevice_acc_props = vk::PhysicalDeviceAccelerationStructurePropertiesKHR::default();
                let mut pdevice_props2 = vk::PhysicalDeviceProperties2::default()
                    .push_next(&mut pdevice_raytracing_props)
                    .push_next(&mut pdevice_acc_props);
                instance.get_physical_device_properties2(pdevice, &mut pdevice_props2);

                basic_props = pdevice_props2.properties;

                pdevice_raytracing_props.p_next = null_mut();
                rt_props = pdevice_raytracing_props;

                pdevice_acc_props.p_next = null_mut();
                acc_props = pdevice_acc_props;
            }
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?} ({:?})", physical_device_name, basic_props.device_type);

            let device_extensions = instance
                .enumerate_device_extension_properties(pdevice)?
                .iter()
                .map(|ext| CStr::from_ptr(ext.extension_name.as_ptr()).to_string_lossy().into_owned())
                .collect_vec();
            log::debug!("physical device supports extensions: {}", device_extensions.join("\n"));

            // 全能的 Queue：graphics, compute, transfer
            let queue_familiy_props = instance.get_physical_device_queue_family_properties(pdevice);
            let required_flags = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER;
            let gfx_queue_family = queue_familiy_props
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(required_flags))
                .map(|(family_idx, props)| GfxQueueFamily {
                    name: "gfx".to_string(),
                    queue_family_index: family_idx as u32,
                    queue_flags: props.queue_flags,
                    queue_count: props.queue_count,
                });

            Ok(Self {
                vk_handle: pdevice,
                basic_props,
                rt_pipeline_props: rt_props,
                acc_struct_props: acc_props,
                device_extensions,
                gfx_queue_family,
            })
        }
    }

    pub fn destroy(self) {
        // 无需销毁
    }
}

// getter
impl GfxPhysicalDevice {
    /// 当前 gpu 是否是独立显卡
    #[inline]
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    pub fn device_name(&self) -> String {
        unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()) }.to_string_lossy().into_owned()
    }

    pub fn support_extension(&self, ext: &CStr) -> bool {
        let ext = ext.to_string_lossy();
        self.device_extensions.iter().any(|supported| *supported == ext)
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
