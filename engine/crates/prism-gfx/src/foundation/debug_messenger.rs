use std::{borrow::Cow, ffi::CStr};

use ash::vk;

use crate::error::GfxResult;

/// validation layer 消息转发到 `log`
///
/// # Destroy
/// 需要在 instance 销毁之前调用 [`GfxDebugMsger::destroy`]
pub struct GfxDebugMsger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

// 创建与销毁
impl GfxDebugMsger {
    pub fn new(vk_pf: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_pf, instance);
        let messenger = unsafe { loader.create_debug_utils_messenger(&Self::debug_utils_messenger_ci(), None)? };
        Ok(Self { loader, messenger })
    }

    /// 同时会挂在 instance create info 上，捕获 instance 创建与销毁过程中的消息
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }

    pub fn destroy(self) {
        log::info!("destroy debug messenger");
        unsafe { self.loader.destroy_debug_utils_messenger(self.messenger, None) }
    }
}

/// # Safety
/// `ptr` 为空或指向以 `\0` 结尾的字符串
unsafe fn lossy_c_str<'a>(ptr: *const std::os::raw::c_char) -> Cow<'a, str> {
    if ptr.is_null() { Cow::Borrowed("") } else { unsafe { CStr::from_ptr(ptr).to_string_lossy() } }
}

/// # Safety
/// 由 vulkan loader 调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let data = unsafe { *p_callback_data };
    let id_name = unsafe { lossy_c_str(data.p_message_id_name) };
    let message = unsafe { lossy_c_str(data.p_message) };

    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
        _ => log::Level::Debug,
    };
    log::log!(target: "vulkan", level, "[{:?}] {}\n{}", message_type, id_name, message);

    // 返回 TRUE 会让触发消息的调用失败
    vk::FALSE
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}
