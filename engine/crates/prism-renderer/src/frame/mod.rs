//! 帧资源
//!
//! - [`frame_counter`]：帧序号与 slot 下标
//! - [`frame_ring`]：与 GPU 无关的 slot 状态机
//! - [`frame_slot`]：一个 slot 持有的 Vulkan 资源
//! - [`frame_resource_ring`]：拥有 command pool 与所有 slot

pub mod frame_counter;
pub mod frame_resource_ring;
pub mod frame_ring;
pub mod frame_slot;
