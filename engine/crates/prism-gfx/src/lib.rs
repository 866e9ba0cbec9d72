//! Vulkan RHI (Rendering Hardware Interface) 抽象层
//!
//! 提供对 Vulkan API 的封装，包括设备管理、命令缓冲、描述符、光追管线、加速结构与交换链。
//! 所有 Vulkan 资源通过 [`gfx::Gfx`] 单例统一管理，简化生命周期和借用关系。
//!
//! 所有可能失败的 Vulkan 调用都返回 [`error::GfxResult`]，由上层决定如何处理。

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod gfx_core;
pub mod pipelines;
pub mod raytracing;
pub mod resources;
pub mod swapchain;
