//! 硬件光追渲染器的核心
//!
//! - [`scene_accel`]：场景 -> geometry buffer -> BLAS -> 间接索引表 / TLAS
//! - [`descriptor`]：将 TLAS、输出图像、相机以及各种表绑定到每个 frame slot 的描述符集
//! - [`frame`]：frame slot 环，驱动每一帧的录制与提交
//! - [`renderer`]：对外的接口

pub mod camera;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod frame_constants;
pub mod renderer;
pub mod scene_accel;
