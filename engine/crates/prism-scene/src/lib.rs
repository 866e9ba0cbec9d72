//! CPU 侧的场景描述
//!
//! 渲染器只会在载入场景时遍历一次 [`scene::Scene`]，之后所有数据都位于 GPU 上

pub mod error;
pub mod gltf_loader;
pub mod material;
pub mod scene;
pub mod texture;
pub mod vertex;
