use std::path::{Path, PathBuf};

use ash::vk;
use prism_crate_tools::resource::PrismPath;
use serde::{Deserialize, Serialize};

use crate::{
    camera::RtCamera,
    error::{RenderError, RenderResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    Fifo,
    Mailbox,
    Immediate,
}

impl PresentMode {
    #[inline]
    pub fn vk(self) -> vk::PresentModeKHR {
        match self {
            PresentMode::Fifo => vk::PresentModeKHR::FIFO,
            PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// 光追管线使用的三个 SPIR-V 文件
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub raygen: PathBuf,
    pub miss: PathBuf,
    pub closest_hit: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            raygen: PrismPath::shader_build_path("rt/raygen.rgen"),
            miss: PrismPath::shader_build_path("rt/miss.rmiss"),
            closest_hit: PrismPath::shader_build_path("rt/closest_hit.rchit"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 1.0, 5.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov_deg: 60.0,
            near: 0.001,
            far: 10000.0,
        }
    }
}

impl CameraConfig {
    pub fn to_camera(&self, aspect_ratio: f32) -> RtCamera {
        RtCamera::look_at(
            self.position.into(),
            self.target.into(),
            self.up.into(),
            self.fov_deg,
            self.near,
            self.far,
            aspect_ratio,
        )
    }
}

/// 渲染器的配置，使用 toml 格式，所有字段都有默认值
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub app_name: String,
    /// 窗口的初始大小，交换链的实际大小由 surface 决定
    pub window_extent: [u32; 2],
    pub present_mode: PresentMode,
    pub clear_color: [f32; 4],
    /// 光追管线的最大递归深度
    pub max_ray_recursion_depth: u32,
    pub allow_integrated_gpu: bool,
    pub shaders: ShaderConfig,
    pub camera: CameraConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            app_name: "Prism".to_string(),
            window_extent: [1280, 720],
            present_mode: PresentMode::Fifo,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            max_ray_recursion_depth: 1,
            allow_integrated_gpu: false,
            shaders: ShaderConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn from_toml_str(content: &str) -> RenderResult<Self> {
        let mut config: Self = toml::from_str(content)?;
        if config.max_ray_recursion_depth == 0 {
            log::warn!("max_ray_recursion_depth must be at least 1");
            config.max_ray_recursion_depth = 1;
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> RenderResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RenderError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::info!("loaded renderer config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.present_mode.vk(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = RendererConfig::from_toml_str(
            r#"
            app_name = "viewer"
            present_mode = "mailbox"
            max_ray_recursion_depth = 0

            [camera]
            fov_deg = 45.0

            [shaders]
            raygen = "custom/raygen.spv"
            "#,
        )
        .unwrap();

        assert_eq!(config.app_name, "viewer");
        assert_eq!(config.present_mode, PresentMode::Mailbox);
        assert_eq!(config.max_ray_recursion_depth, 1);
        assert_eq!(config.camera.fov_deg, 45.0);
        assert_eq!(config.camera.near, CameraConfig::default().near);
        assert_eq!(config.shaders.raygen, PathBuf::from("custom/raygen.spv"));
        assert_eq!(config.shaders.miss, ShaderConfig::default().miss);
    }

    #[test]
    fn unknown_present_mode_is_an_error() {
        let result = RendererConfig::from_toml_str(r#"present_mode = "vsync""#);
        assert!(matches!(result, Err(RenderError::ConfigParse(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let result = RendererConfig::load(Path::new("/nonexistent/prism.toml"));
        assert!(matches!(result, Err(RenderError::ConfigIo { .. })));
    }
}
