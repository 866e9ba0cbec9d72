use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let scene = PrismPath::assets_path("cornell-box.glb");          // assets/cornell-box.glb
/// let shader = PrismPath::shader_build_path("rt/raygen.rgen");    // engine/shader/.build/rt/raygen.rgen.spv
/// ```
pub struct PrismPath {}
// 核心路径
impl PrismPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }

    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    /// 工作区根目录下的渲染器配置文件
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }
}
// engine 目录下
impl PrismPath {
    pub fn shader_root_path() -> PathBuf {
        Self::engine_path().join("shader")
    }

    /// 获取 `engine/shader/.build/` 目录下的着色器路径（编译后的 SPIR-V）
    pub fn shader_build_path(filename: &str) -> PathBuf {
        let mut file_name = filename.to_string();
        file_name.push_str(".spv");
        Self::shader_root_path().join(".build").join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_build_path_appends_spv_suffix() {
        let path = PrismPath::shader_build_path("rt/raygen.rgen");
        assert!(path.ends_with("engine/shader/.build/rt/raygen.rgen.spv"));
    }

    #[test]
    fn assets_live_under_workspace() {
        let path = PrismPath::assets_path("scene.glb");
        assert!(path.starts_with(PrismPath::workspace_path()));
        assert!(path.ends_with("assets/scene.glb"));
    }
}
