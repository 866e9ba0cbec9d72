use std::path::PathBuf;

use prism_crate_tools::{init_log::init_log, resource::PrismPath};
use prism_renderer::config::RendererConfig;
use prism_winit_app::app::PrismApp;

/// 用法：prism-viewer [scene.gltf]
///
/// 工作区根目录下存在 prism.toml 时使用其中的配置
fn main() -> anyhow::Result<()> {
    init_log();
    let _tracy = tracy_client::Client::start();

    let scene_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config_path = PrismPath::config_path("prism.toml");
    let config = if config_path.exists() {
        RendererConfig::load(&config_path)?
    } else {
        log::info!("{:?} not found, use default config", config_path);
        RendererConfig::default()
    };

    PrismApp::run(config, scene_path)
}
