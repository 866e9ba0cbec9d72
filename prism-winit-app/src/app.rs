use std::path::PathBuf;

use prism_renderer::{
    config::RendererConfig,
    frame_constants::FrameConstants,
    renderer::{FrameOutcome, Renderer},
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::camera_controller::CameraController;

pub struct PrismApp {
    config: RendererConfig,
    scene_path: Option<PathBuf>,

    /// renderer 持有 surface，必须先于 window 销毁
    renderer: Option<Renderer>,
    window: Option<Window>,

    controller: CameraController,
    /// 相机静止时累加，相机移动后归零
    sample_index: u32,
    /// 事件循环中发生的第一个错误
    error: Option<anyhow::Error>,
}
// 总的 main 函数
impl PrismApp {
    /// 整个程序的入口
    pub fn run(config: RendererConfig, scene_path: Option<PathBuf>) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;

        let mut app = Self {
            config,
            scene_path,
            renderer: None,
            window: None,
            controller: CameraController::default(),
            sample_index: 0,
            error: None,
        };
        let run_result = event_loop.run_app(&mut app);
        log::info!("end run.");

        let destroy_result = app.destroy();
        if let Some(e) = app.error.take() {
            return Err(e);
        }
        run_result?;
        destroy_result
    }
}
// new & init
impl PrismApp {
    /// 在 window 创建之后调用，初始化 Renderer 并载入场景
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let [width, height] = self.config.window_extent;
        let window_attr = Window::default_attributes()
            .with_title(self.config.app_name.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));
        let window = event_loop.create_window(window_attr)?;

        let mut config = self.config.clone();
        let size = window.inner_size();
        config.window_extent = [size.width, size.height];

        let mut renderer = Renderer::new(
            window.display_handle()?.as_raw(),
            window.window_handle()?.as_raw(),
            config,
        )?;
        self.window = Some(window);

        if let Some(scene_path) = &self.scene_path {
            let loaded = renderer.load_scene(scene_path);
            self.renderer = Some(renderer);
            loaded?;
        } else {
            log::warn!("no scene path given, render an empty scene");
            self.renderer = Some(renderer);
        }
        Ok(())
    }
}
// update
impl PrismApp {
    fn render(&mut self) -> anyhow::Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        let frame_constants = FrameConstants::new(renderer.frame_id(), self.sample_index);
        match renderer.render(&frame_constants)? {
            FrameOutcome::Presented => self.sample_index = self.sample_index.wrapping_add(1),
            FrameOutcome::Skipped => {}
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }
}
// destroy
impl PrismApp {
    fn destroy(&mut self) -> anyhow::Result<()> {
        let result = match self.renderer.take() {
            Some(renderer) => renderer.destroy().map_err(anyhow::Error::from),
            None => Ok(()),
        };
        self.window = None;
        result
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for PrismApp {
    // 建议在这里创建 window 和 Renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("winit event: resumed");

        if let Err(e) = self.init_after_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let (PhysicalKey::Code(key), ElementState::Pressed) = (event.physical_key, event.state) else {
                    return;
                };
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if self.controller.handle_key(renderer.camera_mut(), key) {
                    self.sample_index = 0;
                }
            }
            WindowEvent::Resized(size) => {
                // 交换链不会重建，过期的帧会被跳过
                log::warn!("window resized to {}x{}, swapchain keeps its extent", size.width, size.height);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
