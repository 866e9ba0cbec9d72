use std::path::Path;

use ash::vk;
use prism_gfx::{
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier},
        submit_info::GfxSubmitInfo,
    },
    gfx::Gfx,
    pipelines::{
        rt_pipeline::{GfxRtPipeline, GfxRtPipelineDesc},
        shader::GfxShaderStageInfo,
    },
    resources::sampler::GfxSampler,
    swapchain::{
        render_swapchain::{GfxAcquireOutcome, GfxPresentOutcome, GfxRenderSwapchain},
        surface::GfxSurface,
    },
};
use prism_scene::{
    gltf_loader::{GltfSceneLoader, SceneLoader},
    scene::Scene,
};

use crate::{
    camera::RtCamera,
    config::RendererConfig,
    descriptor::DescriptorBinder,
    error::{RenderError, RenderResult},
    frame::{frame_resource_ring::FrameResourceRing, frame_slot::GpuFrameSlot},
    frame_constants::FrameConstants,
    scene_accel::{SceneAccel, vk_backend::VkAccelBackend},
};

/// 一次 [`Renderer::render`] 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// 交换链已经失效，本帧没有被呈现
    Skipped,
}

/// 光追渲染器
///
/// # 渲染流程
/// ```ignore
/// let mut renderer = Renderer::new(display, window, config)?;
/// renderer.load_scene(path)?;
/// loop {
///     renderer.camera_mut().set_position(pos);
///     renderer.render(&FrameConstants::new(frame_id, 0))?;
/// }
/// renderer.destroy()?;
/// ```
pub struct Renderer {
    config: RendererConfig,
    swapchain: GfxRenderSwapchain,
    frames: FrameResourceRing,
    sampler: GfxSampler,

    backend: VkAccelBackend,
    scene: SceneAccel<VkAccelBackend>,
    /// 贴图数组长度依赖场景，随场景一起重建
    binder: DescriptorBinder,
    pipeline: GfxRtPipeline,

    camera: RtCamera,
    loader: GltfSceneLoader,
}

// new & init
impl Renderer {
    pub fn new(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        config: RendererConfig,
    ) -> RenderResult<Self> {
        let _span = tracy_client::span!("Renderer::new");

        let instance_exts = GfxSurface::required_instance_exts(raw_display_handle)?;
        Gfx::init(&config.app_name, &instance_exts, config.allow_integrated_gpu)?;

        let [width, height] = config.window_extent;
        let swapchain = GfxRenderSwapchain::new(
            raw_display_handle,
            raw_window_handle,
            config.present_mode.vk(),
            vk::Extent2D { width, height },
        )?;
        let frames = FrameResourceRing::new(swapchain.image_count(), swapchain.extent())?;
        let sampler = GfxSampler::new_linear_repeat("material-sampler")?;

        let mut backend = VkAccelBackend;
        let scene = SceneAccel::empty(&mut backend)?;
        let (binder, pipeline) = Self::create_pipeline(&config, frames.slot_count(), scene.material_count())?;

        let extent = swapchain.extent();
        let camera = config.camera.to_camera(extent.width as f32 / extent.height.max(1) as f32);

        let renderer = Self {
            config,
            swapchain,
            frames,
            sampler,
            backend,
            scene,
            binder,
            pipeline,
            camera,
            loader: GltfSceneLoader,
        };
        renderer.bind_all_slots();
        Ok(renderer)
    }

    /// 描述符集布局与光追管线
    fn create_pipeline(
        config: &RendererConfig,
        slot_count: usize,
        material_count: usize,
    ) -> RenderResult<(DescriptorBinder, GfxRtPipeline)> {
        let binder = DescriptorBinder::new(slot_count, material_count as u32)?;

        let desc = GfxRtPipelineDesc {
            raygen: GfxShaderStageInfo::new(vk::ShaderStageFlags::RAYGEN_KHR, config.shaders.raygen.clone()),
            miss: vec![GfxShaderStageInfo::new(vk::ShaderStageFlags::MISS_KHR, config.shaders.miss.clone())],
            closest_hit: vec![GfxShaderStageInfo::new(
                vk::ShaderStageFlags::CLOSEST_HIT_KHR,
                config.shaders.closest_hit.clone(),
            )],
            set_layouts: vec![binder.layout().handle()],
            push_constant_size: size_of::<FrameConstants>() as u32,
            max_ray_recursion_depth: config.max_ray_recursion_depth,
        };
        match GfxRtPipeline::new(&desc, "rt-pipeline") {
            Ok(pipeline) => Ok((binder, pipeline)),
            Err(e) => {
                binder.destroy();
                Err(e.into())
            }
        }
    }

    fn bind_all_slots(&self) {
        for (slot_index, slot) in self.frames.ring().slots().iter().enumerate() {
            self.binder.bind_slot(slot_index, slot.bindings(), &self.scene, &self.sampler);
        }
    }
}

// scene
impl Renderer {
    pub fn load_scene(&mut self, path: &Path) -> RenderResult<()> {
        log::info!("load scene from {:?}", path);
        let scene = self.loader.load(path)?;
        self.load_scene_data(scene)
    }

    /// 构建新场景的加速结构并替换当前场景；失败时当前场景保持不变
    pub fn load_scene_data(&mut self, scene: Scene) -> RenderResult<()> {
        let _span = tracy_client::span!("Renderer::load_scene_data");

        // 旧场景的资源可能仍在被 GPU 使用
        self.frames.ring_mut().drain()?;
        Gfx::get().wait_idle()?;

        let new_scene = SceneAccel::build(&mut self.backend, &scene)?;
        let (binder, pipeline) =
            match Self::create_pipeline(&self.config, self.frames.slot_count(), new_scene.material_count()) {
                Ok(created) => created,
                Err(e) => {
                    new_scene.destroy(&mut self.backend);
                    return Err(e);
                }
            };

        let old_scene = std::mem::replace(&mut self.scene, new_scene);
        let old_binder = std::mem::replace(&mut self.binder, binder);
        let old_pipeline = std::mem::replace(&mut self.pipeline, pipeline);
        old_pipeline.destroy();
        old_binder.destroy();
        old_scene.destroy(&mut self.backend);

        self.bind_all_slots();
        log::info!(
            "scene loaded: {} instances, {} primitives, {} materials",
            self.scene.tlas().map_or(0, |tlas| tlas.instance_count),
            self.scene.blas().len(),
            self.scene.material_count()
        );
        Ok(())
    }
}

// render
impl Renderer {
    pub fn render(&mut self, frame_constants: &FrameConstants) -> RenderResult<FrameOutcome> {
        let _span = tracy_client::span!("Renderer::render");

        let slot_index = self.frames.ring_mut().acquire_slot()?;
        let frame_name = self.frames.ring().counter().frame_name();

        let acquired = self.swapchain.acquire_next_image(&self.frames.ring().slot(slot_index).image_acquired)?;
        let image_index = match acquired {
            GfxAcquireOutcome::Acquired { image_index, .. } => image_index,
            GfxAcquireOutcome::OutOfDate => {
                log::warn!("{} skipped: swapchain out of date", frame_name);
                return Ok(FrameOutcome::Skipped);
            }
        };

        self.frames.ring_mut().begin_recording(slot_index)?;
        let recorded = self.record(slot_index, image_index, frame_constants, &frame_name);
        if let Err(e) = recorded {
            log::error!("{} recording failed: {}", frame_name, e);
            self.release_acquired_image(slot_index, image_index, &frame_name);
            return Err(e);
        }

        self.frames.ring_mut().submit_with(slot_index, |slot| {
            let batch = GfxSubmitInfo::new(&slot.command_buffer)
                .wait(&slot.image_acquired, vk::PipelineStageFlags2::TRANSFER)
                .signal(&slot.render_finished, vk::PipelineStageFlags2::ALL_COMMANDS);
            Ok(Gfx::get().gfx_queue().submit(&batch, Some(&slot.fence))?)
        })?;

        let slot = self.frames.ring().slot(slot_index);
        let presented =
            self.swapchain.present_image(Gfx::get().gfx_queue(), image_index, &[&slot.render_finished])?;
        match presented {
            GfxPresentOutcome::Presented { .. } => Ok(FrameOutcome::Presented),
            GfxPresentOutcome::OutOfDate => {
                log::warn!("{} rendered but not presented: swapchain out of date", frame_name);
                Ok(FrameOutcome::Skipped)
            }
        }
    }

    /// 录制失败时，仍然需要消耗 image-acquired semaphore 并把交换链图像交还给 present engine
    ///
    /// 只录制一个 UNDEFINED -> PRESENT_SRC_KHR 的 layout 转换；这里的失败只记录日志
    fn release_acquired_image(&mut self, slot_index: usize, image_index: u32, frame_name: &str) {
        let present_image = self.swapchain.present_images()[image_index as usize];
        let released = self.frames.ring_mut().release_with(slot_index, |slot| {
            let cmd = &slot.command_buffer;
            cmd.reset()?;
            cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{}release", frame_name))?;
            let to_present = GfxImageBarrier::new()
                .image(present_image)
                .src_mask(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::empty())
                .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::empty())
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR);
            cmd.pipeline_barrier(std::slice::from_ref(&to_present), &[]);
            cmd.end()?;

            let batch = GfxSubmitInfo::new(cmd)
                .wait(&slot.image_acquired, vk::PipelineStageFlags2::ALL_COMMANDS)
                .signal(&slot.render_finished, vk::PipelineStageFlags2::ALL_COMMANDS);
            Ok(Gfx::get().gfx_queue().submit(&batch, Some(&slot.fence))?)
        });
        if let Err(e) = released {
            log::error!("{} failed to release swapchain image {}: {}", frame_name, image_index, e);
            return;
        }

        let slot = self.frames.ring().slot(slot_index);
        if let Err(e) = self.swapchain.present_image(Gfx::get().gfx_queue(), image_index, &[&slot.render_finished]) {
            log::error!("{} failed to present released image {}: {}", frame_name, image_index, e);
        }
    }

    fn record(
        &self,
        slot_index: usize,
        image_index: u32,
        frame_constants: &FrameConstants,
        frame_name: &str,
    ) -> RenderResult<()> {
        let _span = tracy_client::span!("Renderer::record");
        let slot = self.frames.ring().slot(slot_index);
        let descriptor_set = self.binder.set(slot_index).ok_or(RenderError::MissingDescriptorSet(slot_index))?;
        let present_image = self.swapchain.present_images()[image_index as usize];

        // slot 的 fence 已经等待过，stage buffer 可以直接写入
        slot.camera_stage_buffer.transfer_data_by_mmap(self.camera.as_bytes())?;

        let cmd = &slot.command_buffer;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("{}ray-tracing", frame_name))?;

        Self::record_clear(slot, self.config.clear_color);
        Self::record_camera_upload(slot);

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::RAY_TRACING_KHR, self.pipeline.pipeline());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::RAY_TRACING_KHR,
            self.pipeline.pipeline_layout(),
            0,
            &[descriptor_set.handle()],
        );
        let frame_constants = frame_constants.with_max_depth(self.config.max_ray_recursion_depth);
        cmd.cmd_push_constants(
            self.pipeline.pipeline_layout(),
            GfxRtPipelineDesc::push_constant_stages(),
            0,
            frame_constants.as_bytes(),
        );
        let extent = slot.output_extent();
        let (raygen, miss, hit, callable) = self.pipeline.sbt_regions();
        cmd.trace_rays(raygen, miss, hit, callable, [extent.width, extent.height, 1]);

        Self::record_blit_to_present(slot, present_image, self.swapchain.extent());

        cmd.end()?;
        Ok(())
    }

    /// 输出图像 UNDEFINED -> GENERAL，并清空
    fn record_clear(slot: &GpuFrameSlot, clear_color: [f32; 4]) {
        let cmd = &slot.command_buffer;
        let output = slot.output_image.handle();

        let to_general = GfxImageBarrier::new()
            .image(output)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::CLEAR, vk::AccessFlags2::TRANSFER_WRITE)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL);
        cmd.pipeline_barrier(std::slice::from_ref(&to_general), &[]);

        cmd.cmd_clear_color_image(output, vk::ImageLayout::GENERAL, clear_color);

        let clear_to_trace = GfxImageBarrier::new()
            .image(output)
            .src_mask(vk::PipelineStageFlags2::CLEAR, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(
                vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
                vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            )
            .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::GENERAL);
        cmd.pipeline_barrier(std::slice::from_ref(&clear_to_trace), &[]);
    }

    /// 相机数据 stage buffer -> uniform buffer
    fn record_camera_upload(slot: &GpuFrameSlot) {
        let cmd = &slot.command_buffer;
        let size = size_of::<RtCamera>() as vk::DeviceSize;
        cmd.cmd_copy_buffer(
            &slot.camera_stage_buffer,
            &slot.camera_buffer,
            &[vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            }],
        );

        let barrier = GfxBufferBarrier::new()
            .buffer(slot.camera_buffer.vk_buffer(), 0, size)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, vk::AccessFlags2::UNIFORM_READ);
        cmd.pipeline_barrier(&[], std::slice::from_ref(&barrier));
    }

    /// 输出图像 blit 到交换链图像，交换链图像最终处于 PRESENT_SRC_KHR
    fn record_blit_to_present(slot: &GpuFrameSlot, present_image: vk::Image, present_extent: vk::Extent2D) {
        let cmd = &slot.command_buffer;
        let output = slot.output_image.handle();

        let barriers = [
            GfxImageBarrier::new()
                .image(output)
                .src_mask(vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, vk::AccessFlags2::SHADER_STORAGE_WRITE)
                .dst_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_READ)
                .layout_transfer(vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            // 交换链图像的获取由 semaphore 在 TRANSFER 阶段等待
            GfxImageBarrier::new()
                .image(present_image)
                .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::empty())
                .dst_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_WRITE)
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        ];
        cmd.pipeline_barrier(&barriers, &[]);

        let src_extent = slot.output_extent();
        let subresource = vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let region = vk::ImageBlit2::default()
            .src_subresource(subresource)
            .src_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: src_extent.width as i32,
                    y: src_extent.height as i32,
                    z: 1,
                },
            ])
            .dst_subresource(subresource)
            .dst_offsets([
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: present_extent.width as i32,
                    y: present_extent.height as i32,
                    z: 1,
                },
            ]);
        cmd.cmd_blit_image(
            &vk::BlitImageInfo2::default()
                .src_image(output)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_image(present_image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&region))
                .filter(vk::Filter::NEAREST),
        );

        let to_present = GfxImageBarrier::new()
            .image(present_image)
            .src_mask(vk::PipelineStageFlags2::BLIT, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::empty())
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR);
        cmd.pipeline_barrier(std::slice::from_ref(&to_present), &[]);
    }
}

// getter
impl Renderer {
    #[inline]
    pub fn camera(&self) -> &RtCamera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut RtCamera {
        &mut self.camera
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn scene(&self) -> &SceneAccel<VkAccelBackend> {
        &self.scene
    }

    /// 下一次 [`Self::render`] 的帧序号
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frames.ring().counter().frame_id()
    }

    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

// destroy
impl Renderer {
    /// 等待所有帧完成后销毁全部资源，最后销毁 Gfx 单例
    pub fn destroy(mut self) -> RenderResult<()> {
        let _span = tracy_client::span!("Renderer::destroy");
        let frames_result = self.frames.destroy();

        self.pipeline.destroy();
        self.binder.destroy();
        self.scene.destroy(&mut self.backend);
        self.sampler.destroy();
        self.swapchain.destroy();
        Gfx::destroy();

        log::info!("renderer destroyed");
        frames_result
    }
}
