use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    gfx::Gfx,
    pipelines::shader::{GfxShaderGroupInfo, GfxShaderModule, GfxShaderStageInfo},
    resources::sbt_buffer::{GfxSbtBuffer, SbtLayout},
};

/// 光追管线所需的 shader，每个 shader 单独成为一个 group
///
/// group 的顺序为：raygen, miss..., hit...
pub struct GfxRtPipelineDesc {
    pub raygen: GfxShaderStageInfo,
    pub miss: Vec<GfxShaderStageInfo>,
    pub closest_hit: Vec<GfxShaderStageInfo>,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_size: u32,
    /// 这个仅仅是用来分配栈内存的，并不会在超过递归深度后让调用被丢弃
    pub max_ray_recursion_depth: u32,
}
impl GfxRtPipelineDesc {
    /// 所有 shader stage，按 group 顺序排列
    pub fn stages(&self) -> Vec<&GfxShaderStageInfo> {
        std::iter::once(&self.raygen).chain(self.miss.iter()).chain(self.closest_hit.iter()).collect_vec()
    }

    /// 每个 stage 对应一个 group：raygen/miss 为 general，closest hit 为 triangles hit group
    pub fn shader_groups(&self) -> Vec<GfxShaderGroupInfo> {
        let general_cnt = 1 + self.miss.len() as u32;
        let generals = (0..general_cnt).map(|stage_idx| GfxShaderGroupInfo {
            ty: vk::RayTracingShaderGroupTypeKHR::GENERAL,
            general: stage_idx,
            ..GfxShaderGroupInfo::unused()
        });
        let hits = (0..self.closest_hit.len() as u32).map(|hit_idx| GfxShaderGroupInfo {
            ty: vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP,
            closest_hit: general_cnt + hit_idx,
            ..GfxShaderGroupInfo::unused()
        });
        generals.chain(hits).collect_vec()
    }

    #[inline]
    pub fn push_constant_stages() -> vk::ShaderStageFlags {
        vk::ShaderStageFlags::RAYGEN_KHR | vk::ShaderStageFlags::MISS_KHR | vk::ShaderStageFlags::CLOSEST_HIT_KHR
    }
}

/// 光追管线以及对应的 shader binding table
pub struct GfxRtPipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,

    sbt_buffer: GfxSbtBuffer,
    sbt_region_raygen: vk::StridedDeviceAddressRegionKHR,
    sbt_region_miss: vk::StridedDeviceAddressRegionKHR,
    sbt_region_hit: vk::StridedDeviceAddressRegionKHR,
    sbt_region_callable: vk::StridedDeviceAddressRegionKHR,
}
// new & init
impl GfxRtPipeline {
    pub fn new(desc: &GfxRtPipelineDesc, debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();

        let mut shader_modules = Vec::new();
        for stage in desc.stages() {
            match GfxShaderModule::new(&stage.path) {
                Ok(module) => shader_modules.push(module),
                Err(e) => {
                    shader_modules.into_iter().for_each(GfxShaderModule::destroy);
                    return Err(e);
                }
            }
        }
        let stage_infos = desc
            .stages()
            .iter()
            .zip(shader_modules.iter())
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .module(module.handle())
                    .stage(stage.stage)
                    .name(stage.entry_point)
            })
            .collect_vec();
        let shader_groups = desc.shader_groups().iter().map(GfxShaderGroupInfo::vk_info).collect_vec();

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(GfxRtPipelineDesc::push_constant_stages())
            .offset(0)
            .size(desc.push_constant_size);
        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&desc.set_layouts)
            .push_constant_ranges(std::slice::from_ref(&push_constant_range));

        let pipeline_layout = unsafe { gfx_device.create_pipeline_layout(&pipeline_layout_ci, None) };
        let pipeline_layout = match pipeline_layout {
            Ok(layout) => layout,
            Err(e) => {
                shader_modules.into_iter().for_each(GfxShaderModule::destroy);
                return Err(e.into());
            }
        };
        gfx_device.set_object_debug_name(pipeline_layout, format!("{}-pipeline-layout", debug_name));

        let pipeline_ci = vk::RayTracingPipelineCreateInfoKHR::default()
            .stages(&stage_infos)
            .groups(&shader_groups)
            .layout(pipeline_layout)
            .max_pipeline_ray_recursion_depth(desc.max_ray_recursion_depth);

        let pipeline = unsafe {
            gfx_device.ray_tracing_pipeline().create_ray_tracing_pipelines(
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_ci),
                None,
            )
        };
        shader_modules.into_iter().for_each(GfxShaderModule::destroy);
        let pipeline = match pipeline {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { gfx_device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(e.into());
            }
        };
        gfx_device.set_object_debug_name(pipeline, format!("{}-pipeline", debug_name));

        let sbt = Self::create_sbt(pipeline, desc, debug_name);
        let (sbt_buffer, layout) = match sbt {
            Ok(sbt) => sbt,
            Err(e) => {
                unsafe {
                    gfx_device.destroy_pipeline(pipeline, None);
                    gfx_device.destroy_pipeline_layout(pipeline_layout, None);
                }
                return Err(e);
            }
        };
        let sbt_address = sbt_buffer.device_address();

        Ok(Self {
            pipeline,
            pipeline_layout,
            sbt_region_raygen: layout.raygen.to_vk(sbt_address),
            sbt_region_miss: layout.miss.to_vk(sbt_address),
            sbt_region_hit: layout.hit.to_vk(sbt_address),
            sbt_region_callable: vk::StridedDeviceAddressRegionKHR::default(),
            sbt_buffer,
        })
    }

    /// 从 pipeline 中获取 shader group 的 handle，并写入到 shader binding table 中
    fn create_sbt(
        pipeline: vk::Pipeline,
        desc: &GfxRtPipelineDesc,
        debug_name: &str,
    ) -> GfxResult<(GfxSbtBuffer, SbtLayout)> {
        let rt_pipeline_props = Gfx::get().rt_pipeline_props();
        let miss_count = desc.miss.len() as u32;
        let hit_count = desc.closest_hit.len() as u32;
        let group_count = 1 + miss_count + hit_count;
        if group_count as usize != desc.shader_groups().len() {
            return Err(GfxError::Unsupported {
                kind: "shader group layout",
                name: debug_name.to_string(),
            });
        }

        let layout = SbtLayout::new(
            rt_pipeline_props.shader_group_handle_size,
            rt_pipeline_props.shader_group_handle_alignment,
            rt_pipeline_props.shader_group_base_alignment,
            miss_count,
            hit_count,
        );

        let sbt_buffer = GfxSbtBuffer::new(
            layout.total_size() as vk::DeviceSize,
            rt_pipeline_props.shader_group_base_alignment as vk::DeviceSize,
            debug_name,
        )?;

        let shader_group_handle_data = unsafe {
            Gfx::get().gfx_device().ray_tracing_pipeline().get_ray_tracing_shader_group_handles(
                pipeline,
                0,
                group_count,
                (group_count * rt_pipeline_props.shader_group_handle_size) as usize,
            )?
        };
        sbt_buffer.write_handles(
            &shader_group_handle_data,
            layout.handle_size,
            &layout.record_offsets(miss_count, hit_count),
        )?;

        Ok((sbt_buffer, layout))
    }

    pub fn destroy(self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_pipeline(self.pipeline, None);
            gfx_device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
        self.sbt_buffer.destroy();
    }
}
// getter
impl GfxRtPipeline {
    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// (raygen, miss, hit, callable)
    #[inline]
    pub fn sbt_regions(
        &self,
    ) -> (
        &vk::StridedDeviceAddressRegionKHR,
        &vk::StridedDeviceAddressRegionKHR,
        &vk::StridedDeviceAddressRegionKHR,
        &vk::StridedDeviceAddressRegionKHR,
    ) {
        (&self.sbt_region_raygen, &self.sbt_region_miss, &self.sbt_region_hit, &self.sbt_region_callable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(miss_cnt: usize, hit_cnt: usize) -> GfxRtPipelineDesc {
        GfxRtPipelineDesc {
            raygen: GfxShaderStageInfo::new(vk::ShaderStageFlags::RAYGEN_KHR, "raygen.spv"),
            miss: (0..miss_cnt).map(|_| GfxShaderStageInfo::new(vk::ShaderStageFlags::MISS_KHR, "miss.spv")).collect(),
            closest_hit: (0..hit_cnt)
                .map(|_| GfxShaderStageInfo::new(vk::ShaderStageFlags::CLOSEST_HIT_KHR, "chit.spv"))
                .collect(),
            set_layouts: vec![],
            push_constant_size: 16,
            max_ray_recursion_depth: 1,
        }
    }

    #[test]
    fn groups_follow_raygen_miss_hit_order() {
        let desc = desc(1, 1);
        let groups = desc.shader_groups();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].ty, vk::RayTracingShaderGroupTypeKHR::GENERAL);
        assert_eq!(groups[0].general, 0);
        assert_eq!(groups[1].ty, vk::RayTracingShaderGroupTypeKHR::GENERAL);
        assert_eq!(groups[1].general, 1);
        assert_eq!(groups[2].ty, vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP);
        assert_eq!(groups[2].closest_hit, 2);
        assert_eq!(groups[2].general, vk::SHADER_UNUSED_KHR);
    }

    #[test]
    fn hit_groups_reference_stages_after_miss_shaders() {
        let desc = desc(2, 1);
        let stages = desc.stages();
        let groups = desc.shader_groups();

        assert_eq!(stages.len(), 4);
        assert_eq!(stages[3].stage, vk::ShaderStageFlags::CLOSEST_HIT_KHR);
        assert_eq!(groups[3].closest_hit, 3);
    }
}
