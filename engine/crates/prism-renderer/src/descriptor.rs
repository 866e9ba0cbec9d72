//! 光追 pass 的描述符集
//!
//! 每个 frame slot 一个 set，在场景载入时整体写入一次；之后每帧只有相机 buffer 的内容会变化

use ash::vk;
use itertools::Itertools;
use prism_gfx::{
    descriptors::{
        descriptor::{
            GfxDescriptorBinding, GfxDescriptorSet, GfxDescriptorSetLayout, GfxDescriptorWrite, update_descriptor_set,
        },
        descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo},
    },
    resources::sampler::GfxSampler,
};
use prism_scene::material::TextureSlot;

use crate::{
    error::RenderResult,
    scene_accel::{SceneAccel, vk_backend::VkAccelBackend},
};

pub const BINDING_TLAS: u32 = 0;
pub const BINDING_OUTPUT_IMAGE: u32 = 1;
pub const BINDING_CAMERA: u32 = 2;
pub const BINDING_MESH_TABLE: u32 = 3;
pub const BINDING_INSTANCE_TABLE: u32 = 4;
pub const BINDING_MATERIAL_TABLE: u32 = 5;
pub const BINDING_BASE_COLOR_TEXTURES: u32 = 6;
pub const BINDING_NORMAL_TEXTURES: u32 = 7;
pub const BINDING_METALLIC_ROUGHNESS_TEXTURES: u32 = 8;
pub const BINDING_EMISSIVE_TEXTURES: u32 = 9;

/// 贴图数组的 binding，以及对应的贴图槽位
pub const TEXTURE_BINDINGS: [(u32, TextureSlot); 4] = [
    (BINDING_BASE_COLOR_TEXTURES, TextureSlot::BaseColor),
    (BINDING_NORMAL_TEXTURES, TextureSlot::Normal),
    (BINDING_METALLIC_ROUGHNESS_TEXTURES, TextureSlot::MetallicRoughness),
    (BINDING_EMISSIVE_TEXTURES, TextureSlot::Emissive),
];

/// 描述符集布局，`texture_count` 为每个贴图数组的长度
pub fn binding_layout(texture_count: u32) -> Vec<GfxDescriptorBinding> {
    let stages =
        vk::ShaderStageFlags::RAYGEN_KHR | vk::ShaderStageFlags::CLOSEST_HIT_KHR | vk::ShaderStageFlags::MISS_KHR;
    let binding = |binding: u32, ty: vk::DescriptorType, count: u32| GfxDescriptorBinding {
        binding,
        ty,
        count,
        stages,
        flags: vk::DescriptorBindingFlags::empty(),
    };

    let mut bindings = vec![
        binding(BINDING_TLAS, vk::DescriptorType::ACCELERATION_STRUCTURE_KHR, 1),
        binding(BINDING_OUTPUT_IMAGE, vk::DescriptorType::STORAGE_IMAGE, 1),
        binding(BINDING_CAMERA, vk::DescriptorType::UNIFORM_BUFFER, 1),
        binding(BINDING_MESH_TABLE, vk::DescriptorType::STORAGE_BUFFER, 1),
        binding(BINDING_INSTANCE_TABLE, vk::DescriptorType::STORAGE_BUFFER, 1),
        binding(BINDING_MATERIAL_TABLE, vk::DescriptorType::STORAGE_BUFFER, 1),
    ];
    bindings.extend(
        TEXTURE_BINDINGS
            .iter()
            .map(|(b, _)| binding(*b, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, texture_count.max(1))),
    );
    bindings
}

/// 将每个材质的 4 张贴图按 binding 重新排列：每个 binding 一个数组，数组下标为材质下标
pub fn texture_array_writes(
    material_views: &[[vk::ImageView; 4]],
    sampler: vk::Sampler,
) -> Vec<(u32, GfxDescriptorWrite)> {
    TEXTURE_BINDINGS
        .iter()
        .map(|(binding, slot)| {
            let textures = material_views.iter().map(|views| (views[slot.index()], sampler)).collect_vec();
            (*binding, GfxDescriptorWrite::CombinedImageSamplers(textures))
        })
        .collect()
}

/// 写入 set 时需要的每个 slot 自己的资源
#[derive(Debug, Clone, Copy)]
pub struct SlotBindings {
    pub output_view: vk::ImageView,
    pub camera_buffer: vk::Buffer,
}

/// 拥有描述符集布局、pool 以及每个 frame slot 的 set
///
/// 贴图数组长度与材质数量相同，因此每次载入场景时重新创建
pub struct DescriptorBinder {
    layout: GfxDescriptorSetLayout,
    pool: GfxDescriptorPool,
    sets: Vec<GfxDescriptorSet>,
    texture_count: u32,
}

// new & init
impl DescriptorBinder {
    pub fn new(slot_count: usize, texture_count: u32) -> RenderResult<Self> {
        let texture_count = texture_count.max(1);
        let bindings = binding_layout(texture_count);
        let layout = GfxDescriptorSetLayout::new(&bindings, "rt-descriptor-layout")?;
        let pool = GfxDescriptorPool::new(
            &GfxDescriptorPoolCreateInfo::for_bindings(&bindings, slot_count as u32),
            "rt-descriptor-pool",
        )?;
        let sets = (0..slot_count)
            .map(|slot| GfxDescriptorSet::new(&pool, &layout, format!("rt-descriptor-set-{}", slot)))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("descriptor binder created: {} sets, {} textures per array", slot_count, texture_count);
        Ok(Self {
            layout,
            pool,
            sets,
            texture_count,
        })
    }

    /// 写入一个 slot 的全部 binding
    pub fn bind_slot(
        &self,
        slot_index: usize,
        slot: SlotBindings,
        scene: &SceneAccel<VkAccelBackend>,
        sampler: &GfxSampler,
    ) {
        let _span = tracy_client::span!("DescriptorBinder::bind_slot");
        let Some(set) = self.sets.get(slot_index) else {
            log::error!("descriptor set for slot {} does not exist", slot_index);
            return;
        };

        let mut writes = vec![
            (BINDING_OUTPUT_IMAGE, GfxDescriptorWrite::StorageImage(slot.output_view)),
            (BINDING_CAMERA, GfxDescriptorWrite::UniformBuffer(slot.camera_buffer)),
        ];
        if let Some(tlas) = scene.tlas() {
            writes.push((BINDING_TLAS, GfxDescriptorWrite::AccelerationStructure(tlas.accel.handle())));
        }
        if let Some(tables) = scene.tables() {
            writes.push((BINDING_MESH_TABLE, GfxDescriptorWrite::StorageBuffer(tables.mesh_buffer.vk_buffer())));
            writes.push((
                BINDING_INSTANCE_TABLE,
                GfxDescriptorWrite::StorageBuffer(tables.instance_buffer.vk_buffer()),
            ));
        }
        if let Some(materials) = scene.materials() {
            writes.push((BINDING_MATERIAL_TABLE, GfxDescriptorWrite::StorageBuffer(materials.buffer.vk_buffer())));

            let material_views = materials
                .materials
                .iter()
                .take(self.texture_count as usize)
                .map(|m| TextureSlot::ALL.map(|s| m.get(s).view.handle()))
                .collect_vec();
            writes.extend(texture_array_writes(&material_views, sampler.handle()));
        }

        update_descriptor_set(set, &writes);
    }
}

// getter
impl DescriptorBinder {
    #[inline]
    pub fn layout(&self) -> &GfxDescriptorSetLayout {
        &self.layout
    }

    #[inline]
    pub fn set(&self, slot_index: usize) -> Option<&GfxDescriptorSet> {
        self.sets.get(slot_index)
    }

    #[inline]
    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }
}

// destroy
impl DescriptorBinder {
    /// set 随 pool 一起释放
    pub fn destroy(self) {
        self.pool.destroy();
        self.layout.destroy();
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn layout_has_ten_bindings_in_order() {
        let bindings = binding_layout(3);
        assert_eq!(bindings.len(), 10);
        assert!(bindings.iter().enumerate().all(|(i, b)| b.binding == i as u32));
        assert_eq!(bindings[0].ty, vk::DescriptorType::ACCELERATION_STRUCTURE_KHR);
        assert_eq!(bindings[1].ty, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(bindings[2].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert!(bindings[3..6].iter().all(|b| b.ty == vk::DescriptorType::STORAGE_BUFFER && b.count == 1));
        assert!(bindings[6..].iter().all(|b| b.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER && b.count == 3));
    }

    #[test]
    fn all_bindings_visible_to_rt_stages() {
        for binding in binding_layout(1) {
            assert!(binding.stages.contains(vk::ShaderStageFlags::RAYGEN_KHR));
            assert!(binding.stages.contains(vk::ShaderStageFlags::CLOSEST_HIT_KHR));
            assert!(binding.stages.contains(vk::ShaderStageFlags::MISS_KHR));
        }
    }

    #[test]
    fn texture_arrays_never_empty() {
        let bindings = binding_layout(0);
        assert!(bindings[6..].iter().all(|b| b.count == 1));
    }

    #[test]
    fn texture_writes_group_by_slot() {
        // view 的 raw 值：材质下标 * 10 + 槽位下标
        let views = (0..2u64)
            .map(|m| TextureSlot::ALL.map(|s| vk::ImageView::from_raw(m * 10 + s.index() as u64 + 1)))
            .collect_vec();
        let sampler = vk::Sampler::from_raw(99);

        let writes = texture_array_writes(&views, sampler);
        assert_eq!(writes.len(), 4);

        for ((binding, write), (expected_binding, slot)) in writes.iter().zip(TEXTURE_BINDINGS.iter()) {
            assert_eq!(binding, expected_binding);
            let GfxDescriptorWrite::CombinedImageSamplers(textures) = write else {
                panic!("binding {} is not a sampler array", binding);
            };
            assert_eq!(textures.len(), 2);
            for (m, (view, s)) in textures.iter().enumerate() {
                assert_eq!(view.as_raw(), m as u64 * 10 + slot.index() as u64 + 1);
                assert_eq!(*s, sampler);
            }
        }
    }
}
