use ash::vk;
use itertools::Itertools;

use crate::{descriptors::descriptor_pool::GfxDescriptorPool, error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符集中一个 binding 的描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfxDescriptorBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
    pub flags: vk::DescriptorBindingFlags,
}
impl GfxDescriptorBinding {
    #[inline]
    pub fn vk_binding(&self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(self.binding)
            .descriptor_type(self.ty)
            .descriptor_count(self.count)
            .stage_flags(self.stages)
    }
}

/// 描述符集布局
///
/// 描述符集布局定义了描述符集的结构，包括：
/// - 绑定的数量
/// - 每个绑定的类型
/// - 每个绑定的着色器阶段
pub struct GfxDescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    bindings: Vec<GfxDescriptorBinding>,
}
impl GfxDescriptorSetLayout {
    pub fn new(bindings: &[GfxDescriptorBinding], debug_name: impl AsRef<str>) -> GfxResult<Self> {
        let vk_bindings = bindings.iter().map(GfxDescriptorBinding::vk_binding).collect_vec();
        let binding_flags = bindings.iter().map(|b| b.flags).collect_vec();
        let mut bind_flags_ci = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&vk_bindings)
            .push_next(&mut bind_flags_ci);

        let gfx_device = Gfx::get().gfx_device();
        let layout = unsafe { gfx_device.create_descriptor_set_layout(&create_info, None)? };
        let layout = Self {
            layout,
            bindings: bindings.to_vec(),
        };
        gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn bindings(&self) -> &[GfxDescriptorBinding] {
        &self.bindings
    }

    #[inline]
    pub fn destroy(self) {
        // drop
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.layout
    }
}

/// 描述符集
///
/// # Destroy
///
/// 跟随 descriptor pool 一起销毁（或者在 pool reset 时失效）
pub struct GfxDescriptorSet {
    handle: vk::DescriptorSet,
}
impl GfxDescriptorSet {
    pub fn new(
        descriptor_pool: &GfxDescriptorPool,
        layout: &GfxDescriptorSetLayout,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(descriptor_pool.handle())
            .set_layouts(std::slice::from_ref(&layout.layout));
        let gfx_device = Gfx::get().gfx_device();
        let descriptor_set = unsafe { gfx_device.allocate_descriptor_sets(&alloc_info)?[0] };
        let set = Self { handle: descriptor_set };
        gfx_device.set_debug_name(&set, debug_name);
        Ok(set)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSet {
        self.handle
    }
}
impl DebugType for GfxDescriptorSet {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSet"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 一次 descriptor write 的内容
pub enum GfxDescriptorWrite {
    AccelerationStructure(vk::AccelerationStructureKHR),
    StorageImage(vk::ImageView),
    UniformBuffer(vk::Buffer),
    StorageBuffer(vk::Buffer),
    /// (image view, sampler)，layout 固定为 SHADER_READ_ONLY_OPTIMAL
    CombinedImageSamplers(Vec<(vk::ImageView, vk::Sampler)>),
}

/// 将一组 write 写入 descriptor set
///
/// vk::WriteDescriptorSet 中的指针需要指向存活的内存，因此先把所有 info 收集起来再统一提交
pub fn update_descriptor_set(set: &GfxDescriptorSet, writes: &[(u32, GfxDescriptorWrite)]) {
    let mut tlas_handles: Vec<vk::AccelerationStructureKHR> = Vec::new();
    let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::new();
    let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::new();

    for (_, write) in writes {
        match write {
            GfxDescriptorWrite::AccelerationStructure(tlas) => tlas_handles.push(*tlas),
            GfxDescriptorWrite::StorageImage(view) => image_infos.push(vec![
                vk::DescriptorImageInfo::default().image_view(*view).image_layout(vk::ImageLayout::GENERAL),
            ]),
            GfxDescriptorWrite::UniformBuffer(buffer) | GfxDescriptorWrite::StorageBuffer(buffer) => {
                buffer_infos.push(vk::DescriptorBufferInfo::default().buffer(*buffer).range(vk::WHOLE_SIZE))
            }
            GfxDescriptorWrite::CombinedImageSamplers(textures) => image_infos.push(
                textures
                    .iter()
                    .map(|(view, sampler)| {
                        vk::DescriptorImageInfo::default()
                            .image_view(*view)
                            .sampler(*sampler)
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    })
                    .collect_vec(),
            ),
        }
    }

    let mut tlas_writes = tlas_handles
        .iter()
        .map(|tlas| {
            vk::WriteDescriptorSetAccelerationStructureKHR::default().acceleration_structures(std::slice::from_ref(tlas))
        })
        .collect_vec();

    let mut tlas_iter = tlas_writes.iter_mut();
    let mut image_iter = image_infos.iter();
    let mut buffer_iter = buffer_infos.iter();
    let mut vk_writes = Vec::with_capacity(writes.len());
    for (binding, write) in writes {
        let base = vk::WriteDescriptorSet::default().dst_set(set.handle()).dst_binding(*binding).dst_array_element(0);
        let vk_write = match write {
            GfxDescriptorWrite::AccelerationStructure(_) => {
                let Some(tlas_write) = tlas_iter.next() else { continue };
                let mut vk_write = base
                    .descriptor_type(vk::DescriptorType::ACCELERATION_STRUCTURE_KHR)
                    .push_next(tlas_write);
                // 加速结构的数量由 pNext 给出，但是 descriptor_count 仍然需要设置
                vk_write.descriptor_count = 1;
                vk_write
            }
            GfxDescriptorWrite::StorageImage(_) => {
                let Some(infos) = image_iter.next() else { continue };
                base.descriptor_type(vk::DescriptorType::STORAGE_IMAGE).image_info(infos)
            }
            GfxDescriptorWrite::CombinedImageSamplers(_) => {
                let Some(infos) = image_iter.next() else { continue };
                if infos.is_empty() {
                    continue;
                }
                base.descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER).image_info(infos)
            }
            GfxDescriptorWrite::UniformBuffer(_) => {
                let Some(info) = buffer_iter.next() else { continue };
                base.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER).buffer_info(std::slice::from_ref(info))
            }
            GfxDescriptorWrite::StorageBuffer(_) => {
                let Some(info) = buffer_iter.next() else { continue };
                base.descriptor_type(vk::DescriptorType::STORAGE_BUFFER).buffer_info(std::slice::from_ref(info))
            }
        };
        vk_writes.push(vk_write);
    }

    unsafe {
        Gfx::get().gfx_device().update_descriptor_sets(&vk_writes, &[]);
    }
}
