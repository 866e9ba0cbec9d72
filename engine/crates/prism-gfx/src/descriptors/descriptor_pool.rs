use std::collections::BTreeMap;

use ash::vk;

use crate::{
    descriptors::descriptor::GfxDescriptorBinding, error::GfxResult, foundation::debug_messenger::DebugType, gfx::Gfx,
};

/// 描述符池创建信息
///
/// - 标志位
/// - 最大描述符集数量
/// - 每种类型描述符的最大数量
pub struct GfxDescriptorPoolCreateInfo {
    flags: vk::DescriptorPoolCreateFlags,
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl GfxDescriptorPoolCreateInfo {
    #[inline]
    pub fn new(flags: vk::DescriptorPoolCreateFlags, max_sets: u32, pool_sizes: Vec<vk::DescriptorPoolSize>) -> Self {
        Self {
            flags,
            max_sets,
            pool_sizes,
        }
    }

    /// 根据 set layout 的 bindings 计算能够容纳 `set_count` 个 set 的 pool size
    pub fn for_bindings(bindings: &[GfxDescriptorBinding], set_count: u32) -> Self {
        let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
        for binding in bindings {
            *counts.entry(binding.ty.as_raw()).or_default() += binding.count * set_count;
        }
        let pool_sizes = counts
            .into_iter()
            .map(|(ty, count)| vk::DescriptorPoolSize {
                ty: vk::DescriptorType::from_raw(ty),
                descriptor_count: count,
            })
            .collect();
        Self::new(vk::DescriptorPoolCreateFlags::empty(), set_count, pool_sizes)
    }

    #[inline]
    pub fn pool_sizes(&self) -> &[vk::DescriptorPoolSize] {
        &self.pool_sizes
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

/// 描述符池
///
/// 描述符池用于分配描述符集。
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    name: String,
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::debug!("Destroying GfxDescriptorPool: {}", self.name);
        unsafe { Gfx::get().gfx_device().destroy_descriptor_pool(self.handle, None) };
    }
}
impl GfxDescriptorPool {
    #[inline]
    pub fn new(ci: &GfxDescriptorPoolCreateInfo, name: &str) -> GfxResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(ci.flags)
            .max_sets(ci.max_sets)
            .pool_sizes(&ci.pool_sizes);
        let gfx_device = Gfx::get().gfx_device();
        let pool = unsafe { gfx_device.create_descriptor_pool(&create_info, None)? };
        let pool = Self {
            handle: pool,
            name: name.to_string(),
        };
        gfx_device.set_debug_name(&pool, name);
        Ok(pool)
    }

    /// 回收从这个 pool 中分配的所有 descriptor set
    #[inline]
    pub fn reset(&self) -> GfxResult<()> {
        unsafe {
            Gfx::get()
                .gfx_device()
                .reset_descriptor_pool(self.handle, vk::DescriptorPoolResetFlags::empty())?;
        }
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    #[inline]
    pub fn destroy(self) {
        // drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(binding: u32, ty: vk::DescriptorType, count: u32) -> GfxDescriptorBinding {
        GfxDescriptorBinding {
            binding,
            ty,
            count,
            stages: vk::ShaderStageFlags::RAYGEN_KHR,
            flags: vk::DescriptorBindingFlags::empty(),
        }
    }

    #[test]
    fn pool_sizes_merge_same_descriptor_type() {
        let bindings = [
            binding(0, vk::DescriptorType::STORAGE_BUFFER, 1),
            binding(1, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 8),
            binding(2, vk::DescriptorType::STORAGE_BUFFER, 1),
            binding(3, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 8),
        ];
        let ci = GfxDescriptorPoolCreateInfo::for_bindings(&bindings, 2);

        assert_eq!(ci.max_sets(), 2);
        let storage = ci.pool_sizes().iter().find(|s| s.ty == vk::DescriptorType::STORAGE_BUFFER).unwrap();
        let samplers = ci.pool_sizes().iter().find(|s| s.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER).unwrap();
        assert_eq!(storage.descriptor_count, 4);
        assert_eq!(samplers.descriptor_count, 32);
        assert_eq!(ci.pool_sizes().len(), 2);
    }
}
