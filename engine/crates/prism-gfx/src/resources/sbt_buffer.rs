use ash::vk;

use crate::{error::GfxResult, resources::buffer::GfxBuffer};

#[inline]
pub fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// SBT 中一个 region 相对于 buffer 起点的布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbtRegion {
    pub offset: u32,
    pub stride: u32,
    pub size: u32,
}
impl SbtRegion {
    pub fn to_vk(self, sbt_address: vk::DeviceAddress) -> vk::StridedDeviceAddressRegionKHR {
        vk::StridedDeviceAddressRegionKHR::default()
            .device_address(sbt_address + self.offset as vk::DeviceAddress)
            .stride(self.stride as vk::DeviceSize)
            .size(self.size as vk::DeviceSize)
    }
}

/// raygen / miss / hit 三个 region 在 SBT 中的排布
///
/// 不需要 user data，每条记录只有 shader group handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbtLayout {
    pub handle_size: u32,
    pub raygen: SbtRegion,
    pub miss: SbtRegion,
    pub hit: SbtRegion,
}
impl SbtLayout {
    pub fn new(
        handle_size: u32,
        handle_alignment: u32,
        base_alignment: u32,
        miss_count: u32,
        hit_count: u32,
    ) -> Self {
        let aligned_handle_size = align_up(handle_size, handle_alignment);

        // 每一个 region 需要使用 base align 进行对齐
        // raygen 的 stride 需要和 size 一样
        let raygen_size = align_up(aligned_handle_size, base_alignment);
        let miss_size = align_up(miss_count * aligned_handle_size, base_alignment);
        let hit_size = align_up(hit_count * aligned_handle_size, base_alignment);

        Self {
            handle_size,
            raygen: SbtRegion {
                offset: 0,
                stride: raygen_size,
                size: raygen_size,
            },
            miss: SbtRegion {
                offset: raygen_size,
                stride: aligned_handle_size,
                size: miss_size,
            },
            hit: SbtRegion {
                offset: raygen_size + miss_size,
                stride: aligned_handle_size,
                size: hit_size,
            },
        }
    }

    #[inline]
    pub fn total_size(&self) -> u32 {
        self.hit.offset + self.hit.size
    }

    /// 每个 shader group 在 SBT 中的 byte offset，顺序为 raygen, miss..., hit...
    pub fn record_offsets(&self, miss_count: u32, hit_count: u32) -> Vec<u32> {
        let mut offsets = vec![self.raygen.offset];
        offsets.extend((0..miss_count).map(|i| self.miss.offset + i * self.miss.stride));
        offsets.extend((0..hit_count).map(|i| self.hit.offset + i * self.hit.stride));
        offsets
    }
}

/// 存放 shader binding table 的 buffer，host 可写
pub struct GfxSbtBuffer {
    inner: GfxBuffer,
}
// init & destroy
impl GfxSbtBuffer {
    pub fn new(size: vk::DeviceSize, align: vk::DeviceSize, name: impl AsRef<str>) -> GfxResult<Self> {
        let inner = GfxBuffer::new(
            size,
            vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            Some(align),
            true,
            format!("SBTBuffer::{}", name.as_ref()),
        )?;
        Ok(Self { inner })
    }

    #[inline]
    pub fn destroy(self) {
        self.inner.destroy();
    }

    /// 将各个 shader group 的 handle 写入到对应 offset
    pub fn write_handles(&self, handle_data: &[u8], handle_size: u32, offsets: &[u32]) -> GfxResult<()> {
        let mut host_data = vec![0_u8; self.inner.size() as usize];
        for (group_idx, offset) in offsets.iter().enumerate() {
            let src_start = group_idx * handle_size as usize;
            let src = &handle_data[src_start..src_start + handle_size as usize];
            let dst_start = *offset as usize;
            host_data[dst_start..dst_start + handle_size as usize].copy_from_slice(src);
        }
        self.inner.transfer_data_by_mmap(&host_data)
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.inner.device_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 32), 96);
    }

    #[test]
    fn regions_are_base_aligned_and_contiguous() {
        // 常见的 NVIDIA 参数：handle 32，handle align 32，base align 64
        let layout = SbtLayout::new(32, 32, 64, 1, 1);

        assert_eq!(layout.raygen, SbtRegion { offset: 0, stride: 64, size: 64 });
        assert_eq!(layout.miss, SbtRegion { offset: 64, stride: 32, size: 64 });
        assert_eq!(layout.hit, SbtRegion { offset: 128, stride: 32, size: 64 });
        assert_eq!(layout.total_size(), 192);
    }

    #[test]
    fn multiple_miss_records_use_handle_stride() {
        let layout = SbtLayout::new(32, 32, 64, 3, 1);

        assert_eq!(layout.miss.size, 128);
        assert_eq!(layout.hit.offset, 64 + 128);
        assert_eq!(layout.record_offsets(3, 1), vec![0, 64, 96, 128, 192]);
    }

    #[test]
    fn region_converts_to_device_address() {
        let layout = SbtLayout::new(32, 32, 64, 1, 1);
        let region = layout.hit.to_vk(0x1000);
        assert_eq!(region.device_address, 0x1000 + 128);
        assert_eq!(region.stride, 32);
        assert_eq!(region.size, 64);
    }
}
