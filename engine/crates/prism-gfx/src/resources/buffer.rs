use std::ptr;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
};

/// 由 vma 分配内存的 buffer，drop 时自动释放
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,
    /// 只有在 buffer usage 包含 SHADER_DEVICE_ADDRESS 时才有值
    device_addr: Option<vk::DeviceAddress>,

    debug_name: String,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.map_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }

            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// init & destroy
impl GfxBuffer {
    /// - align: buffer 起始地址的内存对齐，默认对齐到 8 字节
    /// - 优先使用 device memory
    pub fn new(
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        // 不允许 UNIFORM + DBA 的组合
        debug_assert!(
            !(buffer_usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
                && buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)),
            "GfxBuffer::new: UNIFORM_BUFFER + SHADER_DEVICE_ADDRESS is not allowed"
        );

        let buffer_ci = vk::BufferCreateInfo::default().size(buffer_size).usage(buffer_usage);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };

        let align = align.unwrap_or(8);
        let allocator = Gfx::get().allocator();
        let (buffer, mut alloc) = unsafe { allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, align)? };

        let mut mapped_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => mapped_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e.into());
                }
            }
        }

        let mut device_addr = None;
        if buffer_usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
            let gfx_device = Gfx::get().gfx_device();
            unsafe {
                device_addr =
                    Some(gfx_device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer)));
            }
        }

        let buffer = Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr: mapped_ptr,
            device_addr,

            debug_name: name.as_ref().to_string(),
        };
        Gfx::get().gfx_device().set_debug_name(&buffer, name.as_ref());
        Ok(buffer)
    }

    #[inline]
    pub fn new_stage_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> GfxResult<Self> {
        Self::new(size, vk::BufferUsageFlags::TRANSFER_SRC, None, true, debug_name)
    }

    /// 创建 device local 的 buffer，并通过 stage buffer 同步写入初始数据
    pub fn new_device_buffer_with_data<T: bytemuck::Pod>(
        data: &[T],
        usage: vk::BufferUsageFlags,
        align: Option<vk::DeviceSize>,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let data = upload_bytes(data);
        let buffer = Self::new(
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            align,
            false,
            name,
        )?;
        buffer.transfer_data_sync(data)?;
        Ok(buffer)
    }

    #[inline]
    pub fn destroy(self) {
        drop(self)
    }
}
// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    /// 没有 SHADER_DEVICE_ADDRESS usage 的 buffer 返回 0
    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        debug_assert!(self.device_addr.is_some(), "buffer {} has no device address", self.debug_name);
        self.device_addr.unwrap_or_default()
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    #[inline]
    pub fn mapped_ptr(&self) -> GfxResult<*mut u8> {
        self.map_ptr.ok_or_else(|| GfxError::NotMapped(self.debug_name.clone()))
    }

    #[inline]
    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> GfxResult<()> {
        let allocator = Gfx::get().allocator();
        allocator.flush_allocation(&self.allocation, offset, size)?;
        Ok(())
    }

    /// 通过 mem map 的方式将 data 传入到 buffer 中
    pub fn transfer_data_by_mmap<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        let data = upload_bytes(data);
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        let dst = self.mapped_ptr()?;
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        self.flush(0, data.len() as vk::DeviceSize)
    }

    /// 创建一个临时的 stage buffer，先将数据放入 stage buffer，再 transfer 到 self
    ///
    /// sync 表示这个函数是同步等待的，会阻塞运行
    ///
    /// # Note
    /// * 这个应该是用来传输大块数据的，每帧的小块数据应该使用常驻的 stage buffer
    pub fn transfer_data_sync(&self, data: &[u8]) -> GfxResult<()> {
        let stage_buffer =
            Self::new_stage_buffer(data.len() as vk::DeviceSize, format!("{}-stage-buffer", self.debug_name))?;
        stage_buffer.transfer_data_by_mmap(data)?;

        let cmd_name = format!("{}-transfer-data", &self.debug_name);
        Gfx::get().one_time_exec(
            |cmd| {
                cmd.cmd_copy_buffer(
                    &stage_buffer,
                    self,
                    &[vk::BufferCopy {
                        size: data.len() as vk::DeviceSize,
                        ..Default::default()
                    }],
                );
            },
            &cmd_name,
        )
    }
}

/// 按内存布局逐字节上传
#[inline]
fn upload_bytes<T: bytemuck::Pod>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_slices_upload_their_raw_bytes() {
        let positions = [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let bytes = upload_bytes(&positions);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[12..16], &4.0f32.to_ne_bytes());

        let indices = [0u32, 1, 2];
        assert_eq!(upload_bytes(&indices).len(), 12);
        assert_eq!(upload_bytes::<u8>(&[]).len(), 0);
    }
}
