//! Ray Tracing 所需的加速结构

use ash::vk;
use ash::vk::Handle;

use crate::{
    error::GfxResult,
    foundation::debug_messenger::DebugType,
    gfx::Gfx,
    resources::buffer::GfxBuffer,
};

/// 构建 BLAS 所需的三角形几何数据，全部以 device address 的形式给出
#[derive(Debug, Clone, Copy)]
pub struct GfxBlasTriangles {
    pub vertex_address: vk::DeviceAddress,
    pub vertex_stride: vk::DeviceSize,
    pub vertex_count: u32,
    pub vertex_format: vk::Format,
    pub index_address: vk::DeviceAddress,
    pub index_count: u32,
}

/// 加速结构以及承载它的 buffer
pub struct GfxAcceleration {
    acceleration_structure: vk::AccelerationStructureKHR,
    buffer: Option<GfxBuffer>,
    device_address: vk::DeviceAddress,
}
impl DebugType for GfxAcceleration {
    fn debug_type_name() -> &'static str {
        "GfxAcceleration"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.acceleration_structure
    }
}
// new & init
impl GfxAcceleration {
    /// 同步构建只包含一个三角形 geometry 的 blas
    ///
    /// # 构建过程
    ///
    /// 1. 查询构建 blas 所需的尺寸
    /// 2. 创建加速结构以及 scratch buffer
    /// 3. 构建 blas 并阻塞等待完成
    /// 4. 回收 scratch buffer
    pub fn build_blas_sync(
        triangles: &GfxBlasTriangles,
        build_flags: vk::BuildAccelerationStructureFlagsKHR,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxAcceleration::build_blas_sync");

        let primitive_count = triangles.index_count / 3;
        let geometry = vk::AccelerationStructureGeometryKHR::default()
            .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
            .flags(vk::GeometryFlagsKHR::OPAQUE)
            .geometry(vk::AccelerationStructureGeometryDataKHR {
                triangles: vk::AccelerationStructureGeometryTrianglesDataKHR::default()
                    .vertex_format(triangles.vertex_format)
                    .vertex_data(vk::DeviceOrHostAddressConstKHR {
                        device_address: triangles.vertex_address,
                    })
                    .vertex_stride(triangles.vertex_stride)
                    .max_vertex(triangles.vertex_count.saturating_sub(1))
                    .index_type(vk::IndexType::UINT32)
                    .index_data(vk::DeviceOrHostAddressConstKHR {
                        device_address: triangles.index_address,
                    }),
            });
        let range_info = vk::AccelerationStructureBuildRangeInfoKHR::default().primitive_count(primitive_count);

        Self::build_sync(
            vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL,
            &geometry,
            range_info,
            build_flags,
            debug_name.as_ref(),
        )
    }

    /// 同步构建 tlas
    ///
    /// instance 数据需要已经上传到 `instance_address` 处；`instance_count` 可以为 0，此时构建出一个空的 tlas
    pub fn build_tlas_sync(
        instance_address: vk::DeviceAddress,
        instance_count: u32,
        build_flags: vk::BuildAccelerationStructureFlagsKHR,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxAcceleration::build_tlas_sync");

        let geometry = vk::AccelerationStructureGeometryKHR::default()
            .geometry_type(vk::GeometryTypeKHR::INSTANCES)
            .geometry(vk::AccelerationStructureGeometryDataKHR {
                instances: vk::AccelerationStructureGeometryInstancesDataKHR::default()
                    // false: data 是 &[vk::AccelerationStructureInstanceKHR]
                    .array_of_pointers(false)
                    .data(vk::DeviceOrHostAddressConstKHR {
                        device_address: instance_address,
                    }),
            });
        let range_info = vk::AccelerationStructureBuildRangeInfoKHR::default().primitive_count(instance_count);

        Self::build_sync(
            vk::AccelerationStructureTypeKHR::TOP_LEVEL,
            &geometry,
            range_info,
            build_flags,
            debug_name.as_ref(),
        )
    }

    fn build_sync(
        ty: vk::AccelerationStructureTypeKHR,
        geometry: &vk::AccelerationStructureGeometryKHR,
        range_info: vk::AccelerationStructureBuildRangeInfoKHR,
        build_flags: vk::BuildAccelerationStructureFlagsKHR,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let gfx = Gfx::get();

        // 使用部分完整的 AccelerationStructureBuildGeometryInfo 来查询所需的资源大小
        let mut build_geometry_info = vk::AccelerationStructureBuildGeometryInfoKHR::default()
            .ty(ty)
            .flags(build_flags | vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
            .geometries(std::slice::from_ref(geometry))
            .mode(vk::BuildAccelerationStructureModeKHR::BUILD);

        let size_info = unsafe {
            let mut size_info = vk::AccelerationStructureBuildSizesInfoKHR::default();
            gfx.gfx_device().acceleration_structure().get_acceleration_structure_build_sizes(
                vk::AccelerationStructureBuildTypeKHR::DEVICE,
                &build_geometry_info,
                &[range_info.primitive_count],
                &mut size_info,
            );
            size_info
        };

        let acceleration = Self::new(size_info.acceleration_structure_size, ty, debug_name)?;

        let scratch_align =
            gfx.acceleration_structure_props().min_acceleration_structure_scratch_offset_alignment as vk::DeviceSize;
        let scratch_buffer = GfxBuffer::new(
            size_info.build_scratch_size.max(1),
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            Some(scratch_align.max(1)),
            false,
            format!("{}-scratch", debug_name),
        )?;

        // 补全剩下的 build info
        build_geometry_info.dst_acceleration_structure = acceleration.acceleration_structure;
        build_geometry_info.scratch_data = vk::DeviceOrHostAddressKHR {
            device_address: scratch_buffer.device_address(),
        };

        let built = gfx.one_time_exec(
            |cmd| {
                cmd.build_acceleration_structure(&build_geometry_info, std::slice::from_ref(&range_info));
            },
            format!("build-{}", debug_name),
        );

        // scratch buffer 只在构建期间使用
        scratch_buffer.destroy();
        if let Err(e) = built {
            acceleration.destroy();
            return Err(e);
        }

        Ok(acceleration)
    }

    /// 创建 AccelerationStructure 以及 buffer
    fn new(size: vk::DeviceSize, ty: vk::AccelerationStructureTypeKHR, debug_name: &str) -> GfxResult<Self> {
        let gfx_device = Gfx::get().gfx_device();

        let buffer = GfxBuffer::new(
            size.max(1),
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
            // 加速结构的起始地址需要 256 字节对齐
            Some(256),
            false,
            format!("{}-buffer", debug_name),
        )?;

        let create_info = vk::AccelerationStructureCreateInfoKHR::default() //
            .ty(ty)
            .size(size)
            .buffer(buffer.vk_buffer());

        let acceleration_structure =
            unsafe { gfx_device.acceleration_structure().create_acceleration_structure(&create_info, None)? };
        let device_address = unsafe {
            gfx_device.acceleration_structure().get_acceleration_structure_device_address(
                &vk::AccelerationStructureDeviceAddressInfoKHR::default().acceleration_structure(acceleration_structure),
            )
        };

        let acc = Self {
            acceleration_structure,
            buffer: Some(buffer),
            device_address,
        };
        gfx_device.set_debug_name(&acc, debug_name);
        Ok(acc)
    }
}
// getter
impl GfxAcceleration {
    #[inline]
    pub fn handle(&self) -> vk::AccelerationStructureKHR {
        self.acceleration_structure
    }

    #[inline]
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }
}
// destroy
impl GfxAcceleration {
    pub fn destroy(mut self) {
        unsafe {
            Gfx::get()
                .gfx_device()
                .acceleration_structure()
                .destroy_acceleration_structure(self.acceleration_structure, None);
        }
        self.acceleration_structure = vk::AccelerationStructureKHR::null();
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
    }
}
impl Drop for GfxAcceleration {
    fn drop(&mut self) {
        debug_assert!(self.acceleration_structure.is_null(), "GfxAcceleration must be destroyed manually");
    }
}
