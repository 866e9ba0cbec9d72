use ash::vk;

use crate::{
    error::{RenderError, RenderResult},
    scene_accel::backend::{AccelBackend, BufferKind},
};

/// instance custom index 只有 24 位
pub const MAX_CUSTOM_INDEX: usize = (1 << 24) - 1;

/// glam 的矩阵是 column major，VkTransformMatrixKHR 是 row major 的 3x4 矩阵
///
/// 第 r 行为 [c0[r], c1[r], c2[r], c3[r]]，最后一行 (0, 0, 0, 1) 被丢弃
pub fn transform_to_vk(transform: &glam::Mat4) -> vk::TransformMatrixKHR {
    let cols = transform.to_cols_array_2d();
    let mut matrix = [0.0_f32; 12];
    for r in 0..3 {
        for c in 0..4 {
            matrix[r * 4 + c] = cols[c][r];
        }
    }
    vk::TransformMatrixKHR { matrix }
}

/// 打包一个 TLAS instance，custom index 即 instance index，shader 通过它查询 instance 表
pub fn pack_instance(
    transform: &glam::Mat4,
    instance_index: usize,
    blas_address: vk::DeviceAddress,
) -> RenderResult<vk::AccelerationStructureInstanceKHR> {
    if instance_index > MAX_CUSTOM_INDEX {
        return Err(RenderError::CustomIndexOverflow(instance_index));
    }

    Ok(vk::AccelerationStructureInstanceKHR {
        transform: transform_to_vk(transform),
        instance_custom_index_and_mask: vk::Packed24_8::new(instance_index as u32, 0xFF),
        instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
            0,
            vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw() as u8,
        ),
        acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
            device_handle: blas_address,
        },
    })
}

fn instance_bytes(instances: &[vk::AccelerationStructureInstanceKHR]) -> Vec<u8> {
    // 没有 instance 时上传一个全 0 的 instance，构建 primitive count 为 0 的 TLAS
    if instances.is_empty() {
        return vec![0; size_of::<vk::AccelerationStructureInstanceKHR>()];
    }
    // AccelerationStructureInstanceKHR 是 repr(C) 的纯数据
    unsafe { std::slice::from_raw_parts(instances.as_ptr() as *const u8, size_of_val(instances)).to_vec() }
}

/// 场景的 TLAS 以及它的 instance buffer
pub struct TopLevelStructure<B: AccelBackend> {
    pub accel: B::Accel,
    pub device_address: vk::DeviceAddress,
    pub instance_buffer: B::Buffer,
    pub instance_count: u32,
}

impl<B: AccelBackend> TopLevelStructure<B> {
    /// 整体重建，不支持 update
    pub fn build(backend: &mut B, instances: &[vk::AccelerationStructureInstanceKHR]) -> RenderResult<Self> {
        let instance_count = instances.len() as u32;
        if instances.is_empty() {
            log::info!("scene has no instance, build an empty tlas");
        }

        let instance_buffer =
            backend.upload_buffer(BufferKind::AccelInstances, &instance_bytes(instances), "tlas-instances")?;
        let accel = match backend.build_tlas(&instance_buffer, instance_count, "scene-tlas") {
            Ok(accel) => accel,
            Err(e) => {
                backend.destroy_buffer(instance_buffer);
                return Err(e);
            }
        };
        let device_address = backend.accel_address(&accel);
        log::info!("tlas built with {} instances", instance_count);

        Ok(Self {
            accel,
            device_address,
            instance_buffer,
            instance_count,
        })
    }

    pub fn destroy(self, backend: &mut B) {
        backend.destroy_accel(self.accel);
        backend.destroy_buffer(self.instance_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_accel::test_backend::RecordingBackend;

    #[test]
    fn translation_lands_in_last_column() {
        let transform = glam::Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0));
        let vk_transform = transform_to_vk(&transform);

        assert_eq!(
            vk_transform.matrix,
            [
                1.0, 0.0, 0.0, 1.0, //
                0.0, 1.0, 0.0, 2.0, //
                0.0, 0.0, 1.0, 3.0, //
            ]
        );
    }

    #[test]
    fn rows_are_read_across_columns() {
        // column major: cols[c][r] = c * 4 + r
        let transform = glam::Mat4::from_cols_array(&std::array::from_fn(|i| i as f32));
        let vk_transform = transform_to_vk(&transform);

        assert_eq!(vk_transform.matrix[0..4], [0.0, 4.0, 8.0, 12.0]);
        assert_eq!(vk_transform.matrix[4..8], [1.0, 5.0, 9.0, 13.0]);
        assert_eq!(vk_transform.matrix[8..12], [2.0, 6.0, 10.0, 14.0]);
    }

    #[test]
    fn packed_instance_fields() {
        let instance = pack_instance(&glam::Mat4::IDENTITY, 7, 0xABC000).unwrap();

        assert_eq!(instance.instance_custom_index_and_mask.low_24(), 7);
        assert_eq!(instance.instance_custom_index_and_mask.high_8(), 0xFF);
        assert_eq!(instance.instance_shader_binding_table_record_offset_and_flags.low_24(), 0);
        assert_eq!(
            instance.instance_shader_binding_table_record_offset_and_flags.high_8() as u32,
            vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE.as_raw()
        );
        assert_eq!(unsafe { instance.acceleration_structure_reference.device_handle }, 0xABC000);
    }

    #[test]
    fn custom_index_overflow_is_an_error() {
        assert!(pack_instance(&glam::Mat4::IDENTITY, MAX_CUSTOM_INDEX, 0).is_ok());
        assert!(matches!(
            pack_instance(&glam::Mat4::IDENTITY, MAX_CUSTOM_INDEX + 1, 0),
            Err(RenderError::CustomIndexOverflow(_))
        ));
    }

    #[test]
    fn empty_tlas_uses_one_zeroed_instance() {
        let mut backend = RecordingBackend::default();
        let tlas = TopLevelStructure::build(&mut backend, &[]).unwrap();

        assert_eq!(tlas.instance_count, 0);
        assert_eq!(tlas.instance_buffer.bytes, vec![0u8; 64]);
        assert_eq!(backend.tlas_builds, vec![(tlas.instance_buffer.id, 0)]);
    }

    #[test]
    fn instance_buffer_holds_all_instances() {
        let mut backend = RecordingBackend::default();
        let instances = [
            pack_instance(&glam::Mat4::IDENTITY, 0, 0x1000).unwrap(),
            pack_instance(&glam::Mat4::from_translation(glam::Vec3::X), 1, 0x1000).unwrap(),
        ];
        let tlas = TopLevelStructure::build(&mut backend, &instances).unwrap();

        assert_eq!(tlas.instance_count, 2);
        assert_eq!(tlas.instance_buffer.bytes.len(), 128);
        assert_eq!(tlas.device_address, RecordingBackend::address_of(tlas.accel.id));
    }
}
