//! 光追 shader 无法解引用 CPU 指针，命中之后通过这两张表从 instance index 找到 geometry 与材质
//!
//! - mesh table：以 primitive id 为下标，记录 vertex/index buffer 的 device address 与材质序号
//! - instance table：以 instance index 为下标，记录 primitive id

use ash::vk;

use crate::{
    error::RenderResult,
    scene_accel::backend::{AccelBackend, BufferKind},
};

/// 没有材质或者材质序号越界时使用的材质
pub const SENTINEL_MATERIAL_INDEX: u32 = 0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshIndirectionEntry {
    pub vertex_address: vk::DeviceAddress,
    pub index_address: vk::DeviceAddress,
    pub material_index: u32,
    _padding: u32,
}

impl MeshIndirectionEntry {
    pub fn new(vertex_address: vk::DeviceAddress, index_address: vk::DeviceAddress, material_index: u32) -> Self {
        Self {
            vertex_address,
            index_address,
            material_index,
            _padding: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceIndirectionEntry {
    pub primitive_id: u32,
}

/// 将场景中的材质序号转换为表中的序号，负数或者越界时使用 sentinel 并打印警告
pub fn resolve_material_index(primitive_id: u32, material_index: i32, material_count: usize) -> u32 {
    match usize::try_from(material_index) {
        Ok(idx) if idx < material_count => idx as u32,
        Ok(idx) => {
            log::warn!(
                "primitive {} references material {} but only {} materials exist, fallback to material {}",
                primitive_id,
                idx,
                material_count,
                SENTINEL_MATERIAL_INDEX
            );
            SENTINEL_MATERIAL_INDEX
        }
        Err(_) => {
            log::warn!("primitive {} has no material, fallback to material {}", primitive_id, SENTINEL_MATERIAL_INDEX);
            SENTINEL_MATERIAL_INDEX
        }
    }
}

/// CPU 侧的两张表
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndirectionTables {
    pub mesh: Vec<MeshIndirectionEntry>,
    pub instance: Vec<InstanceIndirectionEntry>,
}

/// 上传到 GPU 的两张表
pub struct IndirectionBuffers<B: AccelBackend> {
    pub mesh_buffer: B::Buffer,
    pub instance_buffer: B::Buffer,
    pub mesh_count: usize,
    pub instance_count: usize,
}

impl IndirectionTables {
    /// 表为空时仍然上传一个全 0 的元素，保证 descriptor 总能引用一个有效的 buffer
    fn padded_bytes<T: bytemuck::Pod + Default>(entries: &[T]) -> Vec<u8> {
        if entries.is_empty() {
            bytemuck::bytes_of(&T::default()).to_vec()
        } else {
            bytemuck::cast_slice(entries).to_vec()
        }
    }

    pub fn upload<B: AccelBackend>(&self, backend: &mut B) -> RenderResult<IndirectionBuffers<B>> {
        let mesh_buffer =
            backend.upload_buffer(BufferKind::IndirectionTable, &Self::padded_bytes(&self.mesh), "mesh-indirection")?;
        let instance_buffer = match backend.upload_buffer(
            BufferKind::IndirectionTable,
            &Self::padded_bytes(&self.instance),
            "instance-indirection",
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(mesh_buffer);
                return Err(e);
            }
        };
        log::info!("indirection tables uploaded: {} meshes, {} instances", self.mesh.len(), self.instance.len());

        Ok(IndirectionBuffers {
            mesh_buffer,
            instance_buffer,
            mesh_count: self.mesh.len(),
            instance_count: self.instance.len(),
        })
    }
}

impl<B: AccelBackend> IndirectionBuffers<B> {
    pub fn destroy(self, backend: &mut B) {
        backend.destroy_buffer(self.mesh_buffer);
        backend.destroy_buffer(self.instance_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_accel::test_backend::RecordingBackend;

    #[test]
    fn mesh_entry_matches_shader_layout() {
        assert_eq!(size_of::<MeshIndirectionEntry>(), 24);
        assert_eq!(size_of::<InstanceIndirectionEntry>(), 4);
    }

    #[test]
    fn material_index_falls_back_to_sentinel() {
        assert_eq!(resolve_material_index(0, 2, 3), 2);
        assert_eq!(resolve_material_index(0, 3, 3), SENTINEL_MATERIAL_INDEX);
        assert_eq!(resolve_material_index(0, -1, 3), SENTINEL_MATERIAL_INDEX);
        assert_eq!(resolve_material_index(0, 0, 0), SENTINEL_MATERIAL_INDEX);
    }

    #[test]
    fn empty_tables_upload_one_zeroed_entry() {
        let mut backend = RecordingBackend::default();
        let buffers = IndirectionTables::default().upload(&mut backend).unwrap();

        assert_eq!(buffers.mesh_buffer.bytes, vec![0u8; 24]);
        assert_eq!(buffers.instance_buffer.bytes, vec![0u8; 4]);
        assert_eq!((buffers.mesh_count, buffers.instance_count), (0, 0));
    }

    #[test]
    fn tables_are_uploaded_contiguously() {
        let mut backend = RecordingBackend::default();
        let tables = IndirectionTables {
            mesh: vec![MeshIndirectionEntry::new(0x10, 0x20, 1)],
            instance: vec![InstanceIndirectionEntry { primitive_id: 0 }, InstanceIndirectionEntry { primitive_id: 0 }],
        };
        let buffers = tables.upload(&mut backend).unwrap();

        let mesh: Vec<MeshIndirectionEntry> = bytemuck::pod_collect_to_vec(&buffers.mesh_buffer.bytes);
        assert_eq!(mesh, tables.mesh);
        assert_eq!(buffers.instance_buffer.bytes.len(), 8);
        assert_eq!(backend.upload_count(BufferKind::IndirectionTable), 2);
    }
}
