use ash::vk;
use prism_scene::scene::Primitive;

use crate::{
    error::{RenderError, RenderResult},
    scene_accel::backend::{AccelBackend, BufferKind},
};

/// 一个 primitive 在 GPU 上的顶点与索引数据
pub struct GeometryBuffer<B: AccelBackend> {
    pub vertex_buffer: B::Buffer,
    pub index_buffer: B::Buffer,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// 以 primitive id 为下标的 geometry buffer 数组
///
/// 同一个 primitive 只会上传一次，被多个物体引用时共享同一份 buffer
pub struct GeometryCache<B: AccelBackend> {
    entries: Vec<Option<GeometryBuffer<B>>>,
}

impl<B: AccelBackend> Default for GeometryCache<B> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<B: AccelBackend> GeometryCache<B> {
    /// 返回缓存的 geometry buffer，不存在时通过 stage buffer 上传
    pub fn get_or_upload(&mut self, backend: &mut B, primitive: &Primitive) -> RenderResult<&GeometryBuffer<B>> {
        let idx = primitive.id as usize;
        if idx >= self.entries.len() {
            self.entries.resize_with(idx + 1, || None);
        }

        let geometry = match self.entries[idx].take() {
            Some(geometry) => geometry,
            None => Self::upload(backend, primitive)?,
        };
        Ok(self.entries[idx].insert(geometry))
    }

    fn upload(backend: &mut B, primitive: &Primitive) -> RenderResult<GeometryBuffer<B>> {
        if primitive.vertices.is_empty() || primitive.triangle_count() == 0 {
            return Err(RenderError::EmptyPrimitive(primitive.id));
        }
        log::debug!(
            "upload geometry of primitive {}: {} vertices, {} indices",
            primitive.id,
            primitive.vertices.len(),
            primitive.indices.len()
        );

        let vertex_buffer = backend.upload_buffer(
            BufferKind::Geometry,
            bytemuck::cast_slice(&primitive.vertices),
            &format!("primitive-{}-vertex", primitive.id),
        )?;
        let index_buffer = match backend.upload_buffer(
            BufferKind::Geometry,
            bytemuck::cast_slice(&primitive.indices),
            &format!("primitive-{}-index", primitive.id),
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                backend.destroy_buffer(vertex_buffer);
                return Err(e);
            }
        };

        Ok(GeometryBuffer {
            vertex_buffer,
            index_buffer,
            vertex_count: primitive.vertices.len() as u32,
            index_count: primitive.indices.len() as u32,
        })
    }
}

// getter
impl<B: AccelBackend> GeometryCache<B> {
    #[inline]
    pub fn get(&self, primitive_id: u32) -> Option<&GeometryBuffer<B>> {
        self.entries.get(primitive_id as usize).and_then(Option::as_ref)
    }

    /// (vertex address, index address)
    pub fn addresses(&self, backend: &B, primitive_id: u32) -> Option<(vk::DeviceAddress, vk::DeviceAddress)> {
        self.get(primitive_id)
            .map(|geometry| (backend.buffer_address(&geometry.vertex_buffer), backend.buffer_address(&geometry.index_buffer)))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// destroy
impl<B: AccelBackend> GeometryCache<B> {
    pub fn destroy(self, backend: &mut B) {
        for geometry in self.entries.into_iter().flatten() {
            backend.destroy_buffer(geometry.vertex_buffer);
            backend.destroy_buffer(geometry.index_buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use prism_scene::vertex::Vertex;

    use super::*;
    use crate::scene_accel::test_backend::RecordingBackend;

    fn triangle(id: u32) -> Primitive {
        Primitive {
            id,
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1, 2],
            material_index: 0,
        }
    }

    #[test]
    fn second_request_returns_cached_buffer() {
        let mut backend = RecordingBackend::default();
        let mut cache = GeometryCache::<RecordingBackend>::default();
        let prim = triangle(0);

        let first_id = cache.get_or_upload(&mut backend, &prim).unwrap().vertex_buffer.id;
        let uploads = backend.uploads.len();
        let second = cache.get_or_upload(&mut backend, &prim).unwrap();

        assert_eq!(second.vertex_buffer.id, first_id);
        assert_eq!(backend.uploads.len(), uploads);
        assert_eq!(uploads, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn vertex_bytes_use_full_stride() {
        let mut backend = RecordingBackend::default();
        let mut cache = GeometryCache::<RecordingBackend>::default();
        let geometry = cache.get_or_upload(&mut backend, &triangle(2)).unwrap();

        assert_eq!(geometry.vertex_buffer.bytes.len(), 3 * Vertex::STRIDE);
        assert_eq!(geometry.index_buffer.bytes.len(), 12);
        assert_eq!((geometry.vertex_count, geometry.index_count), (3, 3));
        assert!(cache.get(0).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn empty_primitive_is_rejected() {
        let mut backend = RecordingBackend::default();
        let mut cache = GeometryCache::<RecordingBackend>::default();
        let prim = Primitive {
            indices: vec![0, 1],
            ..triangle(0)
        };

        assert!(matches!(cache.get_or_upload(&mut backend, &prim), Err(RenderError::EmptyPrimitive(0))));
        assert!(backend.uploads.is_empty());
    }

    #[test]
    fn destroy_releases_both_buffers() {
        let mut backend = RecordingBackend::default();
        let mut cache = GeometryCache::<RecordingBackend>::default();
        cache.get_or_upload(&mut backend, &triangle(0)).unwrap();
        cache.destroy(&mut backend);

        assert_eq!(backend.destroyed, vec!["buffer:primitive-0-vertex", "buffer:primitive-0-index"]);
    }
}
