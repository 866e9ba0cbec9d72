use ash::vk;
use prism_gfx::raytracing::acceleration::GfxBlasTriangles;
use prism_scene::vertex::Vertex;

use crate::{
    error::RenderResult,
    scene_accel::{backend::AccelBackend, geometry::GeometryBuffer},
};

/// 一个 geometry buffer 对应的 BLAS
pub struct BottomLevelStructure<B: AccelBackend> {
    pub accel: B::Accel,
    pub device_address: vk::DeviceAddress,
}

/// 以 primitive id 为下标的 BLAS 数组，BLAS 创建后不会被重建
pub struct BlasCache<B: AccelBackend> {
    entries: Vec<Option<BottomLevelStructure<B>>>,
}

impl<B: AccelBackend> Default for BlasCache<B> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<B: AccelBackend> BlasCache<B> {
    /// 构建 BLAS 所需的三角形描述，直接引用 geometry 的 device address
    pub fn triangles(backend: &B, geometry: &GeometryBuffer<B>) -> GfxBlasTriangles {
        GfxBlasTriangles {
            vertex_address: backend.buffer_address(&geometry.vertex_buffer),
            vertex_stride: Vertex::STRIDE as vk::DeviceSize,
            vertex_count: geometry.vertex_count,
            vertex_format: vk::Format::R32G32B32_SFLOAT,
            index_address: backend.buffer_address(&geometry.index_buffer),
            index_count: geometry.index_count,
        }
    }

    pub fn get_or_build(
        &mut self,
        backend: &mut B,
        primitive_id: u32,
        geometry: &GeometryBuffer<B>,
    ) -> RenderResult<&BottomLevelStructure<B>> {
        let idx = primitive_id as usize;
        if idx >= self.entries.len() {
            self.entries.resize_with(idx + 1, || None);
        }

        let blas = match self.entries[idx].take() {
            Some(blas) => blas,
            None => {
                let triangles = Self::triangles(backend, geometry);
                log::debug!("build blas for primitive {}: {} triangles", primitive_id, triangles.index_count / 3);
                let accel = backend.build_blas(&triangles, &format!("primitive-{}-blas", primitive_id))?;
                let device_address = backend.accel_address(&accel);
                BottomLevelStructure { accel, device_address }
            }
        };
        Ok(self.entries[idx].insert(blas))
    }
}

// getter
impl<B: AccelBackend> BlasCache<B> {
    #[inline]
    pub fn get(&self, primitive_id: u32) -> Option<&BottomLevelStructure<B>> {
        self.entries.get(primitive_id as usize).and_then(Option::as_ref)
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
impl<B: AccelBackend> BlasCache<B> {
    pub fn destroy(self, backend: &mut B) {
        for blas in self.entries.into_iter().flatten() {
            backend.destroy_accel(blas.accel);
        }
    }
}
