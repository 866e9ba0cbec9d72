//! 场景加速结构的构建
//!
//! Scene -> geometry buffer -> BLAS -> 间接索引表 / TLAS
//!
//! 所有 cache 都只在载入场景时写入，之后只读；场景切换时整体销毁重建

pub mod backend;
pub mod blas;
pub mod geometry;
pub mod indirection;
pub mod material_table;
pub mod tlas;
pub mod vk_backend;

#[cfg(test)]
pub mod test_backend;

use std::rc::Rc;

use itertools::Itertools;
use prism_scene::scene::{Primitive, Scene};

use crate::{
    error::{RenderError, RenderResult},
    scene_accel::{
        backend::AccelBackend,
        blas::BlasCache,
        geometry::GeometryCache,
        indirection::{
            IndirectionBuffers, IndirectionTables, InstanceIndirectionEntry, MeshIndirectionEntry,
            resolve_material_index,
        },
        material_table::MaterialTable,
        tlas::{TopLevelStructure, pack_instance},
    },
};

/// 一个已载入场景在 GPU 上的全部数据
pub struct SceneAccel<B: AccelBackend> {
    geometry: GeometryCache<B>,
    blas: BlasCache<B>,
    materials: Option<MaterialTable<B>>,
    tables: Option<IndirectionBuffers<B>>,
    tlas: Option<TopLevelStructure<B>>,
}

// new & init
impl<B: AccelBackend> SceneAccel<B> {
    /// 构建失败时，已经创建的资源会被释放
    pub fn build(backend: &mut B, scene: &Scene) -> RenderResult<Self> {
        let mut accel = Self {
            geometry: GeometryCache::default(),
            blas: BlasCache::default(),
            materials: None,
            tables: None,
            tlas: None,
        };
        match accel.build_parts(backend, scene) {
            Ok(()) => Ok(accel),
            Err(e) => {
                log::error!("failed to build scene acceleration structures: {}", e);
                accel.destroy(backend);
                Err(e)
            }
        }
    }

    /// 没有任何 instance 的场景，TLAS 为空
    pub fn empty(backend: &mut B) -> RenderResult<Self> {
        Self::build(backend, &Scene::default())
    }

    fn build_parts(&mut self, backend: &mut B, scene: &Scene) -> RenderResult<()> {
        let primitives = Self::distinct_primitives(scene)?;
        log::info!(
            "build scene: {} objects, {} distinct primitives, {} instances",
            scene.objects.len(),
            primitives.len(),
            scene.instance_count()
        );

        // geometry 与 BLAS，每个 primitive 一份
        for primitive in &primitives {
            let geometry = self.geometry.get_or_upload(backend, primitive)?;
            self.blas.get_or_build(backend, primitive.id, geometry)?;
        }

        let materials = MaterialTable::build(backend, &scene.materials)?;
        let material_count = materials.len();
        self.materials = Some(materials);

        let tables = self.indirection_tables(backend, scene, &primitives, material_count);
        self.tables = Some(tables.upload(backend)?);

        let instances = scene
            .instances()
            .enumerate()
            .map(|(instance_index, (object, primitive))| {
                let blas_address = self.blas.get(primitive.id).map_or(0, |blas| blas.device_address);
                pack_instance(&object.global_transform, instance_index, blas_address)
            })
            .collect::<RenderResult<Vec<_>>>()?;
        self.tlas = Some(TopLevelStructure::build(backend, &instances)?);

        Ok(())
    }

    /// 按 id 排列的所有 primitive，id 必须是 0..N 连续的
    fn distinct_primitives(scene: &Scene) -> RenderResult<Vec<Rc<Primitive>>> {
        let primitives = scene
            .instances()
            .map(|(_, primitive)| primitive.clone())
            .sorted_by_key(|primitive| primitive.id)
            .dedup_by(|a, b| a.id == b.id)
            .collect_vec();

        if let Some(last) = primitives.last() {
            if last.id as usize + 1 != primitives.len() {
                return Err(RenderError::SparsePrimitiveIds {
                    distinct: primitives.len(),
                    max_id: last.id,
                });
            }
        }
        Ok(primitives)
    }

    fn indirection_tables(
        &self,
        backend: &B,
        scene: &Scene,
        primitives: &[Rc<Primitive>],
        material_count: usize,
    ) -> IndirectionTables {
        let mesh = primitives
            .iter()
            .map(|primitive| {
                let (vertex_address, index_address) = self.geometry.addresses(backend, primitive.id).unwrap_or((0, 0));
                let material_index = resolve_material_index(primitive.id, primitive.material_index, material_count);
                MeshIndirectionEntry::new(vertex_address, index_address, material_index)
            })
            .collect_vec();
        let instance = scene
            .instances()
            .map(|(_, primitive)| InstanceIndirectionEntry {
                primitive_id: primitive.id,
            })
            .collect_vec();

        IndirectionTables { mesh, instance }
    }
}

// getter
impl<B: AccelBackend> SceneAccel<B> {
    #[inline]
    pub fn geometry(&self) -> &GeometryCache<B> {
        &self.geometry
    }

    #[inline]
    pub fn blas(&self) -> &BlasCache<B> {
        &self.blas
    }

    #[inline]
    pub fn tlas(&self) -> Option<&TopLevelStructure<B>> {
        self.tlas.as_ref()
    }

    #[inline]
    pub fn tables(&self) -> Option<&IndirectionBuffers<B>> {
        self.tables.as_ref()
    }

    #[inline]
    pub fn materials(&self) -> Option<&MaterialTable<B>> {
        self.materials.as_ref()
    }

    /// 材质表中的材质数量，至少为 1
    #[inline]
    pub fn material_count(&self) -> usize {
        self.materials.as_ref().map_or(1, |m| m.len().max(1))
    }
}

// destroy
impl<B: AccelBackend> SceneAccel<B> {
    /// 先销毁 TLAS 及其 buffer，再销毁 BLAS，然后是 geometry，最后是材质
    pub fn destroy(self, backend: &mut B) {
        if let Some(tlas) = self.tlas {
            tlas.destroy(backend);
        }
        if let Some(tables) = self.tables {
            tables.destroy(backend);
        }
        self.blas.destroy(backend);
        self.geometry.destroy(backend);
        if let Some(materials) = self.materials {
            materials.destroy(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use prism_scene::{material::Material, scene::SceneObject, vertex::Vertex};

    use super::*;
    use crate::scene_accel::{backend::BufferKind, test_backend::RecordingBackend};

    fn triangle(id: u32, material_index: i32) -> Rc<Primitive> {
        Rc::new(Primitive {
            id,
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1, 2],
            material_index,
        })
    }

    fn object(primitives: Vec<Rc<Primitive>>, x: f32) -> SceneObject {
        SceneObject {
            primitives,
            global_transform: glam::Mat4::from_translation(glam::vec3(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn one_primitive_two_instances() {
        let mut backend = RecordingBackend::default();
        let prim = triangle(0, 0);
        let scene = Scene {
            objects: vec![object(vec![prim.clone()], 0.0), object(vec![prim], 5.0)],
            materials: vec![Material::default()],
        };

        let accel = SceneAccel::build(&mut backend, &scene).unwrap();

        assert_eq!(backend.blas_builds.len(), 1);
        assert_eq!(accel.blas().len(), 1);
        assert_eq!(backend.upload_count(BufferKind::Geometry), 2);
        assert_eq!(backend.tlas_builds.len(), 1);

        let tlas = accel.tlas().unwrap();
        assert_eq!(tlas.instance_count, 2);
        let tables = accel.tables().unwrap();
        assert_eq!(tables.instance_count, 2);
        assert_eq!(tables.mesh_count, 1);

        // 两个 instance 引用同一个 BLAS，transform 不同
        let blas_address = accel.blas().get(0).unwrap().device_address;
        let bytes = &tlas.instance_buffer.bytes;
        let instance_size = size_of::<ash::vk::AccelerationStructureInstanceKHR>();
        let address_at = |i: usize| {
            let offset = i * instance_size + instance_size - 8;
            u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
        };
        assert_eq!(address_at(0), blas_address);
        assert_eq!(address_at(1), blas_address);
        let translation_x = |i: usize| {
            let offset = i * instance_size + 3 * 4;
            f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
        };
        assert_eq!(translation_x(0), 0.0);
        assert_eq!(translation_x(1), 5.0);
    }

    #[test]
    fn table_lengths_follow_scene() {
        let mut backend = RecordingBackend::default();
        let (a, b, c) = (triangle(0, 0), triangle(1, 1), triangle(2, -1));
        let scene = Scene {
            objects: vec![
                object(vec![a.clone(), b.clone()], 0.0),
                object(vec![b, c], 1.0),
                object(vec![a], 2.0),
            ],
            materials: vec![Material::default()],
        };

        let accel = SceneAccel::build(&mut backend, &scene).unwrap();
        let tables = accel.tables().unwrap();

        assert_eq!(backend.blas_builds.len(), 3);
        assert_eq!(tables.instance_count, scene.instance_count());
        assert_eq!(tables.instance_count, 5);
        assert_eq!(accel.tlas().unwrap().instance_count, 5);
        assert_eq!(tables.mesh_count, 3);

        let instance: Vec<InstanceIndirectionEntry> = bytemuck::pod_collect_to_vec(&tables.instance_buffer.bytes);
        let ids = instance.iter().map(|e| e.primitive_id).collect_vec();
        assert_eq!(ids, vec![0, 1, 1, 2, 0]);

        // material 1 越界，material -1 缺失，都回退到 0
        let mesh: Vec<MeshIndirectionEntry> = bytemuck::pod_collect_to_vec(&tables.mesh_buffer.bytes);
        assert!(mesh.iter().all(|e| e.material_index == 0));
        let geometry = accel.geometry().get(1).unwrap();
        assert_eq!(mesh[1].vertex_address, RecordingBackend::address_of(geometry.vertex_buffer.id));
        assert_eq!(mesh[1].index_address, RecordingBackend::address_of(geometry.index_buffer.id));
    }

    #[test]
    fn empty_scene_builds_degenerate_tlas() {
        let mut backend = RecordingBackend::default();
        let accel = SceneAccel::empty(&mut backend).unwrap();

        assert!(backend.blas_builds.is_empty());
        assert_eq!(backend.tlas_builds.len(), 1);
        assert_eq!(backend.tlas_builds[0].1, 0);
        assert_eq!(accel.tlas().unwrap().instance_count, 0);
        assert_eq!(accel.material_count(), 1);
    }

    #[test]
    fn sparse_primitive_ids_are_rejected() {
        let mut backend = RecordingBackend::default();
        let scene = Scene {
            objects: vec![object(vec![triangle(0, 0), triangle(2, 0)], 0.0)],
            materials: vec![],
        };

        let result = SceneAccel::build(&mut backend, &scene);
        assert!(matches!(result, Err(RenderError::SparsePrimitiveIds { distinct: 2, max_id: 2 })));
        assert!(backend.uploads.is_empty());
    }

    #[test]
    fn teardown_releases_tlas_before_blas_before_geometry() {
        let mut backend = RecordingBackend::default();
        let scene = Scene {
            objects: vec![object(vec![triangle(0, 0)], 0.0)],
            materials: vec![],
        };
        let accel = SceneAccel::build(&mut backend, &scene).unwrap();
        accel.destroy(&mut backend);

        let position = |name: &str| backend.destroyed.iter().position(|d| d == name).unwrap();
        assert!(position("accel:scene-tlas") < position("accel:primitive-0-blas"));
        assert!(position("buffer:tlas-instances") < position("accel:primitive-0-blas"));
        assert!(position("buffer:mesh-indirection") < position("accel:primitive-0-blas"));
        assert!(position("accel:primitive-0-blas") < position("buffer:primitive-0-vertex"));
        assert!(position("buffer:primitive-0-index") < position("buffer:material-table"));
    }

    #[test]
    fn failed_build_releases_created_resources() {
        let mut backend = RecordingBackend {
            fail_texture_at: Some(0),
            ..Default::default()
        };
        let scene = Scene {
            objects: vec![object(vec![triangle(0, 0)], 0.0)],
            materials: vec![Material::default()],
        };

        assert!(SceneAccel::build(&mut backend, &scene).is_err());
        // geometry 的两个 buffer 与 BLAS 都被释放
        assert_eq!(backend.destroyed.len(), 3);
        assert!(backend.tlas_builds.is_empty());
    }
}
