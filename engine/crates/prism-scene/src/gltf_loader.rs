//! 将 glTF 文件转换为 [`Scene`]
//!
//! 只支持三角形 mesh，不支持 skin 与动画

use std::{path::Path, rc::Rc};

use itertools::Itertools;

use crate::{
    error::{SceneError, SceneResult},
    material::{Material, TextureSlot},
    scene::{Primitive, Scene, SceneObject},
    texture::TextureImage,
    vertex::Vertex,
};

/// 从文件中载入场景
pub trait SceneLoader {
    fn load(&self, path: &Path) -> SceneResult<Scene>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GltfSceneLoader;

impl SceneLoader for GltfSceneLoader {
    fn load(&self, path: &Path) -> SceneResult<Scene> {
        let (document, buffers, images) = gltf::import(path).map_err(|source| SceneError::Import {
            path: path.to_path_buf(),
            source,
        })?;
        let import = GltfImport {
            document,
            buffers,
            images,
        };
        let scene = import.process_scene(path)?;
        log::info!(
            "loaded scene {:?}: {} objects, {} instances, {} materials",
            path,
            scene.objects.len(),
            scene.instance_count(),
            scene.materials.len()
        );
        Ok(scene)
    }
}

struct GltfImport {
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    images: Vec<gltf::image::Data>,
}

/// 遍历 node 树时的状态
///
/// primitive id 在第一次遇到某个 mesh 时分配，被多个 node 引用的 mesh 保持相同的 id，
/// 没有被引用的 mesh 不会分配 id
#[derive(Default)]
struct ProcessState {
    meshes: Vec<Option<Vec<Rc<Primitive>>>>,
    next_primitive_id: u32,
    objects: Vec<SceneObject>,
}

impl GltfImport {
    fn process_scene(&self, path: &Path) -> SceneResult<Scene> {
        // 读取默认场景，否则读取 0 号场景
        let scene = self
            .document
            .default_scene()
            .or_else(|| self.document.scenes().next())
            .ok_or_else(|| SceneError::NoScene(path.to_path_buf()))?;

        let mut state = ProcessState {
            meshes: vec![None; self.document.meshes().len()],
            ..Default::default()
        };
        for node in scene.nodes() {
            self.process_node(&node, &glam::Mat4::IDENTITY, &mut state)?;
        }

        let materials = self
            .document
            .materials()
            .map(|m| self.process_material(&m))
            .collect::<SceneResult<Vec<_>>>()?;

        Ok(Scene {
            objects: state.objects,
            materials,
        })
    }

    fn process_node(&self, node: &gltf::Node, parent_matrix: &glam::Mat4, state: &mut ProcessState) -> SceneResult<()> {
        // gltf 这个库使用 column major 的方式存放矩阵（每个元素相当于矩阵的一列）
        let local_matrix = glam::Mat4::from_cols_array_2d(&node.transform().matrix());
        let matrix = parent_matrix.mul_mat4(&local_matrix);

        if let Some(mesh) = node.mesh() {
            let primitives = self.mesh_primitives(&mesh, state)?;
            log::debug!("node {} -> mesh {} with {} primitives", node.index(), mesh.index(), primitives.len());
            state.objects.push(SceneObject {
                primitives,
                global_transform: matrix,
            });
        }

        for child in node.children() {
            self.process_node(&child, &matrix, state)?;
        }
        Ok(())
    }

    fn mesh_primitives(&self, mesh: &gltf::Mesh, state: &mut ProcessState) -> SceneResult<Vec<Rc<Primitive>>> {
        if let Some(primitives) = &state.meshes[mesh.index()] {
            return Ok(primitives.clone());
        }

        let mut primitives = Vec::with_capacity(mesh.primitives().len());
        for primitive in mesh.primitives() {
            let id = state.next_primitive_id;
            primitives.push(Rc::new(self.process_primitive(mesh, &primitive, id)?));
            state.next_primitive_id += 1;
        }
        state.meshes[mesh.index()] = Some(primitives.clone());
        Ok(primitives)
    }

    fn process_primitive(&self, mesh: &gltf::Mesh, primitive: &gltf::Primitive, id: u32) -> SceneResult<Primitive> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            return Err(SceneError::UnsupportedPrimitiveMode {
                mesh: mesh.index(),
                primitive: primitive.index(),
                mode: primitive.mode(),
            });
        }

        let reader = primitive.reader(|buffer| Some(self.buffers[buffer.index()].0.as_slice()));

        let positions = reader.read_positions().ok_or(SceneError::MissingPositions {
            mesh: mesh.index(),
            primitive: primitive.index(),
        })?;
        let positions = positions.map(glam::Vec3::from).collect_vec();
        let vertex_cnt = positions.len();

        let normals = reader
            .read_normals()
            .map_or_else(|| vec![glam::Vec3::ZERO; vertex_cnt], |iter| iter.map(glam::Vec3::from).collect());
        let colors = reader.read_colors(0).map_or_else(
            || vec![glam::Vec3::ONE; vertex_cnt],
            |colors| colors.into_rgb_f32().map(glam::Vec3::from).collect(),
        );
        let uvs = reader.read_tex_coords(0).map_or_else(
            || vec![glam::Vec2::ZERO; vertex_cnt],
            |uvs| uvs.into_f32().map(glam::Vec2::from).collect(),
        );

        let vertices = (0..vertex_cnt)
            .map(|i| {
                Vertex::new(
                    positions[i],
                    normals.get(i).copied().unwrap_or(glam::Vec3::ZERO),
                    colors.get(i).copied().unwrap_or(glam::Vec3::ONE),
                    uvs.get(i).copied().unwrap_or(glam::Vec2::ZERO),
                )
            })
            .collect_vec();

        // 没有 indices 的 primitive，按照顶点顺序组成三角形
        let indices = reader
            .read_indices()
            .map_or_else(|| (0..vertex_cnt as u32).collect(), |indices| indices.into_u32().collect_vec());

        Ok(Primitive {
            id,
            vertices,
            indices,
            material_index: primitive.material().index().map_or(-1, |idx| idx as i32),
        })
    }

    fn process_material(&self, material: &gltf::Material) -> SceneResult<Material> {
        let pbr = material.pbr_metallic_roughness();
        let mut result = Material {
            name: material.name().unwrap_or("unnamed").to_string(),
            base_color: glam::Vec4::from(pbr.base_color_factor()),
            emissive: glam::Vec3::from(material.emissive_factor()),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            transmission: material.transmission().map_or(0.0, |t| t.transmission_factor()),
            textures: [None, None, None, None],
        };

        let sources = [
            (TextureSlot::BaseColor, pbr.base_color_texture().map(|info| info.texture())),
            (TextureSlot::Normal, material.normal_texture().map(|info| info.texture())),
            (TextureSlot::Emissive, material.emissive_texture().map(|info| info.texture())),
            (TextureSlot::MetallicRoughness, pbr.metallic_roughness_texture().map(|info| info.texture())),
        ];
        for (slot, texture) in sources {
            if let Some(texture) = texture {
                let image_index = texture.source().index();
                log::debug!("material {}: {:?} texture from image {}", result.name, slot, image_index);
                result.set_texture(slot, self.texture_image(image_index)?);
            }
        }

        Ok(result)
    }

    fn texture_image(&self, image_index: usize) -> SceneResult<TextureImage> {
        let data = &self.images[image_index];
        let channels = match data.format {
            gltf::image::Format::R8 => 1,
            gltf::image::Format::R8G8 => 2,
            gltf::image::Format::R8G8B8 => 3,
            gltf::image::Format::R8G8B8A8 => 4,
            format => {
                return Err(SceneError::UnsupportedTextureFormat {
                    image: image_index,
                    format,
                });
            }
        };
        TextureImage::new(data.pixels.clone(), data.width, data.height, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3 个顶点 (0,0,0) (1,0,0) (0,1,0) 以及 indices 0 1 2
    const TRIANGLE_BUFFER: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAEAAAACAAAA";

    fn write_gltf(name: &str, meshes: &str, nodes: &str, root_nodes: &str) -> std::path::PathBuf {
        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "nodes": {root_nodes} }} ],
  "nodes": {nodes},
  "meshes": {meshes},
  "buffers": [ {{ "byteLength": 48, "uri": "data:application/octet-stream;base64,{TRIANGLE_BUFFER}" }} ],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 12 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5125, "count": 3, "type": "SCALAR" }}
  ]
}}"#
        );
        let path = std::env::temp_dir().join(format!("prism-scene-{}-{}.gltf", name, std::process::id()));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn shared_mesh_keeps_primitive_id() {
        let path = write_gltf(
            "shared",
            r#"[
              { "primitives": [ { "attributes": { "POSITION": 0 }, "indices": 1 } ] },
              { "primitives": [ { "attributes": { "POSITION": 0 } } ] },
              { "primitives": [ { "attributes": { "POSITION": 0 } } ] }
            ]"#,
            r#"[
              { "mesh": 0 },
              { "mesh": 0, "translation": [2, 0, 0] },
              { "children": [3], "translation": [0, 1, 0] },
              { "mesh": 2 }
            ]"#,
            "[0, 1, 2]",
        );
        let scene = GltfSceneLoader.load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(scene.objects.len(), 3);
        assert_eq!(scene.instance_count(), 3);
        assert!(scene.materials.is_empty());

        let ids = scene.instances().map(|(_, prim)| prim.id).collect_vec();
        // mesh 1 没有被引用，mesh 2 的 primitive 得到 id 1
        assert_eq!(ids, vec![0, 0, 1]);
        assert!(Rc::ptr_eq(&scene.objects[0].primitives[0], &scene.objects[1].primitives[0]));

        assert_eq!(scene.objects[1].global_transform.w_axis.truncate(), glam::vec3(2.0, 0.0, 0.0));
        assert_eq!(scene.objects[2].global_transform.w_axis.truncate(), glam::vec3(0.0, 1.0, 0.0));

        let prim = &scene.objects[2].primitives[0];
        assert_eq!(prim.indices, vec![0, 1, 2]);
        assert_eq!(prim.material_index, -1);
        assert_eq!(prim.vertices[1].position, glam::vec3(1.0, 0.0, 0.0));
        assert_eq!(prim.vertices[1].color, glam::Vec3::ONE);
    }

    #[test]
    fn line_primitives_are_rejected() {
        let path = write_gltf(
            "lines",
            r#"[ { "primitives": [ { "attributes": { "POSITION": 0 }, "mode": 1 } ] } ]"#,
            r#"[ { "mesh": 0 } ]"#,
            "[0]",
        );
        let result = GltfSceneLoader.load(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(SceneError::UnsupportedPrimitiveMode { mesh: 0, .. })));
    }

    #[test]
    fn missing_file_reports_import_error() {
        let result = GltfSceneLoader.load(Path::new("/nonexistent/prism/scene.gltf"));
        assert!(matches!(result, Err(SceneError::Import { .. })));
    }
}
