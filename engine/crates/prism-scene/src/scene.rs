use std::rc::Rc;

use crate::{material::Material, vertex::Vertex};

/// 一个可以独立构建 BLAS 的三角形集合
///
/// `id` 在整个场景中唯一且连续（0..N），被多个物体引用的 primitive 共享同一个 id
#[derive(Debug)]
pub struct Primitive {
    pub id: u32,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// 负数表示没有材质
    pub material_index: i32,
}

impl Primitive {
    #[inline]
    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }
}

/// 场景中的一个物体：若干 primitive 共享同一个世界变换
#[derive(Debug)]
pub struct SceneObject {
    pub primitives: Vec<Rc<Primitive>>,
    pub global_transform: glam::Mat4,
}

#[derive(Debug, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub materials: Vec<Material>,
}

// getter
impl Scene {
    /// 所有的 (物体 x primitive) 数量，即 TLAS 中 instance 的数量
    pub fn instance_count(&self) -> usize {
        self.objects.iter().map(|obj| obj.primitives.len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instance_count() == 0
    }

    /// 按照 instance index 的顺序遍历所有 instance
    pub fn instances(&self) -> impl Iterator<Item = (&SceneObject, &Rc<Primitive>)> {
        self.objects.iter().flat_map(|obj| obj.primitives.iter().map(move |prim| (obj, prim)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(id: u32) -> Rc<Primitive> {
        Rc::new(Primitive {
            id,
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1, 2],
            material_index: -1,
        })
    }

    #[test]
    fn instances_follow_object_then_primitive_order() {
        let shared = triangle(0);
        let scene = Scene {
            objects: vec![
                SceneObject {
                    primitives: vec![shared.clone(), triangle(1)],
                    global_transform: glam::Mat4::IDENTITY,
                },
                SceneObject {
                    primitives: vec![shared],
                    global_transform: glam::Mat4::from_translation(glam::Vec3::X),
                },
            ],
            materials: vec![],
        };

        assert_eq!(scene.instance_count(), 3);
        let ids: Vec<u32> = scene.instances().map(|(_, prim)| prim.id).collect();
        assert_eq!(ids, vec![0, 1, 0]);
    }

    #[test]
    fn empty_scene_has_no_instances() {
        let scene = Scene::default();
        assert!(scene.is_empty());
        assert_eq!(scene.instances().count(), 0);
    }
}
