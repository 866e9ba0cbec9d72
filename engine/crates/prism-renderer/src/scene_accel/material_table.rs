use prism_scene::material::{Material, TextureSlot};

use crate::{
    error::RenderResult,
    scene_accel::backend::{AccelBackend, BufferKind},
};

/// shader 中的材质，贴图通过材质序号在四个贴图数组中查找
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuMaterial {
    pub base_color: glam::Vec4,
    /// w 分量为 0
    pub emissive: glam::Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub transmission: f32,
    _padding: f32,
}

impl From<&Material> for GpuMaterial {
    fn from(material: &Material) -> Self {
        Self {
            base_color: material.base_color,
            emissive: material.emissive.extend(0.0),
            metallic: material.metallic,
            roughness: material.roughness,
            transmission: material.transmission,
            _padding: 0.0,
        }
    }
}

/// 一个材质的四张贴图，顺序与 [`TextureSlot::ALL`] 一致
pub struct MaterialTextures<B: AccelBackend> {
    textures: Vec<B::Texture>,
}

impl<B: AccelBackend> MaterialTextures<B> {
    #[inline]
    pub fn get(&self, slot: TextureSlot) -> &B::Texture {
        &self.textures[slot.index()]
    }
}

/// 材质表以及所有材质的贴图
///
/// 场景中没有材质时使用一个默认材质，因此至少有一个材质
pub struct MaterialTable<B: AccelBackend> {
    pub buffer: B::Buffer,
    pub materials: Vec<MaterialTextures<B>>,
}

impl<B: AccelBackend> MaterialTable<B> {
    pub fn build(backend: &mut B, materials: &[Material]) -> RenderResult<Self> {
        let default_material = [Material::default()];
        let materials = if materials.is_empty() {
            log::info!("scene has no material, use the default material");
            &default_material[..]
        } else {
            materials
        };

        let mut uploaded: Vec<MaterialTextures<B>> = Vec::with_capacity(materials.len());
        let result = Self::upload_all(backend, materials, &mut uploaded);
        let buffer = match result {
            Ok(buffer) => buffer,
            Err(e) => {
                for material in uploaded {
                    material.textures.into_iter().for_each(|tex| backend.destroy_texture(tex));
                }
                return Err(e);
            }
        };
        log::info!("material table built with {} materials", uploaded.len());

        Ok(Self {
            buffer,
            materials: uploaded,
        })
    }

    fn upload_all(
        backend: &mut B,
        materials: &[Material],
        uploaded: &mut Vec<MaterialTextures<B>>,
    ) -> RenderResult<B::Buffer> {
        for (material_idx, material) in materials.iter().enumerate() {
            let images = material.resolve_textures()?;

            let mut textures = Vec::with_capacity(4);
            for (slot, image) in TextureSlot::ALL.iter().zip(images.iter()) {
                match backend.upload_texture(image, &format!("material-{}-{:?}", material_idx, slot)) {
                    Ok(texture) => textures.push(texture),
                    Err(e) => {
                        textures.into_iter().for_each(|tex| backend.destroy_texture(tex));
                        return Err(e);
                    }
                }
            }
            uploaded.push(MaterialTextures { textures });
        }

        let gpu_materials: Vec<GpuMaterial> = materials.iter().map(GpuMaterial::from).collect();
        backend.upload_buffer(BufferKind::MaterialTable, bytemuck::cast_slice(&gpu_materials), "material-table")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn destroy(self, backend: &mut B) {
        backend.destroy_buffer(self.buffer);
        for material in self.materials {
            material.textures.into_iter().for_each(|tex| backend.destroy_texture(tex));
        }
    }
}

#[cfg(test)]
mod tests {
    use prism_scene::{error::SceneError, texture::TextureImage};

    use super::*;
    use crate::{error::RenderError, scene_accel::test_backend::RecordingBackend};

    #[test]
    fn gpu_material_is_48_bytes() {
        assert_eq!(size_of::<GpuMaterial>(), 48);
    }

    #[test]
    fn empty_scene_gets_default_material() {
        let mut backend = RecordingBackend::default();
        let table = MaterialTable::build(&mut backend, &[]).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(backend.textures.len(), 4);
        assert_eq!(table.buffer.bytes.len(), 48);
    }

    #[test]
    fn base_color_only_material_uploads_four_textures() {
        let mut backend = RecordingBackend::default();
        let mut material = Material::default();
        let base = TextureImage::new(vec![255; 16], 2, 2, 4).unwrap();
        material.set_texture(TextureSlot::BaseColor, base.clone());

        let table = MaterialTable::build(&mut backend, &[material]).unwrap();
        let textures = &table.materials[0];

        assert_eq!(textures.get(TextureSlot::BaseColor).image, base);
        for slot in [TextureSlot::Normal, TextureSlot::Emissive, TextureSlot::MetallicRoughness] {
            let image = &textures.get(slot).image;
            assert_eq!((image.width, image.height, image.channels), (1, 1, 4));
        }
        assert_eq!(textures.get(TextureSlot::Normal).image.pixels, vec![0, 0, 255, 0]);
    }

    #[test]
    fn invalid_texture_fails_without_leaking() {
        let mut backend = RecordingBackend::default();
        let mut bad = Material::default();
        bad.set_texture(TextureSlot::Normal, TextureImage::new(vec![0; 3], 1, 1, 3).unwrap());

        let result = MaterialTable::build(&mut backend, &[Material::default(), bad]);

        assert!(matches!(result, Err(RenderError::Scene(SceneError::TextureChannels { .. }))));
        // 第一个材质的 4 张贴图已经被释放
        assert_eq!(backend.destroyed.len(), 4);
        assert_eq!(backend.upload_count(BufferKind::MaterialTable), 0);
    }

    #[test]
    fn failed_upload_releases_partial_textures() {
        let mut backend = RecordingBackend {
            fail_texture_at: Some(2),
            ..Default::default()
        };

        let result = MaterialTable::build(&mut backend, &[Material::default()]);

        assert!(result.is_err());
        assert_eq!(backend.destroyed.len(), 2);
    }
}
