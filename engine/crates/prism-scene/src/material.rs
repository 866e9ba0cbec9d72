use crate::{
    error::{SceneError, SceneResult},
    texture::TextureImage,
};

/// 材质的四个贴图槽位
///
/// 顺序即 [`Material::resolve_textures`] 返回数组的顺序
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    Normal,
    Emissive,
    MetallicRoughness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] =
        [TextureSlot::BaseColor, TextureSlot::Normal, TextureSlot::Emissive, TextureSlot::MetallicRoughness];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 源贴图允许的通道数
    fn allowed_channels(self) -> (&'static [u32], &'static str) {
        match self {
            TextureSlot::BaseColor | TextureSlot::Normal => (&[4], "4"),
            TextureSlot::Emissive => (&[3, 4], "3 or 4"),
            // 只读取 G 与 B 通道，单通道与双通道的贴图会被展开
            TextureSlot::MetallicRoughness => (&[1, 2, 3, 4], "1 to 4"),
        }
    }
}

/// CPU 侧的 PBR 材质
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,

    pub base_color: glam::Vec4,
    pub emissive: glam::Vec3,
    pub metallic: f32,
    pub roughness: f32,
    /// 来自 KHR_materials_transmission，没有该扩展时为 0
    pub transmission: f32,

    pub textures: [Option<TextureImage>; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: glam::Vec4::ONE,
            emissive: glam::Vec3::ZERO,
            metallic: 0.0,
            roughness: 1.0,
            transmission: 0.0,
            textures: [None, None, None, None],
        }
    }
}

// getter
impl Material {
    #[inline]
    pub fn texture(&self, slot: TextureSlot) -> Option<&TextureImage> {
        self.textures[slot.index()].as_ref()
    }

    #[inline]
    pub fn set_texture(&mut self, slot: TextureSlot, texture: TextureImage) {
        self.textures[slot.index()] = Some(texture);
    }
}

// tools
impl Material {
    /// 某个槽位缺少贴图时使用的 1x1 贴图的颜色
    pub fn fallback_value(&self, slot: TextureSlot) -> glam::Vec4 {
        match slot {
            TextureSlot::BaseColor => self.base_color,
            TextureSlot::Normal => glam::vec4(0.0, 0.0, 1.0, 0.0),
            TextureSlot::Emissive => self.emissive.extend(0.0),
            TextureSlot::MetallicRoughness => glam::vec4(self.metallic, self.roughness, 0.0, 0.0),
        }
    }

    /// 得到四个槽位的 RGBA8 贴图，缺失的槽位使用 1x1 的贴图代替
    ///
    /// 源贴图的通道数不合法时返回错误
    pub fn resolve_textures(&self) -> SceneResult<[TextureImage; 4]> {
        let resolve = |slot: TextureSlot| -> SceneResult<TextureImage> {
            let Some(texture) = self.texture(slot) else {
                return Ok(TextureImage::solid_rgba8(self.fallback_value(slot)));
            };
            let (allowed, expected) = slot.allowed_channels();
            let channel_err = || SceneError::TextureChannels {
                slot,
                expected,
                channels: texture.channels,
            };
            if !allowed.contains(&texture.channels) {
                return Err(channel_err());
            }
            texture.to_rgba8().ok_or_else(channel_err)
        };

        Ok([
            resolve(TextureSlot::BaseColor)?,
            resolve(TextureSlot::Normal)?,
            resolve(TextureSlot::Emissive)?,
            resolve(TextureSlot::MetallicRoughness)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_texture() -> TextureImage {
        TextureImage::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1, 4).unwrap()
    }

    #[test]
    fn base_color_only_material_gets_three_fallbacks() {
        let mut material = Material {
            metallic: 0.0,
            roughness: 0.5,
            ..Default::default()
        };
        material.set_texture(TextureSlot::BaseColor, rgba_texture());

        let textures = material.resolve_textures().unwrap();
        assert_eq!(textures.len(), 4);
        assert_eq!(textures[TextureSlot::BaseColor.index()], rgba_texture());

        let normal = &textures[TextureSlot::Normal.index()];
        assert_eq!((normal.width, normal.height), (1, 1));
        assert_eq!(normal.pixels, vec![0, 0, 255, 0]);

        // 默认的 emissive 为黑色
        assert_eq!(textures[TextureSlot::Emissive.index()].pixels, vec![0, 0, 0, 0]);
        assert_eq!(textures[TextureSlot::MetallicRoughness.index()].pixels, vec![0, 128, 0, 0]);
    }

    #[test]
    fn missing_base_color_uses_factor() {
        let material = Material {
            base_color: glam::vec4(1.0, 0.0, 0.0, 1.0),
            emissive: glam::vec3(0.0, 1.0, 0.0),
            ..Default::default()
        };
        let textures = material.resolve_textures().unwrap();
        assert_eq!(textures[TextureSlot::BaseColor.index()].pixels, vec![255, 0, 0, 255]);
        assert_eq!(textures[TextureSlot::Emissive.index()].pixels, vec![0, 255, 0, 0]);
    }

    #[test]
    fn rgb_base_color_is_rejected() {
        let mut material = Material::default();
        material.set_texture(TextureSlot::BaseColor, TextureImage::new(vec![0; 3], 1, 1, 3).unwrap());

        let err = material.resolve_textures().unwrap_err();
        assert!(matches!(
            err,
            SceneError::TextureChannels {
                slot: TextureSlot::BaseColor,
                channels: 3,
                ..
            }
        ));
    }

    #[test]
    fn rgb_emissive_is_expanded() {
        let mut material = Material::default();
        material.set_texture(TextureSlot::Emissive, TextureImage::new(vec![9, 8, 7], 1, 1, 3).unwrap());

        let textures = material.resolve_textures().unwrap();
        assert_eq!(textures[TextureSlot::Emissive.index()].pixels, vec![9, 8, 7, 255]);
    }

    #[test]
    fn two_channel_emissive_is_rejected() {
        let mut material = Material::default();
        material.set_texture(TextureSlot::Emissive, TextureImage::new(vec![0; 2], 1, 1, 2).unwrap());
        assert!(material.resolve_textures().is_err());
    }

    #[test]
    fn narrow_metallic_roughness_is_expanded() {
        let mut material = Material::default();
        material.set_texture(TextureSlot::MetallicRoughness, TextureImage::new(vec![7, 9], 1, 1, 2).unwrap());
        let textures = material.resolve_textures().unwrap();
        assert_eq!(textures[TextureSlot::MetallicRoughness.index()].pixels, vec![7, 9, 0, 255]);

        material.set_texture(TextureSlot::MetallicRoughness, TextureImage::new(vec![42], 1, 1, 1).unwrap());
        let textures = material.resolve_textures().unwrap();
        assert_eq!(textures[TextureSlot::MetallicRoughness.index()].pixels, vec![42, 42, 42, 255]);
    }
}
