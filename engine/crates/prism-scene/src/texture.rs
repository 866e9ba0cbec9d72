use crate::error::{SceneError, SceneResult};

/// 从场景文件中读取出的原始贴图数据，像素按行紧密排列
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

// new & init
impl TextureImage {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u32) -> SceneResult<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(SceneError::TextureSize {
                width,
                height,
                channels,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            width,
            height,
            channels,
        })
    }

    /// 使用一个颜色值生成 1x1 的 RGBA8 贴图
    ///
    /// 每个分量乘以 255 后截断到 [0, 255]
    pub fn solid_rgba8(value: glam::Vec4) -> Self {
        let quantize = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        Self {
            pixels: vec![quantize(value.x), quantize(value.y), quantize(value.z), quantize(value.w)],
            width: 1,
            height: 1,
            channels: 4,
        }
    }
}

// tools
impl TextureImage {
    /// 转换为 RGBA8，缺少的 alpha 补为 255
    ///
    /// - R -> (r, r, r, 255)
    /// - RG -> (r, g, 0, 255)
    /// - RGB -> (r, g, b, 255)
    pub fn to_rgba8(&self) -> Option<TextureImage> {
        let pixels = match self.channels {
            4 => self.pixels.clone(),
            3 => {
                let rgb = image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())?;
                image::DynamicImage::ImageRgb8(rgb).to_rgba8().into_raw()
            }
            2 => self.pixels.chunks_exact(2).flat_map(|rg| [rg[0], rg[1], 0, 255]).collect(),
            1 => {
                let gray = image::GrayImage::from_raw(self.width, self.height, self.pixels.clone())?;
                image::DynamicImage::ImageLuma8(gray).to_rgba8().into_raw()
            }
            _ => return None,
        };
        Some(TextureImage {
            pixels,
            width: self.width,
            height: self.height,
            channels: 4,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_is_quantized_and_clamped() {
        let tex = TextureImage::solid_rgba8(glam::vec4(1.0, 0.5, 0.0, 2.0));
        assert_eq!((tex.width, tex.height, tex.channels), (1, 1, 4));
        assert_eq!(tex.pixels, vec![255, 128, 0, 255]);

        let tex = TextureImage::solid_rgba8(glam::vec4(-1.0, 0.0, 1.0, 0.0));
        assert_eq!(tex.pixels, vec![0, 0, 255, 0]);
    }

    #[test]
    fn rgb_is_expanded_with_opaque_alpha() {
        let tex = TextureImage::new(vec![10, 20, 30, 40, 50, 60], 2, 1, 3).unwrap();
        let rgba = tex.to_rgba8().unwrap();
        assert_eq!(rgba.channels, 4);
        assert_eq!(rgba.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn gray_and_rg_are_expanded() {
        let gray = TextureImage::new(vec![1, 2], 2, 1, 1).unwrap();
        assert_eq!(gray.to_rgba8().unwrap().pixels, vec![1, 1, 1, 255, 2, 2, 2, 255]);

        let rg = TextureImage::new(vec![1, 2, 3, 4], 2, 1, 2).unwrap();
        assert_eq!(rg.to_rgba8().unwrap().pixels, vec![1, 2, 0, 255, 3, 4, 0, 255]);
    }

    #[test]
    fn five_channels_cannot_be_expanded() {
        let tex = TextureImage::new(vec![0; 5], 1, 1, 5).unwrap();
        assert!(tex.to_rgba8().is_none());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let err = TextureImage::new(vec![0; 5], 1, 1, 4).unwrap_err();
        assert!(matches!(err, SceneError::TextureSize { expected: 4, actual: 5, .. }));
    }
}
