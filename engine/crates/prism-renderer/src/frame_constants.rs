/// 每一帧都会变化的数据，通过 push constant 传递给光追管线
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    /// 累积采样时的采样序号
    pub sample_index: u32,
    pub frame_id: u32,
    pub samples_per_pixel: u32,
    /// 由 [`crate::renderer::Renderer::render`] 按管线的最大递归深度填写
    pub max_depth: u32,
}

impl FrameConstants {
    pub fn new(frame_id: u64, sample_index: u32) -> Self {
        Self {
            sample_index,
            frame_id: frame_id as u32,
            samples_per_pixel: 1,
            max_depth: 1,
        }
    }

    #[inline]
    pub fn with_max_depth(self, max_depth: u32) -> Self {
        Self { max_depth, ..self }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constant_size_is_16_bytes() {
        assert_eq!(size_of::<FrameConstants>(), 16);
        assert_eq!(FrameConstants::new(7, 3).as_bytes().len(), 16);
    }

    #[test]
    fn max_depth_follows_pipeline_recursion_depth() {
        let config = crate::config::RendererConfig::from_toml_str("max_ray_recursion_depth = 3").unwrap();
        let constants = FrameConstants::new(1, 2).with_max_depth(config.max_ray_recursion_depth);
        assert_eq!(constants.max_depth, 3);
        assert_eq!((constants.frame_id, constants.sample_index), (1, 2));

        let default = crate::config::RendererConfig::default();
        assert_eq!(FrameConstants::new(0, 0).max_depth, default.max_ray_recursion_depth);
    }

    #[test]
    fn frame_id_is_truncated_to_u32() {
        let constants = FrameConstants::new(u32::MAX as u64 + 2, 0);
        assert_eq!(constants.frame_id, 1);
    }
}
