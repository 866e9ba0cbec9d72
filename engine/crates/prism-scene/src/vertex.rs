/// 光追 shader 通过 buffer device address 直接读取的顶点格式
///
/// 每个 vec3 后面都补齐到 16 字节，与 shader 中的 std430 布局一致
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: glam::Vec3,
    _padding0: f32,
    pub normal: glam::Vec3,
    _padding1: f32,
    pub color: glam::Vec3,
    _padding2: f32,
    pub uv: glam::Vec2,
    _padding3: glam::Vec2,
}

impl Vertex {
    pub fn new(position: glam::Vec3, normal: glam::Vec3, color: glam::Vec3, uv: glam::Vec2) -> Self {
        Self {
            position,
            normal,
            color,
            uv,
            ..Default::default()
        }
    }

    /// 只有位置信息的顶点，法线为 0，颜色为 1
    pub fn from_position(position: glam::Vec3) -> Self {
        Self::new(position, glam::Vec3::ZERO, glam::Vec3::ONE, glam::Vec2::ZERO)
    }

    /// 加速结构构建时使用的 vertex stride
    pub const STRIDE: usize = size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use super::*;

    #[test]
    fn vertex_layout_is_padded_to_vec4() {
        assert_eq!(Vertex::STRIDE, 64);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 16);
        assert_eq!(offset_of!(Vertex, color), 32);
        assert_eq!(offset_of!(Vertex, uv), 48);
    }

    #[test]
    fn vertex_bytes_start_with_position() {
        let v = Vertex::from_position(glam::vec3(1.0, 2.0, 3.0));
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&v));
        assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&floats[8..11], &[1.0, 1.0, 1.0]);
    }
}
