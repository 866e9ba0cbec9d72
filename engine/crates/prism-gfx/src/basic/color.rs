use glam::Vec4;

/// command buffer label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    pub const COLOR_CMD: Vec4 = Vec4::new(0.2, 0.6, 0.2, 1.0);
}
