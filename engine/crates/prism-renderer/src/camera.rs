/// 光追相机，直接作为 uniform buffer 上传
///
/// 所有向量的 w 分量都是 0
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RtCamera {
    pub position: glam::Vec4,
    pub direction: glam::Vec4,
    pub up: glam::Vec4,
    pub right: glam::Vec4,
    /// 垂直视角的一半，弧度
    pub fov: f32,
    pub min: f32,
    pub max: f32,
    pub aspect_ratio: f32,
}

impl Default for RtCamera {
    fn default() -> Self {
        Self::look_at(glam::vec3(0.0, 0.0, 5.0), glam::Vec3::ZERO, glam::Vec3::Y, 60.0, 0.001, 10000.0, 1.0)
    }
}

// new & init
impl RtCamera {
    /// 构建一组正交基：direction 指向 target，right = direction x up
    pub fn look_at(
        position: glam::Vec3,
        target: glam::Vec3,
        world_up: glam::Vec3,
        fov_deg: f32,
        near: f32,
        far: f32,
        aspect_ratio: f32,
    ) -> Self {
        let mut camera = Self {
            position: position.extend(0.0),
            direction: glam::Vec4::ZERO,
            up: glam::Vec4::ZERO,
            right: glam::Vec4::ZERO,
            fov: 0.0,
            min: 0.0,
            max: 0.0,
            aspect_ratio,
        };
        camera.orient(target - position, world_up);
        camera.set_fov(fov_deg);
        camera.set_range(near, far);
        camera
    }
}

// setters
impl RtCamera {
    #[inline]
    pub fn set_position(&mut self, pos: glam::Vec3) {
        self.position = pos.extend(0.0);
    }

    #[inline]
    pub fn set_direction(&mut self, dir: glam::Vec3) {
        self.direction = dir.extend(0.0);
    }

    #[inline]
    pub fn set_up(&mut self, up: glam::Vec3) {
        self.up = up.extend(0.0);
    }

    #[inline]
    pub fn set_right(&mut self, right: glam::Vec3) {
        self.right = right.extend(0.0);
    }

    /// 参数为完整的视角，单位为角度
    #[inline]
    pub fn set_fov(&mut self, fov_deg: f32) {
        self.fov = (fov_deg / 2.0).to_radians();
    }

    #[inline]
    pub fn set_range(&mut self, min: f32, max: f32) {
        self.min = min;
        self.max = max;
    }

    /// 根据朝向与世界空间的 up 重新计算 direction, right, up
    ///
    /// direction 与 world_up 平行时保持原来的 up/right
    pub fn orient(&mut self, direction: glam::Vec3, world_up: glam::Vec3) {
        let direction = direction.normalize_or_zero();
        let right = direction.cross(world_up);
        if direction == glam::Vec3::ZERO || right.length_squared() < 1e-12 {
            log::warn!("camera direction {:?} is degenerate with up {:?}", direction, world_up);
            return;
        }
        let right = right.normalize();
        self.set_direction(direction);
        self.set_right(right);
        self.set_up(right.cross(direction));
    }
}

// getters
impl RtCamera {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_is_80_bytes() {
        assert_eq!(size_of::<RtCamera>(), 80);
        assert_eq!(std::mem::offset_of!(RtCamera, fov), 64);
    }

    #[test]
    fn fov_is_stored_as_half_angle_radians() {
        let mut camera = RtCamera::default();
        camera.set_fov(90.0);
        assert!((camera.fov - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn look_at_builds_orthonormal_basis() {
        let camera = RtCamera::look_at(glam::vec3(0.0, 0.0, 5.0), glam::Vec3::ZERO, glam::Vec3::Y, 60.0, 0.1, 100.0, 1.5);
        let dir = camera.direction.truncate();
        let right = camera.right.truncate();
        let up = camera.up.truncate();

        assert!((dir - glam::vec3(0.0, 0.0, -1.0)).length() < 1e-6);
        assert!((right - glam::vec3(1.0, 0.0, 0.0)).length() < 1e-6);
        assert!((up - glam::vec3(0.0, 1.0, 0.0)).length() < 1e-6);
        assert_eq!(camera.position.w, 0.0);
        assert_eq!((camera.min, camera.max, camera.aspect_ratio), (0.1, 100.0, 1.5));
    }

    #[test]
    fn degenerate_orientation_is_ignored() {
        let mut camera = RtCamera::default();
        let before = camera;
        camera.orient(glam::Vec3::Y, glam::Vec3::Y);
        assert_eq!(camera, before);
    }
}
