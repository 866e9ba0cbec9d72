use prism_renderer::camera::RtCamera;
use winit::keyboard::KeyCode;

/// 键盘控制相机平移：WASD 前后左右，QE 下上
pub struct CameraController {
    /// 每次按键移动的距离
    pub step: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self { step: 0.1 }
    }
}

impl CameraController {
    /// 返回相机是否发生了移动
    pub fn handle_key(&self, camera: &mut RtCamera, key: KeyCode) -> bool {
        let direction = camera.direction.truncate();
        let right = camera.right.truncate();
        let up = camera.up.truncate();

        let delta = match key {
            KeyCode::KeyW => direction,
            KeyCode::KeyS => -direction,
            KeyCode::KeyD => right,
            KeyCode::KeyA => -right,
            KeyCode::KeyE => up,
            KeyCode::KeyQ => -up,
            _ => return false,
        };
        camera.set_position(camera.position.truncate() + delta * self.step);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> RtCamera {
        RtCamera::look_at(glam::Vec3::ZERO, glam::Vec3::NEG_Z, glam::Vec3::Y, 60.0, 0.01, 100.0, 1.0)
    }

    #[test]
    fn forward_moves_along_view_direction() {
        let controller = CameraController { step: 2.0 };
        let mut camera = camera();

        assert!(controller.handle_key(&mut camera, KeyCode::KeyW));
        assert!(camera.position.truncate().abs_diff_eq(glam::vec3(0.0, 0.0, -2.0), 1e-5));
        assert_eq!(camera.position.w, 0.0);
    }

    #[test]
    fn strafe_and_vertical_use_camera_basis() {
        let controller = CameraController::default();
        let mut camera = camera();

        controller.handle_key(&mut camera, KeyCode::KeyD);
        controller.handle_key(&mut camera, KeyCode::KeyE);
        assert!(camera.position.truncate().abs_diff_eq(glam::vec3(0.1, 0.1, 0.0), 1e-5));
    }

    #[test]
    fn other_keys_are_ignored() {
        let controller = CameraController::default();
        let mut camera = camera();
        let before = camera;

        assert!(!controller.handle_key(&mut camera, KeyCode::Space));
        assert_eq!(camera, before);
    }
}
