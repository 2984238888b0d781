use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self {
            eye: Vec3::new(0.0, 10.0, 10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: config.fov_y_deg.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: config.z_near,
            z_far: config.z_far,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn set_look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_projects_to_screen_center() {
        let mut cam = Camera::new(800, 600, &CameraConfig::default());
        cam.eye = Vec3::new(60.0, 24.0, 0.0);
        cam.set_look_at(Vec3::new(0.0, 6.0, 0.0));
        let clip = cam.view_proj() * cam.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "target off center: {:?}", ndc);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut cam = Camera::new(800, 600, &CameraConfig::default());
        cam.set_aspect(1000, 500);
        assert!((cam.aspect - 2.0).abs() < 1e-6);
        cam.set_aspect(10, 0);
        assert!(cam.aspect.is_finite(), "zero height must not produce inf");
    }
}
