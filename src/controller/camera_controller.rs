use glam::Vec3;

use crate::config::CameraConfig;
use crate::model::Camera;
use crate::physics::Pose;

/// Third-person camera that trails the chassis
pub struct ChaseCamera {
    pub pilot_offset: Vec3,
    pub follow_lerp: f32,
    pub min_height: f32,
}

impl ChaseCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            pilot_offset: config.pilot_offset,
            follow_lerp: config.follow_lerp,
            min_height: config.min_height,
        }
    }

    /// Pilot point: the offset carried along by the chassis transform
    pub fn pilot(&self, chassis: Pose) -> Vec3 {
        chassis.transform_point(self.pilot_offset)
    }

    /// Move one lerp step toward the pilot point and aim at the chassis
    pub fn follow(&self, camera: &mut Camera, chassis: Pose) {
        let mut eye = camera.eye.lerp(self.pilot(chassis), self.follow_lerp);
        eye.y = eye.y.max(self.min_height);
        camera.eye = eye;
        camera.set_look_at(chassis.position);
    }

    /// Jump straight to the pilot point (session start, vehicle reset)
    pub fn snap(&self, camera: &mut Camera, chassis: Pose) {
        let mut eye = self.pilot(chassis);
        eye.y = eye.y.max(self.min_height);
        camera.eye = eye;
        camera.set_look_at(chassis.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn setup() -> (ChaseCamera, Camera) {
        let cfg = CameraConfig::default();
        (ChaseCamera::new(&cfg), Camera::new(800, 600, &cfg))
    }

    #[test]
    fn test_follow_moves_a_fraction_of_the_way() {
        let (chase, mut cam) = setup();
        cam.eye = Vec3::ZERO;
        let chassis = Pose::at(Vec3::new(0.0, 5.0, 0.0));
        let pilot = chase.pilot(chassis);
        chase.follow(&mut cam, chassis);
        assert!(cam.eye.abs_diff_eq(pilot * 0.3, 1e-4), "eye {:?} pilot {:?}", cam.eye, pilot);
        assert_eq!(cam.target, chassis.position);
    }

    #[test]
    fn test_camera_never_drops_below_min_height() {
        let (chase, mut cam) = setup();
        cam.eye = Vec3::new(0.0, -50.0, 0.0);
        // upside-down chassis puts the pilot point underground
        let chassis = Pose::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_x(std::f32::consts::PI));
        for _ in 0..20 {
            chase.follow(&mut cam, chassis);
            assert!(cam.eye.y >= 1.0, "camera fell to {}", cam.eye.y);
        }
    }

    #[test]
    fn test_pilot_rotates_with_chassis() {
        let (chase, _) = setup();
        let chassis = Pose::new(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let pilot = chase.pilot(chassis);
        assert!(pilot.abs_diff_eq(Vec3::new(0.0, 24.0, -60.0), 1e-3), "pilot {:?}", pilot);
    }
}
