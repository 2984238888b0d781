// PHYSICS: rapier world, body tagging, contact bus and the rigid vehicle
pub mod tags;
pub mod vehicle;
pub mod world;

pub use tags::BodyTag;
pub use vehicle::RigidVehicle;
pub use world::{Contact, PhysicsWorld, SubscriptionId};

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::{Isometry, Real};

/// Position + orientation of a body or node in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose { position: Vec3::ZERO, rotation: Quat::IDENTITY };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec3) -> Self {
        Self { position, rotation: Quat::IDENTITY }
    }

    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    pub fn to_isometry(&self) -> Isometry<Real> {
        let p = self.position;
        let q = self.rotation;
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z));
        Isometry::from_parts(Translation3::new(p.x, p.y, p.z), rotation)
    }

    pub fn from_isometry(iso: &Isometry<Real>) -> Self {
        let t = iso.translation.vector;
        let c = iso.rotation.coords;
        Self {
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::from_xyzw(c.x, c.y, c.z, c.w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pose_isometry_conversion_keeps_rotation_and_translation() {
        let pose = Pose::new(Vec3::new(1.0, -2.0, 3.5), Quat::from_rotation_y(0.7));
        let back = Pose::from_isometry(&pose.to_isometry());

        assert_relative_eq!(back.position.x, 1.0);
        assert_relative_eq!(back.position.y, -2.0);
        assert_relative_eq!(back.position.z, 3.5);
        assert!(back.rotation.abs_diff_eq(pose.rotation, 1e-6), "rotation changed: {:?}", back.rotation);
    }

    #[test]
    fn test_isometry_translation_matches_pose() {
        let iso = Pose::at(Vec3::new(4.0, 5.0, -6.0)).to_isometry();
        let t = iso.translation.vector;
        assert_eq!((t.x, t.y, t.z), (4.0, 5.0, -6.0), "translation lost in conversion");
        assert_relative_eq!(iso.rotation.angle(), 0.0);
    }

    #[test]
    fn test_transform_point_applies_rotation_first() {
        let pose = Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let p = pose.transform_point(Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(p.x, 11.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }
}
