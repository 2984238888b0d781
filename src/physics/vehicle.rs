use glam::{Quat, Vec3};
use rapier3d::na::Unit;
use rapier3d::prelude::*;

use super::{BodyTag, PhysicsWorld, Pose};
use crate::config::VehicleConfig;

struct Wheel {
    body: RigidBodyHandle,
    joint: ImpulseJointHandle,
    axis: Vec3,
    steer: f32,
    force: f32,
}

/// Chassis plus four wheel bodies hinged to it.
///
/// Steering rotates a wheel's hinge axis around the chassis up axis; wheel force
/// is applied as a torque around the (steered) hinge axis every step. The
/// aggregate cannot be reconfigured once built: to reset, remove it and build a
/// new one.
pub struct RigidVehicle {
    pub chassis: RigidBodyHandle,
    wheels: Vec<Wheel>,
}

impl RigidVehicle {
    /// Build the vehicle at `spawn` and add every body and joint to `world`
    pub fn spawn(world: &mut PhysicsWorld, cfg: &VehicleConfig, spawn: Pose, friction: f32) -> Self {
        let he = cfg.chassis_half_extents;
        let (chassis, _) = world.add_body(
            RigidBodyBuilder::dynamic()
                .position(spawn.to_isometry())
                .angular_damping(cfg.chassis_angular_damping)
                .ccd_enabled(true)
                .build(),
            vec![ColliderBuilder::cuboid(he.x, he.y, he.z)
                .mass(cfg.chassis_mass)
                .friction(friction)
                .restitution(0.0)
                .user_data(BodyTag::Vehicle.user_data())
                .build()],
        );

        let wheels = cfg
            .wheel_anchors
            .iter()
            .map(|anchor| {
                let wheel_pose = Pose::new(spawn.transform_point(*anchor), spawn.rotation);
                let (body, _) = world.add_body(
                    RigidBodyBuilder::dynamic()
                        .position(wheel_pose.to_isometry())
                        .angular_damping(cfg.wheel_angular_damping)
                        .build(),
                    vec![ColliderBuilder::ball(cfg.wheel_radius)
                        .mass(cfg.wheel_mass)
                        .friction(friction)
                        .restitution(0.0)
                        .user_data(BodyTag::Vehicle.user_data())
                        .build()],
                );

                let axis = cfg.wheel_axis.normalize();
                let hinge = RevoluteJointBuilder::new(Unit::new_normalize(vector![axis.x, axis.y, axis.z]))
                    .local_anchor1(point![anchor.x, anchor.y, anchor.z])
                    .local_anchor2(point![0.0, 0.0, 0.0])
                    .contacts_enabled(false)
                    .build();
                let joint = world.add_joint(chassis, body, hinge);

                Wheel { body, joint, axis, steer: 0.0, force: 0.0 }
            })
            .collect();

        Self { chassis, wheels }
    }

    /// Remove chassis and wheels (and with them the hinges) from `world`
    pub fn despawn(&self, world: &mut PhysicsWorld) {
        for wheel in &self.wheels {
            world.remove_body(wheel.body);
        }
        world.remove_body(self.chassis);
    }

    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheel_body(&self, index: usize) -> Option<RigidBodyHandle> {
        self.wheels.get(index).map(|w| w.body)
    }

    pub fn bodies(&self) -> Vec<RigidBodyHandle> {
        std::iter::once(self.chassis)
            .chain(self.wheels.iter().map(|w| w.body))
            .collect()
    }

    pub fn steering_value(&self, index: usize) -> Option<f32> {
        self.wheels.get(index).map(|w| w.steer)
    }

    pub fn wheel_force(&self, index: usize) -> Option<f32> {
        self.wheels.get(index).map(|w| w.force)
    }

    fn steered_axis(wheel: &Wheel) -> Vec3 {
        Quat::from_rotation_y(wheel.steer) * wheel.axis
    }

    /// Turn the hinge of wheel `index` by `value` radians around the chassis up axis
    pub fn set_steering_value(&mut self, world: &mut PhysicsWorld, value: f32, index: usize) {
        let Some(wheel) = self.wheels.get_mut(index) else {
            tracing::warn!("steering unknown wheel {}", index);
            return;
        };
        wheel.steer = value;
        let axis = Self::steered_axis(wheel);
        if let Some(joint) = world.joint_mut(wheel.joint) {
            joint.data.set_local_axis1(Unit::new_normalize(vector![axis.x, axis.y, axis.z]));
        }
    }

    /// Set the drive force of wheel `index`; applied by [`Self::apply_wheel_forces`]
    pub fn set_wheel_force(&mut self, value: f32, index: usize) {
        match self.wheels.get_mut(index) {
            Some(wheel) => wheel.force = value,
            None => tracing::warn!("driving unknown wheel {}", index),
        }
    }

    /// Push the current wheel forces into the world as torques about each hinge axis
    pub fn apply_wheel_forces(&self, world: &mut PhysicsWorld) {
        let chassis_rot = match world.pose(self.chassis) {
            Some(p) => p.rotation,
            None => return,
        };
        for wheel in &self.wheels {
            let axis = chassis_rot * Self::steered_axis(wheel);
            world.set_torque(wheel.body, axis * wheel.force);
        }
    }

    /// Chassis speed in world units per second
    pub fn speed(&self, world: &PhysicsWorld) -> f32 {
        world.linear_velocity(self.chassis).map(|v| v.length()).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use approx::assert_relative_eq;

    fn setup() -> (PhysicsWorld, RigidVehicle) {
        let mut world = PhysicsWorld::new(&PhysicsConfig::default());
        world.add_static_collider(ColliderBuilder::halfspace(Vector::y_axis()).friction(0.3).build());
        let cfg = VehicleConfig::default();
        let spawn = Pose::new(cfg.spawn_position, Quat::from_rotation_y(cfg.spawn_yaw));
        let vehicle = RigidVehicle::spawn(&mut world, &cfg, spawn, 0.3);
        (world, vehicle)
    }

    #[test]
    fn test_spawn_adds_chassis_wheels_and_hinges() {
        let (world, vehicle) = setup();
        assert_eq!(vehicle.wheel_count(), 4);
        assert_eq!(world.body_count(), 5);
        assert_eq!(world.joint_count(), 4);
        assert_eq!(vehicle.bodies().len(), 5);
    }

    #[test]
    fn test_wheels_start_at_rotated_anchors() {
        let (world, vehicle) = setup();
        let cfg = VehicleConfig::default();
        let spawn = Pose::new(cfg.spawn_position, Quat::from_rotation_y(cfg.spawn_yaw));
        for (i, anchor) in cfg.wheel_anchors.iter().enumerate() {
            let expected = spawn.transform_point(*anchor);
            let actual = world.pose(vehicle.wheel_body(i).unwrap()).unwrap().position;
            assert!(actual.abs_diff_eq(expected, 1e-4), "wheel {} at {:?}, expected {:?}", i, actual, expected);
        }
    }

    #[test]
    fn test_despawn_removes_every_body() {
        let (mut world, vehicle) = setup();
        vehicle.despawn(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_actuator_values_are_recorded_per_wheel() {
        let (mut world, mut vehicle) = setup();
        vehicle.set_steering_value(&mut world, 0.3, 1);
        vehicle.set_wheel_force(-50.0, 3);
        assert_relative_eq!(vehicle.steering_value(1).unwrap(), 0.3);
        assert_relative_eq!(vehicle.steering_value(0).unwrap(), 0.0);
        assert_relative_eq!(vehicle.wheel_force(3).unwrap(), -50.0);
        assert!(vehicle.wheel_force(7).is_none());
    }

    #[test]
    fn test_driving_moves_the_chassis() {
        let (mut world, mut vehicle) = setup();
        for _ in 0..120 {
            world.step();
        }
        let start = world.pose(vehicle.chassis).unwrap().position;
        vehicle.set_wheel_force(100.0, 0);
        vehicle.set_wheel_force(100.0, 1);
        for _ in 0..240 {
            vehicle.apply_wheel_forces(&mut world);
            world.step();
        }
        let end = world.pose(vehicle.chassis).unwrap().position;
        let travelled = Vec3::new(end.x - start.x, 0.0, end.z - start.z).length();
        assert!(travelled > 0.5, "chassis barely moved: {}", travelled);
    }
}
