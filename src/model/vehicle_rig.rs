use glam::Quat;

use super::entity::Visual;
use super::scene::{hex_color, NodeId, NodeLook, SceneGraph};
use crate::assets::ModelAsset;
use crate::config::VehicleConfig;
use crate::physics::{PhysicsWorld, Pose, RigidVehicle};
use crate::utils::{create_box_mesh, create_sphere_mesh};

/// The player's car: physics aggregate plus the nodes that show it.
///
/// A plain box stands in for the chassis until the car model has loaded.
pub struct VehicleRig {
    pub vehicle: RigidVehicle,
    chassis: Visual,
    wheels: Vec<NodeId>,
}

pub fn spawn_pose(cfg: &VehicleConfig) -> Pose {
    Pose::new(cfg.spawn_position, Quat::from_rotation_y(cfg.spawn_yaw))
}

impl VehicleRig {
    pub fn spawn(
        physics: &mut PhysicsWorld,
        scene: &mut SceneGraph,
        cfg: &VehicleConfig,
        model: &ModelAsset,
        friction: f32,
    ) -> Self {
        let pose = spawn_pose(cfg);
        let vehicle = RigidVehicle::spawn(physics, cfg, pose, friction);

        let box_mesh = scene.intern_mesh("chassis-box", || create_box_mesh(cfg.chassis_half_extents));
        let stand_in = scene.add_node(box_mesh, pose, NodeLook::colored(hex_color(0xc0392b, 1.0)));
        let mut chassis = Visual::model(model, NodeLook::default().scaled(cfg.model_scale)).with_stand_in(stand_in);
        chassis.resolve(scene, pose);

        let radius = cfg.wheel_radius;
        let wheel_mesh = scene.intern_mesh(&format!("wheel-{radius}"), || create_sphere_mesh(radius, 16, 12));
        let wheels = (0..vehicle.wheel_count())
            .filter_map(|i| vehicle.wheel_body(i))
            .map(|body| {
                let pose = physics.pose(body).unwrap_or(pose);
                scene.add_node(wheel_mesh, pose, NodeLook::colored(hex_color(0x222222, 1.0)).hidden())
            })
            .collect();

        tracing::debug!("vehicle spawned at {:?}", pose.position);
        Self { vehicle, chassis, wheels }
    }

    /// Remove every body and node of the rig
    pub fn despawn(&self, physics: &mut PhysicsWorld, scene: &mut SceneGraph) {
        self.vehicle.despawn(physics);
        self.chassis.detach(scene);
        for node in &self.wheels {
            scene.remove_node(*node);
        }
    }

    /// Tear the car down and build a fresh one at the spawn pose.
    /// Drive commands given to the old vehicle do not carry over.
    pub fn reset(
        &mut self,
        physics: &mut PhysicsWorld,
        scene: &mut SceneGraph,
        cfg: &VehicleConfig,
        model: &ModelAsset,
        friction: f32,
    ) {
        self.despawn(physics, scene);
        *self = Self::spawn(physics, scene, cfg, model, friction);
    }

    /// Mirror chassis and wheel bodies onto their nodes
    pub fn sync(&mut self, physics: &PhysicsWorld, scene: &mut SceneGraph) {
        if let Some(pose) = physics.pose(self.vehicle.chassis) {
            if let Some(node) = self.chassis.resolve(scene, pose) {
                scene.set_pose(node, pose);
            }
        }

        for (i, node) in self.wheels.iter().enumerate() {
            if let Some(pose) = self.vehicle.wheel_body(i).and_then(|b| physics.pose(b)) {
                scene.set_pose(*node, pose);
            }
        }
    }

    pub fn chassis_pose(&self, physics: &PhysicsWorld) -> Option<Pose> {
        physics.pose(self.vehicle.chassis)
    }

    pub fn speed_kmh(&self, physics: &PhysicsWorld) -> f32 {
        self.vehicle.speed(physics) * 3.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use glam::Vec3;
    use rapier3d::prelude::*;

    fn setup() -> (PhysicsWorld, SceneGraph, VehicleConfig, ModelAsset, VehicleRig) {
        let mut physics = PhysicsWorld::new(&PhysicsConfig::default());
        physics.add_static_collider(ColliderBuilder::halfspace(Vector::y_axis()).build());
        let mut scene = SceneGraph::new();
        let cfg = VehicleConfig::default();
        let model = ModelAsset::pending(&cfg.model_path);
        let rig = VehicleRig::spawn(&mut physics, &mut scene, &cfg, &model, 0.3);
        (physics, scene, cfg, model, rig)
    }

    #[test]
    fn test_reset_rebuilds_at_spawn_with_zero_velocity() {
        let (mut physics, mut scene, cfg, model, mut rig) = setup();
        rig.vehicle.set_wheel_force(100.0, 0);
        rig.vehicle.set_wheel_force(100.0, 1);
        for _ in 0..90 {
            rig.vehicle.apply_wheel_forces(&mut physics);
            physics.step();
        }
        let bodies = physics.body_count();
        let nodes = scene.node_count();
        let old_chassis = rig.vehicle.chassis;

        rig.reset(&mut physics, &mut scene, &cfg, &model, 0.3);

        assert!(!physics.contains_body(old_chassis), "old chassis still simulated");
        assert_eq!(physics.body_count(), bodies);
        assert_eq!(scene.node_count(), nodes);
        let pose = rig.chassis_pose(&physics).unwrap();
        assert!(pose.position.abs_diff_eq(cfg.spawn_position, 1e-5));
        assert_eq!(physics.linear_velocity(rig.vehicle.chassis), Some(Vec3::ZERO));
        assert_eq!(physics.angular_velocity(rig.vehicle.chassis), Some(Vec3::ZERO));
        assert_eq!(rig.vehicle.wheel_force(0), Some(0.0));
    }

    #[test]
    fn test_stand_in_is_replaced_once_model_loads() {
        let (physics, mut scene, _cfg, model, mut rig) = setup();
        let before = scene.node_count();
        assert!(!rig.chassis.is_attached());

        model.resolve(create_box_mesh(Vec3::ONE));
        rig.sync(&physics, &mut scene);
        assert!(rig.chassis.is_attached());
        assert_eq!(scene.node_count(), before, "stand-in must be swapped, not stacked");
    }

    #[test]
    fn test_sync_moves_wheel_nodes_with_bodies() {
        let (mut physics, mut scene, _cfg, _model, mut rig) = setup();
        for _ in 0..30 {
            physics.step();
        }
        rig.sync(&physics, &mut scene);
        let body = rig.vehicle.wheel_body(2).unwrap();
        let node = rig.wheels[2];
        assert_eq!(scene.node(node).unwrap().pose, physics.pose(body).unwrap());
    }
}
