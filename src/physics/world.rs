use std::sync::Mutex;

use glam::Vec3;
use rapier3d::prelude::*;
use slotmap::{new_key_type, SlotMap};

use super::{BodyTag, Pose};
use crate::config::PhysicsConfig;

new_key_type! {
    /// Handle of a contact-bus subscription
    pub struct SubscriptionId;
}

/// A contact-bus subscription: watch `collider`, report only contacts whose other
/// collider carries `required`.
#[derive(Debug, Clone, Copy)]
struct Subscription {
    collider: ColliderHandle,
    required: BodyTag,
}

/// A qualifying contact delivered by [`PhysicsWorld::drain_contacts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub subscription: SubscriptionId,
    pub other: ColliderHandle,
}

/// Collects collision-start events while the pipeline steps
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<(ColliderHandle, ColliderHandle)>>,
}

impl ContactCollector {
    fn take(&self) -> Vec<(ColliderHandle, ColliderHandle)> {
        match self.started.lock() {
            Ok(mut started) => std::mem::take(&mut *started),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let CollisionEvent::Started(c1, c2, _) = event {
            if let Ok(mut started) = self.started.lock() {
                started.push((c1, c2));
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Rigid-body world: rapier pipeline plus a publish/subscribe contact bus
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,

    collector: ContactCollector,
    subscriptions: SlotMap<SubscriptionId, Subscription>,
    pending: Vec<Contact>,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let g = config.gravity;
        Self {
            gravity: vector![g.x, g.y, g.z],
            integration_parameters: IntegrationParameters {
                dt: config.fixed_step,
                ..IntegrationParameters::default()
            },
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            collector: ContactCollector::default(),
            subscriptions: SlotMap::with_key(),
            pending: Vec::new(),
        }
    }

    /// Advance the simulation by exactly one fixed step.
    ///
    /// Collision events raised during the step are matched against the
    /// subscriptions right away and queued for [`Self::drain_contacts`].
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            None,
            &(),
            &self.collector,
        );

        for (c1, c2) in self.collector.take() {
            self.route_contact(c1, c2);
            self.route_contact(c2, c1);
        }
    }

    fn route_contact(&mut self, watched: ColliderHandle, other: ColliderHandle) {
        let other_tag = self.collider_tag(other);

        for (id, sub) in self.subscriptions.iter() {
            if sub.collider != watched {
                continue;
            }
            if other_tag == Some(sub.required) {
                self.pending.push(Contact { subscription: id, other });
            } else {
                tracing::trace!("ignoring contact on {:?}: other tag {:?}", watched, other_tag);
            }
        }
    }

    /// Subscribe to contacts on `collider` made by colliders tagged `required`
    pub fn subscribe(&mut self, collider: ColliderHandle, required: BodyTag) -> SubscriptionId {
        if let Some(c) = self.colliders.get_mut(collider) {
            c.set_active_events(c.active_events() | ActiveEvents::COLLISION_EVENTS);
        }
        self.subscriptions.insert(Subscription { collider, required })
    }

    /// Stop routing contacts for `id`. Contacts already queued stay queued.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(id).is_some()
    }

    /// Contacts queued since the last drain, in the order the solver reported them
    pub fn drain_contacts(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.pending)
    }

    /// Insert a body together with its colliders
    pub fn add_body(&mut self, body: RigidBody, colliders: Vec<Collider>) -> (RigidBodyHandle, Vec<ColliderHandle>) {
        let handle = self.bodies.insert(body);
        let collider_handles = colliders
            .into_iter()
            .map(|c| self.colliders.insert_with_parent(c, handle, &mut self.bodies))
            .collect();
        (handle, collider_handles)
    }

    /// Insert a collider attached to nothing (infinite ground, static scenery)
    pub fn add_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.colliders.insert(collider)
    }

    /// Remove a body with its colliders and joints. Returns false for unknown handles.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        self.bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn add_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint: impl Into<GenericJoint>,
    ) -> ImpulseJointHandle {
        self.impulse_joints.insert(body1, body2, joint, true)
    }

    pub fn joint_mut(&mut self, handle: ImpulseJointHandle) -> Option<&mut ImpulseJoint> {
        self.impulse_joints.get_mut(handle)
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    pub fn collider_tag(&self, handle: ColliderHandle) -> Option<BodyTag> {
        self.colliders.get(handle).and_then(|c| BodyTag::from_user_data(c.user_data))
    }

    pub fn pose(&self, handle: RigidBodyHandle) -> Option<Pose> {
        self.bodies.get(handle).map(|b| Pose::from_isometry(b.position()))
    }

    /// Teleport a body. Works for fixed bodies too (doors).
    pub fn set_pose(&mut self, handle: RigidBodyHandle, pose: Pose) -> bool {
        match self.bodies.get_mut(handle) {
            Some(body) => {
                body.set_position(pose.to_isometry(), true);
                true
            }
            None => false,
        }
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let v = b.linvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    pub fn angular_velocity(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| {
            let w = b.angvel();
            Vec3::new(w.x, w.y, w.z)
        })
    }

    /// Replace the persistent torque on a body (rapier keeps user torques across steps)
    pub fn set_torque(&mut self, handle: RigidBodyHandle, torque: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.reset_torques(false);
            if torque != Vec3::ZERO {
                body.add_torque(vector![torque.x, torque.y, torque.z], true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig::default())
    }

    fn ground(world: &mut PhysicsWorld) -> ColliderHandle {
        world.add_static_collider(
            ColliderBuilder::halfspace(Vector::y_axis())
                .user_data(BodyTag::Ground.user_data())
                .build(),
        )
    }

    fn drop_ball(world: &mut PhysicsWorld, tag: Option<BodyTag>) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic().translation(vector![0.0, 1.5, 0.0]).build();
        let mut collider = ColliderBuilder::ball(1.0);
        if let Some(tag) = tag {
            collider = collider.user_data(tag.user_data());
        }
        world.add_body(body, vec![collider.build()]).0
    }

    fn step_n(world: &mut PhysicsWorld, n: usize) -> Vec<Contact> {
        let mut contacts = Vec::new();
        for _ in 0..n {
            world.step();
            contacts.extend(world.drain_contacts());
        }
        contacts
    }

    #[test]
    fn test_gravity_pulls_dynamic_bodies_down() {
        let mut w = world();
        let ball = drop_ball(&mut w, None);
        let y0 = w.pose(ball).unwrap().position.y;
        step_n(&mut w, 10);
        assert!(w.pose(ball).unwrap().position.y < y0, "ball did not fall");
    }

    #[test]
    fn test_contact_bus_reports_matching_tag() {
        let mut w = world();
        let plane = ground(&mut w);
        let sub = w.subscribe(plane, BodyTag::Vehicle);
        drop_ball(&mut w, Some(BodyTag::Vehicle));

        let contacts = step_n(&mut w, 60);
        assert!(!contacts.is_empty(), "expected a contact with the ground");
        assert!(contacts.iter().all(|c| c.subscription == sub));
    }

    #[test]
    fn test_contact_bus_ignores_other_and_untagged_bodies() {
        let mut w = world();
        let plane = ground(&mut w);
        w.subscribe(plane, BodyTag::Vehicle);
        drop_ball(&mut w, Some(BodyTag::Scenery));
        drop_ball(&mut w, None);

        let contacts = step_n(&mut w, 60);
        assert!(contacts.is_empty(), "scenery contacts must not be reported: {:?}", contacts);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut w = world();
        let plane = ground(&mut w);
        let sub = w.subscribe(plane, BodyTag::Vehicle);
        assert!(w.unsubscribe(sub));
        drop_ball(&mut w, Some(BodyTag::Vehicle));
        assert!(step_n(&mut w, 60).is_empty());
    }

    #[test]
    fn test_remove_body_drops_it_from_the_world() {
        let mut w = world();
        let ball = drop_ball(&mut w, None);
        assert_eq!(w.body_count(), 1);
        assert!(w.remove_body(ball));
        assert_eq!(w.body_count(), 0);
        assert!(!w.remove_body(ball), "second removal must report false");
        assert!(w.pose(ball).is_none());
    }

    #[test]
    fn test_set_pose_moves_fixed_bodies() {
        let mut w = world();
        let (door, _) = w.add_body(RigidBodyBuilder::fixed().build(), vec![ColliderBuilder::cuboid(1.0, 1.0, 1.0).build()]);
        let target = Pose::at(Vec3::new(3.0, -40.0, 1.0));
        assert!(w.set_pose(door, target));
        let pose = w.pose(door).unwrap();
        assert!(pose.position.abs_diff_eq(target.position, 1e-6));
    }
}
