use std::collections::HashMap;

use rapier3d::prelude::ColliderHandle;
use slotmap::{new_key_type, SlotMap};

use crate::model::{Gate, SceneEvent};
use crate::physics::{BodyTag, PhysicsWorld, SubscriptionId};

new_key_type! {
    pub struct ZoneId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    Press(Gate),
    Goal,
}

impl TriggerAction {
    fn event(self) -> SceneEvent {
        match self {
            TriggerAction::Press(gate) => SceneEvent::PlatePressed(gate),
            TriggerAction::Goal => SceneEvent::GoalReached,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerZone {
    pub collider: ColliderHandle,
    pub subscription: SubscriptionId,
    pub action: TriggerAction,
    /// Fire at most once for the lifetime of the zone
    pub one_shot: bool,
    pub fired: bool,
}

/// Turns vehicle contacts on watched colliders into scene events
#[derive(Default)]
pub struct TriggerBank {
    zones: SlotMap<ZoneId, TriggerZone>,
    by_subscription: HashMap<SubscriptionId, ZoneId>,
}

impl TriggerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `collider` for contacts with the vehicle
    pub fn add_zone(
        &mut self,
        physics: &mut PhysicsWorld,
        collider: ColliderHandle,
        action: TriggerAction,
        one_shot: bool,
    ) -> ZoneId {
        let subscription = physics.subscribe(collider, BodyTag::Vehicle);
        let id = self.zones.insert(TriggerZone { collider, subscription, action, one_shot, fired: false });
        self.by_subscription.insert(subscription, id);
        id
    }

    pub fn get(&self, id: ZoneId) -> Option<&TriggerZone> {
        self.zones.get(id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Register a contact on `id`. One-shot zones answer only the first time.
    pub fn fire(&mut self, id: ZoneId) -> Option<SceneEvent> {
        let zone = self.zones.get_mut(id)?;
        if zone.one_shot && zone.fired {
            return None;
        }
        zone.fired = true;
        tracing::debug!("trigger {:?} fired", zone.action);
        Some(zone.action.event())
    }

    /// Drain this step's contacts and return the resulting events in order.
    /// A one-shot zone stops listening on the contact bus once it has fired.
    pub fn collect(&mut self, physics: &mut PhysicsWorld) -> Vec<SceneEvent> {
        let zones: Vec<ZoneId> = physics
            .drain_contacts()
            .into_iter()
            .filter_map(|contact| self.by_subscription.get(&contact.subscription).copied())
            .collect();

        let mut events = Vec::with_capacity(zones.len());
        for zone in zones {
            if let Some(event) = self.fire(zone) {
                events.push(event);
                self.retire_if_spent(physics, zone);
            }
        }
        events
    }

    fn retire_if_spent(&mut self, physics: &mut PhysicsWorld, id: ZoneId) {
        let Some(zone) = self.zones.get(id) else { return };
        if zone.one_shot && zone.fired && self.by_subscription.remove(&zone.subscription).is_some() {
            physics.unsubscribe(zone.subscription);
        }
    }
}
