use glam::Vec3;
use rapier3d::prelude::RigidBodyHandle;
use slotmap::{new_key_type, SlotMap};

use super::scene::{NodeId, NodeLook, SceneGraph};
use crate::assets::ModelAsset;
use crate::physics::{PhysicsWorld, Pose};

new_key_type! {
    /// Stable handle of a mirrored entity; never reused after removal
    pub struct EntityId;
}

/// The drawable side of an entity. Model-backed visuals stay `Pending` until
/// their asset slot is filled, optionally shown by a stand-in node meanwhile.
#[derive(Debug, Clone)]
pub enum Visual {
    Pending { model: ModelAsset, look: NodeLook, stand_in: Option<NodeId> },
    Attached(NodeId),
}

impl Visual {
    pub fn model(model: &ModelAsset, look: NodeLook) -> Self {
        Visual::Pending { model: model.clone(), look, stand_in: None }
    }

    /// Show `node` until the model arrives; it is removed on attach
    pub fn with_stand_in(self, node: NodeId) -> Self {
        match self {
            Visual::Pending { model, look, .. } => Visual::Pending { model, look, stand_in: Some(node) },
            attached => attached,
        }
    }

    /// Attach the model if it has arrived. Returns the node currently showing
    /// this visual: the model node, the stand-in, or nothing.
    pub fn resolve(&mut self, scene: &mut SceneGraph, pose: Pose) -> Option<NodeId> {
        if let Visual::Pending { model, look, stand_in } = self {
            if let Some(mesh) = model.get() {
                let mesh_id = scene.intern_mesh(model.path(), || mesh.clone());
                if let Some(old) = stand_in.take() {
                    scene.remove_node(old);
                }
                let node = scene.add_node(mesh_id, pose, *look);
                *self = Visual::Attached(node);
            }
        }
        self.node()
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Visual::Attached(node) => Some(*node),
            Visual::Pending { stand_in, .. } => *stand_in,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Visual::Attached(_))
    }

    /// Drop the node (if any) from the scene
    pub fn detach(&self, scene: &mut SceneGraph) {
        if let Some(node) = self.node() {
            scene.remove_node(node);
        }
    }
}

#[derive(Debug, Clone)]
pub struct DynamicEntity {
    pub body: RigidBodyHandle,
    pub visual: Visual,
    /// Vertical offset added to the mirrored position
    pub y_offset: Option<f32>,
}

/// Body pose as the visual should show it
pub fn mirrored_pose(body: Pose, y_offset: Option<f32>) -> Pose {
    match y_offset {
        Some(dy) => Pose::new(body.position + Vec3::new(0.0, dy, 0.0), body.rotation),
        None => body,
    }
}

/// Keeps visual nodes in lockstep with their physics bodies
#[derive(Default)]
pub struct EntityMirror {
    entities: SlotMap<EntityId, DynamicEntity>,
}

impl EntityMirror {
    pub fn new() -> Self {
        Self { entities: SlotMap::with_key() }
    }

    pub fn register(&mut self, body: RigidBodyHandle, visual: Visual, y_offset: Option<f32>) -> EntityId {
        self.entities.insert(DynamicEntity { body, visual, y_offset })
    }

    /// Forget an entity and drop its node. The body stays in the physics world.
    pub fn remove(&mut self, id: EntityId, scene: &mut SceneGraph) -> Option<DynamicEntity> {
        let entity = self.entities.remove(id)?;
        entity.visual.detach(scene);
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&DynamicEntity> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &DynamicEntity)> {
        self.entities.iter()
    }

    /// Copy every body pose onto its node. Entities with nothing to show yet,
    /// or whose body has vanished, are skipped. Returns how many nodes were
    /// written.
    pub fn sync(&mut self, physics: &PhysicsWorld, scene: &mut SceneGraph) -> usize {
        let mut mirrored = 0;
        for entity in self.entities.values_mut() {
            let Some(body_pose) = physics.pose(entity.body) else {
                continue;
            };
            let pose = mirrored_pose(body_pose, entity.y_offset);
            if let Some(node) = entity.visual.resolve(scene, pose) {
                scene.set_pose(node, pose);
                mirrored += 1;
            }
        }
        mirrored
    }
}
