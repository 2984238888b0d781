use std::collections::HashMap;
use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rapier3d::prelude::*;

use super::triggers::{TriggerAction, TriggerBank};
use crate::assets::AssetLoader;
use crate::config::PhysicsConfig;
use crate::model::{hex_color, EntityId, EntityMirror, Gate, NodeId, NodeLook, SceneGraph, Skybox, Surface, Visual};
use crate::physics::{BodyTag, PhysicsWorld, Pose};
use crate::utils::{create_box_mesh, create_cylinder_mesh, create_sphere_mesh};

const GROUND_COLOR: u32 = 0x38761d;
const GROUND_NIGHT_COLOR: u32 = 0x1b3a0e;
const STONE_COLOR: u32 = 0xd3c3a2;
const PLATE_IDLE: u32 = 0xff0000;
const PLATE_LIT: u32 = 0x00ff00;

const GROUND_TEXTURE_REPEAT: f32 = 24.0;
const RAMP_TEXTURE_REPEAT: f32 = 2.0;

const WALL_HALF: Vec3 = Vec3::new(500.0, 120.0, 15.0);
const WALL_AT: Vec3 = Vec3::new(0.0, 0.0, -300.0);

const COLUMN_HALF: Vec3 = Vec3::new(4.0, 60.0, 4.0);
const COLUMNS: [Vec3; 2] = [Vec3::new(-37.0, 0.0, 120.0), Vec3::new(30.0, 0.0, 120.0)];

const ROOF_BLOCKS: usize = 10;
const ROOF_HALF: f32 = 4.0;
const ROOF_GAP: f32 = 0.8;
const ROOF_HEIGHT: f32 = 70.0;
const ROOF_MASS: f32 = 2.0;

const PLATE_RADIUS: f32 = 4.0;
const PLATE_HALF_HEIGHT: f32 = 0.2;

const DOOR_HALF: Vec3 = Vec3::new(29.5, 30.0, 2.0);
const DOOR_CLOSED: Vec3 = Vec3::new(-3.5, 30.0, 120.0);
const DOOR_OPEN: Vec3 = Vec3::new(-3.5, -31.0, 120.0);
const DOOR_MODEL: &str = "models/door/scene.gltf";
const DOOR_MODEL_SCALE: f32 = 20.0;

const RAMP_HALF: Vec3 = Vec3::new(6.0, 1.0, 179.0);
const RAMP_AT: Vec3 = Vec3::new(30.0, 1.0, -50.0);
const RAMP_TILT: f32 = -PI / 10.8;
const RAMP_COLOR: u32 = 0xb9e8ea;

const GOAL_HALF: Vec3 = Vec3::new(14.0, 8.0, 10.0);
const GOAL_AT: Vec3 = Vec3::new(-3.5, 8.0, 185.0);
const GOAL_ORB_RADIUS: f32 = 1.2;
const GOAL_ORB_FLOAT: f32 = 2.5;

const STATUE_MODEL: &str = "models/statue/scene.gltf";
const STATUE_AT: Vec3 = Vec3::new(-80.0, 0.0, 150.0);
const STATUE_SCALE: f32 = 10.0;

const BONUS_PLATE_AT: Vec3 = Vec3::new(-60.0, PLATE_HALF_HEIGHT, 40.0);
const BONUS_DROP_AT: Vec3 = Vec3::new(-60.0, 25.0, 60.0);
const BONUS_GRID: (usize, usize) = (4, 3);
const BONUS_RADIUS: f32 = 1.5;
const BONUS_SPACING: f32 = 3.5;

/// A model-backed decoration without a body
struct StaticProp {
    visual: Visual,
    pose: Pose,
}

/// The course: static geometry, plates, door, goal and on-demand pieces
pub struct Level {
    door_body: RigidBodyHandle,
    door_entity: EntityId,
    plates: HashMap<Gate, NodeId>,
    ground: NodeId,
    ramp: Option<(ColliderHandle, NodeId)>,
    props: Vec<StaticProp>,
    bonus_clusters: usize,
    ice_friction: f32,
}

fn box_mesh(scene: &mut SceneGraph, half: Vec3) -> crate::model::MeshId {
    scene.intern_mesh(&format!("box-{}-{}-{}", half.x, half.y, half.z), || create_box_mesh(half))
}

fn static_box(physics: &mut PhysicsWorld, scene: &mut SceneGraph, half: Vec3, pose: Pose, tag: BodyTag, look: NodeLook) -> (ColliderHandle, NodeId) {
    let collider = physics.add_static_collider(
        ColliderBuilder::cuboid(half.x, half.y, half.z)
            .position(pose.to_isometry())
            .user_data(tag.user_data())
            .build(),
    );
    let mesh = box_mesh(scene, half);
    (collider, scene.add_node(mesh, pose, look))
}

pub fn door_closed_pose() -> Pose {
    Pose::at(DOOR_CLOSED)
}

pub fn door_open_pose() -> Pose {
    Pose::at(DOOR_OPEN)
}

impl Level {
    pub fn build(
        physics: &mut PhysicsWorld,
        scene: &mut SceneGraph,
        mirror: &mut EntityMirror,
        triggers: &mut TriggerBank,
        assets: &mut AssetLoader,
        config: &PhysicsConfig,
    ) -> Self {
        Self::request_surfaces(scene, assets);

        // ground
        physics.add_static_collider(
            ColliderBuilder::halfspace(Vector::y_axis())
                .friction(config.ground_friction)
                .user_data(BodyTag::Ground.user_data())
                .build(),
        );
        let ground_half = Vec3::new(500.0, 0.5, 500.0);
        let ground_mesh = box_mesh(scene, ground_half);
        let ground_look = NodeLook::colored(hex_color(GROUND_COLOR, 1.0)).textured(Surface::Ground, GROUND_TEXTURE_REPEAT);
        let ground = scene.add_node(ground_mesh, Pose::at(Vec3::new(0.0, -0.5, 0.0)), ground_look);

        static_box(physics, scene, WALL_HALF, Pose::at(WALL_AT), BodyTag::Scenery, NodeLook::colored(hex_color(0xffffff, 0.35)));
        let stone = NodeLook::colored(hex_color(STONE_COLOR, 1.0)).textured(Surface::Stone, 1.0);
        for at in COLUMNS {
            static_box(physics, scene, COLUMN_HALF, Pose::at(at), BodyTag::Scenery, stone);
        }

        Self::build_roof_chain(physics, scene, mirror);

        // pressure plates
        let upright = Quat::from_rotation_x(-PI / 2.0);
        let plate_mesh = scene.intern_mesh("plate", || create_cylinder_mesh(PLATE_RADIUS, PLATE_RADIUS, PLATE_HALF_HEIGHT * 2.0, 24));
        let mut plates = HashMap::new();
        for (gate, pose) in [
            (Gate::Door, Pose::new(Vec3::new(30.0, 55.0, 116.0), upright)),
            (Gate::Ramp, Pose::new(Vec3::new(-37.0, 4.0, 116.0), upright)),
            (Gate::Bonus, Pose::at(BONUS_PLATE_AT)),
        ] {
            let collider = physics.add_static_collider(
                ColliderBuilder::cylinder(PLATE_HALF_HEIGHT, PLATE_RADIUS)
                    .position(pose.to_isometry())
                    .user_data(BodyTag::Plate.user_data())
                    .build(),
            );
            triggers.add_zone(physics, collider, TriggerAction::Press(gate), true);
            plates.insert(gate, scene.add_node(plate_mesh, pose, NodeLook::colored(hex_color(PLATE_IDLE, 1.0))));
        }

        // door: fixed body, moved to the open pose when the door plate fires
        let closed = door_closed_pose();
        let (door_body, _) = physics.add_body(
            RigidBodyBuilder::fixed().position(closed.to_isometry()).build(),
            vec![ColliderBuilder::cuboid(DOOR_HALF.x, DOOR_HALF.y, DOOR_HALF.z)
                .user_data(BodyTag::Scenery.user_data())
                .build()],
        );
        let door_box = box_mesh(scene, DOOR_HALF);
        let door_stand_in = scene.add_node(door_box, closed, NodeLook::colored(hex_color(0x6b4226, 1.0)));
        let door_model = assets.request_model(DOOR_MODEL);
        let door_entity = mirror.register(
            door_body,
            Visual::model(&door_model, NodeLook::default().scaled(DOOR_MODEL_SCALE)).with_stand_in(door_stand_in),
            None,
        );

        // goal volume behind the gate
        let goal = physics.add_static_collider(
            ColliderBuilder::cuboid(GOAL_HALF.x, GOAL_HALF.y, GOAL_HALF.z)
                .translation(vector![GOAL_AT.x, GOAL_AT.y, GOAL_AT.z])
                .sensor(true)
                .user_data(BodyTag::Goal.user_data())
                .build(),
        );
        triggers.add_zone(physics, goal, TriggerAction::Goal, false);
        let ring = scene.intern_mesh("goal-ring", || create_cylinder_mesh(GOAL_HALF.x, GOAL_HALF.x, 0.2, 32));
        scene.add_node(ring, Pose::at(Vec3::new(GOAL_AT.x, 0.1, GOAL_AT.z)), NodeLook::colored(hex_color(0xf1c40f, 0.5)));

        let orb_mesh = scene.intern_mesh("goal-orb", || create_sphere_mesh(GOAL_ORB_RADIUS, 16, 12));
        for dx in [-8.5, 0.0, 8.5] {
            let at = GOAL_AT + Vec3::new(dx, -GOAL_AT.y + GOAL_ORB_RADIUS, 3.0);
            let (body, _) = physics.add_body(
                RigidBodyBuilder::dynamic().translation(vector![at.x, at.y, at.z]).build(),
                vec![ColliderBuilder::ball(GOAL_ORB_RADIUS).user_data(BodyTag::Bonus.user_data()).build()],
            );
            let node = scene.add_node(orb_mesh, Pose::at(at), NodeLook::colored(hex_color(0xffd700, 1.0)));
            mirror.register(body, Visual::Attached(node), Some(GOAL_ORB_FLOAT));
        }

        scene.lighting.spot.position = Vec3::new(GOAL_AT.x, 60.0, 150.0);
        scene.lighting.spot.target = Vec3::new(GOAL_AT.x, 0.0, GOAL_AT.z);
        scene.lighting.spot.intensity = 1.5;

        let statue = assets.request_model(STATUE_MODEL);
        let props = vec![StaticProp {
            visual: Visual::model(&statue, NodeLook::colored(hex_color(STONE_COLOR, 1.0)).scaled(STATUE_SCALE)),
            pose: Pose::new(STATUE_AT, Quat::from_rotation_y(PI / 4.0)),
        }];

        tracing::info!("level built: {} bodies, {} nodes", physics.body_count(), scene.node_count());

        Self {
            door_body,
            door_entity,
            plates,
            ground,
            ramp: None,
            props,
            bonus_clusters: 0,
            ice_friction: config.ice_friction,
        }
    }

    /// Start loading the tiling textures and both sky sets
    fn request_surfaces(scene: &mut SceneGraph, assets: &mut AssetLoader) {
        for surface in Surface::ALL {
            scene.set_texture(surface, assets.request_texture(surface.path()));
        }
        for sky in Skybox::ALL {
            scene.set_sky(sky, assets.request_cubemap(sky.dir()));
        }
    }

    /// Row of blocks locked to each other, dropped onto the gate columns
    fn build_roof_chain(physics: &mut PhysicsWorld, scene: &mut SceneGraph, mirror: &mut EntityMirror) {
        let half = Vec3::splat(ROOF_HALF);
        let mesh = box_mesh(scene, half);
        let pitch = ROOF_HALF * 2.0 + ROOF_GAP;
        let mut previous: Option<RigidBodyHandle> = None;

        for i in 0..ROOF_BLOCKS {
            let x = (i as f32 - (ROOF_BLOCKS / 2) as f32) * pitch;
            let at = Vec3::new(x, ROOF_HEIGHT, COLUMNS[0].z);
            let (body, _) = physics.add_body(
                RigidBodyBuilder::dynamic().translation(vector![at.x, at.y, at.z]).build(),
                vec![ColliderBuilder::cuboid(ROOF_HALF, ROOF_HALF, ROOF_HALF)
                    .mass(ROOF_MASS)
                    .user_data(BodyTag::Scenery.user_data())
                    .build()],
            );
            if let Some(prev) = previous {
                let lock = FixedJointBuilder::new()
                    .local_anchor1(point![pitch / 2.0, 0.0, 0.0])
                    .local_anchor2(point![-pitch / 2.0, 0.0, 0.0])
                    .build();
                physics.add_joint(prev, body, lock);
            }
            previous = Some(body);

            let node = scene.add_node(mesh, Pose::at(at), NodeLook::colored(hex_color(0x8b5a2b, 1.0)));
            mirror.register(body, Visual::Attached(node), None);
        }
    }

    pub fn light_plate(&self, scene: &mut SceneGraph, gate: Gate) {
        if let Some(node) = self.plates.get(&gate) {
            scene.set_color(*node, hex_color(PLATE_LIT, 1.0));
        }
    }

    /// Move the door body and whatever shows it to the open pose. Absolute, so
    /// running it twice changes nothing.
    pub fn open_door(&self, physics: &mut PhysicsWorld, scene: &mut SceneGraph, mirror: &EntityMirror) {
        let open = door_open_pose();
        physics.set_pose(self.door_body, open);
        if let Some(node) = mirror.get(self.door_entity).and_then(|e| e.visual.node()) {
            scene.set_pose(node, open);
        }
    }

    pub fn door_pose(&self, physics: &PhysicsWorld) -> Option<Pose> {
        physics.pose(self.door_body)
    }

    /// Night sky set, dimmed lights, darker ground and the goal spotlight. Absolute, like `open_door`.
    pub fn nightfall(&self, scene: &mut SceneGraph) {
        scene.skybox = Skybox::Night;
        scene.lighting.ambient_intensity = 0.15;
        scene.lighting.sun_intensity = 0.15;
        scene.lighting.spot.enabled = true;
        scene.set_color(self.ground, hex_color(GROUND_NIGHT_COLOR, 1.0));
    }

    /// Add the ice ramp leading up to the door plate. Only the first call builds it.
    pub fn spawn_ramp(&mut self, physics: &mut PhysicsWorld, scene: &mut SceneGraph) -> bool {
        if self.ramp.is_some() {
            return false;
        }
        let pose = Pose::new(RAMP_AT, Quat::from_rotation_x(RAMP_TILT));
        let collider = physics.add_static_collider(
            ColliderBuilder::cuboid(RAMP_HALF.x, RAMP_HALF.y, RAMP_HALF.z)
                .position(pose.to_isometry())
                .friction(self.ice_friction)
                .user_data(BodyTag::Ground.user_data())
                .build(),
        );
        let mesh = box_mesh(scene, RAMP_HALF);
        let look = NodeLook::colored(hex_color(RAMP_COLOR, 1.0)).textured(Surface::Ice, RAMP_TEXTURE_REPEAT);
        let node = scene.add_node(mesh, pose, look);
        self.ramp = Some((collider, node));
        true
    }

    pub fn has_ramp(&self) -> bool {
        self.ramp.is_some()
    }

    /// Drop a grid of coloured balls next to the bonus plate
    pub fn spawn_bonus_cluster(&mut self, physics: &mut PhysicsWorld, scene: &mut SceneGraph, mirror: &mut EntityMirror) -> Vec<EntityId> {
        let mesh = scene.intern_mesh("bonus-ball", || create_sphere_mesh(BONUS_RADIUS, 16, 12));
        let (cols, rows) = BONUS_GRID;
        let lift = self.bonus_clusters as f32 * BONUS_RADIUS * 2.0;
        self.bonus_clusters += 1;

        let mut spawned = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                let offset = Vec3::new(
                    (c as f32 - (cols - 1) as f32 / 2.0) * BONUS_SPACING,
                    lift + r as f32 * BONUS_SPACING,
                    (r as f32 - (rows - 1) as f32 / 2.0) * BONUS_SPACING,
                );
                let at = BONUS_DROP_AT + offset;
                let (body, _) = physics.add_body(
                    RigidBodyBuilder::dynamic().translation(vector![at.x, at.y, at.z]).build(),
                    vec![ColliderBuilder::ball(BONUS_RADIUS)
                        .restitution(0.4)
                        .user_data(BodyTag::Bonus.user_data())
                        .build()],
                );
                let hue = (r * cols + c) as f32 / (cols * rows) as f32;
                let node = scene.add_node(mesh, Pose::at(at), NodeLook::colored(hue_color(hue)));
                spawned.push(mirror.register(body, Visual::Attached(node), None));
            }
        }
        tracing::info!("bonus cluster #{} dropped ({} balls)", self.bonus_clusters, spawned.len());
        spawned
    }

    /// Attach decoration models as they arrive
    pub fn sync_props(&mut self, scene: &mut SceneGraph) {
        for prop in &mut self.props {
            if !prop.visual.is_attached() {
                prop.visual.resolve(scene, prop.pose);
            }
        }
    }
}

/// Fully saturated colour for `hue` in [0, 1)
fn hue_color(hue: f32) -> [f32; 4] {
    let h = (hue.fract() * 6.0).max(0.0);
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [r, g, b, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        physics: PhysicsWorld,
        scene: SceneGraph,
        mirror: EntityMirror,
        triggers: TriggerBank,
        level: Level,
    }

    fn fixture() -> Fixture {
        let config = PhysicsConfig::default();
        let mut physics = PhysicsWorld::new(&config);
        let mut scene = SceneGraph::new();
        let mut mirror = EntityMirror::new();
        let mut triggers = TriggerBank::new();
        let mut assets = AssetLoader::offline();
        let level = Level::build(&mut physics, &mut scene, &mut mirror, &mut triggers, &mut assets, &config);
        Fixture { physics, scene, mirror, triggers, level }
    }

    #[test]
    fn test_build_registers_plates_and_goal() {
        let f = fixture();
        assert_eq!(f.triggers.len(), 4, "three plates and the goal");
        // door + roof chain + goal orbs
        assert_eq!(f.mirror.len(), 1 + ROOF_BLOCKS + 3);
        assert_eq!(f.level.door_pose(&f.physics), Some(door_closed_pose()));
    }

    #[test]
    fn test_open_door_is_idempotent() {
        let mut f = fixture();
        f.level.open_door(&mut f.physics, &mut f.scene, &f.mirror);
        let once = f.level.door_pose(&f.physics).unwrap();
        f.level.open_door(&mut f.physics, &mut f.scene, &f.mirror);
        let twice = f.level.door_pose(&f.physics).unwrap();
        assert_eq!(once, twice);
        assert!(once.position.abs_diff_eq(DOOR_OPEN, 1e-5));
    }

    #[test]
    fn test_ramp_spawns_once() {
        let mut f = fixture();
        let nodes = f.scene.node_count();
        assert!(f.level.spawn_ramp(&mut f.physics, &mut f.scene));
        assert!(!f.level.spawn_ramp(&mut f.physics, &mut f.scene));
        assert_eq!(f.scene.node_count(), nodes + 1);
        assert!(f.level.has_ramp());
    }

    #[test]
    fn test_bonus_clusters_stack_up() {
        let mut f = fixture();
        let bodies = f.physics.body_count();
        let first = f.level.spawn_bonus_cluster(&mut f.physics, &mut f.scene, &mut f.mirror);
        let second = f.level.spawn_bonus_cluster(&mut f.physics, &mut f.scene, &mut f.mirror);
        assert_eq!(first.len(), 12);
        assert_eq!(f.physics.body_count(), bodies + 24);
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn test_nightfall_switches_sky_and_lights() {
        let mut f = fixture();
        let day = f.scene.lighting;
        f.level.nightfall(&mut f.scene);
        assert_eq!(f.scene.skybox, Skybox::Night);
        assert!(f.scene.lighting.ambient_intensity < day.ambient_intensity);
        assert!(f.scene.lighting.spot.enabled);
    }

    #[test]
    fn test_nightfall_twice_matches_once() {
        let mut f = fixture();
        let ground_color = |f: &Fixture| f.scene.node(f.level.ground).map(|n| n.look.color);

        f.level.nightfall(&mut f.scene);
        let once = (f.scene.lighting, f.scene.skybox, ground_color(&f));
        f.level.nightfall(&mut f.scene);
        let twice = (f.scene.lighting, f.scene.skybox, ground_color(&f));

        assert_eq!(once, twice, "second nightfall changed the scene");
        assert_eq!(once.2, Some(hex_color(GROUND_NIGHT_COLOR, 1.0)));
    }

    #[test]
    fn test_course_pieces_use_surface_textures() {
        let mut f = fixture();
        let ground = f.scene.node(f.level.ground).map(|n| n.look);
        assert_eq!(ground.and_then(|l| l.texture), Some(Surface::Ground));

        f.level.spawn_ramp(&mut f.physics, &mut f.scene);
        let ramp = f.level.ramp.and_then(|(_, node)| f.scene.node(node)).map(|n| n.look);
        assert_eq!(ramp.map(|l| (l.texture, l.uv_repeat)), Some((Some(Surface::Ice), [2.0, 2.0])));
    }

    #[test]
    fn test_hue_color_is_saturated() {
        assert_eq!(hue_color(0.0), [1.0, 0.0, 0.0, 1.0]);
        for i in 0..12 {
            let c = hue_color(i as f32 / 12.0);
            assert!(c[..3].iter().any(|v| *v == 1.0), "hue {} not saturated: {:?}", i, c);
        }
    }
}
