// MODEL: scene data, mirrored entities and game progress
pub mod camera;
pub mod entity;
pub mod game_state;
pub mod scene;
pub mod timer;
pub mod vehicle_rig;

pub use camera::Camera;
pub use entity::{DynamicEntity, EntityId, EntityMirror, Visual};
pub use game_state::{Effect, GameState, Gate, SceneEvent, Transition};
pub use scene::{hex_color, Lighting, MeshId, Node, NodeId, NodeLook, SceneGraph, Skybox, SpotLight, Surface};
pub use timer::{format_elapsed, Timer};
pub use vehicle_rig::VehicleRig;
