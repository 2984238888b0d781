use glam::{Mat4, Vec3};
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

use crate::assets::{CubeFaces, CubemapAsset, ImageData, TextureAsset};
use crate::physics::Pose;
use crate::utils::Mesh;

new_key_type! {
    pub struct MeshId;
    pub struct NodeId;
}

/// Tiling textures shared by course pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Ground,
    Ice,
    Stone,
}

impl Surface {
    pub const ALL: [Surface; 3] = [Surface::Ground, Surface::Ice, Surface::Stone];

    pub fn path(self) -> &'static str {
        match self {
            Surface::Ground => "textures/texture.jpg",
            Surface::Ice => "textures/ice.jpg",
            Surface::Stone => "textures/stone.jpg",
        }
    }
}

/// Scale, tint, texture and visibility of a node, decided before its mesh exists
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLook {
    pub scale: Vec3,
    pub color: [f32; 4],
    /// Multiplied with `color`; untextured nodes sample plain white
    pub texture: Option<Surface>,
    /// Texture repeats across the mesh's 0..1 UV range
    pub uv_repeat: [f32; 2],
    pub visible: bool,
}

impl NodeLook {
    pub fn colored(color: [f32; 4]) -> Self {
        Self { scale: Vec3::ONE, color, texture: None, uv_repeat: [1.0, 1.0], visible: true }
    }

    pub fn textured(mut self, surface: Surface, repeat: f32) -> Self {
        self.texture = Some(surface);
        self.uv_repeat = [repeat, repeat];
        self
    }

    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale = Vec3::splat(factor);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

impl Default for NodeLook {
    fn default() -> Self {
        Self::colored([1.0, 1.0, 1.0, 1.0])
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub mesh: MeshId,
    pub pose: Pose,
    pub look: NodeLook,
}

impl Node {
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.look.scale, self.pose.rotation, self.pose.position)
    }

    pub fn is_translucent(&self) -> bool {
        self.look.color[3] < 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    /// Half-angle of the cone in radians
    pub angle: f32,
    pub intensity: f32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    /// Direction pointing toward the sun
    pub sun_direction: Vec3,
    pub sun_intensity: f32,
    pub spot: SpotLight,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.5,
            sun_direction: Vec3::new(-10.0, 500.0, 1000.0).normalize(),
            sun_intensity: 0.8,
            spot: SpotLight {
                position: Vec3::ZERO,
                target: Vec3::NEG_Y,
                angle: std::f32::consts::PI / 8.0,
                intensity: 0.0,
                enabled: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skybox {
    Day,
    Night,
}

impl Skybox {
    pub const ALL: [Skybox; 2] = [Skybox::Day, Skybox::Night];

    /// Directory holding the six cube faces
    pub fn dir(self) -> &'static str {
        match self {
            Skybox::Day => "textures/skybox/day",
            Skybox::Night => "textures/skybox/night",
        }
    }

    /// Shown until the cubemap set has arrived
    pub fn clear_color(self) -> wgpu::Color {
        match self {
            Skybox::Day => wgpu::Color { r: 0.53, g: 0.75, b: 0.95, a: 1.0 },
            Skybox::Night => wgpu::Color { r: 0.02, g: 0.03, b: 0.08, a: 1.0 },
        }
    }
}

/// Everything the renderer draws: shared meshes, posed nodes, lights and sky.
///
/// Meshes are immutable once added. Model meshes are interned by asset path so
/// every node using the same file shares one GPU upload. Surface textures and
/// cubemap sets are asset slots; the renderer uploads each once it has arrived.
pub struct SceneGraph {
    meshes: SlotMap<MeshId, Mesh>,
    interned: HashMap<String, MeshId>,
    nodes: SlotMap<NodeId, Node>,
    textures: HashMap<Surface, TextureAsset>,
    skies: HashMap<Skybox, CubemapAsset>,
    pub lighting: Lighting,
    pub skybox: Skybox,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            interned: HashMap::new(),
            nodes: SlotMap::with_key(),
            textures: HashMap::new(),
            skies: HashMap::new(),
            lighting: Lighting::default(),
            skybox: Skybox::Day,
        }
    }

    pub fn set_texture(&mut self, surface: Surface, asset: TextureAsset) {
        self.textures.insert(surface, asset);
    }

    /// Pixels of `surface`, once loaded
    pub fn texture(&self, surface: Surface) -> Option<&ImageData> {
        self.textures.get(&surface).and_then(|a| a.get())
    }

    pub fn set_sky(&mut self, skybox: Skybox, asset: CubemapAsset) {
        self.skies.insert(skybox, asset);
    }

    /// Faces of the `skybox` set, once loaded
    pub fn sky_faces(&self, skybox: Skybox) -> Option<&CubeFaces> {
        self.skies.get(&skybox).and_then(|a| a.get())
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Mesh registered under `key`, inserting `make()` on first use
    pub fn intern_mesh(&mut self, key: &str, make: impl FnOnce() -> Mesh) -> MeshId {
        if let Some(id) = self.interned.get(key) {
            return *id;
        }
        let id = self.meshes.insert(make());
        self.interned.insert(key.to_string(), id);
        id
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn add_node(&mut self, mesh: MeshId, pose: Pose, look: NodeLook) -> NodeId {
        self.nodes.insert(Node { mesh, pose, look })
    }

    pub fn remove_node(&mut self, id: NodeId) -> bool {
        self.nodes.remove(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_pose(&mut self, id: NodeId, pose: Pose) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.pose = pose;
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, id: NodeId, color: [f32; 4]) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.look.color = color;
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// `0xRRGGBB` to linear-ish RGBA with the given alpha
pub fn hex_color(rgb: u32, alpha: f32) -> [f32; 4] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
        alpha,
    ]
}
