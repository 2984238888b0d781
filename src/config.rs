use glam::Vec3;
use std::f32::consts::PI;

/// Vehicle tuning: chassis, wheel layout and actuator limits
#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub max_steer: f32,
    pub max_force: f32,
    /// Fraction of `max_force` applied when reversing
    pub reverse_factor: f32,
    pub steer_wheels: Vec<usize>,
    pub forward_wheels: Vec<usize>,
    pub reverse_wheels: Vec<usize>,

    pub chassis_half_extents: Vec3,
    pub chassis_mass: f32,
    pub chassis_angular_damping: f32,

    pub wheel_radius: f32,
    pub wheel_mass: f32,
    pub wheel_angular_damping: f32,
    /// Wheel anchors in chassis space, index order is the actuator index order
    pub wheel_anchors: [Vec3; 4],
    pub wheel_axis: Vec3,

    pub spawn_position: Vec3,
    pub spawn_yaw: f32,

    pub model_path: String,
    pub model_scale: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let axis_width = 5.0;
        Self {
            max_steer: PI / 8.0,
            max_force: 100.0,
            reverse_factor: 0.5,
            steer_wheels: vec![0, 1],
            forward_wheels: vec![0, 1],
            reverse_wheels: vec![0, 1, 2, 3],

            chassis_half_extents: Vec3::new(4.0, 0.5, 2.0),
            chassis_mass: 6.0,
            chassis_angular_damping: 0.9,

            wheel_radius: 1.0,
            wheel_mass: 0.5,
            wheel_angular_damping: 0.99,
            wheel_anchors: [
                Vec3::new(-2.0, 0.0, axis_width / 2.0),
                Vec3::new(-2.0, 0.0, -axis_width / 2.0),
                Vec3::new(2.0, 0.0, axis_width / 2.0),
                Vec3::new(2.0, 0.0, -axis_width / 2.0),
            ],
            wheel_axis: Vec3::Z,

            spawn_position: Vec3::new(0.0, 6.0, 0.0),
            spawn_yaw: PI / 2.0,

            model_path: "models/car/scene.gltf".to_string(),
            model_scale: 3.0,
        }
    }
}

/// Chase camera and projection
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Pilot point in chassis space the camera is pulled toward
    pub pilot_offset: Vec3,
    pub follow_lerp: f32,
    pub min_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 75.0,
            z_near: 1.0,
            z_far: 1000.0,
            pilot_offset: Vec3::new(60.0, 24.0, 0.0),
            follow_lerp: 0.3,
            min_height: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Fixed step per frame, no accumulator
    pub fixed_step: f32,
    pub ground_friction: f32,
    pub ice_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_step: 1.0 / 60.0,
            ground_friction: 0.3,
            ice_friction: 0.9,
        }
    }
}

/// Where the win dialog sends the player
#[derive(Debug, Clone)]
pub struct ExitConfig {
    pub visit_url: String,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            visit_url: "https://www.rust-lang.org".to_string(),
        }
    }
}

/// Top-level game configuration, assembled from defaults
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub vehicle: VehicleConfig,
    pub camera: CameraConfig,
    pub physics: PhysicsConfig,
    pub exit: ExitConfig,
    /// HUD clock refresh period
    pub hud_interval_ms: i32,
    /// Enables `k` (open door) and `l` (spawn bonus balls)
    pub debug_keys: bool,
    pub canvas_size: (u32, u32),
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig::default(),
            camera: CameraConfig::default(),
            physics: PhysicsConfig::default(),
            exit: ExitConfig::default(),
            hud_interval_ms: 10,
            debug_keys: cfg!(debug_assertions),
            canvas_size: (800, 600),
        }
    }
}
