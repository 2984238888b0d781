use crate::assets::{AssetLoader, ModelAsset};
use crate::config::GameConfig;
use crate::controller::camera_controller::ChaseCamera;
use crate::controller::director::{DialogChoice, Navigation, SceneDirector, Stage, WinDialog};
use crate::controller::input::{ControlAction, DriveCommand, DriveController, InputEvent, KeyBindings};
use crate::controller::level::Level;
use crate::controller::triggers::TriggerBank;
use crate::model::{Camera, Effect, EntityMirror, SceneEvent, SceneGraph, Timer, VehicleRig};
use crate::physics::PhysicsWorld;

/// What the HUD shows this frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudState {
    pub timer_text: String,
    pub speed_kmh: f32,
}

/// Summary of one tick for the platform layer
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<SceneEvent>,
    /// The goal was reached during this tick
    pub won: bool,
    pub mirrored: usize,
}

/// The whole game minus the GPU: physics, scene, input, triggers and progress
pub struct GameSession {
    pub config: GameConfig,
    pub physics: PhysicsWorld,
    pub scene: SceneGraph,
    pub mirror: EntityMirror,
    pub triggers: TriggerBank,
    pub director: SceneDirector,
    pub level: Level,
    pub rig: VehicleRig,
    pub drive: DriveController,
    pub chase: ChaseCamera,
    pub camera: Camera,
    pub timer: Timer,
    pub hud: HudState,
    assets: AssetLoader,
    car_model: ModelAsset,
    last_tick_ms: f64,
}

impl GameSession {
    pub fn new(config: GameConfig, mut assets: AssetLoader, width: u32, height: u32, now_ms: f64) -> Self {
        let mut physics = PhysicsWorld::new(&config.physics);
        let mut scene = SceneGraph::new();
        let mut mirror = EntityMirror::new();
        let mut triggers = TriggerBank::new();

        let level = Level::build(&mut physics, &mut scene, &mut mirror, &mut triggers, &mut assets, &config.physics);

        let car_model = assets.request_model(&config.vehicle.model_path);
        let rig = VehicleRig::spawn(&mut physics, &mut scene, &config.vehicle, &car_model, config.physics.ground_friction);

        let chase = ChaseCamera::new(&config.camera);
        let mut camera = Camera::new(width, height, &config.camera);
        if let Some(pose) = rig.chassis_pose(&physics) {
            chase.snap(&mut camera, pose);
        }

        let timer = Timer::start(now_ms);
        Self {
            drive: DriveController::new(&config.vehicle, KeyBindings::default(), config.debug_keys),
            director: SceneDirector::new(&config.exit.visit_url),
            hud: HudState { timer_text: timer.display(now_ms), speed_kmh: 0.0 },
            config,
            physics,
            scene,
            mirror,
            triggers,
            level,
            rig,
            chase,
            camera,
            timer,
            assets,
            car_model,
            last_tick_ms: now_ms,
        }
    }

    pub fn is_won(&self) -> bool {
        self.director.state().won
    }

    pub fn dialog(&self) -> Option<&WinDialog> {
        self.director.dialog()
    }

    /// Feed one input event. Drive commands reach the vehicle immediately.
    pub fn handle_input(&mut self, event: &InputEvent) {
        let outcome = self.drive.handle(event);
        self.apply_commands(&outcome.commands);
        if let Some(action) = outcome.action {
            self.perform(action);
        }
    }

    fn apply_commands(&mut self, commands: &[DriveCommand]) {
        for command in commands {
            match *command {
                DriveCommand::Steer { wheel, value } => {
                    self.rig.vehicle.set_steering_value(&mut self.physics, value, wheel)
                }
                DriveCommand::Force { wheel, value } => self.rig.vehicle.set_wheel_force(value, wheel),
            }
        }
    }

    pub fn perform(&mut self, action: ControlAction) {
        match action {
            ControlAction::ResetVehicle => self.reset_vehicle(),
            ControlAction::ForceOpenDoor => {
                self.dispatch(SceneEvent::ForceOpenDoor, self.last_tick_ms);
            }
            ControlAction::SpawnBonus => {
                self.dispatch(SceneEvent::DebugSpawnBonus, self.last_tick_ms);
            }
        }
    }

    /// Replace the car with a fresh one at the spawn pose
    pub fn reset_vehicle(&mut self) {
        self.rig.reset(
            &mut self.physics,
            &mut self.scene,
            &self.config.vehicle,
            &self.car_model,
            self.config.physics.ground_friction,
        );
        self.drive.forget();
        if let Some(pose) = self.rig.chassis_pose(&self.physics) {
            self.chase.snap(&mut self.camera, pose);
        }
        tracing::info!("vehicle reset");
    }

    pub fn dispatch(&mut self, event: SceneEvent, now_ms: f64) -> Vec<Effect> {
        let mut stage = Stage {
            physics: &mut self.physics,
            scene: &mut self.scene,
            mirror: &mut self.mirror,
            level: &mut self.level,
            timer: &mut self.timer,
            now_ms,
        };
        self.director.dispatch(event, &mut stage)
    }

    /// One frame: a single fixed physics step, then everything that follows from it
    pub fn tick(&mut self, now_ms: f64) -> TickReport {
        self.last_tick_ms = now_ms;
        self.assets.poll();

        self.rig.vehicle.apply_wheel_forces(&mut self.physics);
        self.physics.step();

        let events = self.triggers.collect(&mut self.physics);
        let mut won = false;
        for event in &events {
            let effects = self.dispatch(*event, now_ms);
            won |= effects.contains(&Effect::ShowWinDialog);
        }

        let mirrored = self.mirror.sync(&self.physics, &mut self.scene);
        self.level.sync_props(&mut self.scene);
        self.rig.sync(&self.physics, &mut self.scene);

        if let Some(pose) = self.rig.chassis_pose(&self.physics) {
            self.chase.follow(&mut self.camera, pose);
        }

        self.hud.speed_kmh = self.rig.speed_kmh(&self.physics);
        self.hud.timer_text = self.timer.display(now_ms);

        TickReport { events, won, mirrored }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    pub fn choose(&mut self, choice: DialogChoice) -> Navigation {
        let nav = self.director.choose(choice);
        tracing::info!("dialog answered: {:?}", nav);
        nav
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Gate;
    use glam::Vec3;

    const FRAME_MS: f64 = 1000.0 / 60.0;

    fn session_at(spawn: Option<Vec3>) -> GameSession {
        let mut config = GameConfig::default();
        config.debug_keys = true;
        if let Some(at) = spawn {
            config.vehicle.spawn_position = at;
        }
        GameSession::new(config, AssetLoader::offline(), 800, 600, 0.0)
    }

    fn run(session: &mut GameSession, frames: usize) -> Vec<TickReport> {
        (0..frames).map(|i| session.tick(i as f64 * FRAME_MS)).collect()
    }

    #[test]
    fn test_ticks_update_hud_and_camera() {
        let mut s = session_at(None);
        let reports = run(&mut s, 30);
        assert!(reports.iter().all(|r| r.mirrored > 0));
        assert_eq!(s.hud.timer_text, "00:00:483");
        assert!(s.camera.eye.y >= s.config.camera.min_height);
    }

    #[test]
    fn test_w_key_drives_front_wheels() {
        let mut s = session_at(None);
        s.handle_input(&InputEvent::KeyDown("w".into()));
        assert_eq!(s.rig.vehicle.wheel_force(0), Some(100.0));
        assert_eq!(s.rig.vehicle.wheel_force(2), Some(0.0));
        s.handle_input(&InputEvent::KeyUp("w".into()));
        assert_eq!(s.rig.vehicle.wheel_force(0), Some(0.0));
    }

    #[test]
    fn test_space_resets_without_duplicating_bodies() {
        let mut s = session_at(None);
        run(&mut s, 20);
        let bodies = s.physics.body_count();
        s.handle_input(&InputEvent::KeyDown(" ".into()));
        assert_eq!(s.physics.body_count(), bodies);
        let pose = s.rig.chassis_pose(&s.physics).unwrap();
        assert!(pose.position.abs_diff_eq(s.config.vehicle.spawn_position, 1e-5));
    }

    #[test]
    fn test_bonus_plate_drops_a_cluster() {
        let mut s = session_at(Some(Vec3::new(-60.0, 3.0, 40.0)));
        let before = s.mirror.len();
        let reports = run(&mut s, 120);
        assert!(
            reports.iter().any(|r| r.events.contains(&SceneEvent::PlatePressed(Gate::Bonus))),
            "car never touched the bonus plate"
        );
        assert!(s.director.state().bonus_armed);
        assert_eq!(s.mirror.len(), before + 12);
    }

    #[test]
    fn test_goal_needs_open_door() {
        let goal = Vec3::new(-3.5, 3.0, 180.0);

        let mut closed = session_at(Some(goal));
        let reports = run(&mut closed, 60);
        assert!(reports.iter().any(|r| r.events.contains(&SceneEvent::GoalReached)));
        assert!(!closed.is_won(), "won with the door closed");
        assert!(closed.dialog().is_none());

        let mut open = session_at(Some(goal));
        open.handle_input(&InputEvent::KeyDown("k".into()));
        let reports = run(&mut open, 60);
        assert!(reports.iter().any(|r| r.won));
        assert!(open.is_won());
        assert!(!open.timer.is_running());
        assert!(open.dialog().is_some());
    }

    #[test]
    fn test_debug_bonus_key_spawns_every_press() {
        let mut s = session_at(None);
        let before = s.mirror.len();
        s.handle_input(&InputEvent::KeyDown("l".into()));
        s.handle_input(&InputEvent::KeyDown("l".into()));
        assert_eq!(s.mirror.len(), before + 24);
    }
}
