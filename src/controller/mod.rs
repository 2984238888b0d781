// CONTROLLER: input, triggers, progress and the per-frame update
pub mod camera_controller;
pub mod director;
pub mod frame_loop;
pub mod input;
pub mod level;
pub mod triggers;

pub use camera_controller::ChaseCamera;
pub use director::{DialogChoice, Navigation, SceneDirector, Stage, WinDialog};
pub use frame_loop::{GameSession, HudState, TickReport};
pub use input::{ControlAction, DriveCommand, DriveController, InputEvent, InputOutcome, KeyBindings};
pub use level::Level;
pub use triggers::{TriggerAction, TriggerBank, TriggerZone, ZoneId};
