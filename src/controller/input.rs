/// Platform-agnostic input handling: raw events in, drive commands out
use std::collections::HashMap;

use crate::config::VehicleConfig;

/// Platform-independent input events
#[derive(Debug, Clone)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),

    FocusLost,
    VisibilityChanged { visible: bool },
}

/// Key mapping configuration
#[derive(Clone, Debug)]
pub struct KeyBindings {
    pub steer_left: String,
    pub steer_right: String,
    pub forward: String,
    pub reverse: String,
    pub reset: String,
    pub open_door: String,
    pub spawn_bonus: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            steer_left: "a".to_string(),
            steer_right: "d".to_string(),
            forward: "w".to_string(),
            reverse: "s".to_string(),
            reset: " ".to_string(),
            open_door: "k".to_string(),
            spawn_bonus: "l".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriveKey {
    SteerLeft,
    SteerRight,
    Forward,
    Reverse,
}

/// Actuator change for a single wheel
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DriveCommand {
    Steer { wheel: usize, value: f32 },
    Force { wheel: usize, value: f32 },
}

/// Non-driving key actions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    ResetVehicle,
    ForceOpenDoor,
    SpawnBonus,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputOutcome {
    pub commands: Vec<DriveCommand>,
    pub action: Option<ControlAction>,
}

/// Turns key presses into per-wheel commands.
///
/// Every drive key remembers which wheel indices its press touched; its release
/// zeroes exactly those, whatever the other keys did in between.
pub struct DriveController {
    bindings: KeyBindings,
    max_steer: f32,
    max_force: f32,
    reverse_factor: f32,
    steer_wheels: Vec<usize>,
    forward_wheels: Vec<usize>,
    reverse_wheels: Vec<usize>,
    debug_keys: bool,
    commanded: HashMap<DriveKey, Vec<usize>>,
}

fn key_matches(key: &str, binding: &str) -> bool {
    key.eq_ignore_ascii_case(binding)
}

impl DriveController {
    pub fn new(cfg: &VehicleConfig, bindings: KeyBindings, debug_keys: bool) -> Self {
        Self {
            bindings,
            max_steer: cfg.max_steer,
            max_force: cfg.max_force,
            reverse_factor: cfg.reverse_factor,
            steer_wheels: cfg.steer_wheels.clone(),
            forward_wheels: cfg.forward_wheels.clone(),
            reverse_wheels: cfg.reverse_wheels.clone(),
            debug_keys,
            commanded: HashMap::new(),
        }
    }

    fn drive_key(&self, key: &str) -> Option<DriveKey> {
        let b = &self.bindings;
        if key_matches(key, &b.steer_left) || key == "ArrowLeft" {
            Some(DriveKey::SteerLeft)
        } else if key_matches(key, &b.steer_right) || key == "ArrowRight" {
            Some(DriveKey::SteerRight)
        } else if key_matches(key, &b.forward) || key == "ArrowUp" {
            Some(DriveKey::Forward)
        } else if key_matches(key, &b.reverse) || key == "ArrowDown" {
            Some(DriveKey::Reverse)
        } else {
            None
        }
    }

    fn action(&self, key: &str) -> Option<ControlAction> {
        let b = &self.bindings;
        if key == b.reset {
            Some(ControlAction::ResetVehicle)
        } else if self.debug_keys && key_matches(key, &b.open_door) {
            Some(ControlAction::ForceOpenDoor)
        } else if self.debug_keys && key_matches(key, &b.spawn_bonus) {
            Some(ControlAction::SpawnBonus)
        } else {
            None
        }
    }

    fn command(key: DriveKey, wheel: usize, value: f32) -> DriveCommand {
        match key {
            DriveKey::SteerLeft | DriveKey::SteerRight => DriveCommand::Steer { wheel, value },
            DriveKey::Forward | DriveKey::Reverse => DriveCommand::Force { wheel, value },
        }
    }

    pub fn key_down(&mut self, key: &str) -> InputOutcome {
        let Some(drive) = self.drive_key(key) else {
            return InputOutcome { commands: Vec::new(), action: self.action(key) };
        };

        let (wheels, value) = match drive {
            DriveKey::SteerLeft => (self.steer_wheels.clone(), self.max_steer),
            DriveKey::SteerRight => (self.steer_wheels.clone(), -self.max_steer),
            DriveKey::Forward => (self.forward_wheels.clone(), self.max_force),
            DriveKey::Reverse => (self.reverse_wheels.clone(), -self.max_force * self.reverse_factor),
        };

        let commands = wheels.iter().map(|w| Self::command(drive, *w, value)).collect();
        self.commanded.insert(drive, wheels);
        InputOutcome { commands, action: None }
    }

    pub fn key_up(&mut self, key: &str) -> InputOutcome {
        let commands = match self.drive_key(key) {
            Some(drive) => self
                .commanded
                .remove(&drive)
                .unwrap_or_default()
                .into_iter()
                .map(|w| Self::command(drive, w, 0.0))
                .collect(),
            None => Vec::new(),
        };
        InputOutcome { commands, action: None }
    }

    /// Zero everything any held key commanded (focus loss, hidden tab)
    pub fn release_all(&mut self) -> Vec<DriveCommand> {
        let mut commands = Vec::new();
        for (drive, wheels) in self.commanded.drain() {
            commands.extend(wheels.into_iter().map(|w| Self::command(drive, w, 0.0)));
        }
        commands
    }

    /// Drop remembered presses without emitting commands (the vehicle was rebuilt)
    pub fn forget(&mut self) {
        self.commanded.clear();
    }

    pub fn handle(&mut self, event: &InputEvent) -> InputOutcome {
        match event {
            InputEvent::KeyDown(key) => self.key_down(key),
            InputEvent::KeyUp(key) => self.key_up(key),
            InputEvent::FocusLost | InputEvent::VisibilityChanged { visible: false } => InputOutcome {
                commands: self.release_all(),
                action: None,
            },
            _ => InputOutcome::default(),
        }
    }
}

pub mod wasm {
    use super::*;
    use web_sys::KeyboardEvent;

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> DriveController {
        DriveController::new(&VehicleConfig::default(), KeyBindings::default(), true)
    }

    /// Apply commands to a per-wheel (steer, force) table
    fn apply(table: &mut [(f32, f32); 4], commands: &[DriveCommand]) {
        for c in commands {
            match *c {
                DriveCommand::Steer { wheel, value } => table[wheel].0 = value,
                DriveCommand::Force { wheel, value } => table[wheel].1 = value,
            }
        }
    }

    #[test]
    fn test_forward_drives_front_wheels() {
        let mut c = controller();
        let out = c.key_down("w");
        assert_eq!(out.commands, vec![
            DriveCommand::Force { wheel: 0, value: 100.0 },
            DriveCommand::Force { wheel: 1, value: 100.0 },
        ]);
    }

    #[test]
    fn test_reverse_drives_all_wheels_at_half_force() {
        let mut c = controller();
        let mut table = [(0.0, 0.0); 4];
        apply(&mut table, &c.key_down("s").commands);
        assert!(table.iter().all(|(_, f)| *f == -50.0), "unexpected forces {:?}", table);
    }

    #[test]
    fn test_throttle_release_zeroes_its_wheels_in_every_order() {
        use InputEvent::*;
        let orders: [[InputEvent; 4]; 6] = [
            [KeyDown("w".into()), KeyUp("w".into()), KeyDown("s".into()), KeyUp("s".into())],
            [KeyDown("w".into()), KeyDown("s".into()), KeyUp("w".into()), KeyUp("s".into())],
            [KeyDown("w".into()), KeyDown("s".into()), KeyUp("s".into()), KeyUp("w".into())],
            [KeyDown("s".into()), KeyDown("w".into()), KeyUp("w".into()), KeyUp("s".into())],
            [KeyDown("s".into()), KeyDown("w".into()), KeyUp("s".into()), KeyUp("w".into())],
            [KeyDown("s".into()), KeyUp("s".into()), KeyDown("w".into()), KeyUp("w".into())],
        ];
        let cfg = VehicleConfig::default();

        for (n, order) in orders.iter().enumerate() {
            let mut c = controller();
            let mut table = [(0.0, 0.0); 4];
            for event in order {
                apply(&mut table, &c.handle(event).commands);
                if let KeyUp(key) = event {
                    let wheels = if key == "w" { &cfg.forward_wheels } else { &cfg.reverse_wheels };
                    for w in wheels {
                        assert_eq!(table[*w].1, 0.0, "order {}: wheel {} still driven after releasing {}", n, w, key);
                    }
                }
            }
            assert!(table.iter().all(|(_, f)| *f == 0.0), "order {} left forces {:?}", n, table);
        }
    }

    #[test]
    fn test_steering_press_and_release() {
        let mut c = controller();
        let mut table = [(0.0, 0.0); 4];
        let max = VehicleConfig::default().max_steer;

        apply(&mut table, &c.key_down("a").commands);
        assert_eq!((table[0].0, table[1].0), (max, max));
        apply(&mut table, &c.key_down("d").commands);
        assert_eq!((table[0].0, table[1].0), (-max, -max));
        apply(&mut table, &c.key_up("d").commands);
        assert_eq!((table[0].0, table[1].0), (0.0, 0.0));
        assert_eq!((table[2].0, table[3].0), (0.0, 0.0), "rear wheels never steer");
    }

    #[test]
    fn test_focus_loss_releases_everything() {
        let mut c = controller();
        let mut table = [(0.0, 0.0); 4];
        apply(&mut table, &c.key_down("w").commands);
        apply(&mut table, &c.key_down("a").commands);
        apply(&mut table, &c.handle(&InputEvent::FocusLost).commands);
        assert!(table.iter().all(|(s, f)| *s == 0.0 && *f == 0.0), "held keys survived blur: {:?}", table);
        assert!(c.key_up("w").commands.is_empty(), "nothing left to release");
    }

    #[test]
    fn test_uppercase_and_arrow_keys_drive() {
        let mut c = controller();
        assert_eq!(c.key_down("W").commands.len(), 2);
        assert_eq!(c.key_up("ArrowUp").commands.len(), 2);
    }

    #[test]
    fn test_actions() {
        let mut c = controller();
        assert_eq!(c.key_down(" ").action, Some(ControlAction::ResetVehicle));
        assert_eq!(c.key_down("k").action, Some(ControlAction::ForceOpenDoor));
        assert_eq!(c.key_down("l").action, Some(ControlAction::SpawnBonus));
        assert_eq!(c.key_down("x"), InputOutcome::default());

        let mut release = DriveController::new(&VehicleConfig::default(), KeyBindings::default(), false);
        assert_eq!(release.key_down("k").action, None, "debug keys must be off");
    }
}
