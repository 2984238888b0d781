use super::level::Level;
use crate::model::{Effect, EntityMirror, GameState, SceneEvent, SceneGraph, Timer};
use crate::physics::PhysicsWorld;

/// The confirmation shown once the goal is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinDialog {
    pub title: String,
    pub message: String,
    pub elapsed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Visit,
    Quit,
}

/// Side effect the platform layer carries out after the dialog closes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Visit(String),
    Quit,
}

/// Everything an effect may touch
pub struct Stage<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub scene: &'a mut SceneGraph,
    pub mirror: &'a mut EntityMirror,
    pub level: &'a mut Level,
    pub timer: &'a mut Timer,
    pub now_ms: f64,
}

/// Owns the game progress and turns scene events into world edits
pub struct SceneDirector {
    state: GameState,
    dialog: Option<WinDialog>,
    visit_url: String,
}

impl SceneDirector {
    pub fn new(visit_url: &str) -> Self {
        Self {
            state: GameState::new(),
            dialog: None,
            visit_url: visit_url.to_string(),
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn dialog(&self) -> Option<&WinDialog> {
        self.dialog.as_ref()
    }

    /// Run the transition for `event` and apply its effects. Returns the
    /// effects that were applied (empty when the event changed nothing).
    pub fn dispatch(&mut self, event: SceneEvent, stage: &mut Stage) -> Vec<Effect> {
        let transition = self.state.apply(event);
        if transition.state != self.state {
            tracing::info!("{:?}: {:?} -> {:?}", event, self.state, transition.state);
        }
        self.state = transition.state;
        for effect in &transition.effects {
            self.execute(*effect, stage);
        }
        transition.effects
    }

    fn execute(&mut self, effect: Effect, stage: &mut Stage) {
        tracing::debug!("effect {:?}", effect);
        match effect {
            Effect::LightPlate(gate) => stage.level.light_plate(stage.scene, gate),
            Effect::OpenDoor => stage.level.open_door(stage.physics, stage.scene, stage.mirror),
            Effect::Nightfall => stage.level.nightfall(stage.scene),
            Effect::SpawnRamp => {
                stage.level.spawn_ramp(stage.physics, stage.scene);
            }
            Effect::SpawnBonusCluster => {
                stage.level.spawn_bonus_cluster(stage.physics, stage.scene, stage.mirror);
            }
            Effect::StopTimer => stage.timer.stop(stage.now_ms),
            Effect::ShowWinDialog => {
                let elapsed = stage.timer.display(stage.now_ms);
                self.dialog = Some(WinDialog {
                    title: "You made it!".to_string(),
                    message: format!("You reached the goal in {}. Visit the project page or quit?", elapsed),
                    elapsed,
                });
            }
        }
    }

    /// Close the dialog with the player's answer
    pub fn choose(&mut self, choice: DialogChoice) -> Navigation {
        self.dialog = None;
        match choice {
            DialogChoice::Visit => Navigation::Visit(self.visit_url.clone()),
            DialogChoice::Quit => Navigation::Quit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLoader;
    use crate::config::PhysicsConfig;
    use crate::controller::level::{door_closed_pose, door_open_pose};
    use crate::controller::triggers::TriggerBank;
    use crate::model::Gate;

    struct World {
        physics: PhysicsWorld,
        scene: SceneGraph,
        mirror: EntityMirror,
        level: Level,
        timer: Timer,
    }

    impl World {
        fn new() -> Self {
            let config = PhysicsConfig::default();
            let mut physics = PhysicsWorld::new(&config);
            let mut scene = SceneGraph::new();
            let mut mirror = EntityMirror::new();
            let mut triggers = TriggerBank::new();
            let level = Level::build(&mut physics, &mut scene, &mut mirror, &mut triggers, &mut AssetLoader::offline(), &config);
            Self { physics, scene, mirror, level, timer: Timer::start(0.0) }
        }

        fn dispatch(&mut self, director: &mut SceneDirector, event: SceneEvent, now_ms: f64) -> Vec<Effect> {
            let mut stage = Stage {
                physics: &mut self.physics,
                scene: &mut self.scene,
                mirror: &mut self.mirror,
                level: &mut self.level,
                timer: &mut self.timer,
                now_ms,
            };
            director.dispatch(event, &mut stage)
        }
    }

    #[test]
    fn test_goal_before_door_keeps_playing() {
        let mut w = World::new();
        let mut d = SceneDirector::new("https://example.org");
        assert!(w.dispatch(&mut d, SceneEvent::GoalReached, 5_000.0).is_empty());
        assert!(!d.state().won);
        assert!(d.dialog().is_none());
        assert!(w.timer.is_running());
    }

    #[test]
    fn test_win_freezes_timer_and_shows_dialog() {
        let mut w = World::new();
        let mut d = SceneDirector::new("https://example.org");
        w.dispatch(&mut d, SceneEvent::PlatePressed(Gate::Door), 1_000.0);
        w.dispatch(&mut d, SceneEvent::GoalReached, 61_234.0);

        assert!(d.state().won);
        assert_eq!(w.timer.elapsed_ms(99_999.0), 61_234.0);
        let dialog = d.dialog().expect("dialog after win");
        assert_eq!(dialog.elapsed, "01:01:234");
        assert!(dialog.message.contains("01:01:234"));

        assert_eq!(d.choose(DialogChoice::Visit), Navigation::Visit("https://example.org".into()));
        assert!(d.dialog().is_none());
    }

    #[test]
    fn test_door_plate_twice_opens_once() {
        let mut w = World::new();
        let mut d = SceneDirector::new("https://example.org");
        assert_eq!(w.level.door_pose(&w.physics), Some(door_closed_pose()));

        let first = w.dispatch(&mut d, SceneEvent::PlatePressed(Gate::Door), 0.0);
        assert!(first.contains(&Effect::OpenDoor));
        let pose = w.level.door_pose(&w.physics);
        assert_eq!(pose, Some(door_open_pose()));

        assert!(w.dispatch(&mut d, SceneEvent::PlatePressed(Gate::Door), 0.0).is_empty());
        assert!(w.dispatch(&mut d, SceneEvent::ForceOpenDoor, 0.0).is_empty());
        assert_eq!(w.level.door_pose(&w.physics), pose);
        assert_eq!(w.scene.skybox, crate::model::Skybox::Night);
    }

    #[test]
    fn test_quit_choice() {
        let mut d = SceneDirector::new("https://example.org");
        assert_eq!(d.choose(DialogChoice::Quit), Navigation::Quit);
    }
}
