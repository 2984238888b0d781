/// The pressure plates of the level, one per one-shot scene change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    Door,
    Ramp,
    Bonus,
}

/// Something that happened in the world and may change the scene
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    PlatePressed(Gate),
    GoalReached,
    /// Debug shortcut: same as pressing the door plate
    ForceOpenDoor,
    /// Debug shortcut: drop another bonus cluster, every time
    DebugSpawnBonus,
}

/// A scene change the director has to carry out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    LightPlate(Gate),
    OpenDoor,
    Nightfall,
    SpawnRamp,
    SpawnBonusCluster,
    StopTimer,
    ShowWinDialog,
}

/// Progress flags. Every flag only ever goes from false to true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub door_open: bool,
    pub ramp_spawned: bool,
    pub bonus_armed: bool,
    pub night: bool,
    pub won: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub state: GameState,
    pub effects: Vec<Effect>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure transition function. Replaying an event that already took effect
    /// yields the same state and no effects.
    pub fn apply(self, event: SceneEvent) -> Transition {
        let mut next = self;
        let mut effects = Vec::new();

        match event {
            SceneEvent::PlatePressed(Gate::Door) | SceneEvent::ForceOpenDoor => {
                if !self.door_open {
                    next.door_open = true;
                    next.night = true;
                    effects.extend([Effect::LightPlate(Gate::Door), Effect::OpenDoor, Effect::Nightfall]);
                }
            }
            SceneEvent::PlatePressed(Gate::Ramp) => {
                if !self.ramp_spawned {
                    next.ramp_spawned = true;
                    effects.extend([Effect::LightPlate(Gate::Ramp), Effect::SpawnRamp]);
                }
            }
            SceneEvent::PlatePressed(Gate::Bonus) => {
                if !self.bonus_armed {
                    next.bonus_armed = true;
                    effects.extend([Effect::LightPlate(Gate::Bonus), Effect::SpawnBonusCluster]);
                }
            }
            SceneEvent::DebugSpawnBonus => effects.push(Effect::SpawnBonusCluster),
            SceneEvent::GoalReached => {
                if self.door_open && !self.won {
                    next.won = true;
                    effects.extend([Effect::StopTimer, Effect::ShowWinDialog]);
                }
            }
        }

        Transition { state: next, effects }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_is_ignored_while_door_closed() {
        let t = GameState::new().apply(SceneEvent::GoalReached);
        assert!(!t.state.won, "goal must not win before the door opens");
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_goal_wins_after_door_opens() {
        let open = GameState::new().apply(SceneEvent::PlatePressed(Gate::Door)).state;
        let t = open.apply(SceneEvent::GoalReached);
        assert!(t.state.won);
        assert_eq!(t.effects, vec![Effect::StopTimer, Effect::ShowWinDialog]);
    }

    #[test]
    fn test_second_goal_contact_after_win_does_nothing() {
        let mut s = GameState::new().apply(SceneEvent::ForceOpenDoor).state;
        s = s.apply(SceneEvent::GoalReached).state;
        let again = s.apply(SceneEvent::GoalReached);
        assert_eq!(again.state, s);
        assert!(again.effects.is_empty());
    }

    #[test]
    fn test_door_opens_once_and_brings_night() {
        let first = GameState::new().apply(SceneEvent::PlatePressed(Gate::Door));
        assert!(first.state.door_open && first.state.night);
        assert_eq!(
            first.effects,
            vec![Effect::LightPlate(Gate::Door), Effect::OpenDoor, Effect::Nightfall]
        );

        let second = first.state.apply(SceneEvent::PlatePressed(Gate::Door));
        assert_eq!(second.state, first.state);
        assert!(second.effects.is_empty(), "door plate fired twice: {:?}", second.effects);

        let forced = first.state.apply(SceneEvent::ForceOpenDoor);
        assert!(forced.effects.is_empty());
    }

    #[test]
    fn test_ramp_spawns_once() {
        let first = GameState::new().apply(SceneEvent::PlatePressed(Gate::Ramp));
        assert_eq!(first.effects, vec![Effect::LightPlate(Gate::Ramp), Effect::SpawnRamp]);
        assert!(first.state.apply(SceneEvent::PlatePressed(Gate::Ramp)).effects.is_empty());
    }

    #[test]
    fn test_debug_bonus_spawns_every_time() {
        let s = GameState::new();
        for _ in 0..3 {
            assert_eq!(s.apply(SceneEvent::DebugSpawnBonus).effects, vec![Effect::SpawnBonusCluster]);
        }
    }

    #[test]
    fn test_flags_never_revert() {
        let events = [
            SceneEvent::PlatePressed(Gate::Ramp),
            SceneEvent::GoalReached,
            SceneEvent::PlatePressed(Gate::Door),
            SceneEvent::PlatePressed(Gate::Bonus),
            SceneEvent::GoalReached,
            SceneEvent::ForceOpenDoor,
            SceneEvent::PlatePressed(Gate::Ramp),
        ];
        let mut s = GameState::new();
        for e in events {
            let next = s.apply(e).state;
            assert!(next.door_open >= s.door_open && next.ramp_spawned >= s.ramp_spawned);
            assert!(next.night >= s.night && next.won >= s.won && next.bonus_armed >= s.bonus_armed);
            s = next;
        }
        assert!(s.won && s.night && s.ramp_spawned && s.bonus_armed);
    }
}
