/// Explicit collider tag stored in rapier's `user_data`.
///
/// This is the only way the game decides "is this the vehicle": every chassis
/// and wheel collider carries `Vehicle`, everything else carries its own tag or
/// nothing at all (`user_data == 0`).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyTag {
    Vehicle = 1,
    Ground = 2,
    Scenery = 3,
    Plate = 4,
    Goal = 5,
    Bonus = 6,
}

impl BodyTag {
    pub fn from_user_data(v: u128) -> Option<Self> {
        match v {
            1 => Some(BodyTag::Vehicle),
            2 => Some(BodyTag::Ground),
            3 => Some(BodyTag::Scenery),
            4 => Some(BodyTag::Plate),
            5 => Some(BodyTag::Goal),
            6 => Some(BodyTag::Bonus),
            _ => None,
        }
    }

    pub fn user_data(self) -> u128 {
        self as u8 as u128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_data_round_trip() {
        for tag in [BodyTag::Vehicle, BodyTag::Ground, BodyTag::Scenery, BodyTag::Plate, BodyTag::Goal, BodyTag::Bonus] {
            assert_eq!(BodyTag::from_user_data(tag.user_data()), Some(tag));
        }
    }

    #[test]
    fn test_untagged_and_unknown_values_are_none() {
        assert_eq!(BodyTag::from_user_data(0), None);
        assert_eq!(BodyTag::from_user_data(250), None);
        assert_eq!(BodyTag::from_user_data(u128::MAX), None);
    }
}
