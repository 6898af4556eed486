//! Collision Flags
//!
//! 32-bit group/mask bitfields. An object's `c_group` says what it is, its
//! `c_mask` says what it can be hit by.

use bitflags::bitflags;
use serde::{Serialize, Deserialize};

bitflags! {
    /// Collision group / mask bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CollisionFlags: u32 {
        /// The ball
        const BALL = 1;
        /// Red team players
        const RED = 2;
        /// Blue team players
        const BLUE = 4;
        /// Red kickoff barrier
        const RED_KO = 8;
        /// Blue kickoff barrier
        const BLUE_KO = 16;
        /// Walls
        const WALL = 32;
        /// Kickable discs
        const KICK = 64;
        /// Discs that can score goals
        const SCORE = 128;
        /// Custom bit 0
        const C0 = 1 << 28;
        /// Custom bit 1
        const C1 = 1 << 29;
        /// Custom bit 2
        const C2 = 1 << 30;
        /// Custom bit 3
        const C3 = 1 << 31;
    }
}

/// Flag names accepted in stadium files, in serialization order.
pub const FLAG_NAMES: [(&str, CollisionFlags); 12] = [
    ("ball", CollisionFlags::BALL),
    ("red", CollisionFlags::RED),
    ("blue", CollisionFlags::BLUE),
    ("redKO", CollisionFlags::RED_KO),
    ("blueKO", CollisionFlags::BLUE_KO),
    ("wall", CollisionFlags::WALL),
    ("kick", CollisionFlags::KICK),
    ("score", CollisionFlags::SCORE),
    ("c0", CollisionFlags::C0),
    ("c1", CollisionFlags::C1),
    ("c2", CollisionFlags::C2),
    ("c3", CollisionFlags::C3),
];

impl CollisionFlags {
    /// `"all"` in stadium files: every physical bit below `KICK`.
    pub const ALL: Self = Self::from_bits_retain(63);

    /// Default mask/group of player discs before team bits are added.
    pub const PLAYER_MASK: Self = Self::from_bits_retain(39);

    /// Whether two objects with these group/mask pairs interact.
    #[inline]
    pub fn interacts(group_a: Self, mask_a: Self, group_b: Self, mask_b: Self) -> bool {
        group_a.intersects(mask_b) && mask_a.intersects(group_b)
    }

    /// Look up a single flag by its stadium-file name.
    pub fn from_stadium_name(name: &str) -> Option<Self> {
        if name == "all" {
            return Some(Self::ALL);
        }
        FLAG_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// Stadium-file names of the set bits.
    pub fn names(self) -> Vec<&'static str> {
        if self == Self::ALL {
            return vec!["all"];
        }
        FLAG_NAMES
            .iter()
            .filter(|(_, f)| self.contains(*f))
            .map(|(n, _)| *n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(CollisionFlags::BALL.bits(), 1);
        assert_eq!(CollisionFlags::SCORE.bits(), 128);
        assert_eq!(CollisionFlags::C3.bits(), 0x8000_0000);
        assert_eq!(
            CollisionFlags::PLAYER_MASK,
            CollisionFlags::BALL | CollisionFlags::RED | CollisionFlags::BLUE | CollisionFlags::WALL
        );
    }

    #[test]
    fn test_interacts_needs_both_directions() {
        let ball_group = CollisionFlags::BALL | CollisionFlags::KICK;
        let wall_mask = CollisionFlags::BALL;
        assert!(CollisionFlags::interacts(
            ball_group,
            CollisionFlags::ALL,
            CollisionFlags::WALL,
            wall_mask
        ));
        assert!(!CollisionFlags::interacts(
            CollisionFlags::RED,
            CollisionFlags::ALL,
            CollisionFlags::WALL,
            wall_mask
        ));
    }

    #[test]
    fn test_names_roundtrip() {
        let flags = CollisionFlags::RED | CollisionFlags::BLUE_KO | CollisionFlags::C1;
        let names = flags.names();
        assert_eq!(names, vec!["red", "blueKO", "c1"]);

        let back = names
            .iter()
            .filter_map(|n| CollisionFlags::from_stadium_name(n))
            .fold(CollisionFlags::empty(), |acc, f| acc | f);
        assert_eq!(back, flags);
        assert_eq!(CollisionFlags::ALL.names(), vec!["all"]);
    }
}
