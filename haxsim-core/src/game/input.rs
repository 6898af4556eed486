//! Player Input
//!
//! The per-player input word: four direction bits and a kick bit. Movement is
//! derived from it deterministically every tick.

use serde::{Serialize, Deserialize};

use crate::core::point::Point;

/// Up pressed
pub const INPUT_UP: u32 = 1;
/// Down pressed
pub const INPUT_DOWN: u32 = 2;
/// Left pressed
pub const INPUT_LEFT: u32 = 4;
/// Right pressed
pub const INPUT_RIGHT: u32 = 8;
/// Kick held
pub const INPUT_KICK: u32 = 16;

/// Bits that carry meaning; the rest are ignored.
pub const INPUT_MASK: u32 = 31;

/// Input state of one player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputFrame(pub u32);

impl InputFrame {
    /// No keys held.
    pub const NONE: InputFrame = InputFrame(0);

    /// Build from the raw word, dropping unknown bits.
    #[inline]
    pub fn new(bits: u32) -> Self {
        Self(bits & INPUT_MASK)
    }

    /// Build from individual keys.
    pub fn from_keys(up: bool, down: bool, left: bool, right: bool, kick: bool) -> Self {
        let mut bits = 0;
        if up {
            bits |= INPUT_UP;
        }
        if down {
            bits |= INPUT_DOWN;
        }
        if left {
            bits |= INPUT_LEFT;
        }
        if right {
            bits |= INPUT_RIGHT;
        }
        if kick {
            bits |= INPUT_KICK;
        }
        Self(bits)
    }

    /// Raw word.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Kick button held.
    #[inline]
    pub fn kick(self) -> bool {
        self.0 & INPUT_KICK != 0
    }

    /// Unit movement direction (zero when no direction or opposing keys).
    ///
    /// Screen coordinates: `UP` is negative y.
    pub fn direction(self) -> Point {
        let mut dir = Point::ZERO;
        if self.0 & INPUT_UP != 0 {
            dir.y -= 1.0;
        }
        if self.0 & INPUT_DOWN != 0 {
            dir.y += 1.0;
        }
        if self.0 & INPUT_LEFT != 0 {
            dir.x -= 1.0;
        }
        if self.0 & INPUT_RIGHT != 0 {
            dir.x += 1.0;
        }
        dir.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_normalized() {
        let d = InputFrame::from_keys(true, false, false, true, false).direction();
        assert!((d.length() - 1.0).abs() < 1e-12);
        assert!(d.x > 0.0 && d.y < 0.0);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let d = InputFrame::from_keys(true, true, true, true, true).direction();
        assert_eq!(d, Point::ZERO);
        assert!(InputFrame::new(INPUT_KICK | 1024).kick());
        assert_eq!(InputFrame::new(1024).bits(), 0);
    }
}
