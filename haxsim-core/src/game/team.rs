//! Teams and Team Colors

use serde::{Serialize, Deserialize};

use crate::core::codec::{CodecError, CodecResult, StreamReader, StreamWriter};
use crate::physics::flags::CollisionFlags;

/// Team assignment of a player, or goal ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum Team {
    /// Watching, no disc
    #[default]
    Spectator = 0,
    /// Red team (left side)
    Red = 1,
    /// Blue team (right side)
    Blue = 2,
}

impl Team {
    /// Wire id.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Team from wire id.
    pub fn from_id(id: u8) -> Option<Team> {
        match id {
            0 => Some(Team::Spectator),
            1 => Some(Team::Red),
            2 => Some(Team::Blue),
            _ => None,
        }
    }

    /// Read a team id, failing on unknown values.
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Team> {
        let id = r.read_u8()?;
        Team::from_id(id).ok_or(CodecError::InvalidValue {
            field: "team",
            value: id as i64,
        })
    }

    /// Whether the team plays (has discs).
    #[inline]
    pub fn is_playing(self) -> bool {
        self != Team::Spectator
    }

    /// The other playing team. Spectators map to themselves.
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
            Team::Spectator => Team::Spectator,
        }
    }

    /// Collision group of this team's player discs.
    pub fn c_group(self) -> CollisionFlags {
        match self {
            Team::Red => CollisionFlags::RED,
            Team::Blue => CollisionFlags::BLUE,
            Team::Spectator => CollisionFlags::empty(),
        }
    }

    /// Kickoff barrier bit associated with this team.
    pub fn ko_flag(self) -> CollisionFlags {
        match self {
            Team::Red => CollisionFlags::RED_KO,
            Team::Blue => CollisionFlags::BLUE_KO,
            Team::Spectator => CollisionFlags::empty(),
        }
    }

    /// Sign of the team's half along x (red left).
    pub fn side(self) -> f64 {
        match self {
            Team::Red => -1.0,
            Team::Blue => 1.0,
            Team::Spectator => 0.0,
        }
    }

    /// Lowercase name used in stadium files.
    pub fn name(self) -> &'static str {
        match self {
            Team::Spectator => "spectators",
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }
}

/// Maximum number of stripe colors in a team kit.
pub const MAX_STRIPES: usize = 3;

/// Team kit colors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamColors {
    /// Stripe angle in degrees
    pub angle: u32,
    /// Avatar text color
    pub text_color: u32,
    /// Stripe colors, at most [`MAX_STRIPES`]
    pub stripes: Vec<u32>,
}

impl TeamColors {
    /// Default kit for a team.
    pub fn default_for(team: Team) -> Self {
        let stripe = match team {
            Team::Blue => 0x5689E5,
            _ => 0xE56E56,
        };
        Self {
            angle: 0,
            text_color: 0xFFFFFF,
            stripes: vec![stripe],
        }
    }

    /// Write the kit.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_u32(self.angle);
        w.write_u32(self.text_color);
        let count = self.stripes.len().min(MAX_STRIPES);
        w.write_u8(count as u8);
        for stripe in &self.stripes[..count] {
            w.write_u32(*stripe);
        }
    }

    /// Read a kit written by [`TeamColors::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let angle = r.read_u32()?;
        let text_color = r.read_u32()?;
        let count = r.read_u8()? as usize;
        if count > MAX_STRIPES {
            return Err(CodecError::InvalidValue {
                field: "stripe count",
                value: count as i64,
            });
        }
        let stripes = (0..count)
            .map(|_| r.read_u32())
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Self { angle, text_color, stripes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_ids() {
        for team in [Team::Spectator, Team::Red, Team::Blue] {
            assert_eq!(Team::from_id(team.id()), Some(team));
        }
        assert_eq!(Team::from_id(3), None);
        assert_eq!(Team::Red.opponent(), Team::Blue);
        assert_eq!(Team::Blue.ko_flag(), CollisionFlags::BLUE_KO);
    }

    #[test]
    fn test_stripe_limit_enforced_on_decode() {
        let mut w = StreamWriter::little();
        w.write_u32(0);
        w.write_u32(0);
        w.write_u8(4);
        let bytes = w.into_bytes();
        let mut r = StreamReader::little(&bytes);
        assert!(TeamColors::decode(&mut r).is_err());
    }
}
