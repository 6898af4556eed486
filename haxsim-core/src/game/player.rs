//! Players
//!
//! Roster entries. A player's disc is owned by the game's world; the player
//! only holds its index.

use serde::{Serialize, Deserialize};

use crate::core::codec::{CodecResult, StreamReader, StreamWriter};
use super::input::InputFrame;
use super::team::Team;

/// Unique player identifier, never reused within a room.
pub type PlayerId = i32;

/// Identifier of the host. The host is always an admin.
pub const HOST_ID: PlayerId = 0;

/// Largest accepted handicap in milliseconds.
pub const MAX_HANDICAP: u16 = 300;

/// One participant of a room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Team assignment
    pub team: Team,
    /// Admin rights
    pub admin: bool,
    /// Country code
    pub country: Option<String>,
    /// Avatar chosen by the player
    pub avatar: Option<String>,
    /// Avatar set by the host; overrides `avatar`
    pub headless_avatar: Option<String>,
    /// Current input
    pub input: InputFrame,
    /// Kick press already used; cleared when the button is released
    pub kick_consumed: bool,
    /// Reported a checksum mismatch
    pub desynced: bool,
    /// Extra input delay in milliseconds
    pub handicap: u16,
    /// Last ping broadcast by the host
    pub ping: u32,
    /// Spawn slot within the team, 0 when not in a game
    pub slot: u8,
    /// Index of the bound disc in the game world
    pub disc: Option<usize>,
    /// Kick rate-limit budget
    pub zc: i32,
    /// Kick cooldown in ticks
    pub bc: i32,
    /// Typing indicator
    pub chat_indicator: bool,
}

impl Player {
    /// A fresh spectator.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            team: Team::Spectator,
            admin: false,
            country: None,
            avatar: None,
            headless_avatar: None,
            input: InputFrame::NONE,
            kick_consumed: false,
            desynced: false,
            handicap: 0,
            ping: 0,
            slot: 0,
            disc: None,
            zc: 0,
            bc: 0,
            chat_indicator: false,
        }
    }

    /// Avatar to draw, preferring the host-set one.
    pub fn shown_avatar(&self) -> Option<&str> {
        self.headless_avatar.as_deref().or(self.avatar.as_deref())
    }

    /// Drop the disc binding and the spawn slot.
    pub fn unbind(&mut self) {
        self.disc = None;
        self.slot = 0;
    }

    /// Write the full player record.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_i32(self.id);
        w.write_string(&self.name);
        w.write_u8(self.team.id());
        w.write_bool(self.admin);
        w.write_opt_string(self.country.as_deref());
        w.write_opt_string(self.avatar.as_deref());
        w.write_opt_string(self.headless_avatar.as_deref());
        w.write_u32(self.input.bits());
        w.write_bool(self.kick_consumed);
        w.write_bool(self.desynced);
        w.write_u16(self.handicap);
        w.write_u32(self.ping);
        w.write_u8(self.slot);
        w.write_i16(self.disc.map_or(-1, |d| d as i16));
        w.write_i32(self.zc);
        w.write_i32(self.bc);
        w.write_bool(self.chat_indicator);
    }

    /// Read a player written by [`Player::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            id: r.read_i32()?,
            name: r.read_string()?,
            team: Team::decode(r)?,
            admin: r.read_bool()?,
            country: r.read_opt_string()?,
            avatar: r.read_opt_string()?,
            headless_avatar: r.read_opt_string()?,
            input: InputFrame::new(r.read_u32()?),
            kick_consumed: r.read_bool()?,
            desynced: r.read_bool()?,
            handicap: r.read_u16()?,
            ping: r.read_u32()?,
            slot: r.read_u8()?,
            disc: usize::try_from(r.read_i16()?).ok(),
            zc: r.read_i32()?,
            bc: r.read_i32()?,
            chat_indicator: r.read_bool()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_avatar_overrides() {
        let mut p = Player::new(3, "ana");
        p.avatar = Some("A".into());
        assert_eq!(p.shown_avatar(), Some("A"));
        p.headless_avatar = Some("9".into());
        assert_eq!(p.shown_avatar(), Some("9"));
    }

    #[test]
    fn test_unbound_disc_survives_encoding() {
        let mut p = Player::new(7, "bo");
        p.team = Team::Blue;
        p.country = Some("pt".into());

        let mut w = StreamWriter::big();
        p.encode(&mut w);
        let bytes = w.into_bytes();
        let back = Player::decode(&mut StreamReader::big(&bytes)).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.disc, None);
    }
}
