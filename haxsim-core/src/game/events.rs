//! Room Events
//!
//! Domain events emitted by actions and by the simulation step. Callers drain
//! them from the room after each step; nothing in the core reacts to them.

use serde::{Serialize, Deserialize};

use super::player::PlayerId;
use super::team::Team;

/// Payload of a room event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player entered the room
    PlayerJoined {
        /// Who
        player_id: PlayerId,
        /// Display name
        name: String,
    },
    /// Player left, was kicked or banned
    PlayerLeft {
        /// Who
        player_id: PlayerId,
        /// Kick reason, `None` for a voluntary leave
        reason: Option<String>,
        /// Whether it was a ban
        ban: bool,
        /// Who removed them
        by: PlayerId,
    },
    /// Team assignment changed
    TeamChanged {
        /// Who moved
        player_id: PlayerId,
        /// New team
        team: Team,
        /// Who moved them
        by: PlayerId,
    },
    /// Admin flag changed
    AdminChanged {
        /// Target
        player_id: PlayerId,
        /// New value
        admin: bool,
        /// Who changed it
        by: PlayerId,
    },
    /// Match started
    GameStarted {
        /// Who started it
        by: PlayerId,
    },
    /// Match ended or was stopped
    GameStopped {
        /// Who stopped it, `None` when the end pause ran out
        by: Option<PlayerId>,
    },
    /// Pause toggled
    GamePaused {
        /// New value
        paused: bool,
        /// Who toggled
        by: PlayerId,
    },
    /// The ball left its kickoff spot
    KickoffTaken {
        /// Team that kicked off
        team: Team,
    },
    /// A kick landed
    PlayerKicked {
        /// Kicker
        player_id: PlayerId,
    },
    /// A rate-limited kick touched the ball and nudged it instead
    KickBlocked {
        /// Kicker
        player_id: PlayerId,
    },
    /// A team scored
    Goal {
        /// Scoring team
        team: Team,
        /// Red score after the goal
        red: u32,
        /// Blue score after the goal
        blue: u32,
    },
    /// Time ran out with a tie
    Overtime,
    /// A team won the match
    TeamVictory {
        /// Winner
        team: Team,
    },
    /// Stadium replaced
    StadiumChanged {
        /// New stadium name
        name: String,
        /// Who changed it
        by: PlayerId,
    },
    /// Chat line
    Chat {
        /// Author
        player_id: PlayerId,
        /// Message
        text: String,
    },
    /// Host announcement
    Announcement {
        /// Message
        text: String,
        /// Text color
        color: i32,
        /// Style index
        style: u8,
        /// Sound index
        sound: u8,
    },
    /// A player reported a checksum mismatch
    Desync {
        /// Reporter
        player_id: PlayerId,
    },
}

/// An event stamped with the room frame it happened at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Room frame
    pub frame: u32,
    /// Payload
    pub data: GameEventData,
}

impl GameEvent {
    /// Create an event.
    pub fn new(frame: u32, data: GameEventData) -> Self {
        Self { frame, data }
    }

    /// Create a goal event.
    pub fn goal(frame: u32, team: Team, red: u32, blue: u32) -> Self {
        Self::new(frame, GameEventData::Goal { team, red, blue })
    }

    /// Create a team changed event.
    pub fn team_changed(frame: u32, player_id: PlayerId, team: Team, by: PlayerId) -> Self {
        Self::new(frame, GameEventData::TeamChanged { player_id, team, by })
    }

    /// Create a player left event.
    pub fn player_left(
        frame: u32,
        player_id: PlayerId,
        reason: Option<String>,
        ban: bool,
        by: PlayerId,
    ) -> Self {
        Self::new(frame, GameEventData::PlayerLeft { player_id, reason, ban, by })
    }

    /// Whether this event ends the current match.
    pub fn is_game_stop(&self) -> bool {
        matches!(self.data, GameEventData::GameStopped { .. })
    }
}
