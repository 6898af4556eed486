//! Game Logic Module
//!
//! Match simulation and the room that owns it. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `team`: Teams and team colors
//! - `input`: Player input word
//! - `player`: Roster entries
//! - `state`: Match state, disc binding, kickoff placement
//! - `tick`: Authoritative per-tick loop
//! - `events`: Domain events emitted by the room
//! - `room`: Roster, rules and the running game

pub mod team;
pub mod input;
pub mod player;
pub mod state;
pub mod tick;
pub mod events;
pub mod room;

// Re-export key types
pub use team::{Team, TeamColors};
pub use input::InputFrame;
pub use player::{Player, PlayerId, HOST_ID};
pub use state::{Game, GameState, KickRateLimit};
pub use tick::TickResult;
pub use events::{GameEvent, GameEventData};
pub use room::Room;
