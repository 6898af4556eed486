//! Replays
//!
//! Recorded matches in the `.hbr2` container:
//!
//! ```text
//! "HBR2" | version u16 | tick count u32 | raw-deflated payload
//! payload = marker count varint, marker deltas varint...,
//!           initial room, (frame delta varint, envelope)...
//! ```
//!
//! Everything is big-endian. Goal markers are stored sorted as successive
//! deltas from the recording start.

pub mod reader;
pub mod recorder;

use thiserror::Error;

use crate::action::{ActionEnvelope, PendingQueue, Scheduled};
use crate::core::codec::CodecError;
use crate::game::room::Room;

pub use reader::ReplayReader;
pub use recorder::ReplayRecorder;

/// File magic.
pub const REPLAY_MAGIC: &[u8; 4] = b"HBR2";

/// Container version written and accepted.
pub const REPLAY_VERSION: u16 = 3;

/// Replay loading errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// Not a replay file.
    #[error("not a replay file")]
    BadMagic,

    /// Written by another version.
    #[error("incompatible replay version {0}")]
    IncompatibleVersion(u16),

    /// Payload is malformed.
    #[error("replay payload: {0}")]
    Codec(#[from] CodecError),
}

/// A loaded replay.
#[derive(Debug, Clone)]
pub struct Replay {
    /// Container version
    pub version: u16,
    /// Recorded ticks
    pub ticks: u32,
    /// Absolute frames at which goals were scored
    pub goal_markers: Vec<u32>,
    /// Room at the start of the recording
    pub initial: Room,
    /// Actions by the frame they were applied at
    pub actions: Vec<Scheduled<ActionEnvelope>>,
}

impl Replay {
    /// First recorded frame.
    pub fn start_frame(&self) -> u32 {
        self.initial.frame
    }

    /// Last recorded frame.
    pub fn end_frame(&self) -> u32 {
        self.initial.frame.wrapping_add(self.ticks)
    }

    /// Re-simulate up to `frame` (clamped to the recording).
    pub fn play_to(&self, frame: u32) -> Room {
        let target = frame.min(self.end_frame());
        let mut room = self.initial.clone();
        let mut queue: PendingQueue<ActionEnvelope> = self.actions.iter().cloned().collect();
        while room.frame < target {
            for entry in queue.pop_due(room.frame) {
                entry.item.apply(&mut room);
            }
            room.step();
        }
        room.take_events();
        room
    }

    /// Re-simulate the whole recording.
    pub fn play_to_end(&self) -> Room {
        self.play_to(self.end_frame())
    }
}
