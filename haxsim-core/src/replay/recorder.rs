//! Replay recording.

use tracing::debug;

use crate::action::ActionEnvelope;
use crate::core::codec::{Endian, StreamWriter};
use crate::core::compress::deflate;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::room::Room;
use super::{ReplayError, REPLAY_MAGIC, REPLAY_VERSION};

/// Accumulates a recording while a host runs.
///
/// Actions must be recorded in the order they are applied, with the frame
/// the room was at when they were applied.
#[derive(Debug)]
pub struct ReplayRecorder {
    start_frame: u32,
    initial: Vec<u8>,
    actions: StreamWriter,
    last_frame: u32,
    action_count: usize,
    goal_markers: Vec<u32>,
}

impl ReplayRecorder {
    /// Start recording from the current state of `room`.
    pub fn new(room: &Room) -> Self {
        Self {
            start_frame: room.frame,
            initial: room.to_bytes(Endian::Big),
            actions: StreamWriter::big(),
            last_frame: room.frame,
            action_count: 0,
            goal_markers: Vec::new(),
        }
    }

    /// Frame the recording started at.
    pub fn start_frame(&self) -> u32 {
        self.start_frame
    }

    /// Number of recorded actions.
    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Append an action applied at `frame`. Nothing is written when the
    /// action fails to encode.
    pub fn record(&mut self, frame: u32, envelope: &ActionEnvelope) -> Result<(), ReplayError> {
        let mut entry = StreamWriter::big();
        envelope.encode(&mut entry)?;

        let frame = frame.max(self.last_frame);
        self.actions.write_varint(frame - self.last_frame);
        self.actions.write_bytes(entry.as_bytes());
        self.last_frame = frame;
        self.action_count += 1;
        Ok(())
    }

    /// Scan emitted events for goals.
    pub fn observe(&mut self, events: &[GameEvent]) {
        for event in events {
            if matches!(event.data, GameEventData::Goal { .. }) {
                self.goal_markers.push(event.frame);
            }
        }
    }

    /// Close the recording at `end_frame` and produce the file bytes.
    pub fn finish(mut self, end_frame: u32) -> Result<Vec<u8>, ReplayError> {
        let ticks = end_frame.saturating_sub(self.start_frame);

        let mut payload = StreamWriter::big();
        self.goal_markers.sort_unstable();
        payload.write_varint(self.goal_markers.len() as u32);
        let mut prev = self.start_frame;
        for marker in &self.goal_markers {
            let marker = (*marker).max(prev);
            payload.write_varint(marker - prev);
            prev = marker;
        }
        payload.write_bytes(&self.initial);
        payload.write_bytes(self.actions.as_bytes());

        let body = deflate(payload.as_bytes())?;
        let mut out = StreamWriter::big();
        out.write_bytes(REPLAY_MAGIC);
        out.write_u16(REPLAY_VERSION);
        out.write_u32(ticks);
        out.write_bytes(&body);
        debug!(
            ticks,
            actions = self.action_count,
            goals = self.goal_markers.len(),
            bytes = out.len(),
            "replay finished"
        );
        Ok(out.into_bytes())
    }
}
