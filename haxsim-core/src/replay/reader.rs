//! Replay loading.

use crate::action::{ActionEnvelope, Scheduled};
use crate::core::codec::StreamReader;
use crate::core::compress::inflate;
use crate::game::room::Room;
use super::{Replay, ReplayError, REPLAY_MAGIC, REPLAY_VERSION};

/// Parses `.hbr2` files.
pub struct ReplayReader;

impl ReplayReader {
    /// Parse a complete replay file.
    pub fn read(bytes: &[u8]) -> Result<Replay, ReplayError> {
        let mut header = StreamReader::big(bytes);
        let magic = header.read_bytes(4).map_err(|_| ReplayError::BadMagic)?;
        if magic != REPLAY_MAGIC {
            return Err(ReplayError::BadMagic);
        }
        let version = header.read_u16()?;
        if version != REPLAY_VERSION {
            return Err(ReplayError::IncompatibleVersion(version));
        }
        let ticks = header.read_u32()?;

        let raw = inflate(header.read_rest())?;
        let mut r = StreamReader::big(&raw);

        let marker_count = r.read_varint()?;
        let mut deltas = Vec::with_capacity((marker_count as usize).min(r.remaining()));
        for _ in 0..marker_count {
            deltas.push(r.read_varint()?);
        }

        let initial = Room::decode(&mut r)?;
        let mut at = initial.frame;
        let goal_markers = deltas
            .into_iter()
            .map(|d| {
                at = at.wrapping_add(d);
                at
            })
            .collect();

        let mut frame = initial.frame;
        let mut actions = Vec::new();
        while !r.is_empty() {
            frame = frame.wrapping_add(r.read_varint()?);
            let envelope = ActionEnvelope::decode(&mut r)?;
            actions.push(Scheduled::new(frame, actions.len() as u32, envelope));
        }

        Ok(Replay {
            version,
            ticks,
            goal_markers,
            initial,
            actions,
        })
    }
}
