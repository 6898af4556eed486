//! Wire Protocol
//!
//! Host↔client messages. Every message is little-endian and starts with a
//! one-byte type tag.
//!
//! ## Server → Client
//!
//! | Tag | Message | Payload |
//! |-----|---------|---------|
//! | 0 | Snapshot | ack_seq varint, frame u32, next_seq u32, deflated body |
//! | 1 | Confirm | seq varint, frame u32, envelope |
//! | 2 | Ack | frame u32, last_seq varint |
//! | 3 | Pong | stamp f64 |
//! | 4 | Checksum | frame u32, value u32 |
//! | 5 | ActionDropped | |
//!
//! ## Client → Server
//!
//! | Tag | Message | Payload |
//! |-----|---------|---------|
//! | 0 | Action | frame u32, envelope |
//! | 1 | Ping | stamp f64 |

use crate::action::{ActionEnvelope, PendingQueue, Scheduled};
use crate::core::codec::{CodecError, CodecResult, Endian, StreamReader, StreamWriter};
use crate::core::compress::{deflate, inflate};
use crate::game::room::Room;

/// Message from the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full authoritative state
    Snapshot {
        /// Actions of the recipient the host has processed
        ack_seq: u32,
        /// Room frame of the snapshot
        frame: u32,
        /// Next sequence number the host will assign
        next_seq: u32,
        /// Deflated room plus pending actions, see [`pack_snapshot`]
        payload: Vec<u8>,
    },
    /// A sequenced action and the frame it applies at
    Confirm {
        /// Sequence number
        seq: u32,
        /// Target frame
        frame: u32,
        /// The action
        envelope: ActionEnvelope,
    },
    /// The host reached `frame`; every action for earlier frames was sent
    Ack {
        /// Host frame
        frame: u32,
        /// Sequence numbers issued so far
        last_seq: u32,
    },
    /// Ping reply
    Pong {
        /// Echoed client timestamp
        stamp: f64,
    },
    /// Room checksum after stepping to `frame`
    Checksum {
        /// Frame
        frame: u32,
        /// Folded checksum
        value: u32,
    },
    /// The recipient's oldest unprocessed action was refused
    ActionDropped,
}

impl ServerMessage {
    /// Encode to bytes.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut w = StreamWriter::little();
        match self {
            Self::Snapshot { ack_seq, frame, next_seq, payload } => {
                w.write_u8(0);
                w.write_varint(*ack_seq);
                w.write_u32(*frame);
                w.write_u32(*next_seq);
                w.write_len_bytes(payload);
            }
            Self::Confirm { seq, frame, envelope } => {
                w.write_u8(1);
                w.write_varint(*seq);
                w.write_u32(*frame);
                envelope.encode(&mut w)?;
            }
            Self::Ack { frame, last_seq } => {
                w.write_u8(2);
                w.write_u32(*frame);
                w.write_varint(*last_seq);
            }
            Self::Pong { stamp } => {
                w.write_u8(3);
                w.write_f64(*stamp);
            }
            Self::Checksum { frame, value } => {
                w.write_u8(4);
                w.write_u32(*frame);
                w.write_u32(*value);
            }
            Self::ActionDropped => w.write_u8(5),
        }
        Ok(w.into_bytes())
    }

    /// Decode from bytes.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = StreamReader::little(bytes);
        let tag = r.read_u8()?;
        let msg = match tag {
            0 => Self::Snapshot {
                ack_seq: r.read_varint()?,
                frame: r.read_u32()?,
                next_seq: r.read_u32()?,
                payload: r.read_len_bytes()?.to_vec(),
            },
            1 => Self::Confirm {
                seq: r.read_varint()?,
                frame: r.read_u32()?,
                envelope: ActionEnvelope::decode(&mut r)?,
            },
            2 => Self::Ack {
                frame: r.read_u32()?,
                last_seq: r.read_varint()?,
            },
            3 => Self::Pong { stamp: r.read_f64()? },
            4 => Self::Checksum {
                frame: r.read_u32()?,
                value: r.read_u32()?,
            },
            5 => Self::ActionDropped,
            tag => return Err(CodecError::UnknownTag { kind: "server message", tag }),
        };
        Ok(msg)
    }
}

/// Message from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// An action, with the frame the client applied it at locally
    Action {
        /// Client frame
        frame: u32,
        /// The action
        envelope: ActionEnvelope,
    },
    /// Round-trip probe
    Ping {
        /// Client timestamp in ms
        stamp: f64,
    },
}

impl ClientMessage {
    /// Encode to bytes.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut w = StreamWriter::little();
        match self {
            Self::Action { frame, envelope } => {
                w.write_u8(0);
                w.write_u32(*frame);
                envelope.encode(&mut w)?;
            }
            Self::Ping { stamp } => {
                w.write_u8(1);
                w.write_f64(*stamp);
            }
        }
        Ok(w.into_bytes())
    }

    /// Decode from bytes.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = StreamReader::little(bytes);
        match r.read_u8()? {
            0 => Ok(Self::Action {
                frame: r.read_u32()?,
                envelope: ActionEnvelope::decode(&mut r)?,
            }),
            1 => Ok(Self::Ping { stamp: r.read_f64()? }),
            tag => Err(CodecError::UnknownTag { kind: "client message", tag }),
        }
    }
}

/// Serialize and deflate a room with its pending actions.
pub fn pack_snapshot(room: &Room, pending: &PendingQueue<ActionEnvelope>) -> CodecResult<Vec<u8>> {
    let mut w = StreamWriter::new(Endian::Little);
    room.encode(&mut w);
    w.write_varint(pending.len() as u32);
    for entry in pending.iter() {
        w.write_u32(entry.frame);
        w.write_varint(entry.seq);
        entry.item.encode(&mut w)?;
    }
    deflate(w.as_bytes())
}

/// Inflate and parse a snapshot body into fresh values.
pub fn unpack_snapshot(payload: &[u8]) -> CodecResult<(Room, PendingQueue<ActionEnvelope>)> {
    let raw = inflate(payload)?;
    let mut r = StreamReader::little(&raw);
    let room = Room::decode(&mut r)?;
    let count = r.read_varint()?;
    let mut pending = PendingQueue::new();
    for _ in 0..count {
        let frame = r.read_u32()?;
        let seq = r.read_varint()?;
        pending.insert(Scheduled::new(frame, seq, ActionEnvelope::decode(&mut r)?));
    }
    Ok((room, pending))
}
