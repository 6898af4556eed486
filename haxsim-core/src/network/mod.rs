//! Network Layer
//!
//! Host and client reconciliation over an abstract message transport.
//! Everything here is **non-deterministic** bookkeeping around the
//! deterministic room in `game/`: sequencing, acknowledgements, snapshots,
//! extrapolation and connection failure handling.

pub mod client;
pub mod config;
pub mod driver;
pub mod failure;
pub mod host;
pub mod ping;
pub mod protocol;

use thiserror::Error;

use crate::core::codec::CodecError;
use crate::game::player::PlayerId;

pub use client::ClientSession;
pub use config::{ClientConfig, HostConfig};
pub use driver::{run_host, HostCommand};
pub use failure::{AttemptHandle, ConnectionAttempt, ConnectionFailure, RejectionReason};
pub use host::HostSession;
pub use ping::PingEstimator;
pub use protocol::{pack_snapshot, unpack_snapshot, ClientMessage, ServerMessage};

/// Network layer errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A message failed to decode.
    #[error("decode error: {0}")]
    Codec(#[from] CodecError),

    /// The connection has ended.
    #[error("connection ended: {0}")]
    Connection(ConnectionFailure),

    /// No snapshot received yet.
    #[error("not connected")]
    NotConnected,

    /// Message from a client the host does not know.
    #[error("unknown client {0}")]
    UnknownClient(PlayerId),

    /// A client with this id is already present.
    #[error("client {0} already connected")]
    DuplicateClient(PlayerId),
}
