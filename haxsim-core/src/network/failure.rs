//! Connection Failures
//!
//! Typed failure reasons and the attempt handle that fences off callbacks
//! from a cancelled or failed connection attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Why the host refused a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    /// 4100
    RoomClosed,
    /// 4101
    RoomFull,
    /// 4102
    WrongPassword,
    /// 4103
    Banned,
    /// 4104
    IncompatibleVersion,
    /// Any other code
    Other(u16),
}

impl RejectionReason {
    /// Map a close code.
    pub fn from_code(code: u16) -> Self {
        match code {
            4100 => Self::RoomClosed,
            4101 => Self::RoomFull,
            4102 => Self::WrongPassword,
            4103 => Self::Banned,
            4104 => Self::IncompatibleVersion,
            other => Self::Other(other),
        }
    }

    /// Close code.
    pub fn code(self) -> u16 {
        match self {
            Self::RoomClosed => 4100,
            Self::RoomFull => 4101,
            Self::WrongPassword => 4102,
            Self::Banned => 4103,
            Self::IncompatibleVersion => 4104,
            Self::Other(code) => code,
        }
    }

    /// Fixed human-readable text.
    pub fn description(self) -> &'static str {
        match self {
            Self::RoomClosed => "The room was closed.",
            Self::RoomFull => "The room is full.",
            Self::WrongPassword => "Wrong password.",
            Self::Banned => "You are banned from this room.",
            Self::IncompatibleVersion => "Incompatible game version.",
            Self::Other(_) => "Connection closed",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(code) => write!(f, "{} ({})", self.description(), code),
            _ => f.write_str(self.description()),
        }
    }
}

/// Terminal failure of a connection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionFailure {
    /// The peer connection broke or timed out.
    #[error("connection to the host failed")]
    PeerFailed,

    /// The host refused us.
    #[error("rejected: {0}")]
    Rejected(RejectionReason),

    /// Cancelled locally.
    #[error("connection cancelled")]
    Cancelled,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Cheap clonable token; callbacks check it before touching shared state.
#[derive(Clone, Debug)]
pub struct AttemptHandle {
    id: Uuid,
    live: Arc<AtomicBool>,
}

impl AttemptHandle {
    /// Attempt identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether callbacks from this attempt may still run.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Run `f` only while the attempt is live.
    pub fn guard<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        self.is_live().then(f)
    }
}

/// One connection attempt. Fails at most once.
#[derive(Debug)]
pub struct ConnectionAttempt {
    handle: AttemptHandle,
    failure: Option<ConnectionFailure>,
}

impl Default for ConnectionAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionAttempt {
    /// Start a new attempt with a fresh id.
    pub fn new() -> Self {
        Self {
            handle: AttemptHandle {
                id: Uuid::new_v4(),
                live: Arc::new(AtomicBool::new(true)),
            },
            failure: None,
        }
    }

    /// A handle for callbacks.
    pub fn handle(&self) -> AttemptHandle {
        self.handle.clone()
    }

    /// Whether the attempt is still live.
    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// The recorded failure, if any.
    pub fn failure(&self) -> Option<&ConnectionFailure> {
        self.failure.as_ref()
    }

    /// Record a failure and invalidate every handle. Returns the failure the
    /// first time only.
    pub fn fail(&mut self, failure: ConnectionFailure) -> Option<ConnectionFailure> {
        if !self.handle.live.swap(false, Ordering::AcqRel) {
            return None;
        }
        info!(attempt = %self.handle.id, reason = %failure, "connection failed");
        self.failure = Some(failure.clone());
        Some(failure)
    }

    /// Cancel the attempt.
    pub fn cancel(&mut self) -> Option<ConnectionFailure> {
        self.fail(ConnectionFailure::Cancelled)
    }
}
