//! # Haxsim
//!
//! Deterministic physics, match rules and netcode for a top-down
//! multiplayer ball game played on configurable stadiums.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          HAXSIM                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── point.rs    - f64 2D vector                             │
//! │  ├── codec.rs    - Endian-aware stream reader/writer         │
//! │  ├── compress.rs - Raw deflate                               │
//! │  ├── checksum.rs - XOR fold checksum, SHA-256 fingerprints   │
//! │  └── snapshot.rs - Generation-tagged copy-on-write cache     │
//! │                                                              │
//! │  physics/        - Discs, walls, joints, world step          │
//! │  stadium/        - Stadium model, built-ins, JSON, binary    │
//! │                                                              │
//! │  game/           - Match and room (deterministic)            │
//! │  ├── state.rs    - Game state machine                        │
//! │  ├── tick.rs     - One simulation tick                       │
//! │  └── room.rs     - Roster, rules, serialization, checksum    │
//! │                                                              │
//! │  action/         - Action catalog, ordering, rate limits     │
//! │  replay/         - .hbr2 recording and playback              │
//! │                                                              │
//! │  network/        - Reconciliation (non-deterministic)        │
//! │  ├── host.rs     - Authoritative session                     │
//! │  ├── client.rs   - Extrapolating session                     │
//! │  ├── protocol.rs - Wire messages                             │
//! │  └── driver.rs   - tokio host loop                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! Everything under `core/`, `physics/`, `game/` and `action/` is
//! **deterministic**:
//! - Fixed operation order in every physics stage
//! - No HashMap (BTreeMap for sorted iteration)
//! - No system time or randomness
//!
//! Given the same starting room and the same ordered actions, two
//! instances produce **bit-identical** serialized state and checksums.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod physics;
pub mod stadium;
pub mod game;
pub mod action;
pub mod network;
pub mod replay;

// Re-export commonly used types
pub use core::point::Point;
pub use core::codec::{CodecError, Endian, StreamReader, StreamWriter};
pub use physics::{CollisionFlags, Disc, World};
pub use stadium::{Stadium, StadiumError};
pub use game::{Game, GameEvent, GameState, InputFrame, Player, PlayerId, Room, Team};
pub use action::{Action, ActionEnvelope, ActionKind};
pub use network::{ClientSession, HostSession, NetworkError};
pub use replay::{Replay, ReplayError, ReplayReader, ReplayRecorder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
