//! Physics Module
//!
//! Deterministic rigid-body simulation on a fixed tick (Δt = 1).
//!
//! ## Module Structure
//!
//! - `flags`: Collision group/mask bits
//! - `disc`: Circular bodies and collision responses
//! - `geometry`: Vertices, segments, planes
//! - `joint`: Distance constraints
//! - `world`: Disc arena and the ordered step

pub mod flags;
pub mod disc;
pub mod geometry;
pub mod joint;
pub mod world;

pub use flags::CollisionFlags;
pub use disc::{Disc, DiscPatch};
pub use geometry::{Plane, Segment, SegmentShape, Vertex};
pub use joint::Joint;
pub use world::World;
