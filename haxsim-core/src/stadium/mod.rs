//! Stadiums
//!
//! The immutable template a match is played on: static geometry, disc
//! templates (disc 0 is the ball), joints, goals, player physics and spawn
//! points.
//!
//! ## Module Structure
//!
//! - `binary`: Wire encoding (built-in index or full custom payload)
//! - `json`: Human-authored stadium files with traits
//! - `builtin`: The ten built-in fields, generated from one builder
//!
//! Every constructor validates before returning, so a `Stadium` in hand is
//! always within the hard limits.

pub mod binary;
pub mod json;
pub mod builtin;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::checksum::{fingerprint, Fingerprint};
use crate::core::codec::{CodecError, StreamWriter};
use crate::core::point::Point;
use crate::game::team::Team;
use crate::physics::{CollisionFlags, Disc, Joint, Plane, Segment, Vertex};

/// Maximum number of entries in each geometry list.
pub const MAX_ITEMS: usize = 255;

/// Errors raised while loading a stadium.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StadiumError {
    /// The text is not a valid JSON stadium document.
    #[error("malformed stadium file: {0}")]
    Json(String),

    /// A field violates a hard limit.
    #[error("invalid stadium field `{field}`: {reason}")]
    InvalidStadium {
        /// Path of the failing field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A built-in index outside the known list.
    #[error("unknown built-in stadium index {0}")]
    UnknownBuiltin(u8),

    /// Binary payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl StadiumError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StadiumError::InvalidStadium {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<StadiumError> for CodecError {
    fn from(err: StadiumError) -> Self {
        match err {
            StadiumError::Codec(e) => e,
            other => CodecError::Invalid {
                kind: "stadium",
                reason: other.to_string(),
            },
        }
    }
}

/// Background drawing style.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackgroundKind {
    /// Plain color
    #[default]
    None,
    /// Grass field lines
    Grass,
    /// Hockey rink lines
    Hockey,
}

impl BackgroundKind {
    /// Wire id.
    pub fn id(self) -> u32 {
        match self {
            BackgroundKind::None => 0,
            BackgroundKind::Grass => 1,
            BackgroundKind::Hockey => 2,
        }
    }

    /// Kind from wire id; unknown ids draw nothing.
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => BackgroundKind::Grass,
            2 => BackgroundKind::Hockey,
            _ => BackgroundKind::None,
        }
    }

    /// Name in stadium files.
    pub fn name(self) -> &'static str {
        match self {
            BackgroundKind::None => "none",
            BackgroundKind::Grass => "grass",
            BackgroundKind::Hockey => "hockey",
        }
    }
}

/// Background hints for renderers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Background {
    /// Drawing style
    pub kind: BackgroundKind,
    /// Half width of the drawn field
    pub width: f64,
    /// Half height of the drawn field
    pub height: f64,
    /// Centre circle radius
    pub kick_off_radius: f64,
    /// Field corner radius
    pub corner_radius: f64,
    /// Goal line offset
    pub goal_line: f64,
    /// Background color
    pub color: i32,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            kind: BackgroundKind::None,
            width: 0.0,
            height: 0.0,
            kick_off_radius: 0.0,
            corner_radius: 0.0,
            goal_line: 0.0,
            color: 0x718C5A,
        }
    }
}

/// Physics constants applied to every player disc.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerPhysics {
    /// Disc radius
    pub radius: f64,
    /// Bounce coefficient
    pub b_coef: f64,
    /// Inverse mass
    pub inv_mass: f64,
    /// Damping while not kicking
    pub damping: f64,
    /// Extra collision group bits
    pub c_group: CollisionFlags,
    /// Constant acceleration
    pub gravity: Point,
    /// Input acceleration while not kicking
    pub acceleration: f64,
    /// Input acceleration while holding kick
    pub kicking_acceleration: f64,
    /// Damping while holding kick
    pub kicking_damping: f64,
    /// Impulse given to kicked discs
    pub kick_strength: f64,
    /// Impulse the kicker receives back
    pub kickback: f64,
}

impl Default for PlayerPhysics {
    fn default() -> Self {
        Self {
            radius: 15.0,
            b_coef: 0.5,
            inv_mass: 0.5,
            damping: 0.96,
            c_group: CollisionFlags::empty(),
            gravity: Point::ZERO,
            acceleration: 0.1,
            kicking_acceleration: 0.07,
            kicking_damping: 0.96,
            kick_strength: 5.0,
            kickback: 0.0,
        }
    }
}

/// Default ball disc.
pub fn default_ball() -> Disc {
    Disc {
        radius: 10.0,
        b_coef: 0.5,
        inv_mass: 1.0,
        damping: 0.99,
        color: 0xFFFFFF,
        c_mask: CollisionFlags::ALL,
        c_group: CollisionFlags::BALL | CollisionFlags::KICK | CollisionFlags::SCORE,
        ..Disc::default()
    }
}

/// A goal line owned by a team. The ball crossing it scores for the opponent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Start point
    pub p0: Point,
    /// End point
    pub p1: Point,
    /// Owning team
    pub team: Team,
}

impl Goal {
    /// Whether the move `from → to` crosses the goal line.
    ///
    /// Both sides use strict comparisons, so a path through an endpoint does
    /// not count.
    pub fn crossed_by(&self, from: Point, to: Point) -> bool {
        let line = self.p1 - self.p0;
        let path = to - from;
        let a = line.cross(from - self.p0) * line.cross(to - self.p0);
        let b = path.cross(self.p0 - from) * path.cross(self.p1 - from);
        0.0 > a && 0.0 > b
    }
}

/// Which discs a kickoff puts back in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KickOffReset {
    /// Only the ball
    #[default]
    Partial,
    /// Every stadium disc
    Full,
}

/// What the camera tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraFollow {
    /// The ball
    #[default]
    Ball,
    /// The local player
    Player,
}

/// A complete playing field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stadium {
    /// Display name
    pub name: String,
    /// Index in the built-in list, `None` for custom stadiums
    pub builtin: Option<u8>,
    /// Camera half width limit
    pub width: f64,
    /// Camera half height limit
    pub height: f64,
    /// Maximum view width, 0 for unlimited
    pub max_view_width: i32,
    /// Camera target
    pub camera_follow: CameraFollow,
    /// Default distance of spawn lines from the centre
    pub spawn_distance: f64,
    /// Whether players may save this stadium
    pub can_be_stored: bool,
    /// Kickoff reset policy
    pub kick_off_reset: KickOffReset,
    /// Drawing hints
    pub background: Background,
    /// Player disc constants
    pub player_physics: PlayerPhysics,
    /// Static points
    pub vertices: Vec<Vertex>,
    /// Walls
    pub segments: Vec<Segment>,
    /// Half-space bounds
    pub planes: Vec<Plane>,
    /// Goal lines
    pub goals: Vec<Goal>,
    /// Disc templates; index 0 is the ball
    pub discs: Vec<Disc>,
    /// Constraints between disc indices
    pub joints: Vec<Joint>,
    /// Explicit red spawn points
    pub red_spawn_points: Vec<Point>,
    /// Explicit blue spawn points
    pub blue_spawn_points: Vec<Point>,
}

impl Stadium {
    /// A stadium with a single default ball and no geometry.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            builtin: None,
            width: 420.0,
            height: 200.0,
            max_view_width: 0,
            camera_follow: CameraFollow::Ball,
            spawn_distance: 170.0,
            can_be_stored: true,
            kick_off_reset: KickOffReset::Partial,
            background: Background::default(),
            player_physics: PlayerPhysics::default(),
            vertices: Vec::new(),
            segments: Vec::new(),
            planes: Vec::new(),
            goals: Vec::new(),
            discs: vec![default_ball()],
            joints: Vec::new(),
            red_spawn_points: Vec::new(),
            blue_spawn_points: Vec::new(),
        }
    }

    /// Whether this stadium is custom rather than built-in.
    pub fn is_custom(&self) -> bool {
        self.builtin.is_none()
    }

    /// Spawn points listed for a team.
    pub fn spawn_points(&self, team: Team) -> &[Point] {
        match team {
            Team::Red => &self.red_spawn_points,
            Team::Blue => &self.blue_spawn_points,
            Team::Spectator => &[],
        }
    }

    /// Check every hard limit.
    pub fn validate(&self) -> Result<(), StadiumError> {
        let lists = [
            ("vertexes", self.vertices.len()),
            ("segments", self.segments.len()),
            ("planes", self.planes.len()),
            ("goals", self.goals.len()),
            ("discs", self.discs.len()),
            ("joints", self.joints.len()),
            ("redSpawnPoints", self.red_spawn_points.len()),
            ("blueSpawnPoints", self.blue_spawn_points.len()),
        ];
        for (field, len) in lists {
            if len > MAX_ITEMS {
                return Err(StadiumError::invalid(field, format!("{len} entries, at most {MAX_ITEMS}")));
            }
        }
        if self.discs.is_empty() {
            return Err(StadiumError::invalid("discs", "at least one disc is required"));
        }

        finite("width", self.width)?;
        finite("height", self.height)?;
        finite("spawnDistance", self.spawn_distance)?;
        non_negative("bg.kickOffRadius", self.background.kick_off_radius)?;
        non_negative("bg.cornerRadius", self.background.corner_radius)?;
        non_negative("bg.goalLine", self.background.goal_line)?;
        non_negative("playerPhysics.radius", self.player_physics.radius)?;

        for (i, v) in self.vertices.iter().enumerate() {
            point(&format!("vertexes[{i}]"), v.pos)?;
        }
        for (i, s) in self.segments.iter().enumerate() {
            if s.v0 >= self.vertices.len() || s.v1 >= self.vertices.len() {
                return Err(StadiumError::invalid(format!("segments[{i}]"), "vertex index out of range"));
            }
            finite(&format!("segments[{i}].curve"), s.curve)?;
            finite(&format!("segments[{i}].bias"), s.bias)?;
        }
        for (i, p) in self.planes.iter().enumerate() {
            point(&format!("planes[{i}].normal"), p.normal)?;
            finite(&format!("planes[{i}].dist"), p.dist)?;
        }
        for (i, g) in self.goals.iter().enumerate() {
            point(&format!("goals[{i}].p0"), g.p0)?;
            point(&format!("goals[{i}].p1"), g.p1)?;
            if !g.team.is_playing() {
                return Err(StadiumError::invalid(format!("goals[{i}].team"), "must be red or blue"));
            }
        }
        for (i, d) in self.discs.iter().enumerate() {
            point(&format!("discs[{i}].pos"), d.pos)?;
            point(&format!("discs[{i}].speed"), d.vel)?;
            non_negative(&format!("discs[{i}].radius"), d.radius)?;
            non_negative(&format!("discs[{i}].invMass"), d.inv_mass)?;
        }
        for (i, j) in self.joints.iter().enumerate() {
            if j.d0 >= self.discs.len() || j.d1 >= self.discs.len() {
                return Err(StadiumError::invalid(format!("joints[{i}]"), "disc index out of range"));
            }
            finite(&format!("joints[{i}].length"), j.min_length)?;
            finite(&format!("joints[{i}].length"), j.max_length)?;
        }
        Ok(())
    }

    /// The ball template (disc 0).
    pub fn ball(&self) -> &Disc {
        &self.discs[0]
    }

    /// SHA-256 of the stadium's full binary description.
    ///
    /// Built-in stadiums are hashed with their geometry, not their index, so
    /// the digest identifies the actual field.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut w = StreamWriter::little();
        binary::encode_custom(self, &mut w);
        fingerprint(w.as_bytes())
    }

    /// Hex form of [`Stadium::fingerprint`].
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint())
    }
}

fn finite(field: &str, value: f64) -> Result<(), StadiumError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(StadiumError::invalid(field, "must be a finite number"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), StadiumError> {
    finite(field, value)?;
    if value < 0.0 {
        return Err(StadiumError::invalid(field, "must not be negative"));
    }
    Ok(())
}

fn point(field: &str, p: Point) -> Result<(), StadiumError> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(StadiumError::invalid(field, "must be a finite point"))
    }
}
