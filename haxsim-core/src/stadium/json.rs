//! Stadium Files
//!
//! Human-authored stadiums are JSON with three relaxations: `//` and `/* */`
//! comments, trailing commas, and named traits. Comments and trailing commas
//! are stripped before `serde_json` sees the text; traits are merged at the
//! `Value` level; the result is deserialized into raw structs and converted
//! with the defaults below.
//!
//! | object   | defaults                                                        |
//! |----------|-----------------------------------------------------------------|
//! | vertex   | `bCoef 1`, masks `all`                                          |
//! | segment  | `bCoef 1`, `curve 0`, `bias 0`, `vis true`, `color 000000`      |
//! | plane    | `bCoef 1`, masks `all`                                          |
//! | disc     | `radius 10`, `bCoef 0.5`, `invMass 0`, `damping 0.99`, `FFFFFF` |
//! | joint    | `length` = distance at load, `strength "rigid"`                |
//!
//! Disc indices (joints) count the ball as disc 0. With `"ballPhysics":
//! "disc0"` the first listed disc is the ball; otherwise the ball is built
//! from `ballPhysics` and placed in front of the listed discs.
//!
//! Serialization omits every field equal to its default.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::point::Point;
use crate::game::team::Team;
use crate::physics::disc::TRANSPARENT;
use crate::physics::{CollisionFlags, Disc, Joint, Plane, Segment, Vertex};

use super::{
    default_ball, Background, BackgroundKind, CameraFollow, Goal, KickOffReset, PlayerPhysics,
    Stadium, StadiumError,
};

/// Object lists that may reference traits.
const TRAIT_LISTS: [&str; 6] = ["vertexes", "segments", "planes", "goals", "discs", "joints"];

// =============================================================================
// RAW DOCUMENT
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStadium {
    name: String,
    width: f64,
    height: f64,
    #[serde(default)]
    max_view_width: Option<i32>,
    #[serde(default)]
    camera_follow: Option<String>,
    #[serde(default)]
    spawn_distance: Option<f64>,
    #[serde(default)]
    can_be_stored: Option<bool>,
    #[serde(default)]
    kick_off_reset: Option<String>,
    #[serde(default)]
    bg: Option<RawBackground>,
    #[serde(default)]
    vertexes: Vec<RawVertex>,
    #[serde(default)]
    segments: Vec<RawSegment>,
    #[serde(default)]
    planes: Vec<RawPlane>,
    #[serde(default)]
    goals: Vec<RawGoal>,
    #[serde(default)]
    discs: Vec<RawDisc>,
    #[serde(default)]
    joints: Vec<RawJoint>,
    #[serde(default)]
    player_physics: Option<RawPlayerPhysics>,
    #[serde(default)]
    ball_physics: Option<RawBallPhysics>,
    #[serde(default)]
    red_spawn_points: Vec<[f64; 2]>,
    #[serde(default)]
    blue_spawn_points: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBackground {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    kick_off_radius: Option<f64>,
    #[serde(default)]
    corner_radius: Option<f64>,
    #[serde(default)]
    goal_line: Option<f64>,
    #[serde(default)]
    color: Option<RawColor>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColor {
    Text(String),
    Rgb([u8; 3]),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVertex {
    x: f64,
    y: f64,
    #[serde(default)]
    b_coef: Option<f64>,
    #[serde(default)]
    c_mask: Option<Vec<String>>,
    #[serde(default)]
    c_group: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSegment {
    v0: usize,
    v1: usize,
    #[serde(default)]
    b_coef: Option<f64>,
    #[serde(default)]
    curve: Option<f64>,
    #[serde(default)]
    bias: Option<f64>,
    #[serde(default)]
    vis: Option<bool>,
    #[serde(default)]
    color: Option<RawColor>,
    #[serde(default)]
    c_mask: Option<Vec<String>>,
    #[serde(default)]
    c_group: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlane {
    normal: [f64; 2],
    dist: f64,
    #[serde(default)]
    b_coef: Option<f64>,
    #[serde(default)]
    c_mask: Option<Vec<String>>,
    #[serde(default)]
    c_group: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawGoal {
    p0: [f64; 2],
    p1: [f64; 2],
    team: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawDisc {
    #[serde(default)]
    pos: Option<[f64; 2]>,
    #[serde(default)]
    speed: Option<[f64; 2]>,
    #[serde(default)]
    gravity: Option<[f64; 2]>,
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default)]
    inv_mass: Option<f64>,
    #[serde(default)]
    damping: Option<f64>,
    #[serde(default)]
    b_coef: Option<f64>,
    #[serde(default)]
    color: Option<RawColor>,
    #[serde(default)]
    c_mask: Option<Vec<String>>,
    #[serde(default)]
    c_group: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBallPhysics {
    Named(String),
    Disc(RawDisc),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLength {
    Fixed(f64),
    Range([f64; 2]),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStrength {
    Named(String),
    Elastic(f64),
}

#[derive(Deserialize)]
struct RawJoint {
    d0: usize,
    d1: usize,
    #[serde(default)]
    length: Option<RawLength>,
    #[serde(default)]
    strength: Option<RawStrength>,
    #[serde(default)]
    color: Option<RawColor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlayerPhysics {
    #[serde(default)]
    radius: Option<f64>,
    #[serde(default)]
    b_coef: Option<f64>,
    #[serde(default)]
    inv_mass: Option<f64>,
    #[serde(default)]
    damping: Option<f64>,
    #[serde(default)]
    c_group: Option<Vec<String>>,
    #[serde(default)]
    gravity: Option<[f64; 2]>,
    #[serde(default)]
    acceleration: Option<f64>,
    #[serde(default)]
    kicking_acceleration: Option<f64>,
    #[serde(default)]
    kicking_damping: Option<f64>,
    #[serde(default)]
    kick_strength: Option<f64>,
    #[serde(default)]
    kickback: Option<f64>,
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a stadium file.
///
/// The stadium is fully built and validated before it is returned; nothing is
/// produced on failure.
pub fn parse(text: &str) -> Result<Stadium, StadiumError> {
    let cleaned = strip_relaxed(text);
    let mut root: Value =
        serde_json::from_str(&cleaned).map_err(|e| StadiumError::Json(e.to_string()))?;
    apply_traits(&mut root)?;
    let raw: RawStadium =
        serde_json::from_value(root).map_err(|e| StadiumError::Json(e.to_string()))?;
    let stadium = convert(raw)?;
    stadium.validate()?;
    Ok(stadium)
}

/// Remove comments and trailing commas outside string literals.
pub fn strip_relaxed(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut no_comments = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            no_comments.push(c);
            if c == '\\' && i + 1 < chars.len() {
                no_comments.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                no_comments.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                no_comments.push(c);
                i += 1;
            }
        }
    }

    let chars: Vec<char> = no_comments.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn apply_traits(root: &mut Value) -> Result<(), StadiumError> {
    let traits = root
        .get("traits")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let merge = |field: String, item: &mut Value| -> Result<(), StadiumError> {
        let Some(obj) = item.as_object_mut() else {
            return Ok(());
        };
        let Some(name) = obj.remove("trait") else {
            return Ok(());
        };
        let name = name
            .as_str()
            .ok_or_else(|| StadiumError::invalid(format!("{field}.trait"), "must be a string"))?;
        let bundle = traits
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| StadiumError::invalid(format!("{field}.trait"), format!("unknown trait `{name}`")))?;
        for (key, value) in bundle {
            obj.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    };

    for list in TRAIT_LISTS {
        if let Some(Value::Array(items)) = root.get_mut(list) {
            for (i, item) in items.iter_mut().enumerate() {
                merge(format!("{list}[{i}]"), item)?;
            }
        }
    }
    if let Some(ball) = root.get_mut("ballPhysics") {
        merge("ballPhysics".to_string(), ball)?;
    }
    Ok(())
}

fn color(field: &str, raw: &RawColor) -> Result<i32, StadiumError> {
    match raw {
        RawColor::Text(s) if s.eq_ignore_ascii_case("transparent") => Ok(TRANSPARENT),
        RawColor::Text(s) => {
            if s.is_empty() || s.len() > 6 {
                return Err(StadiumError::invalid(field, format!("bad color `{s}`")));
            }
            i32::from_str_radix(s, 16)
                .map_err(|_| StadiumError::invalid(field, format!("bad color `{s}`")))
        }
        RawColor::Rgb([r, g, b]) => Ok(((*r as i32) << 16) | ((*g as i32) << 8) | *b as i32),
    }
}

fn flags(field: &str, names: &[String]) -> Result<CollisionFlags, StadiumError> {
    names.iter().try_fold(CollisionFlags::empty(), |acc, name| {
        CollisionFlags::from_stadium_name(name)
            .map(|f| acc | f)
            .ok_or_else(|| StadiumError::invalid(field, format!("unknown collision flag `{name}`")))
    })
}

fn opt_flags(field: &str, names: &Option<Vec<String>>, default: CollisionFlags) -> Result<CollisionFlags, StadiumError> {
    match names {
        Some(names) => flags(field, names),
        None => Ok(default),
    }
}

fn opt_color(field: &str, raw: &Option<RawColor>, default: i32) -> Result<i32, StadiumError> {
    match raw {
        Some(c) => color(field, c),
        None => Ok(default),
    }
}

fn pt(p: [f64; 2]) -> Point {
    Point::new(p[0], p[1])
}

fn convert_disc(field: &str, raw: &RawDisc, base: &Disc) -> Result<Disc, StadiumError> {
    Ok(Disc {
        pos: raw.pos.map(pt).unwrap_or(base.pos),
        vel: raw.speed.map(pt).unwrap_or(base.vel),
        gravity: raw.gravity.map(pt).unwrap_or(base.gravity),
        radius: raw.radius.unwrap_or(base.radius),
        b_coef: raw.b_coef.unwrap_or(base.b_coef),
        inv_mass: raw.inv_mass.unwrap_or(base.inv_mass),
        damping: raw.damping.unwrap_or(base.damping),
        color: opt_color(&format!("{field}.color"), &raw.color, base.color)?,
        c_mask: opt_flags(&format!("{field}.cMask"), &raw.c_mask, base.c_mask)?,
        c_group: opt_flags(&format!("{field}.cGroup"), &raw.c_group, base.c_group)?,
    })
}

fn convert(raw: RawStadium) -> Result<Stadium, StadiumError> {
    let background = match &raw.bg {
        Some(bg) => {
            let base = Background::default();
            Background {
                kind: match bg.kind.as_deref() {
                    None | Some("none") => BackgroundKind::None,
                    Some("grass") => BackgroundKind::Grass,
                    Some("hockey") => BackgroundKind::Hockey,
                    Some(other) => {
                        return Err(StadiumError::invalid("bg.type", format!("unknown background `{other}`")))
                    }
                },
                width: bg.width.unwrap_or(base.width),
                height: bg.height.unwrap_or(base.height),
                kick_off_radius: bg.kick_off_radius.unwrap_or(base.kick_off_radius),
                corner_radius: bg.corner_radius.unwrap_or(base.corner_radius),
                goal_line: bg.goal_line.unwrap_or(base.goal_line),
                color: opt_color("bg.color", &bg.color, base.color)?,
            }
        }
        None => Background::default(),
    };

    let player_physics = match &raw.player_physics {
        Some(pp) => {
            let base = PlayerPhysics::default();
            PlayerPhysics {
                radius: pp.radius.unwrap_or(base.radius),
                b_coef: pp.b_coef.unwrap_or(base.b_coef),
                inv_mass: pp.inv_mass.unwrap_or(base.inv_mass),
                damping: pp.damping.unwrap_or(base.damping),
                c_group: opt_flags("playerPhysics.cGroup", &pp.c_group, base.c_group)?,
                gravity: pp.gravity.map(pt).unwrap_or(base.gravity),
                acceleration: pp.acceleration.unwrap_or(base.acceleration),
                kicking_acceleration: pp.kicking_acceleration.unwrap_or(base.kicking_acceleration),
                kicking_damping: pp.kicking_damping.unwrap_or(base.kicking_damping),
                kick_strength: pp.kick_strength.unwrap_or(base.kick_strength),
                kickback: pp.kickback.unwrap_or(base.kickback),
            }
        }
        None => PlayerPhysics::default(),
    };

    let vertices = raw
        .vertexes
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Ok(Vertex {
                pos: Point::new(v.x, v.y),
                b_coef: v.b_coef.unwrap_or(1.0),
                c_mask: opt_flags(&format!("vertexes[{i}].cMask"), &v.c_mask, CollisionFlags::ALL)?,
                c_group: opt_flags(&format!("vertexes[{i}].cGroup"), &v.c_group, CollisionFlags::ALL)?,
            })
        })
        .collect::<Result<Vec<_>, StadiumError>>()?;

    let segments = raw
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let field = format!("segments[{i}]");
            let mut seg = Segment::new(
                s.v0,
                s.v1,
                &vertices,
                s.curve.unwrap_or(0.0),
                s.bias.unwrap_or(0.0),
                s.b_coef.unwrap_or(1.0),
                opt_flags(&format!("{field}.cMask"), &s.c_mask, CollisionFlags::ALL)?,
                opt_flags(&format!("{field}.cGroup"), &s.c_group, CollisionFlags::ALL)?,
            );
            seg.vis = s.vis.unwrap_or(true);
            seg.color = opt_color(&format!("{field}.color"), &s.color, 0)?;
            Ok(seg)
        })
        .collect::<Result<Vec<_>, StadiumError>>()?;

    let planes = raw
        .planes
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Ok(Plane {
                normal: pt(p.normal).normalize(),
                dist: p.dist,
                b_coef: p.b_coef.unwrap_or(1.0),
                c_mask: opt_flags(&format!("planes[{i}].cMask"), &p.c_mask, CollisionFlags::ALL)?,
                c_group: opt_flags(&format!("planes[{i}].cGroup"), &p.c_group, CollisionFlags::ALL)?,
            })
        })
        .collect::<Result<Vec<_>, StadiumError>>()?;

    let goals = raw
        .goals
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let team = match g.team.as_str() {
                "red" => Team::Red,
                "blue" => Team::Blue,
                other => {
                    return Err(StadiumError::invalid(format!("goals[{i}].team"), format!("unknown team `{other}`")))
                }
            };
            Ok(Goal { p0: pt(g.p0), p1: pt(g.p1), team })
        })
        .collect::<Result<Vec<_>, StadiumError>>()?;

    let mut discs = Vec::with_capacity(raw.discs.len() + 1);
    let listed_base = Disc::default();
    match &raw.ball_physics {
        Some(RawBallPhysics::Named(name)) if name == "disc0" => {}
        Some(RawBallPhysics::Named(name)) => {
            return Err(StadiumError::invalid("ballPhysics", format!("unknown value `{name}`")));
        }
        Some(RawBallPhysics::Disc(ball)) => discs.push(convert_disc("ballPhysics", ball, &default_ball())?),
        None => discs.push(default_ball()),
    }
    for (i, d) in raw.discs.iter().enumerate() {
        discs.push(convert_disc(&format!("discs[{i}]"), d, &listed_base)?);
    }

    let joints = raw
        .joints
        .iter()
        .enumerate()
        .map(|(i, j)| {
            let field = format!("joints[{i}]");
            let (min_length, max_length) = match &j.length {
                Some(RawLength::Fixed(len)) => (*len, *len),
                Some(RawLength::Range([min, max])) => (*min, *max),
                None => {
                    let len = match (discs.get(j.d0), discs.get(j.d1)) {
                        (Some(a), Some(b)) => a.pos.distance(b.pos),
                        _ => 0.0,
                    };
                    (len, len)
                }
            };
            let strength = match &j.strength {
                None => f64::INFINITY,
                Some(RawStrength::Named(s)) if s == "rigid" => f64::INFINITY,
                Some(RawStrength::Named(s)) => {
                    return Err(StadiumError::invalid(format!("{field}.strength"), format!("unknown strength `{s}`")))
                }
                Some(RawStrength::Elastic(v)) => *v,
            };
            Ok(Joint {
                d0: j.d0,
                d1: j.d1,
                min_length,
                max_length,
                strength,
                color: opt_color(&format!("{field}.color"), &j.color, 0)?,
            })
        })
        .collect::<Result<Vec<_>, StadiumError>>()?;

    let camera_follow = match raw.camera_follow.as_deref() {
        None | Some("ball") => CameraFollow::Ball,
        Some("player") => CameraFollow::Player,
        Some(other) => return Err(StadiumError::invalid("cameraFollow", format!("unknown value `{other}`"))),
    };
    let kick_off_reset = match raw.kick_off_reset.as_deref() {
        None | Some("partial") => KickOffReset::Partial,
        Some("full") => KickOffReset::Full,
        Some(other) => return Err(StadiumError::invalid("kickOffReset", format!("unknown value `{other}`"))),
    };

    Ok(Stadium {
        name: raw.name,
        builtin: None,
        width: raw.width,
        height: raw.height,
        max_view_width: raw.max_view_width.unwrap_or(0),
        camera_follow,
        spawn_distance: raw.spawn_distance.unwrap_or(200.0),
        can_be_stored: raw.can_be_stored.unwrap_or(true),
        kick_off_reset,
        background,
        player_physics,
        vertices,
        segments,
        planes,
        goals,
        discs,
        joints,
        red_spawn_points: raw.red_spawn_points.into_iter().map(pt).collect(),
        blue_spawn_points: raw.blue_spawn_points.into_iter().map(pt).collect(),
    })
}

// =============================================================================
// SERIALIZATION
// =============================================================================

fn color_value(color: i32) -> Value {
    if color == TRANSPARENT {
        Value::from("transparent")
    } else {
        Value::from(format!("{:06X}", color & 0xFF_FFFF))
    }
}

fn flags_value(flags: CollisionFlags) -> Value {
    Value::from(flags.names())
}

fn point_value(p: Point) -> Value {
    Value::from(vec![p.x, p.y])
}

fn put<T: PartialEq>(map: &mut Map<String, Value>, key: &str, value: T, default: T, to: impl FnOnce(T) -> Value) {
    if value != default {
        map.insert(key.to_string(), to(value));
    }
}

fn disc_value(d: &Disc, base: &Disc) -> Value {
    let mut m = Map::new();
    put(&mut m, "pos", d.pos, base.pos, point_value);
    put(&mut m, "speed", d.vel, base.vel, point_value);
    put(&mut m, "gravity", d.gravity, base.gravity, point_value);
    put(&mut m, "radius", d.radius, base.radius, Value::from);
    put(&mut m, "invMass", d.inv_mass, base.inv_mass, Value::from);
    put(&mut m, "damping", d.damping, base.damping, Value::from);
    put(&mut m, "bCoef", d.b_coef, base.b_coef, Value::from);
    put(&mut m, "color", d.color, base.color, color_value);
    put(&mut m, "cMask", d.c_mask, base.c_mask, flags_value);
    put(&mut m, "cGroup", d.c_group, base.c_group, flags_value);
    Value::Object(m)
}

/// Convert a stadium into its file form, omitting default values.
pub fn to_value(s: &Stadium) -> Value {
    let mut root = Map::new();
    root.insert("name".into(), Value::from(s.name.clone()));
    root.insert("width".into(), Value::from(s.width));
    root.insert("height".into(), Value::from(s.height));
    put(&mut root, "spawnDistance", s.spawn_distance, 200.0, Value::from);
    put(&mut root, "maxViewWidth", s.max_view_width, 0, Value::from);
    put(&mut root, "cameraFollow", s.camera_follow, CameraFollow::Ball, |_| Value::from("player"));
    put(&mut root, "canBeStored", s.can_be_stored, true, Value::from);
    put(&mut root, "kickOffReset", s.kick_off_reset, KickOffReset::Partial, |_| Value::from("full"));

    let bg = &s.background;
    let base_bg = Background::default();
    let mut bgm = Map::new();
    put(&mut bgm, "type", bg.kind, base_bg.kind, |k| Value::from(k.name()));
    put(&mut bgm, "width", bg.width, base_bg.width, Value::from);
    put(&mut bgm, "height", bg.height, base_bg.height, Value::from);
    put(&mut bgm, "kickOffRadius", bg.kick_off_radius, base_bg.kick_off_radius, Value::from);
    put(&mut bgm, "cornerRadius", bg.corner_radius, base_bg.corner_radius, Value::from);
    put(&mut bgm, "goalLine", bg.goal_line, base_bg.goal_line, Value::from);
    put(&mut bgm, "color", bg.color, base_bg.color, color_value);
    if !bgm.is_empty() {
        root.insert("bg".into(), Value::Object(bgm));
    }

    let pp = &s.player_physics;
    let base_pp = PlayerPhysics::default();
    let mut ppm = Map::new();
    put(&mut ppm, "radius", pp.radius, base_pp.radius, Value::from);
    put(&mut ppm, "bCoef", pp.b_coef, base_pp.b_coef, Value::from);
    put(&mut ppm, "invMass", pp.inv_mass, base_pp.inv_mass, Value::from);
    put(&mut ppm, "damping", pp.damping, base_pp.damping, Value::from);
    put(&mut ppm, "cGroup", pp.c_group, base_pp.c_group, flags_value);
    put(&mut ppm, "gravity", pp.gravity, base_pp.gravity, point_value);
    put(&mut ppm, "acceleration", pp.acceleration, base_pp.acceleration, Value::from);
    put(&mut ppm, "kickingAcceleration", pp.kicking_acceleration, base_pp.kicking_acceleration, Value::from);
    put(&mut ppm, "kickingDamping", pp.kicking_damping, base_pp.kicking_damping, Value::from);
    put(&mut ppm, "kickStrength", pp.kick_strength, base_pp.kick_strength, Value::from);
    put(&mut ppm, "kickback", pp.kickback, base_pp.kickback, Value::from);
    if !ppm.is_empty() {
        root.insert("playerPhysics".into(), Value::Object(ppm));
    }

    let vertexes: Vec<Value> = s
        .vertices
        .iter()
        .map(|v| {
            let mut m = Map::new();
            m.insert("x".into(), Value::from(v.pos.x));
            m.insert("y".into(), Value::from(v.pos.y));
            put(&mut m, "bCoef", v.b_coef, 1.0, Value::from);
            put(&mut m, "cMask", v.c_mask, CollisionFlags::ALL, flags_value);
            put(&mut m, "cGroup", v.c_group, CollisionFlags::ALL, flags_value);
            Value::Object(m)
        })
        .collect();
    root.insert("vertexes".into(), Value::from(vertexes));

    let segments: Vec<Value> = s
        .segments
        .iter()
        .map(|seg| {
            let mut m = Map::new();
            m.insert("v0".into(), Value::from(seg.v0));
            m.insert("v1".into(), Value::from(seg.v1));
            put(&mut m, "bCoef", seg.b_coef, 1.0, Value::from);
            put(&mut m, "curve", seg.curve, 0.0, Value::from);
            put(&mut m, "bias", seg.bias, 0.0, Value::from);
            put(&mut m, "vis", seg.vis, true, Value::from);
            put(&mut m, "color", seg.color, 0, color_value);
            put(&mut m, "cMask", seg.c_mask, CollisionFlags::ALL, flags_value);
            put(&mut m, "cGroup", seg.c_group, CollisionFlags::ALL, flags_value);
            Value::Object(m)
        })
        .collect();
    root.insert("segments".into(), Value::from(segments));

    let planes: Vec<Value> = s
        .planes
        .iter()
        .map(|p| {
            let mut m = Map::new();
            m.insert("normal".into(), point_value(p.normal));
            m.insert("dist".into(), Value::from(p.dist));
            put(&mut m, "bCoef", p.b_coef, 1.0, Value::from);
            put(&mut m, "cMask", p.c_mask, CollisionFlags::ALL, flags_value);
            put(&mut m, "cGroup", p.c_group, CollisionFlags::ALL, flags_value);
            Value::Object(m)
        })
        .collect();
    root.insert("planes".into(), Value::from(planes));

    let goals: Vec<Value> = s
        .goals
        .iter()
        .map(|g| {
            let mut m = Map::new();
            m.insert("p0".into(), point_value(g.p0));
            m.insert("p1".into(), point_value(g.p1));
            m.insert("team".into(), Value::from(g.team.name()));
            Value::Object(m)
        })
        .collect();
    root.insert("goals".into(), Value::from(goals));

    if let Some(ball) = s.discs.first() {
        root.insert("ballPhysics".into(), disc_value(ball, &default_ball()));
    }
    let base_disc = Disc::default();
    let discs: Vec<Value> = s.discs.iter().skip(1).map(|d| disc_value(d, &base_disc)).collect();
    root.insert("discs".into(), Value::from(discs));

    let joints: Vec<Value> = s
        .joints
        .iter()
        .map(|j| {
            let mut m = Map::new();
            m.insert("d0".into(), Value::from(j.d0));
            m.insert("d1".into(), Value::from(j.d1));
            let length = if j.min_length == j.max_length {
                Value::from(j.min_length)
            } else {
                Value::from(vec![j.min_length, j.max_length])
            };
            m.insert("length".into(), length);
            if !j.is_rigid() {
                m.insert("strength".into(), Value::from(j.strength));
            }
            put(&mut m, "color", j.color, 0, color_value);
            Value::Object(m)
        })
        .collect();
    root.insert("joints".into(), Value::from(joints));

    if !s.red_spawn_points.is_empty() {
        let points: Vec<Value> = s.red_spawn_points.iter().map(|p| point_value(*p)).collect();
        root.insert("redSpawnPoints".into(), Value::from(points));
    }
    if !s.blue_spawn_points.is_empty() {
        let points: Vec<Value> = s.blue_spawn_points.iter().map(|p| point_value(*p)).collect();
        root.insert("blueSpawnPoints".into(), Value::from(points));
    }

    Value::Object(root)
}

/// Serialize a stadium to pretty-printed JSON.
pub fn serialize(s: &Stadium) -> String {
    serde_json::to_string_pretty(&to_value(s)).unwrap_or_default()
}

impl Stadium {
    /// Parse a stadium file. See [`parse`].
    pub fn from_json(text: &str) -> Result<Stadium, StadiumError> {
        parse(text)
    }

    /// Serialize to a stadium file. See [`serialize`].
    pub fn to_json(&self) -> String {
        serialize(self)
    }
}
