//! Stadium Wire Encoding
//!
//! A single leading byte selects a built-in stadium (`0..=9`) or announces a
//! custom payload (`255`) that follows in the stream's byte order:
//!
//! ```text
//! name, background, width, height, spawnDistance, playerPhysics,
//! maxViewWidth, cameraFollow, canBeStored, kickOffReset,
//! vertexes, segments, planes, goals, discs, joints,
//! redSpawnPoints, blueSpawnPoints
//! ```
//!
//! Each list is a `u8` count followed by its entries.

use crate::core::codec::{CodecResult, StreamReader, StreamWriter};
use crate::core::point::Point;
use crate::game::team::Team;
use crate::physics::{CollisionFlags, Disc, Joint, Plane, Segment, Vertex};

use super::builtin;
use super::{
    Background, BackgroundKind, CameraFollow, Goal, KickOffReset, PlayerPhysics, Stadium,
    StadiumError, MAX_ITEMS,
};

/// Type byte of a custom stadium payload.
pub const CUSTOM_STADIUM: u8 = 255;

/// Write a stadium: its built-in index, or the full custom description.
pub fn encode(stadium: &Stadium, w: &mut StreamWriter) {
    match stadium.builtin {
        Some(index) => w.write_u8(index),
        None => encode_custom(stadium, w),
    }
}

/// Write the full custom description regardless of built-in status.
pub fn encode_custom(s: &Stadium, w: &mut StreamWriter) {
    w.write_u8(CUSTOM_STADIUM);
    w.write_string(&s.name);

    let bg = &s.background;
    w.write_u32(bg.kind.id());
    w.write_f64(bg.width);
    w.write_f64(bg.height);
    w.write_f64(bg.kick_off_radius);
    w.write_f64(bg.corner_radius);
    w.write_f64(bg.goal_line);
    w.write_i32(bg.color);

    w.write_f64(s.width);
    w.write_f64(s.height);
    w.write_f64(s.spawn_distance);

    let pp = &s.player_physics;
    w.write_f64(pp.radius);
    w.write_f64(pp.b_coef);
    w.write_f64(pp.inv_mass);
    w.write_f64(pp.damping);
    w.write_u32(pp.c_group.bits());
    w.write_f64(pp.gravity.x);
    w.write_f64(pp.gravity.y);
    w.write_f64(pp.acceleration);
    w.write_f64(pp.kicking_acceleration);
    w.write_f64(pp.kicking_damping);
    w.write_f64(pp.kick_strength);
    w.write_f64(pp.kickback);

    w.write_i32(s.max_view_width);
    w.write_u8(match s.camera_follow {
        CameraFollow::Ball => 0,
        CameraFollow::Player => 1,
    });
    w.write_bool(s.can_be_stored);
    w.write_bool(s.kick_off_reset == KickOffReset::Full);

    write_list(w, &s.vertices, |w, v| {
        w.write_f64(v.pos.x);
        w.write_f64(v.pos.y);
        w.write_f64(v.b_coef);
        w.write_u32(v.c_mask.bits());
        w.write_u32(v.c_group.bits());
    });
    write_list(w, &s.segments, |w, seg| {
        w.write_u8(seg.v0 as u8);
        w.write_u8(seg.v1 as u8);
        w.write_f64(seg.b_coef);
        w.write_u32(seg.c_mask.bits());
        w.write_u32(seg.c_group.bits());
        w.write_f64(seg.curve);
        w.write_f64(seg.bias);
        w.write_bool(seg.vis);
        w.write_i32(seg.color);
    });
    write_list(w, &s.planes, |w, p| {
        w.write_f64(p.normal.x);
        w.write_f64(p.normal.y);
        w.write_f64(p.dist);
        w.write_f64(p.b_coef);
        w.write_u32(p.c_mask.bits());
        w.write_u32(p.c_group.bits());
    });
    write_list(w, &s.goals, |w, g| {
        w.write_f64(g.p0.x);
        w.write_f64(g.p0.y);
        w.write_f64(g.p1.x);
        w.write_f64(g.p1.y);
        w.write_u8(g.team.id());
    });
    write_list(w, &s.discs, |w, d| d.encode(w));
    write_list(w, &s.joints, |w, j| {
        w.write_u8(j.d0 as u8);
        w.write_u8(j.d1 as u8);
        w.write_f64(j.min_length);
        w.write_f64(j.max_length);
        w.write_f64(j.strength);
        w.write_i32(j.color);
    });
    write_list(w, &s.red_spawn_points, write_point);
    write_list(w, &s.blue_spawn_points, write_point);
}

/// Read a stadium written by [`encode`], validating custom payloads.
pub fn decode(r: &mut StreamReader<'_>) -> Result<Stadium, StadiumError> {
    let kind = r.read_u8()?;
    if kind != CUSTOM_STADIUM {
        return builtin::by_index(kind).ok_or(StadiumError::UnknownBuiltin(kind));
    }
    let stadium = decode_custom_body(r)?;
    stadium.validate()?;
    Ok(stadium)
}

fn decode_custom_body(r: &mut StreamReader<'_>) -> CodecResult<Stadium> {
    let name = r.read_string()?;

    let background = Background {
        kind: BackgroundKind::from_id(r.read_u32()?),
        width: r.read_f64()?,
        height: r.read_f64()?,
        kick_off_radius: r.read_f64()?,
        corner_radius: r.read_f64()?,
        goal_line: r.read_f64()?,
        color: r.read_i32()?,
    };

    let width = r.read_f64()?;
    let height = r.read_f64()?;
    let spawn_distance = r.read_f64()?;

    let player_physics = PlayerPhysics {
        radius: r.read_f64()?,
        b_coef: r.read_f64()?,
        inv_mass: r.read_f64()?,
        damping: r.read_f64()?,
        c_group: CollisionFlags::from_bits_retain(r.read_u32()?),
        gravity: read_point(r)?,
        acceleration: r.read_f64()?,
        kicking_acceleration: r.read_f64()?,
        kicking_damping: r.read_f64()?,
        kick_strength: r.read_f64()?,
        kickback: r.read_f64()?,
    };

    let max_view_width = r.read_i32()?;
    let camera_follow = if r.read_u8()? == 1 {
        CameraFollow::Player
    } else {
        CameraFollow::Ball
    };
    let can_be_stored = r.read_bool()?;
    let kick_off_reset = if r.read_bool()? {
        KickOffReset::Full
    } else {
        KickOffReset::Partial
    };

    let vertices = read_list(r, |r| {
        Ok(Vertex {
            pos: read_point(r)?,
            b_coef: r.read_f64()?,
            c_mask: CollisionFlags::from_bits_retain(r.read_u32()?),
            c_group: CollisionFlags::from_bits_retain(r.read_u32()?),
        })
    })?;

    let mut segments = read_list(r, |r| {
        let v0 = r.read_u8()? as usize;
        let v1 = r.read_u8()? as usize;
        let b_coef = r.read_f64()?;
        let c_mask = CollisionFlags::from_bits_retain(r.read_u32()?);
        let c_group = CollisionFlags::from_bits_retain(r.read_u32()?);
        let curve = r.read_f64()?;
        let bias = r.read_f64()?;
        let vis = r.read_bool()?;
        let color = r.read_i32()?;
        let mut seg = Segment::new(v0, v1, &[], curve, bias, b_coef, c_mask, c_group);
        seg.vis = vis;
        seg.color = color;
        Ok(seg)
    })?;
    for seg in &mut segments {
        seg.refresh_shape(&vertices);
    }

    let planes = read_list(r, |r| {
        Ok(Plane {
            normal: read_point(r)?,
            dist: r.read_f64()?,
            b_coef: r.read_f64()?,
            c_mask: CollisionFlags::from_bits_retain(r.read_u32()?),
            c_group: CollisionFlags::from_bits_retain(r.read_u32()?),
        })
    })?;

    let goals = read_list(r, |r| {
        Ok(Goal {
            p0: read_point(r)?,
            p1: read_point(r)?,
            team: Team::decode(r)?,
        })
    })?;

    let discs = read_list(r, Disc::decode)?;

    let joints = read_list(r, |r| {
        Ok(Joint {
            d0: r.read_u8()? as usize,
            d1: r.read_u8()? as usize,
            min_length: r.read_f64()?,
            max_length: r.read_f64()?,
            strength: r.read_f64()?,
            color: r.read_i32()?,
        })
    })?;

    let red_spawn_points = read_list(r, read_point)?;
    let blue_spawn_points = read_list(r, read_point)?;

    Ok(Stadium {
        name,
        builtin: None,
        width,
        height,
        max_view_width,
        camera_follow,
        spawn_distance,
        can_be_stored,
        kick_off_reset,
        background,
        player_physics,
        vertices,
        segments,
        planes,
        goals,
        discs,
        joints,
        red_spawn_points,
        blue_spawn_points,
    })
}

fn write_point(w: &mut StreamWriter, p: &Point) {
    w.write_f64(p.x);
    w.write_f64(p.y);
}

fn read_point(r: &mut StreamReader<'_>) -> CodecResult<Point> {
    Ok(Point::new(r.read_f64()?, r.read_f64()?))
}

fn write_list<T>(w: &mut StreamWriter, items: &[T], mut each: impl FnMut(&mut StreamWriter, &T)) {
    let count = items.len().min(MAX_ITEMS);
    w.write_u8(count as u8);
    for item in &items[..count] {
        each(w, item);
    }
}

fn read_list<T>(
    r: &mut StreamReader<'_>,
    mut each: impl FnMut(&mut StreamReader<'_>) -> CodecResult<T>,
) -> CodecResult<Vec<T>> {
    let count = r.read_u8()? as usize;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(each(r)?);
    }
    Ok(items)
}
