//! Discs
//!
//! Circular rigid bodies (ball, goal posts, player avatars) and their
//! collision responses against each other and against static geometry.

use serde::{Serialize, Deserialize};

use crate::core::point::Point;
use crate::core::codec::{CodecResult, StreamReader, StreamWriter};
use super::flags::CollisionFlags;
use super::geometry::{Plane, Segment, SegmentShape, Vertex};

/// Transparent color value.
pub const TRANSPARENT: i32 = -1;

/// A circular rigid body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    /// Centre position
    pub pos: Point,
    /// Velocity (units per tick)
    pub vel: Point,
    /// Constant acceleration added every tick
    pub gravity: Point,
    /// Radius
    pub radius: f64,
    /// Bounce coefficient
    pub b_coef: f64,
    /// Inverse mass (0 = static)
    pub inv_mass: f64,
    /// Velocity multiplier applied every tick
    pub damping: f64,
    /// Fill color (`0xRRGGBB`, -1 transparent)
    pub color: i32,
    /// Bits this disc can be hit by
    pub c_mask: CollisionFlags,
    /// Bits this disc belongs to
    pub c_group: CollisionFlags,
}

impl Default for Disc {
    fn default() -> Self {
        Self {
            pos: Point::ZERO,
            vel: Point::ZERO,
            gravity: Point::ZERO,
            radius: 10.0,
            b_coef: 0.5,
            inv_mass: 0.0,
            damping: 0.99,
            color: 0xFFFFFF,
            c_mask: CollisionFlags::ALL,
            c_group: CollisionFlags::ALL,
        }
    }
}

impl Disc {
    /// Whether this disc and `other` can collide.
    #[inline]
    pub fn interacts_with(&self, group: CollisionFlags, mask: CollisionFlags) -> bool {
        CollisionFlags::interacts(self.c_group, self.c_mask, group, mask)
    }

    /// Advance one tick: move by the current velocity, then add gravity and damp.
    #[inline]
    pub fn integrate(&mut self) {
        self.pos += self.vel;
        self.vel = (self.vel + self.gravity) * self.damping;
    }

    /// Resolve an overlap with another disc.
    ///
    /// The positional correction and the impulse are split by inverse mass.
    pub fn collide_disc(&mut self, other: &mut Disc) {
        let inv_sum = self.inv_mass + other.inv_mass;
        if inv_sum == 0.0 {
            return;
        }

        let delta = self.pos - other.pos;
        let radius_sum = self.radius + other.radius;
        let dist_sq = delta.length_squared();
        if !(0.0 < dist_sq && dist_sq <= radius_sum * radius_sum) {
            return;
        }

        let dist = dist_sq.sqrt();
        let normal = delta * (1.0 / dist);
        let ratio = self.inv_mass / inv_sum;

        let penetration = radius_sum - dist;
        let own_share = penetration * ratio;
        self.pos += normal * own_share;
        other.pos -= normal * (penetration - own_share);

        let approach = normal.dot(self.vel - other.vel);
        if approach < 0.0 {
            let impulse = approach * (self.b_coef * other.b_coef + 1.0);
            let own_impulse = impulse * ratio;
            self.vel -= normal * own_impulse;
            other.vel += normal * (impulse - own_impulse);
        }
    }

    /// Push out along `normal` by `penetration` and reflect approaching velocity.
    #[inline]
    fn bounce_off(&mut self, normal: Point, penetration: f64, b_coef: f64) {
        self.pos += normal * penetration;
        let approach = self.vel.dot(normal);
        if approach < 0.0 {
            self.vel -= normal * (approach * (self.b_coef * b_coef + 1.0));
        }
    }

    /// Resolve an overlap with a plane.
    pub fn collide_plane(&mut self, plane: &Plane) {
        let penetration = plane.dist - plane.normal.dot(self.pos) + self.radius;
        if penetration > 0.0 {
            self.bounce_off(plane.normal, penetration, plane.b_coef);
        }
    }

    /// Resolve an overlap with a segment.
    pub fn collide_segment(&mut self, segment: &Segment) {
        let (mut normal, mut dist, bias) = match segment.shape {
            SegmentShape::Straight { p0, p1, normal, bias } => {
                let along = p1 - p0;
                if (self.pos - p0).dot(along) <= 0.0 || (self.pos - p1).dot(along) >= 0.0 {
                    return;
                }
                (normal, normal.dot(self.pos - p0), bias)
            }
            SegmentShape::Curved { center, radius, tangent0, tangent1, curve_f, bias } => {
                let offset = self.pos - center;
                let in_wedge = tangent0.dot(offset) > 0.0 && tangent1.dot(offset) > 0.0;
                if in_wedge == (curve_f <= 0.0) {
                    return;
                }
                let len = offset.length();
                if len == 0.0 {
                    return;
                }
                (offset * (1.0 / len), len - radius, bias)
            }
        };

        if bias == 0.0 {
            if dist < 0.0 {
                dist = -dist;
                normal = -normal;
            }
        } else {
            let mut depth = bias;
            if depth < 0.0 {
                depth = -depth;
                dist = -dist;
                normal = -normal;
            }
            if dist < -depth {
                return;
            }
        }

        if dist < self.radius {
            self.bounce_off(normal, self.radius - dist, segment.b_coef);
        }
    }

    /// Resolve an overlap with a vertex (a zero-radius static point).
    pub fn collide_vertex(&mut self, vertex: &Vertex) {
        let delta = self.pos - vertex.pos;
        let dist_sq = delta.length_squared();
        if !(0.0 < dist_sq && dist_sq <= self.radius * self.radius) {
            return;
        }
        let dist = dist_sq.sqrt();
        self.bounce_off(delta * (1.0 / dist), self.radius - dist, vertex.b_coef);
    }

    /// Write the full disc state.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_f64(self.pos.x);
        w.write_f64(self.pos.y);
        w.write_f64(self.vel.x);
        w.write_f64(self.vel.y);
        w.write_f64(self.gravity.x);
        w.write_f64(self.gravity.y);
        w.write_f64(self.radius);
        w.write_f64(self.b_coef);
        w.write_f64(self.inv_mass);
        w.write_f64(self.damping);
        w.write_i32(self.color);
        w.write_u32(self.c_mask.bits());
        w.write_u32(self.c_group.bits());
    }

    /// Read a disc written by [`Disc::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            pos: Point::new(r.read_f64()?, r.read_f64()?),
            vel: Point::new(r.read_f64()?, r.read_f64()?),
            gravity: Point::new(r.read_f64()?, r.read_f64()?),
            radius: r.read_f64()?,
            b_coef: r.read_f64()?,
            inv_mass: r.read_f64()?,
            damping: r.read_f64()?,
            color: r.read_i32()?,
            c_mask: CollisionFlags::from_bits_retain(r.read_u32()?),
            c_group: CollisionFlags::from_bits_retain(r.read_u32()?),
        })
    }
}

/// Partial overwrite of a disc's fields, sent by the host.
///
/// Float fields travel as `f32`; a `u16` mask says which fields are present,
/// bit `i` for the `i`-th float (pos, vel, gravity, radius, bCoef, invMass,
/// damping) and bits 10..=12 for color, cMask and cGroup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscPatch {
    /// `pos.x, pos.y, vel.x, vel.y, gravity.x, gravity.y, radius, b_coef, inv_mass, damping`
    pub floats: [Option<f32>; 10],
    /// `color, c_mask, c_group`
    pub ints: [Option<i32>; 3],
}

impl DiscPatch {
    /// Presence mask of the set fields.
    pub fn mask(&self) -> u16 {
        let mut mask = 0u16;
        for (i, f) in self.floats.iter().enumerate() {
            if f.is_some() {
                mask |= 1 << i;
            }
        }
        for (i, v) in self.ints.iter().enumerate() {
            if v.is_some() {
                mask |= 1 << (10 + i);
            }
        }
        mask
    }

    /// Overwrite the present fields of `disc`.
    pub fn apply(&self, disc: &mut Disc) {
        let targets: [&mut f64; 10] = [
            &mut disc.pos.x,
            &mut disc.pos.y,
            &mut disc.vel.x,
            &mut disc.vel.y,
            &mut disc.gravity.x,
            &mut disc.gravity.y,
            &mut disc.radius,
            &mut disc.b_coef,
            &mut disc.inv_mass,
            &mut disc.damping,
        ];
        for (target, value) in targets.into_iter().zip(self.floats) {
            if let Some(v) = value {
                *target = v as f64;
            }
        }
        if let Some(color) = self.ints[0] {
            disc.color = color;
        }
        if let Some(mask) = self.ints[1] {
            disc.c_mask = CollisionFlags::from_bits_retain(mask as u32);
        }
        if let Some(group) = self.ints[2] {
            disc.c_group = CollisionFlags::from_bits_retain(group as u32);
        }
    }

    /// Write the mask, then the present fields in order.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_u16(self.mask());
        for v in self.floats.iter().flatten() {
            w.write_f32(*v);
        }
        for v in self.ints.iter().flatten() {
            w.write_i32(*v);
        }
    }

    /// Read a patch written by [`DiscPatch::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let mask = r.read_u16()?;
        let mut patch = Self::default();
        for i in 0..10 {
            if mask & (1 << i) != 0 {
                patch.floats[i] = Some(r.read_f32()?);
            }
        }
        for i in 0..3 {
            if mask & (1 << (10 + i)) != 0 {
                patch.ints[i] = Some(r.read_i32()?);
            }
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(x: f64, vx: f64) -> Disc {
        Disc {
            pos: Point::new(x, 0.0),
            vel: Point::new(vx, 0.0),
            radius: 10.0,
            b_coef: 1.0,
            inv_mass: 1.0,
            damping: 1.0,
            ..Disc::default()
        }
    }

    #[test]
    fn test_integrate_uses_pre_damping_velocity() {
        let mut d = body(0.0, 2.0);
        d.damping = 0.5;
        d.gravity = Point::new(0.0, 1.0);
        d.integrate();

        assert_eq!(d.pos, Point::new(2.0, 0.0));
        assert_eq!(d.vel, Point::new(1.0, 0.5));
    }

    #[test]
    fn test_head_on_equal_mass_exchange() {
        let mut a = body(-9.0, 3.0);
        let mut b = body(9.0, -3.0);
        a.collide_disc(&mut b);

        assert!((a.vel.x + 3.0).abs() < 1e-9);
        assert!((b.vel.x - 3.0).abs() < 1e-9);
        assert!((b.pos.x - a.pos.x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_static_pair_ignored() {
        let mut a = body(0.0, 0.0);
        let mut b = body(5.0, 0.0);
        a.inv_mass = 0.0;
        b.inv_mass = 0.0;
        a.collide_disc(&mut b);
        assert_eq!(a.pos.x, 0.0);
        assert_eq!(b.pos.x, 5.0);
    }

    #[test]
    fn test_plane_pushes_out() {
        let plane = Plane {
            normal: Point::new(0.0, 1.0),
            dist: -100.0,
            b_coef: 1.0,
            c_mask: CollisionFlags::ALL,
            c_group: CollisionFlags::WALL,
        };
        let mut d = body(0.0, 0.0);
        d.pos = Point::new(0.0, -95.0);
        d.vel = Point::new(0.0, -4.0);
        d.collide_plane(&plane);

        assert_eq!(d.pos.y, -90.0);
        assert_eq!(d.vel.y, 4.0);
    }

    #[test]
    fn test_straight_segment_outside_extent() {
        let seg = Segment::straight_between(Point::new(-50.0, 0.0), Point::new(50.0, 0.0));
        let mut d = body(0.0, 0.0);
        d.pos = Point::new(80.0, 5.0);
        d.collide_segment(&seg);
        assert_eq!(d.pos, Point::new(80.0, 5.0));

        d.pos = Point::new(0.0, 5.0);
        d.collide_segment(&seg);
        assert_eq!(d.pos.y.abs(), 10.0);
    }

    fn wall(p0: Point, p1: Point, curve: f64, bias: f64) -> Segment {
        let vertices = [p0, p1].map(|pos| Vertex {
            pos,
            b_coef: 1.0,
            c_mask: CollisionFlags::ALL,
            c_group: CollisionFlags::WALL,
        });
        Segment::new(0, 1, &vertices, curve, bias, 1.0, CollisionFlags::ALL, CollisionFlags::WALL)
    }

    #[test]
    fn test_arc_collides_only_inside_wedge() {
        // Left half of a radius 75 circle around the origin.
        let arc = wall(Point::new(0.0, 75.0), Point::new(0.0, -75.0), 180.0, 0.0);
        assert!(arc.is_curved());

        // From the inner side, heading out through the arc.
        let mut d = body(-70.0, -3.0);
        d.collide_segment(&arc);
        assert!((d.pos.x + 65.0).abs() < 1e-9);
        assert!((d.vel.x - 3.0).abs() < 1e-9);

        // From the outer side, heading in.
        let mut d = body(-82.0, 3.0);
        d.collide_segment(&arc);
        assert!((d.pos.x + 85.0).abs() < 1e-9);
        assert!((d.vel.x + 3.0).abs() < 1e-9);

        // Same distance from the circle on the open side: no contact.
        let mut d = body(70.0, 3.0);
        d.collide_segment(&arc);
        assert_eq!(d.pos, Point::new(70.0, 0.0));
        assert_eq!(d.vel, Point::new(3.0, 0.0));
    }

    #[test]
    fn test_biased_segment_is_one_sided() {
        // Normal of this segment points to -y.
        let seg = wall(Point::new(-50.0, 0.0), Point::new(50.0, 0.0), 0.0, 20.0);

        let mut d = body(0.0, 0.0);
        d.pos = Point::new(0.0, -5.0);
        d.vel = Point::new(0.0, 3.0);
        d.collide_segment(&seg);
        assert_eq!(d.pos.y, -10.0);
        assert_eq!(d.vel.y, -3.0);

        // Beyond the bias depth on the back side: passes through.
        d.pos = Point::new(0.0, 25.0);
        d.vel = Point::new(0.0, -3.0);
        d.collide_segment(&seg);
        assert_eq!(d.pos.y, 25.0);
        assert_eq!(d.vel.y, -3.0);

        // Within the depth on the back side: pushed out to the front.
        d.pos = Point::new(0.0, 5.0);
        d.collide_segment(&seg);
        assert_eq!(d.pos.y, -10.0);

        // A negative bias swaps the sides.
        let flipped = wall(Point::new(-50.0, 0.0), Point::new(50.0, 0.0), 0.0, -20.0);
        d.pos = Point::new(0.0, -25.0);
        d.vel = Point::new(0.0, 3.0);
        d.collide_segment(&flipped);
        assert_eq!(d.pos.y, -25.0);
        d.pos = Point::new(0.0, 5.0);
        d.vel = Point::new(0.0, -3.0);
        d.collide_segment(&flipped);
        assert_eq!(d.pos.y, 10.0);
        assert_eq!(d.vel.y, 3.0);
    }

    #[test]
    fn test_vertex_bounce() {
        let v = Vertex {
            pos: Point::ZERO,
            b_coef: 0.0,
            c_mask: CollisionFlags::ALL,
            c_group: CollisionFlags::WALL,
        };
        let mut d = body(6.0, -1.0);
        d.collide_vertex(&v);
        assert_eq!(d.pos.x, 10.0);
        assert_eq!(d.vel.x, 0.0);
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut patch = DiscPatch::default();
        patch.floats[1] = Some(42.0);
        patch.floats[6] = Some(3.5);
        patch.ints[1] = Some(CollisionFlags::BALL.bits() as i32);
        assert_eq!(patch.mask(), (1 << 1) | (1 << 6) | (1 << 11));

        let mut d = body(7.0, 1.0);
        patch.apply(&mut d);
        assert_eq!(d.pos, Point::new(7.0, 42.0));
        assert_eq!(d.radius, 3.5);
        assert_eq!(d.c_mask, CollisionFlags::BALL);
        assert_eq!(d.vel.x, 1.0);

        let mut w = StreamWriter::little();
        patch.encode(&mut w);
        assert_eq!(w.len(), 2 + 4 + 4 + 4);
        let bytes = w.into_bytes();
        assert_eq!(DiscPatch::decode(&mut StreamReader::little(&bytes)).unwrap(), patch);
    }
}
