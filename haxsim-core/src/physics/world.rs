//! Physics World
//!
//! The dynamic disc arena of a game plus the fixed-order step that advances it.
//!
//! ## Step Order
//!
//! 1. Integrate every disc (position from the old velocity, then gravity and damping)
//! 2. Disc / disc pairs `(i, j)` with `i < j`
//! 3. Disc / plane
//! 4. Disc / segment
//! 5. Disc / vertex
//! 6. Joints, two passes
//!
//! Discs with zero inverse mass skip static geometry.

use serde::{Serialize, Deserialize};
#[cfg(feature = "debug-tracing")]
use tracing::trace;

use crate::core::codec::{CodecError, CodecResult, StreamReader, StreamWriter};
use crate::stadium::Stadium;
use super::disc::Disc;

/// Number of joint passes per tick.
pub const JOINT_PASSES: usize = 2;

/// All dynamic discs of a game, addressed by index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Discs; stadium discs first, player discs appended after them
    pub discs: Vec<Disc>,
}

impl World {
    /// Create a world from a stadium's disc templates.
    pub fn from_stadium(stadium: &Stadium) -> Self {
        Self {
            discs: stadium.discs.clone(),
        }
    }

    /// Advance all discs by one tick against the stadium's static geometry.
    pub fn step(&mut self, stadium: &Stadium) {
        for disc in &mut self.discs {
            disc.integrate();
        }

        let count = self.discs.len();
        for i in 0..count {
            let (head, tail) = self.discs.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                if a.interacts_with(b.c_group, b.c_mask) {
                    a.collide_disc(b);
                }
            }
        }

        for disc in self.discs.iter_mut().filter(|d| d.inv_mass != 0.0) {
            for plane in &stadium.planes {
                if disc.interacts_with(plane.c_group, plane.c_mask) {
                    disc.collide_plane(plane);
                }
            }
        }

        for disc in self.discs.iter_mut().filter(|d| d.inv_mass != 0.0) {
            for segment in &stadium.segments {
                if disc.interacts_with(segment.c_group, segment.c_mask) {
                    disc.collide_segment(segment);
                }
            }
        }

        for disc in self.discs.iter_mut().filter(|d| d.inv_mass != 0.0) {
            for vertex in &stadium.vertices {
                if disc.interacts_with(vertex.c_group, vertex.c_mask) {
                    disc.collide_vertex(vertex);
                }
            }
        }

        for _ in 0..JOINT_PASSES {
            for joint in &stadium.joints {
                joint.resolve(&mut self.discs);
            }
        }

        #[cfg(feature = "debug-tracing")]
        if let Some(ball) = self.discs.first() {
            trace!(pos = %ball.pos, vel = %ball.vel, "ball after step");
        }
    }

    /// Append a disc, returning its index.
    pub fn push(&mut self, disc: Disc) -> usize {
        self.discs.push(disc);
        self.discs.len() - 1
    }

    /// Remove a disc. Indices above `index` shift down by one.
    pub fn remove(&mut self, index: usize) -> Option<Disc> {
        (index < self.discs.len()).then(|| self.discs.remove(index))
    }

    /// Mutable access to two distinct discs.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut Disc, &mut Disc)> {
        if a == b || a >= self.discs.len() || b >= self.discs.len() {
            return None;
        }
        if a < b {
            let (head, tail) = self.discs.split_at_mut(b);
            Some((&mut head[a], &mut tail[0]))
        } else {
            let (head, tail) = self.discs.split_at_mut(a);
            Some((&mut tail[0], &mut head[b]))
        }
    }

    /// Write every disc (varint count, then each disc).
    ///
    /// A match holds up to 255 stadium discs plus one per player, so the
    /// count does not fit a byte.
    pub fn encode(&self, w: &mut StreamWriter) {
        w.write_varint(self.discs.len() as u32);
        for disc in &self.discs {
            disc.encode(w);
        }
    }

    /// Read a world written by [`World::encode`].
    pub fn decode(r: &mut StreamReader<'_>) -> CodecResult<Self> {
        let count = r.read_varint()? as usize;
        let discs = (0..count)
            .map(|_| Disc::decode(r))
            .collect::<Result<Vec<_>, CodecError>>()?;
        Ok(Self { discs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::Endian;
    use crate::core::point::Point;
    use crate::physics::flags::CollisionFlags;

    fn free_disc(x: f64, vx: f64) -> Disc {
        Disc {
            pos: Point::new(x, 0.0),
            vel: Point::new(vx, 0.0),
            radius: 10.0,
            b_coef: 1.0,
            inv_mass: 1.0,
            damping: 1.0,
            c_mask: CollisionFlags::ALL,
            c_group: CollisionFlags::BALL,
            ..Disc::default()
        }
    }

    #[test]
    fn test_head_on_exchange_in_one_tick() {
        let stadium = Stadium::empty("test");
        let mut world = World {
            discs: vec![free_disc(-12.0, 3.0), free_disc(12.0, -3.0)],
        };
        world.step(&stadium);

        assert!((world.discs[0].vel.x + 3.0).abs() < 1e-9);
        assert!((world.discs[1].vel.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_masks_filter_pairs() {
        let stadium = Stadium::empty("test");
        let mut a = free_disc(-5.0, 0.0);
        let b = free_disc(5.0, 0.0);
        a.c_mask = CollisionFlags::WALL;
        let mut world = World { discs: vec![a, b] };
        world.step(&stadium);
        assert_eq!(world.discs[0].pos.x, -5.0);
    }

    #[test]
    fn test_step_is_deterministic() {
        let stadium = Stadium::classic();
        let mut a = World::from_stadium(&stadium);
        a.discs[0].vel = Point::new(7.3, -2.1);
        let mut b = a.clone();
        for _ in 0..500 {
            a.step(&stadium);
            b.step(&stadium);
        }
        assert_eq!(a, b);
        let bits_a: Vec<u64> = a.discs.iter().map(|d| d.pos.x.to_bits()).collect();
        let bits_b: Vec<u64> = b.discs.iter().map(|d| d.pos.x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_ball_stays_in_classic_field() {
        let stadium = Stadium::classic();
        let mut world = World::from_stadium(&stadium);
        world.discs[0].vel = Point::new(0.0, 20.0);
        for _ in 0..200 {
            world.step(&stadium);
            assert!(world.discs[0].pos.y.abs() <= 170.0 + 1e-6);
        }
    }

    #[test]
    fn test_encoding_keeps_more_than_255_discs() {
        let mut world = World::from_stadium(&Stadium::classic());
        while world.discs.len() < 300 {
            world.push(free_disc(world.discs.len() as f64, 0.0));
        }
        let mut w = StreamWriter::new(Endian::Little);
        world.encode(&mut w);
        let bytes = w.into_bytes();

        let decoded = World::decode(&mut StreamReader::new(&bytes, Endian::Little)).unwrap();
        assert_eq!(decoded.discs.len(), 300);
        assert_eq!(decoded, world);
    }
}
