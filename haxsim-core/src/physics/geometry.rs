//! Static Collision Geometry
//!
//! Vertices, segments and planes. Immutable once a stadium is built and
//! shared read-only by every game played on it.

use serde::{Serialize, Deserialize};

use crate::core::point::Point;
use super::flags::CollisionFlags;

/// Lower curve bound (10 degrees) below which a segment stays straight.
const MIN_CURVE: f64 = 0.174_358_392_274_233_53;
/// Upper curve bound (340 degrees) above which a segment stays straight.
const MAX_CURVE: f64 = 5.934_119_456_780_721;

/// A static collision point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Position
    pub pos: Point,
    /// Bounce coefficient
    pub b_coef: f64,
    /// Collision mask
    pub c_mask: CollisionFlags,
    /// Collision group
    pub c_group: CollisionFlags,
}

/// An infinite half-space boundary. Discs are kept where `normal·pos >= dist + radius`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Unit normal pointing into the allowed side
    pub normal: Point,
    /// Offset along the normal
    pub dist: f64,
    /// Bounce coefficient
    pub b_coef: f64,
    /// Collision mask
    pub c_mask: CollisionFlags,
    /// Collision group
    pub c_group: CollisionFlags,
}

/// Precomputed collision shape of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SegmentShape {
    /// Straight line between two points.
    Straight {
        /// Start point
        p0: Point,
        /// End point
        p1: Point,
        /// Unit normal
        normal: Point,
        /// One-sided depth (0 = two-sided)
        bias: f64,
    },
    /// Circular arc running counter-clockwise around `center`.
    Curved {
        /// Circle centre
        center: Point,
        /// Circle radius
        radius: f64,
        /// Tangent at the start point
        tangent0: Point,
        /// Tangent at the end point
        tangent1: Point,
        /// `1 / tan(angle / 2)`
        curve_f: f64,
        /// One-sided depth (0 = two-sided)
        bias: f64,
    },
}

/// A wall between two vertices, straight or curved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start vertex index
    pub v0: usize,
    /// End vertex index
    pub v1: usize,
    /// Bounce coefficient
    pub b_coef: f64,
    /// Collision mask
    pub c_mask: CollisionFlags,
    /// Collision group
    pub c_group: CollisionFlags,
    /// Curvature in degrees as authored (negative bends the other way)
    pub curve: f64,
    /// One-sided depth (0 = two-sided)
    pub bias: f64,
    /// Drawn by renderers
    pub vis: bool,
    /// Line color
    pub color: i32,
    /// Derived collision shape
    pub shape: SegmentShape,
}

impl SegmentShape {
    /// Compute the collision shape between two points.
    ///
    /// A negative curve swaps the endpoints and negates the bias; curves outside
    /// (10°, 340°) are treated as straight.
    pub fn compute(p0: Point, p1: Point, curve_deg: f64, bias: f64) -> Self {
        let mut angle = curve_deg * std::f64::consts::PI / 180.0;
        let (mut a, mut b, mut bias) = (p0, p1, bias);
        if angle < 0.0 {
            angle = -angle;
            std::mem::swap(&mut a, &mut b);
            bias = -bias;
        }

        if angle > MIN_CURVE && angle < MAX_CURVE {
            let curve_f = 1.0 / (angle / 2.0).tan();
            let half = (b - a) * 0.5;
            let center = a + half + half.perp() * curve_f;
            let radius = (a - center).length();

            let mut tangent0 = (a - center).perp();
            let mut tangent1 = -(b - center).perp();
            if curve_f <= 0.0 {
                tangent0 = -tangent0;
                tangent1 = -tangent1;
            }
            SegmentShape::Curved { center, radius, tangent0, tangent1, curve_f, bias }
        } else {
            let along = b - a;
            let normal = Point::new(along.y, -along.x).normalize();
            SegmentShape::Straight { p0: a, p1: b, normal, bias }
        }
    }
}

impl Segment {
    /// Build a segment and compute its shape from the vertex positions.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        v0: usize,
        v1: usize,
        vertices: &[Vertex],
        curve: f64,
        bias: f64,
        b_coef: f64,
        c_mask: CollisionFlags,
        c_group: CollisionFlags,
    ) -> Self {
        let p0 = vertices.get(v0).map(|v| v.pos).unwrap_or_default();
        let p1 = vertices.get(v1).map(|v| v.pos).unwrap_or_default();
        Self {
            v0,
            v1,
            b_coef,
            c_mask,
            c_group,
            curve,
            bias,
            vis: true,
            color: 0,
            shape: SegmentShape::compute(p0, p1, curve, bias),
        }
    }

    /// Recompute the shape after vertices or curve changed.
    pub fn refresh_shape(&mut self, vertices: &[Vertex]) {
        let p0 = vertices.get(self.v0).map(|v| v.pos).unwrap_or_default();
        let p1 = vertices.get(self.v1).map(|v| v.pos).unwrap_or_default();
        self.shape = SegmentShape::compute(p0, p1, self.curve, self.bias);
    }

    /// Whether the segment is an arc.
    pub fn is_curved(&self) -> bool {
        matches!(self.shape, SegmentShape::Curved { .. })
    }

    #[cfg(test)]
    pub(crate) fn straight_between(p0: Point, p1: Point) -> Self {
        let vertices = [
            Vertex { pos: p0, b_coef: 1.0, c_mask: CollisionFlags::ALL, c_group: CollisionFlags::WALL },
            Vertex { pos: p1, b_coef: 1.0, c_mask: CollisionFlags::ALL, c_group: CollisionFlags::WALL },
        ];
        Self::new(0, 1, &vertices, 0.0, 0.0, 1.0, CollisionFlags::ALL, CollisionFlags::WALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_curve_is_straight() {
        let shape = SegmentShape::compute(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 5.0, 0.0);
        assert!(matches!(shape, SegmentShape::Straight { .. }));
    }

    #[test]
    fn test_half_circle_arc() {
        let shape = SegmentShape::compute(Point::new(0.0, 75.0), Point::new(0.0, -75.0), 180.0, 0.0);
        match shape {
            SegmentShape::Curved { center, radius, tangent0, tangent1, .. } => {
                assert!(center.length() < 1e-9);
                assert!((radius - 75.0).abs() < 1e-9);
                // Both tangents point into the left half plane.
                assert!(tangent0.x < 0.0 && tangent1.x < 0.0);
            }
            _ => panic!("expected an arc"),
        }
    }

    #[test]
    fn test_negative_curve_swaps_side() {
        let shape = SegmentShape::compute(Point::new(0.0, 75.0), Point::new(0.0, -75.0), -180.0, 2.0);
        match shape {
            SegmentShape::Curved { tangent0, tangent1, bias, .. } => {
                assert!(tangent0.x > 0.0 && tangent1.x > 0.0);
                assert_eq!(bias, -2.0);
            }
            _ => panic!("expected an arc"),
        }
    }
}
