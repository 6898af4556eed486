//! Joints
//!
//! Distance constraints between two discs addressed by index.

use serde::{Serialize, Deserialize};

use super::disc::Disc;

/// A distance constraint between two discs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// First disc index
    pub d0: usize,
    /// Second disc index
    pub d1: usize,
    /// Minimum length
    pub min_length: f64,
    /// Maximum length (`<= min_length` means a fixed length)
    pub max_length: f64,
    /// Spring strength, `f64::INFINITY` for rigid
    pub strength: f64,
    /// Line color
    pub color: i32,
}

impl Joint {
    /// Whether the joint is enforced by position projection.
    #[inline]
    pub fn is_rigid(&self) -> bool {
        self.strength.is_infinite()
    }

    /// Enforce the constraint once.
    pub fn resolve(&self, discs: &mut [Disc]) {
        if self.d0 == self.d1 || self.d0 >= discs.len() || self.d1 >= discs.len() {
            return;
        }
        let (a, b) = if self.d0 < self.d1 {
            let (head, tail) = discs.split_at_mut(self.d1);
            (&mut head[self.d0], &mut tail[0])
        } else {
            let (head, tail) = discs.split_at_mut(self.d0);
            (&mut tail[0], &mut head[self.d1])
        };

        let delta = a.pos - b.pos;
        let dist = delta.length();
        if dist <= 0.0 {
            return;
        }
        let normal = delta * (1.0 / dist);

        let target = if self.min_length >= self.max_length {
            self.min_length
        } else if dist <= self.min_length {
            self.min_length
        } else if dist >= self.max_length {
            self.max_length
        } else {
            return;
        };

        let mut ratio = a.inv_mass / (a.inv_mass + b.inv_mass);
        if ratio.is_nan() {
            ratio = 0.5;
        }
        let error = dist - target;

        if self.is_rigid() {
            let own = error * ratio;
            a.pos -= normal * own;
            b.pos += normal * (error - own);

            // Relative axial speed that makes the violation worse is reflected.
            let axial = normal.dot(a.vel - b.vel);
            if axial * error > 0.0 {
                let impulse = axial * (a.b_coef * b.b_coef + 1.0);
                let own_impulse = impulse * ratio;
                a.vel -= normal * own_impulse;
                b.vel += normal * (impulse - own_impulse);
            }
        } else {
            let impulse = error * self.strength;
            let own = impulse * ratio;
            a.vel -= normal * own;
            b.vel += normal * (impulse - own);
        }
    }
}
