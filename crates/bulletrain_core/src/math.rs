//! # Play-Field Math
//!
//! 2D vectors, axis-aligned boxes and the two collision tests the engine
//! needs: circle vs circle (enemy bullets vs the player) and AABB vs AABB
//! (player bullets vs enemies).

use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub};

use bytemuck::{Pod, Zeroable};

/// A 2D vector in play-field units (origin at the field center).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Builds a vector from a magnitude and a direction in radians.
    #[inline]
    #[must_use]
    pub fn from_polar(magnitude: f32, direction: f32) -> Self {
        let (sin, cos) = direction.sin_cos();
        Self::new(magnitude * cos, magnitude * sin)
    }

    /// Returns `(magnitude, direction)`.
    #[inline]
    #[must_use]
    pub fn to_polar(self) -> (f32, f32) {
        (self.length(), self.y.atan2(self.x))
    }

    /// Squared length. Avoids the sqrt for comparisons.
    #[inline]
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// True if either coordinate lies outside `[-bound, bound]`.
    #[inline]
    #[must_use]
    pub fn outside_square(self, bound: f32) -> bool {
        self.x > bound || self.x < -bound || self.y > bound || self.y < -bound
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

/// Axis-aligned bounding box, top-left and lower-right corners.
///
/// Y grows downward, so `top_left.y <= lower_right.y` for a valid box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Aabb {
    /// Top-left corner.
    pub top_left: Vec2,
    /// Lower-right corner.
    pub lower_right: Vec2,
}

impl Aabb {
    /// Creates a new box.
    #[inline]
    #[must_use]
    pub const fn new(top_left: Vec2, lower_right: Vec2) -> Self {
        Self {
            top_left,
            lower_right,
        }
    }

    /// The same box moved by `offset`.
    #[inline]
    #[must_use]
    pub fn translated(self, offset: Vec2) -> Self {
        Self::new(self.top_left + offset, self.lower_right + offset)
    }

    /// Inclusive overlap test.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        aabb_collide(self, other)
    }
}

/// Circle vs circle, given the two centers and the sum of the radii.
///
/// Touching circles collide. Non-finite distances (overflowed coordinates)
/// never collide.
#[inline]
#[must_use]
pub fn circle_collide(a: Vec2, b: Vec2, radius_sum: f32) -> bool {
    let dist_sq = a.distance_squared(b);
    dist_sq.is_finite() && dist_sq <= radius_sum * radius_sum
}

/// AABB vs AABB, edges inclusive.
#[inline]
#[must_use]
pub fn aabb_collide(a: &Aabb, b: &Aabb) -> bool {
    // horizontal
    if a.lower_right.x < b.top_left.x || a.top_left.x > b.lower_right.x {
        return false;
    }
    // vertical
    !(a.lower_right.y < b.top_left.y || a.top_left.y > b.lower_right.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_collide() {
        let a = Vec2::new(0.0, 0.0);
        assert!(circle_collide(a, Vec2::new(3.0, 4.0), 5.0));
        assert!(!circle_collide(a, Vec2::new(3.0, 4.1), 5.0));
        assert!(!circle_collide(a, Vec2::new(f32::MAX, f32::MAX), 5.0));
    }

    #[test]
    fn test_aabb_collide() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let touching = Aabb::new(Vec2::new(10.0, 10.0), Vec2::new(12.0, 12.0));
        let apart = Aabb::new(Vec2::new(11.0, 0.0), Vec2::new(12.0, 10.0));
        assert!(a.overlaps(&touching));
        assert!(!a.overlaps(&apart));
        assert!(a.overlaps(&apart.translated(Vec2::new(-5.0, 0.0))));
    }

    #[test]
    fn test_polar_roundtrip_direction() {
        let v = Vec2::from_polar(2.0, std::f32::consts::FRAC_PI_2);
        assert!(v.x.abs() < 1e-5);
        assert!((v.y - 2.0).abs() < 1e-5);
        let (mag, dir) = v.to_polar();
        assert!((mag - 2.0).abs() < 1e-5);
        assert!((dir - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_outside_square() {
        assert!(!Vec2::new(400.0, -400.0).outside_square(400.0));
        assert!(Vec2::new(400.5, 0.0).outside_square(400.0));
        assert!(Vec2::new(0.0, -401.0).outside_square(400.0));
    }
}
