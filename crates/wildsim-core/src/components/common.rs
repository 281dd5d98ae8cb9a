//! Common geometry and placement components.

use serde::{Deserialize, Serialize};

/// Integral board position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Unit vector pointing from `self` towards `other`
    pub fn direction_to(&self, other: &Self) -> Vec2 {
        Vec2::new((other.x - self.x) as f32, (other.y - self.y) as f32).normalize()
    }

    /// Step of at most `speed` units towards `other`, rounded to the grid
    pub fn step_towards(&self, other: &Self, speed: f32) -> (i32, i32) {
        let distance = self.distance(other);
        if distance <= speed {
            return (other.x - self.x, other.y - self.y);
        }
        let dir = self.direction_to(other) * speed;
        (dir.x.round() as i32, dir.y.round() as i32)
    }
}

/// 2D float vector for headings and impulses
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        } else {
            Self::ZERO
        }
    }

    /// Unit heading for an angle in radians
    pub fn from_angle(radians: f32) -> Self {
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

/// Where a piece sits on the board. Owned by the placement layer; the
/// simulation reads and moves it but never duplicates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub point: Point,
    /// Degrees, accumulated from passive spin
    pub rotation: f32,
    /// False once the piece has been taken off the board
    pub in_world: bool,
}

impl Placement {
    pub fn at(point: Point) -> Self {
        Self {
            point,
            rotation: 0.0,
            in_world: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.offset(3, 4), b);
    }

    #[test]
    fn test_step_towards_stops_on_target() {
        let a = Point::new(0, 0);
        assert_eq!(a.step_towards(&Point::new(2, 0), 5.0), (2, 0));
        assert_eq!(a.step_towards(&Point::new(100, 0), 5.0), (5, 0));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2::new(3.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 0.001);
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        assert_eq!(-Vec2::new(1.0, -2.0), Vec2::new(-1.0, 2.0));
    }
}
