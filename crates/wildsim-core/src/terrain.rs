//! Static board terrain: bounds, water and impassable ground.

use serde::{Deserialize, Serialize};

use crate::components::Point;

/// Axis-aligned rectangle, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            min: Point::new(x, y),
            max: Point::new(x + width.max(0), y + height.max(0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }

    /// Point inside the rectangle closest to `point`.
    pub fn closest(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.min.x, self.max.x - 1),
            point.y.clamp(self.min.y, self.max.y - 1),
        )
    }
}

/// Board layout the simulation moves pieces over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub width: i32,
    pub height: i32,
    pub water: Vec<Rect>,
    pub blocking: Vec<Rect>,
}

impl Terrain {
    /// Open board with no water and no obstacles.
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            water: Vec::new(),
            blocking: Vec::new(),
        }
    }

    pub fn with_water(mut self, rect: Rect) -> Self {
        if !rect.is_empty() {
            self.water.push(rect);
        }
        self
    }

    pub fn with_blocking(mut self, rect: Rect) -> Self {
        if !rect.is_empty() {
            self.blocking.push(rect);
        }
        self
    }

    pub fn on_board(&self, point: Point) -> bool {
        point.x >= 0 && point.y >= 0 && point.x < self.width && point.y < self.height
    }

    pub fn is_water(&self, point: Point) -> bool {
        self.water.iter().any(|r| r.contains(point))
    }

    /// Off-board points count as blocked.
    pub fn is_blocked(&self, point: Point) -> bool {
        !self.on_board(point) || self.blocking.iter().any(|r| r.contains(point))
    }

    /// Closest water point within `radius`, if any.
    pub fn nearest_water(&self, point: Point, radius: f32) -> Option<Point> {
        self.water
            .iter()
            .map(|r| r.closest(point))
            .map(|p| (p, point.distance_squared(&p)))
            .filter(|(_, d_sq)| *d_sq <= radius * radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
    }

    /// Clamp a point onto the board.
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(point.x.clamp(0, self.width - 1), point.y.clamp(0, self.height - 1))
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Self::open(1024, 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pond() -> Terrain {
        Terrain::open(100, 100)
            .with_water(Rect::new(40, 40, 10, 10))
            .with_blocking(Rect::new(0, 90, 100, 10))
    }

    #[test]
    fn test_bounds_and_blocking() {
        let terrain = pond();
        assert!(terrain.on_board(Point::new(0, 0)));
        assert!(!terrain.on_board(Point::new(100, 5)));
        assert!(terrain.is_blocked(Point::new(-1, 5)));
        assert!(terrain.is_blocked(Point::new(10, 95)));
        assert!(!terrain.is_blocked(Point::new(10, 10)));
    }

    #[test]
    fn test_nearest_water() {
        let terrain = pond();
        assert!(terrain.is_water(Point::new(45, 45)));
        assert!(!terrain.is_water(Point::new(50, 45)));
        assert_eq!(terrain.nearest_water(Point::new(30, 45), 20.0), Some(Point::new(40, 45)));
        assert_eq!(terrain.nearest_water(Point::new(0, 0), 20.0), None);
        assert_eq!(terrain.nearest_water(Point::new(60, 60), 50.0), Some(Point::new(49, 49)));
    }
}
