use serde::{Deserialize, Serialize};

/// A point in CSS pixel (client) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen rectangle, as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Top-left corner; where a pointer "enters" the element.
    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Exact geometric center.
    pub fn center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Center snapped down to whole pixels, used for point queries against
    /// a control located by the caller.
    pub fn probe_point(&self) -> Point {
        Point::new(
            self.left + (self.width / 2.0).floor(),
            self.top + (self.height / 2.0).floor(),
        )
    }

    /// First pixel row below the bottom edge, on the probe column.
    pub fn below_point(&self) -> Point {
        Point::new(self.probe_point().x, self.top + 1.0 + self.height)
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// True when this rectangle's origin lies at or after `other`'s origin
    /// on both axes.
    pub fn starts_within(&self, other: &Rect) -> bool {
        self.left >= other.left && self.top >= other.top
    }
}
