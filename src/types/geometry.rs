//! Geometry primitives for layout.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in graph units (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Create a rectangle from two corners.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Center point.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Non-positive width or height.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Strict overlap on both axes (touching edges do not overlap).
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Same size, moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow by per-side margins.
    pub fn expanded(&self, left: f64, top: f64, right: f64, bottom: f64) -> Rect {
        Rect::from_corners(self.x - left, self.y - top, self.right() + right, self.bottom() + bottom)
    }
}

/// 8-way compass position of a placed item relative to its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Above.
    Top,
    /// Above and to the right.
    TopRight,
    /// To the right.
    Right,
    /// Below and to the right.
    BottomRight,
    /// Below.
    Bottom,
    /// Below and to the left.
    BottomLeft,
    /// To the left.
    Left,
    /// Above and to the left.
    TopLeft,
}

impl Position {
    /// Horizontal direction: -1 left, 0 same column, 1 right.
    pub fn dx(&self) -> i8 {
        match self {
            Self::Top | Self::Bottom => 0,
            Self::TopRight | Self::Right | Self::BottomRight => 1,
            Self::BottomLeft | Self::Left | Self::TopLeft => -1,
        }
    }

    /// Vertical direction: -1 up, 0 same row, 1 down.
    pub fn dy(&self) -> i8 {
        match self {
            Self::Right | Self::Left => 0,
            Self::Top | Self::TopRight | Self::TopLeft => -1,
            Self::BottomRight | Self::Bottom | Self::BottomLeft => 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::Right
    }
}

/// Cross-axis alignment of a placed group relative to its base group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Align leading edges.
    Start,
    /// Align centers.
    Center,
    /// Align trailing edges.
    End,
}

impl Alignment {
    /// Fraction of the span difference applied on the cross axis.
    pub fn factor(&self) -> f64 {
        match self {
            Self::Start => 0.0,
            Self::Center => 0.5,
            Self::End => 1.0,
        }
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self::Center
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, -5.0, 15.0, 15.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&Rect::new(10.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_expand_and_degenerate() {
        let r = Rect::new(0.0, 0.0, 80.0, 66.0).expanded(30.0, 80.0, 30.0, 30.0);
        assert_eq!(r, Rect::new(-30.0, -80.0, 140.0, 176.0));
        assert!(Rect::from_corners(30.0, 40.0, 30.0, 30.0).is_degenerate());
    }

    #[test]
    fn test_compass_directions() {
        assert_eq!((Position::TopLeft.dx(), Position::TopLeft.dy()), (-1, -1));
        assert_eq!((Position::Bottom.dx(), Position::Bottom.dy()), (0, 1));
        assert_eq!((Position::Right.dx(), Position::Right.dy()), (1, 0));
        assert_eq!(Alignment::Center.factor(), 0.5);
    }
}
