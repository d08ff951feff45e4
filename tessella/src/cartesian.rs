//! Cartesian primitives shared by the fill and draw paths.

use nalgebra::{Point2, Vector2};

/// A point in tile-local render space.
pub type RenderPoint = Point2<f32>;

/// Unit 2D vector perpendicular to a line segment, used to extrude
/// constant-width ribbons in the vertex shader.
pub type Normal = Vector2<f32>;

/// Computes the unit normal of the segment from `beg` to `end`.
///
/// Degenerate (zero-length) segments get an arbitrary small length instead of
/// producing NaNs, matching what downstream width extrusion expects.
pub fn segment_normal(beg: RenderPoint, end: RenderPoint) -> Normal {
    let delta = end - beg;
    let mut length = delta.norm();
    if length == 0.0 {
        length = 0.01;
    }

    Normal::new(-delta.y / length, delta.x / length)
}

/// Axis-aligned rectangle in map coordinates.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    /// Creates an extent from its corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Left edge.
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Bottom edge.
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Right edge.
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Top edge.
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// Horizontal size.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Vertical size.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Whether the extent covers a non-empty area.
    pub fn is_valid(&self) -> bool {
        self.max_x > self.min_x && self.max_y > self.min_y
    }

    /// Intersection with `other`; an empty intersection is reported by
    /// [`Extent::is_valid`] returning `false`.
    pub fn intersection(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        }
    }

    /// Normalizes a possibly inverted extent by swapping crossed edges.
    pub fn fix(&mut self) {
        if self.min_x > self.max_x {
            std::mem::swap(&mut self.min_x, &mut self.max_x);
        }
        if self.min_y > self.max_y {
            std::mem::swap(&mut self.min_y, &mut self.max_y);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn normal_is_unit_and_perpendicular() {
        let normal = segment_normal(RenderPoint::new(0.0, 0.0), RenderPoint::new(3.0, 4.0));
        assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(normal.dot(&Normal::new(3.0, 4.0)), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_segment_does_not_produce_nan() {
        let point = RenderPoint::new(1.0, 1.0);
        let normal = segment_normal(point, point);
        assert!(normal.x.is_finite() && normal.y.is_finite());
    }

    #[test]
    fn disjoint_extents_intersect_to_invalid() {
        let a = Extent::new(0.0, 0.0, 1.0, 1.0);
        let b = Extent::new(2.0, 2.0, 3.0, 3.0);
        assert!(!a.intersection(&b).is_valid());
    }

    #[test]
    fn overlapping_extents_intersect() {
        let a = Extent::new(0.0, 0.0, 2.0, 2.0);
        let b = Extent::new(1.0, 1.0, 3.0, 3.0);
        let i = a.intersection(&b);
        assert_eq!(i, Extent::new(1.0, 1.0, 2.0, 2.0));
    }
}
