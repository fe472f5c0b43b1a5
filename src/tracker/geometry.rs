use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Axis-aligned search region in world coordinates.
///
/// Used as the extent of a leg's likelihood grid. Cell `(ix, iy)` of an
/// `nx` by `ny` grid lies at `min + (ix * step_x, iy * step_y)`, so the first
/// and last cells sit exactly on the box edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lower-left corner
    pub min: Point2<f64>,
    /// Upper-right corner
    pub max: Point2<f64>,
}

impl BoundingBox {
    /// Create a box from two opposite corners.
    #[inline]
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self { min, max }
    }

    /// Create a square box of half-width `margin` around `center`.
    #[inline]
    pub fn around(center: Point2<f64>, margin: f64) -> Self {
        let m = Vector2::new(margin, margin);
        Self {
            min: center - m,
            max: center + m,
        }
    }

    /// The four corners, in the order (max.x, min.y), (max.x, max.y),
    /// (min.x, min.y), (min.x, max.y).
    #[inline]
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(self.max.x, self.min.y),
            Point2::new(self.max.x, self.max.y),
            Point2::new(self.min.x, self.min.y),
            Point2::new(self.min.x, self.max.y),
        ]
    }

    #[inline]
    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Spacing between cell centres for an `nx` by `ny` grid spanning the box.
    #[inline]
    pub fn grid_step(&self, nx: usize, ny: usize) -> Vector2<f64> {
        Vector2::new(
            self.width() / (nx.max(2) - 1) as f64,
            self.height() / (ny.max(2) - 1) as f64,
        )
    }

    /// Distance from `p` to the nearest point of the box (zero inside).
    pub fn distance_to(&self, p: &Point2<f64>) -> f64 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        dx.hypot(dy)
    }
}

/// Distance from `p` to the segment `a`-`b`.
pub fn segment_to_point(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Bring `angle` onto the same 2π branch as `reference`.
#[inline]
pub fn unwrap_angle(angle: f64, reference: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    if angle > reference + PI {
        angle - TAU
    } else if angle < reference - PI {
        angle + TAU
    } else {
        angle
    }
}
