//! One sweep of the range sensor.

use nalgebra::{Isometry2, Point2, Vector2};

/// An immutable scan frame.
///
/// Each sample carries its sensor-local angle, its range and the world-space
/// point it resolves to. The sensor pose is kept so the estimator can map
/// world-space regions back into local angles.
#[derive(Debug, Clone)]
pub struct ScanFrame {
    frame_id: u32,
    pose: Isometry2<f64>,
    angles: Vec<f64>,
    ranges: Vec<f64>,
    points: Vec<Point2<f64>>,
}

impl ScanFrame {
    /// Build a frame from polar samples taken by a sensor at `origin` facing
    /// `heading` radians from the world x axis.
    ///
    /// `angles` and `ranges` must have equal length; extra entries of the
    /// longer slice are ignored.
    pub fn from_polar(
        frame_id: u32,
        origin: Point2<f64>,
        heading: f64,
        angles: &[f64],
        ranges: &[f64],
    ) -> Self {
        let pose = Isometry2::new(origin.coords, heading);
        let n = angles.len().min(ranges.len());
        let angles = angles[..n].to_vec();
        let ranges = ranges[..n].to_vec();
        let points = angles
            .iter()
            .zip(ranges.iter())
            .map(|(&a, &r)| pose * Point2::new(r * a.cos(), r * a.sin()))
            .collect();
        Self {
            frame_id,
            pose,
            angles,
            ranges,
            points,
        }
    }

    #[inline]
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// World-space point of sample `i`.
    #[inline]
    pub fn point(&self, i: usize) -> Point2<f64> {
        self.points[i]
    }

    #[inline]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Sensor-local angle of sample `i` in radians.
    #[inline]
    pub fn angle(&self, i: usize) -> f64 {
        self.angles[i]
    }

    #[inline]
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Measured range of sample `i`.
    #[inline]
    pub fn range(&self, i: usize) -> f64 {
        self.ranges[i]
    }

    #[inline]
    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }

    /// Sensor position in world coordinates.
    #[inline]
    pub fn origin(&self) -> Point2<f64> {
        Point2::from(self.pose.translation.vector)
    }

    pub fn world_to_local(&self, p: &Point2<f64>) -> Point2<f64> {
        self.pose.inverse_transform_point(p)
    }

    pub fn local_to_world(&self, p: &Point2<f64>) -> Point2<f64> {
        self.pose.transform_point(p)
    }

    /// Local bearing of a world-space point.
    pub fn local_angle_of(&self, p: &Point2<f64>) -> f64 {
        let local: Vector2<f64> = self.world_to_local(p).coords;
        local.y.atan2(local.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_points_follow_pose() {
        let frame = ScanFrame::from_polar(
            7,
            Point2::new(1.0, 0.0),
            FRAC_PI_2,
            &[0.0, FRAC_PI_2],
            &[2.0, 3.0],
        );
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.frame_id(), 7);
        // Local +x points along world +y
        assert_relative_eq!(frame.point(0).x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(frame.point(0).y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(frame.point(1).x, -2.0, epsilon = 1e-12);
        assert_relative_eq!(frame.point(1).y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_local_round_trip() {
        let frame = ScanFrame::from_polar(1, Point2::new(0.5, -0.5), 0.3, &[], &[]);
        let p = Point2::new(2.0, 1.0);
        let back = frame.local_to_world(&frame.world_to_local(&p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
        assert_relative_eq!(frame.origin().x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_local_angle_matches_sample_angle() {
        let frame = ScanFrame::from_polar(1, Point2::origin(), 1.0, &[0.4], &[3.0]);
        assert_relative_eq!(frame.local_angle_of(&frame.point(0)), 0.4, epsilon = 1e-12);
    }
}
