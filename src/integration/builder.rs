//! Builder for creating ScanFrame objects from raw polar samples.

use nalgebra::Point2;

use crate::tracker::ScanFrame;

/// Builder for creating `ScanFrame` objects from device output.
#[derive(Debug, Clone)]
pub struct ScanFrameBuilder {
    frame_id: u32,
    origin: Point2<f64>,
    heading: f64,
    angles: Vec<f64>,
    ranges: Vec<f64>,
    max_range: Option<f64>,
}

impl Default for ScanFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanFrameBuilder {
    /// Create a new builder for a sensor at the world origin facing +x.
    pub fn new() -> Self {
        Self {
            frame_id: 0,
            origin: Point2::origin(),
            heading: 0.0,
            angles: Vec::new(),
            ranges: Vec::new(),
            max_range: None,
        }
    }

    pub fn frame_id(mut self, frame_id: u32) -> Self {
        self.frame_id = frame_id;
        self
    }

    /// Set the sensor position in world coordinates.
    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin = Point2::new(x, y);
        self
    }

    /// Set the sensor heading in radians from the world x axis.
    pub fn heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    /// Samples taken at `start + i * step` radians.
    pub fn uniform(mut self, start: f64, step: f64, ranges: Vec<f64>) -> Self {
        self.angles = (0..ranges.len()).map(|i| start + i as f64 * step).collect();
        self.ranges = ranges;
        self
    }

    /// Samples at explicit sensor-local angles.
    pub fn polar(mut self, angles: Vec<f64>, ranges: Vec<f64>) -> Self {
        self.angles = angles;
        self.ranges = ranges;
        self
    }

    /// Replace dropouts (non-finite or non-positive ranges) with `max_range`.
    pub fn max_range(mut self, max_range: f64) -> Self {
        self.max_range = Some(max_range);
        self
    }

    /// Build the final `ScanFrame`.
    pub fn build(mut self) -> ScanFrame {
        if let Some(max_range) = self.max_range {
            for r in &mut self.ranges {
                if !(r.is_finite() && *r > 0.0) {
                    *r = max_range;
                }
            }
        }
        ScanFrame::from_polar(
            self.frame_id,
            self.origin,
            self.heading,
            &self.angles,
            &self.ranges,
        )
    }
}
