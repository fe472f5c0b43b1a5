//! Ray-cast scan simulator shared by the integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;

use legtrack_rs::tracker::{ScanFrame, TrackerConfig};
use nalgebra::{Point2, Vector2};

pub const NUM_RAYS: usize = 361;
pub const WALL_RANGE: f64 = 5.0;
pub const LEG_DIAMETER: f64 = 0.15;

/// Tracker settings with a short background warm-up.
pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        bg_init_frames: 10,
        ..TrackerConfig::default()
    }
}

/// Sensor at the world origin sweeping local angles 0..=PI, i.e. the +y
/// half-plane, with a round wall at `WALL_RANGE`.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub legs: Vec<Point2<f64>>,
}

impl Scene {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One person standing with legs `sep` apart around `center`.
    pub fn person(center: Point2<f64>, sep: f64) -> Self {
        Self {
            legs: person_legs(center, sep).to_vec(),
        }
    }

    pub fn angles() -> Vec<f64> {
        (0..NUM_RAYS).map(|i| i as f64 * PI / (NUM_RAYS - 1) as f64).collect()
    }

    pub fn ranges(&self) -> Vec<f64> {
        Self::angles()
            .iter()
            .map(|&a| {
                let dir = Vector2::new(a.cos(), a.sin());
                self.legs
                    .iter()
                    .filter_map(|c| ray_circle(dir, c, LEG_DIAMETER / 2.0))
                    .fold(WALL_RANGE, f64::min)
            })
            .collect()
    }

    pub fn frame(&self, frame_id: u32) -> ScanFrame {
        ScanFrame::from_polar(frame_id, Point2::origin(), 0.0, &Self::angles(), &self.ranges())
    }
}

pub fn person_legs(center: Point2<f64>, sep: f64) -> [Point2<f64>; 2] {
    [
        Point2::new(center.x - sep / 2.0, center.y),
        Point2::new(center.x + sep / 2.0, center.y),
    ]
}

/// Range at which a ray from the origin along unit `dir` first meets the
/// circle, if it does.
fn ray_circle(dir: Vector2<f64>, center: &Point2<f64>, radius: f64) -> Option<f64> {
    let proj = center.coords.dot(&dir);
    if proj <= 0.0 {
        return None;
    }
    let miss2 = center.coords.norm_squared() - proj * proj;
    let r2 = radius * radius;
    (miss2 <= r2).then(|| proj - (r2 - miss2).sqrt())
}
