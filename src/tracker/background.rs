//! Per-bin statistical model of the static environment.

use serde::Serialize;
use tracing::{trace, warn};

use crate::tracker::assignment::PointLabel;
use crate::tracker::config::TrackerConfig;
use crate::tracker::scan::ScanFrame;
use crate::tracker::stats::normal_log_pdf;

/// Running range statistics for one angular bin.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BinStats {
    pub mean: f64,
    pub var: f64,
    /// Number of updates folded into this bin
    pub count: u32,
}

/// Background model with one bin per scan sample index.
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundModel {
    bins: Vec<BinStats>,
    sensor_sigma: f64,
    update_tc: f64,
    unknown_like: f64,
    floor_like: f64,
}

impl BackgroundModel {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            bins: Vec::new(),
            sensor_sigma: config.sensor_sigma,
            update_tc: config.bg_update_tc,
            unknown_like: config.unknown_bg_like,
            floor_like: config.random_point_like(),
        }
    }

    pub fn bins(&self) -> &[BinStats] {
        &self.bins
    }

    /// Log-likelihood of each sample of `frame` being background.
    ///
    /// Bins never observed score the configured "unknown" value.
    pub fn score(&self, frame: &ScanFrame) -> Vec<f64> {
        frame
            .ranges()
            .iter()
            .enumerate()
            .map(|(i, &r)| match self.bins.get(i) {
                Some(bin) if bin.count > 0 => {
                    let sigma = (bin.var + self.sensor_sigma * self.sensor_sigma).sqrt();
                    normal_log_pdf(r, bin.mean, sigma).max(self.floor_like)
                }
                _ => self.unknown_like,
            })
            .collect()
    }

    /// Fold the ranges of `frame` into the model.
    ///
    /// With `use_all_points` every sample is used regardless of its label.
    /// Otherwise only samples labelled [`PointLabel::Background`] are used.
    pub fn update(&mut self, frame: &ScanFrame, labels: &[PointLabel], use_all_points: bool) {
        if self.bins.len() != frame.len() {
            if !self.bins.is_empty() {
                warn!(
                    old = self.bins.len(),
                    new = frame.len(),
                    "Scan size changed, restarting background model"
                );
            }
            self.bins = vec![BinStats::default(); frame.len()];
        }

        if use_all_points {
            // Degenerate scene: too few points look like background (e.g. the
            // sensor was moved). Relearn from everything so the model recovers.
            for (i, &r) in frame.ranges().iter().enumerate() {
                self.fold(i, r);
            }
        } else {
            for (i, &r) in frame.ranges().iter().enumerate() {
                if labels.get(i) == Some(&PointLabel::Background) {
                    self.fold(i, r);
                }
            }
        }
        trace!(use_all_points, "Background updated");
    }

    fn fold(&mut self, i: usize, range: f64) {
        if !range.is_finite() {
            return;
        }
        let bin = &mut self.bins[i];
        bin.count = bin.count.saturating_add(1);
        let alpha = (1.0 / bin.count as f64).max(1.0 / self.update_tc);
        let delta = range - bin.mean;
        bin.mean += alpha * delta;
        bin.var = (1.0 - alpha) * (bin.var + alpha * delta * delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn frame(ranges: &[f64]) -> ScanFrame {
        let angles: Vec<f64> = (0..ranges.len()).map(|i| i as f64 * 0.01).collect();
        ScanFrame::from_polar(1, Point2::origin(), 0.0, &angles, ranges)
    }

    #[test]
    fn test_unknown_bins_use_sentinel() {
        let config = TrackerConfig::default();
        let bg = BackgroundModel::new(&config);
        let like = bg.score(&frame(&[1.0, 2.0]));
        assert_eq!(like, vec![config.unknown_bg_like; 2]);
    }

    #[test]
    fn test_learns_mean_range() {
        let config = TrackerConfig::default();
        let mut bg = BackgroundModel::new(&config);
        let f = frame(&[4.0, 5.0]);
        for _ in 0..10 {
            bg.update(&f, &[PointLabel::Background; 2], false);
        }
        assert_relative_eq!(bg.bins()[0].mean, 4.0, epsilon = 1e-12);
        assert_relative_eq!(bg.bins()[1].mean, 5.0, epsilon = 1e-12);
        assert_eq!(bg.bins()[0].count, 10);

        let like = bg.score(&frame(&[4.0, 2.0]));
        let peak = normal_log_pdf(0.0, 0.0, config.sensor_sigma);
        assert_relative_eq!(like[0], peak, epsilon = 1e-9);
        // A return well in front of the background hits the floor
        assert_relative_eq!(like[1], config.random_point_like());
    }

    #[test]
    fn test_only_background_points_update_normally() {
        let config = TrackerConfig::default();
        let mut bg = BackgroundModel::new(&config);
        bg.update(&frame(&[5.0, 5.0]), &[PointLabel::Background; 2], false);
        bg.update(
            &frame(&[1.0, 1.0]),
            &[PointLabel::Background, PointLabel::Entry],
            false,
        );
        assert_eq!(bg.bins()[0].count, 2);
        assert_eq!(bg.bins()[1].count, 1);
        assert_relative_eq!(bg.bins()[1].mean, 5.0);
    }

    #[test]
    fn test_use_all_points_ignores_labels() {
        let config = TrackerConfig::default();
        let mut bg = BackgroundModel::new(&config);
        bg.update(&frame(&[5.0, 5.0]), &[PointLabel::Entry; 2], true);
        assert_eq!(bg.bins()[0].count, 1);
        assert_eq!(bg.bins()[1].count, 1);
    }

    #[test]
    fn test_resize_restarts_model() {
        let config = TrackerConfig::default();
        let mut bg = BackgroundModel::new(&config);
        bg.update(&frame(&[5.0, 5.0]), &[PointLabel::Background; 2], false);
        bg.update(&frame(&[3.0, 3.0, 3.0]), &[PointLabel::Background; 3], false);
        assert_eq!(bg.bins().len(), 3);
        assert_eq!(bg.bins()[0].count, 1);
        assert_relative_eq!(bg.bins()[0].mean, 3.0);
    }
}
