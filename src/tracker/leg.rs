//! Single leg estimate and its grid-search likelihood update.

use nalgebra::{Point2, Vector2};
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, trace};

use crate::tracker::config::TrackerConfig;
use crate::tracker::error::{Result, TrackerError};
use crate::tracker::geometry::{BoundingBox, segment_to_point, unwrap_angle};
use crate::tracker::scan::ScanFrame;
use crate::tracker::stats::{
    LookupTable, clear_path_log_like, edge_log_density, normal_log_pdf, normal_sf, rice_log_pdf,
};

const MAX_PRIOR_POSITIONS: usize = 1000;
const TRIMMED_PRIOR_POSITIONS: usize = 500;

// Prediction error model: sigma = base + gain * |predicted step|
const PREDICT_SIGMA_BASE: f64 = 0.007;
const PREDICT_SIGMA_GAIN: f64 = 0.08;

/// Leg separation prior of the owning person.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeparationPrior {
    pub sep: f64,
    pub sigma: f64,
}

/// The part of the sibling leg's state the estimator uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiblingLeg {
    pub position: Point2<f64>,
    pub posvar: f64,
}

/// Result of [`Leg::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegUpdate {
    /// Position and variance were re-estimated.
    Updated,
    /// The best grid cell scored below the update floor; the prior estimate
    /// was kept.
    LowConfidence,
}

/// Log-likelihood surface evaluated over a leg's search box.
///
/// `values[[ix, iy]]` is the score of the cell at
/// `bounds.min + (ix * step.x, iy * step.y)`.
#[derive(Debug, Clone, Serialize)]
pub struct LikelihoodGrid {
    pub bounds: BoundingBox,
    pub values: Array2<f64>,
}

impl LikelihoodGrid {
    pub fn cell_center(&self, ix: usize, iy: usize) -> Point2<f64> {
        let (nx, ny) = self.values.dim();
        let step = self.bounds.grid_step(nx, ny);
        Point2::new(
            self.bounds.min.x + ix as f64 * step.x,
            self.bounds.min.y + iy as f64 * step.y,
        )
    }

    /// Index and value of the best cell. Ties keep the first cell in
    /// row-major order.
    pub fn argmax(&self) -> Option<((usize, usize), f64)> {
        self.values
            .indexed_iter()
            .fold(None, |best, (idx, &v)| match best {
                Some((_, b)) if !(v > b) => best,
                _ => Some((idx, v)),
            })
    }
}

/// One of a person's two legs.
#[derive(Debug, Clone, Serialize)]
pub struct Leg {
    pub position: Point2<f64>,
    /// Position after the last prediction, before measurements were applied
    pub predicted_position: Point2<f64>,
    pub posvar: f64,
    pub prev_posvar: f64,
    pub diameter: f64,
    pub diameter_sigma: f64,
    /// Velocity in metres per second
    pub velocity: Vector2<f64>,
    prior_positions: Vec<Point2<f64>>,
    pub consecutive_invisible: u32,
    /// Cleared by `predict`, rebuilt by `update`
    pub grid: Option<LikelihoodGrid>,
    /// Best grid score of this frame's update, NaN until one runs
    pub max_like: f64,
    /// Scan indices used by the last update
    pub scan_points: Vec<usize>,
}

impl Leg {
    pub fn new(position: Point2<f64>, config: &TrackerConfig) -> Self {
        Self {
            position,
            predicted_position: position,
            posvar: config.initial_position_var,
            prev_posvar: config.initial_position_var,
            diameter: config.initial_leg_diameter,
            diameter_sigma: config.leg_diameter_sigma,
            velocity: Vector2::zeros(),
            prior_positions: vec![position],
            consecutive_invisible: 0,
            grid: None,
            max_like: f64::NAN,
            scan_points: Vec::new(),
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn sibling_view(&self) -> SiblingLeg {
        SiblingLeg {
            position: self.position,
            posvar: self.posvar,
        }
    }

    pub fn prior_positions(&self) -> &[Point2<f64>] {
        &self.prior_positions
    }

    /// The `n`th most recent recorded position (`n >= 1`). Older requests
    /// than the history holds return the oldest entry.
    pub fn prior_position(&self, n: usize) -> Point2<f64> {
        debug_assert!(n > 0);
        let len = self.prior_positions.len();
        if n > len {
            return self.prior_positions.first().copied().unwrap_or(self.position);
        }
        self.prior_positions[len - n]
    }

    /// Change between the `n`th and `n+1`th most recent positions.
    pub fn prior_delta(&self, n: usize) -> Vector2<f64> {
        debug_assert!(n > 0);
        let len = self.prior_positions.len();
        if n + 1 > len {
            return Vector2::zeros();
        }
        self.prior_positions[len - n] - self.prior_positions[len - n - 1]
    }

    pub fn save_prior_position(&mut self) {
        self.prior_positions.push(self.position);
        if self.prior_positions.len() > MAX_PRIOR_POSITIONS {
            let excess = self.prior_positions.len() - TRIMMED_PRIOR_POSITIONS;
            self.prior_positions.drain(..excess);
        }
    }

    fn clear_frame_state(&mut self) {
        self.grid = None;
        self.scan_points.clear();
        self.max_like = f64::NAN;
    }

    /// Advance the estimate by `nsteps` frames.
    ///
    /// The new position is a weighted sum of this leg's and the sibling's
    /// prior positions. With `nsteps == 0` position and variance are left
    /// untouched.
    pub fn predict(&mut self, sibling: &Leg, nsteps: u32, config: &TrackerConfig) {
        self.clear_frame_state();
        if nsteps == 0 {
            return;
        }

        let weights = &config.prediction;
        let mut sum = Vector2::zeros();
        for (i, w) in weights.same().iter().enumerate() {
            sum += self.prior_position(i + 1).coords * *w;
        }
        for (i, w) in weights.other().iter().enumerate() {
            sum += sibling.prior_position(i + 1).coords * *w;
        }
        let predicted = Point2::from(sum);
        let step = (predicted - self.prior_position(1)).norm();
        let rmse = step * PREDICT_SIGMA_GAIN + PREDICT_SIGMA_BASE;
        trace!(step, rmse, "Leg predicted");

        self.position = predicted;
        self.prev_posvar = self.posvar;
        self.posvar = (self.posvar + f64::from(nsteps) * rmse * rmse).min(config.max_position_var);
        self.predicted_position = self.position;
    }

    /// Log-likelihood that an echo at `pt` came from this leg.
    pub fn observation_like(&self, pt: &Point2<f64>, origin: &Point2<f64>, config: &TrackerConfig) -> f64 {
        let delta = pt - self.position;
        let dist = delta.norm();
        let sigma = ((self.diameter_sigma / 2.0).powi(2) + self.posvar).sqrt();
        // Expected echo location is on the leg surface facing the point
        let offset = if dist > 0.0 {
            delta * (self.diameter / 2.0 / dist)
        } else {
            Vector2::zeros()
        };
        let mut like =
            normal_log_pdf(delta.x, offset.x, sigma) + normal_log_pdf(delta.y, offset.y, sigma);
        // The echo should also be in front of the leg centre
        let front = normal_sf(
            (pt - origin).norm(),
            (self.position - origin).norm(),
            self.posvar.sqrt(),
        );
        like += front.ln();
        like.max(config.random_point_like())
    }

    /// Region searched by the likelihood grid.
    pub fn search_box(&self) -> BoundingBox {
        BoundingBox::around(self.position, 3.0 * self.posvar.sqrt() + self.diameter / 2.0)
    }

    /// Re-estimate position and variance from the scan.
    ///
    /// `scan_points` are the indices assigned to this leg. The sibling is
    /// `None` when no usable estimate of the other leg exists yet.
    pub fn update(
        &mut self,
        frame: &ScanFrame,
        bglike: &[f64],
        scan_points: &[usize],
        prior: SeparationPrior,
        sibling: Option<SiblingLeg>,
        config: &TrackerConfig,
    ) -> Result<LegUpdate> {
        self.scan_points = scan_points.to_vec();

        let grid = self.build_grid(frame, bglike, prior, sibling, config);
        let Some(((mx, my), max_like)) = grid.argmax() else {
            return Err(TrackerError::invariant("Leg::update", "empty likelihood grid"));
        };
        if !max_like.is_finite() {
            return Err(TrackerError::invariant(
                "Leg::update",
                format!("non-finite grid maximum {max_like}"),
            ));
        }
        let mle = grid.cell_center(mx, my);
        self.max_like = max_like;

        if max_like < config.min_like_for_updates {
            debug!(
                mle_x = mle.x,
                mle_y = mle.y,
                max_like,
                "Unlikely leg placement, keeping prior estimate"
            );
            self.grid = Some(grid);
            return Ok(LegUpdate::LowConfidence);
        }

        // Probability-weighted mean over cells near the maximum
        let mut sum = Vector2::zeros();
        let mut tprob = 0.0;
        for ((ix, iy), &v) in grid.values.indexed_iter() {
            let Some(prob) = cell_weight(v, max_like, config.likelihood_window)? else {
                continue;
            };
            sum += grid.cell_center(ix, iy).coords * prob;
            tprob += prob;
        }
        if !(tprob > 0.0) {
            return Err(TrackerError::invariant(
                "Leg::update",
                format!("total probability {tprob} over grid"),
            ));
        }
        let mean = Point2::from(sum / tprob);

        if self.speed() <= config.stationary_velocity {
            // Not moving: creep toward the estimate to suppress jitter
            self.position += (mean - self.position) * config.stationary_fraction;
        } else {
            self.position = mean;
        }

        let mut var = 0.0;
        for ((ix, iy), &v) in grid.values.indexed_iter() {
            let Some(prob) = cell_weight(v, max_like, config.likelihood_window)? else {
                continue;
            };
            var += prob * (grid.cell_center(ix, iy) - self.position).norm_squared();
        }
        let floor = config.sensor_sigma * config.sensor_sigma;
        self.posvar = (var / tprob).clamp(floor, config.max_position_var);

        trace!(
            x = self.position.x,
            y = self.position.y,
            sigma = self.posvar.sqrt(),
            max_like,
            "Leg updated"
        );
        self.grid = Some(grid);

        if config.update_diameter {
            self.update_diameter_estimate(&frame.origin(), config);
        }
        Ok(LegUpdate::Updated)
    }

    fn build_grid(
        &self,
        frame: &ScanFrame,
        bglike: &[f64],
        prior: SeparationPrior,
        sibling: Option<SiblingLeg>,
        config: &TrackerConfig,
    ) -> LikelihoodGrid {
        let bounds = self.search_box();
        let n = config.grid_resolution;
        let step = bounds.grid_step(n, n);
        let floor = config.random_point_like();

        // Leg diameter is log-normal
        let log_mu = self.diameter.ln();
        let log_sigma = (1.0 + self.diameter_sigma / self.diameter).ln();

        let origin = frame.origin();
        let clear: Vec<Point2<f64>> = self
            .clear_paths(frame, &bounds)
            .into_iter()
            .map(|i| frame.point(i))
            .collect();
        let hits: Vec<(Point2<f64>, f64)> = self
            .scan_points
            .iter()
            .map(|&f| (frame.point(f), bglike[f]))
            .collect();

        let max_sep = 2.0 * config.max_leg_sep;
        let sep_sigma = sibling.map(|s| (s.posvar + prior.sigma * prior.sigma).sqrt());
        let sep_table = match (sibling, sep_sigma) {
            (Some(s), Some(sigma)) if s.posvar.sqrt() > prior.sep + prior.sigma => {
                trace!(sibling_sigma = s.posvar.sqrt(), "Using tabulated separation likelihood");
                Some(LookupTable::tabulate(
                    0.0,
                    max_sep,
                    config.sep_table_size,
                    floor,
                    |d| rice_log_pdf(d, prior.sep, sigma),
                ))
            }
            _ => None,
        };

        let position = self.position;
        let diameter = self.diameter;
        let apriori_sigma = (self.posvar + config.sensor_sigma * config.sensor_sigma).sqrt();

        let values = Array2::from_shape_fn((n, n), |(ix, iy)| {
            let pt = Point2::new(
                bounds.min.x + ix as f64 * step.x,
                bounds.min.y + iy as f64 * step.y,
            );

            let delta = position - pt;
            let apriori =
                normal_log_pdf(delta.x, 0.0, apriori_sigma) + normal_log_pdf(delta.y, 0.0, apriori_sigma);

            // The leg cannot sit on an unobstructed ray
            let clear_like = if clear.is_empty() {
                0.0
            } else {
                let dclr = clear
                    .iter()
                    .map(|end| segment_to_point(&origin, end, &pt))
                    .fold(f64::INFINITY, f64::min);
                clear_path_log_like(dclr, log_mu, log_sigma)
            };

            // Each hit is explained by the background or by this leg,
            // whichever is more probable
            let hit_like: f64 = hits
                .iter()
                .map(|(p, bg)| bg.max(edge_log_density((p - pt).norm(), log_mu, log_sigma, diameter)))
                .sum();

            let sep_like = match (sibling, sep_sigma) {
                (Some(s), Some(sigma)) => {
                    let d = (s.position - pt).norm();
                    if d > max_sep {
                        floor
                    } else if let Some(table) = &sep_table {
                        table.lookup(d)
                    } else {
                        rice_log_pdf(d, prior.sep, sigma)
                    }
                }
                _ => 0.0,
            };

            (apriori + clear_like + hit_like + sep_like).max(floor)
        });

        LikelihoodGrid { bounds, values }
    }

    /// Scan indices whose rays cross the angular window of `bounds` and
    /// reach at least its near edge, excluding this leg's own hits.
    fn clear_paths(&self, frame: &ScanFrame, bounds: &BoundingBox) -> Vec<usize> {
        let mut theta = bounds.corners().map(|c| frame.local_angle_of(&c));
        for k in 1..4 {
            theta[k] = unwrap_angle(theta[k], theta[0]);
        }
        let min_theta = theta.iter().copied().fold(f64::INFINITY, f64::min);
        let max_theta = theta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let near = bounds.distance_to(&frame.origin());

        (0..frame.len())
            .filter(|i| {
                let angle = unwrap_angle(frame.angle(*i), theta[0]);
                angle >= min_theta
                    && angle <= max_theta
                    && frame.range(*i) >= near
                    && !self.scan_points.contains(i)
            })
            .collect()
    }

    /// Exponential average of the last position change, capped in speed.
    pub fn update_velocity(&mut self, nsteps: u32, config: &TrackerConfig) {
        let tc = config.vel_update_tc;
        let per_frame = self.prior_delta(1) / f64::from(nsteps.max(1));
        self.velocity = self.velocity * (1.0 - 1.0 / tc) + per_frame * (config.frame_rate / tc);
        let speed = self.velocity.norm();
        if speed > config.max_leg_speed {
            self.velocity *= config.max_leg_speed / speed;
        }
    }

    /// Update the invisible counter from the last update. Returns whether
    /// the leg counts as visible this frame.
    pub fn update_visibility(&mut self, bglike: &[f64], config: &TrackerConfig) -> bool {
        let confident = self.max_like >= config.min_like_for_updates;
        let visible = confident
            && self
                .scan_points
                .iter()
                .any(|&f| bglike[f] < self.max_like - config.max_bg_like_for_visible);
        if visible {
            self.consecutive_invisible = 0;
        } else {
            trace!(
                max_like = self.max_like,
                npoints = self.scan_points.len(),
                "Leg marked invisible"
            );
            self.consecutive_invisible += 1;
        }
        visible
    }

    /// If the measurement pulled the leg away from the sensor relative to
    /// the prediction, the assumed diameter was too large, and vice versa.
    fn update_diameter_estimate(&mut self, origin: &Point2<f64>, config: &TrackerConfig) {
        let view = self.position - origin;
        let range = view.norm();
        if range == 0.0 {
            return;
        }
        let scan_error = (view / range).dot(&(self.predicted_position - self.position));
        let estimate =
            (self.diameter + scan_error).clamp(config.min_leg_diameter, config.max_leg_diameter);
        let tc = config.leg_diameter_tc;
        self.diameter = (self.diameter * (1.0 - 1.0 / tc) + estimate / tc)
            .clamp(config.min_leg_diameter, config.max_leg_diameter);
        trace!(scan_error, diameter = self.diameter, "Leg diameter updated");
    }
}

/// Weight of a grid cell relative to the maximum, or `None` when it falls
/// outside the likelihood window.
fn cell_weight(value: f64, max_like: f64, window: f64) -> Result<Option<f64>> {
    if value - max_like < -window {
        return Ok(None);
    }
    let prob = (value - max_like).exp();
    if !(prob > 0.0) || !prob.is_finite() {
        return Err(TrackerError::invariant(
            "Leg::update",
            format!("cell weight {prob} from score {value} (max {max_like})"),
        ));
    }
    Ok(Some(prob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    /// Sensor at the origin looking along +y with a wall at `wall` metres
    /// and a round leg of diameter `diam` at `leg`.
    fn scan_with_leg(leg: Point2<f64>, diam: f64, wall: f64) -> ScanFrame {
        let n = 361;
        let angles: Vec<f64> = (0..n).map(|i| i as f64 * PI / (n - 1) as f64).collect();
        let ranges: Vec<f64> = angles
            .iter()
            .map(|&a| {
                let dir = Vector2::new(a.cos(), a.sin());
                let proj = leg.coords.dot(&dir);
                let miss2 = leg.coords.norm_squared() - proj * proj;
                let r2 = (diam / 2.0).powi(2);
                if proj > 0.0 && miss2 <= r2 {
                    proj - (r2 - miss2).sqrt()
                } else {
                    wall
                }
            })
            .collect();
        ScanFrame::from_polar(1, Point2::origin(), 0.0, &angles, &ranges)
    }

    fn leg_points(frame: &ScanFrame, wall: f64) -> Vec<usize> {
        (0..frame.len()).filter(|&i| frame.range(i) < wall - 0.01).collect()
    }

    fn foreground_bglike(frame: &ScanFrame, config: &TrackerConfig) -> Vec<f64> {
        vec![config.random_point_like(); frame.len()]
    }

    fn prior(config: &TrackerConfig) -> SeparationPrior {
        SeparationPrior {
            sep: config.mean_leg_sep,
            sigma: config.leg_sep_sigma,
        }
    }

    #[test]
    fn test_new_leg_state() {
        let config = TrackerConfig::default();
        let leg = Leg::new(Point2::new(1.0, 2.0), &config);
        assert_eq!(leg.posvar, config.initial_position_var);
        assert!(leg.max_like.is_nan());
        assert_eq!(leg.prior_positions().len(), 1);
        assert_eq!(leg.consecutive_invisible, 0);
    }

    #[test]
    fn test_zero_step_predict_is_noop() {
        let config = TrackerConfig::default();
        let mut leg = Leg::new(Point2::new(1.0, 2.0), &config);
        let sibling = Leg::new(Point2::new(1.3, 2.0), &config);
        leg.position = Point2::new(1.05, 2.02);
        leg.posvar = 0.02;
        leg.predict(&sibling, 0, &config);
        assert_eq!(leg.position, Point2::new(1.05, 2.02));
        assert_eq!(leg.posvar, 0.02);
        assert!(leg.grid.is_none());
    }

    #[test]
    fn test_predict_grows_variance_and_respects_ceiling() {
        let mut config = TrackerConfig::default();
        config.prediction = crate::tracker::config::PredictionWeights::zero_order_hold();
        let mut leg = Leg::new(Point2::new(1.0, 2.0), &config);
        let sibling = Leg::new(Point2::new(1.3, 2.0), &config);
        leg.predict(&sibling, 1, &config);
        assert_eq!(leg.position, Point2::new(1.0, 2.0));
        let expected = config.initial_position_var + PREDICT_SIGMA_BASE * PREDICT_SIGMA_BASE;
        assert_relative_eq!(leg.posvar, expected, epsilon = 1e-15);

        for _ in 0..100_000 {
            leg.predict(&sibling, 10, &config);
        }
        assert!(leg.posvar <= config.max_position_var);
    }

    #[test]
    fn test_prior_history_is_trimmed() {
        let config = TrackerConfig::default();
        let mut leg = Leg::new(Point2::origin(), &config);
        for i in 0..MAX_PRIOR_POSITIONS {
            leg.position = Point2::new(i as f64, 0.0);
            leg.save_prior_position();
        }
        assert_eq!(leg.prior_positions().len(), TRIMMED_PRIOR_POSITIONS);
        assert_eq!(leg.prior_position(1), Point2::new((MAX_PRIOR_POSITIONS - 1) as f64, 0.0));
        assert_relative_eq!(leg.prior_delta(1).x, 1.0);
    }

    #[test]
    fn test_observation_like_prefers_leg_surface() {
        let config = TrackerConfig::default();
        let leg = Leg::new(Point2::new(0.0, 2.0), &config);
        let origin = Point2::origin();
        let on_surface = leg.observation_like(&Point2::new(0.0, 1.925), &origin, &config);
        let far = leg.observation_like(&Point2::new(1.0, 2.0), &origin, &config);
        assert!(on_surface > far);
        assert!(on_surface > 0.0);
        // Far-away points hit the floor
        let distant = leg.observation_like(&Point2::new(3.0, 4.0), &origin, &config);
        assert_relative_eq!(distant, config.random_point_like());
    }

    #[test]
    fn test_update_moves_toward_observed_leg() {
        let config = TrackerConfig::default();
        let truth = Point2::new(0.0, 2.5);
        let frame = scan_with_leg(truth, config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        assert!(points.len() >= 3);
        let bglike = foreground_bglike(&frame, &config);

        let mut leg = Leg::new(Point2::new(0.05, 2.55), &config);
        // Moving legs adopt the estimate directly
        leg.velocity = Vector2::new(1.0, 0.0);
        let outcome = leg
            .update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();
        assert_eq!(outcome, LegUpdate::Updated);
        assert!((leg.position - truth).norm() < 0.03, "position {:?}", leg.position);
        assert!(leg.posvar >= config.sensor_sigma.powi(2));
        assert!(leg.posvar <= config.max_position_var);
        assert!(leg.max_like.is_finite());
        assert!(leg.grid.is_some());
    }

    #[test]
    fn test_stationary_leg_moves_a_fraction() {
        let config = TrackerConfig::default();
        let truth = Point2::new(0.0, 2.5);
        let frame = scan_with_leg(truth, config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        let bglike = foreground_bglike(&frame, &config);

        let start = Point2::new(0.05, 2.5);
        let mut moving = Leg::new(start, &config);
        moving.velocity = Vector2::new(1.0, 0.0);
        moving
            .update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();

        let mut still = Leg::new(start, &config);
        still
            .update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();

        let expected = start + (moving.position - start) * config.stationary_fraction;
        assert_relative_eq!(still.position.x, expected.x, epsilon = 1e-9);
        assert_relative_eq!(still.position.y, expected.y, epsilon = 1e-9);
    }

    #[test]
    fn test_update_is_deterministic() {
        let config = TrackerConfig::default();
        let frame = scan_with_leg(Point2::new(0.2, 3.0), config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        let bglike = foreground_bglike(&frame, &config);
        let sibling = SiblingLeg {
            position: Point2::new(-0.1, 3.0),
            posvar: 0.01,
        };

        let start = Leg::new(Point2::new(0.22, 3.03), &config);
        let run = || {
            let mut leg = start.clone();
            leg.update(&frame, &bglike, &points, prior(&config), Some(sibling), &config)
                .unwrap();
            leg
        };
        let a = run();
        let b = run();
        assert_eq!(a.position.x.to_bits(), b.position.x.to_bits());
        assert_eq!(a.position.y.to_bits(), b.position.y.to_bits());
        assert_eq!(a.posvar.to_bits(), b.posvar.to_bits());
        assert_eq!(a.max_like.to_bits(), b.max_like.to_bits());
    }

    #[test]
    fn test_low_confidence_keeps_prior() {
        let mut config = TrackerConfig::default();
        config.min_like_for_updates = 1e6;
        config.random_point_prob = 1e-300;
        let frame = scan_with_leg(Point2::new(0.0, 2.5), config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        let bglike = foreground_bglike(&frame, &config);

        let mut leg = Leg::new(Point2::new(0.05, 2.55), &config);
        let before = (leg.position, leg.posvar);
        let outcome = leg
            .update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();
        assert_eq!(outcome, LegUpdate::LowConfidence);
        assert_eq!((leg.position, leg.posvar), before);
        assert!(!leg.update_visibility(&bglike, &config));
        assert_eq!(leg.consecutive_invisible, 1);
    }

    #[test]
    fn test_tabulated_separation_used_for_vague_sibling() {
        let config = TrackerConfig::default();
        let frame = scan_with_leg(Point2::new(0.0, 2.5), config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        let bglike = foreground_bglike(&frame, &config);
        let vague = SiblingLeg {
            position: Point2::new(0.3, 2.5),
            posvar: 0.9,
        };
        let mut leg = Leg::new(Point2::new(0.02, 2.52), &config);
        leg.velocity = Vector2::new(1.0, 0.0);
        let outcome = leg
            .update(&frame, &bglike, &points, prior(&config), Some(vague), &config)
            .unwrap();
        assert_eq!(outcome, LegUpdate::Updated);
        assert!((leg.position - Point2::new(0.0, 2.5)).norm() < 0.05);
    }

    #[test]
    fn test_visibility_requires_foreground_hit() {
        let config = TrackerConfig::default();
        let frame = scan_with_leg(Point2::new(0.0, 2.5), config.initial_leg_diameter, 5.0);
        let points = leg_points(&frame, 5.0);
        let mut leg = Leg::new(Point2::new(0.0, 2.5), &config);
        let bglike = foreground_bglike(&frame, &config);
        leg.update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();
        assert!(leg.update_visibility(&bglike, &config));
        assert_eq!(leg.consecutive_invisible, 0);

        // Every hit explained better by the background
        let background = vec![1e6; frame.len()];
        assert!(!leg.update_visibility(&background, &config));
        assert_eq!(leg.consecutive_invisible, 1);
    }

    #[test]
    fn test_velocity_tracks_motion() {
        let config = TrackerConfig::default();
        let mut leg = Leg::new(Point2::origin(), &config);
        for i in 1..200 {
            leg.position = Point2::new(i as f64 * 0.01, 0.0);
            leg.save_prior_position();
            leg.update_velocity(1, &config);
        }
        // 1 cm per frame at 50 frames per second
        assert_relative_eq!(leg.velocity.x, 0.5, epsilon = 1e-3);
        assert_relative_eq!(leg.velocity.y, 0.0);
    }

    #[test]
    fn test_velocity_capped() {
        let config = TrackerConfig::default();
        let mut leg = Leg::new(Point2::origin(), &config);
        leg.position = Point2::new(10.0, 0.0);
        leg.save_prior_position();
        leg.update_velocity(1, &config);
        assert_relative_eq!(leg.speed(), config.max_leg_speed, epsilon = 1e-12);
    }

    #[test]
    fn test_diameter_update_disabled_by_default() {
        let config = TrackerConfig::default();
        let frame = scan_with_leg(Point2::new(0.0, 2.5), 0.25, 5.0);
        let points = leg_points(&frame, 5.0);
        let bglike = foreground_bglike(&frame, &config);
        let mut leg = Leg::new(Point2::new(0.0, 2.5), &config);
        leg.update(&frame, &bglike, &points, prior(&config), None, &config)
            .unwrap();
        assert_eq!(leg.diameter, config.initial_leg_diameter);
    }

    #[test]
    fn test_diameter_update_stays_bounded() {
        let mut config = TrackerConfig::default();
        config.update_diameter = true;
        config.leg_diameter_tc = 1.0;
        let mut leg = Leg::new(Point2::new(0.0, 2.0), &config);
        leg.predicted_position = Point2::new(0.0, 10.0);
        leg.update_diameter_estimate(&Point2::origin(), &config);
        assert_relative_eq!(leg.diameter, config.max_leg_diameter);
    }
}
