//! Person track: a pair of legs with a stable identity.

use nalgebra::{Point2, Vector2};
use serde::Serialize;
use tracing::trace;

use crate::tracker::config::TrackerConfig;
use crate::tracker::error::Result;
use crate::tracker::leg::{Leg, LegUpdate, SeparationPrior};
use crate::tracker::scan::ScanFrame;
use crate::tracker::track_state::TrackState;

/// Running estimate of the distance between a person's legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegStats {
    pub sep: f64,
    pub sep_sigma: f64,
}

impl LegStats {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            sep: config.mean_leg_sep,
            sep_sigma: config.leg_sep_sigma,
        }
    }

    fn observe(&mut self, dist: f64, config: &TrackerConfig) {
        let tc = config.leg_sep_tc;
        self.sep = (self.sep * (1.0 - 1.0 / tc) + dist / tc).clamp(self.sep_sigma, config.max_leg_sep);
    }

    pub fn prior(&self) -> SeparationPrior {
        SeparationPrior {
            sep: self.sep,
            sigma: self.sep_sigma,
        }
    }
}

/// A tracked person.
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    id: u64,
    channel: u32,
    legs: [Leg; 2],
    leg_stats: LegStats,
    /// Number of updates applied
    age: u32,
    consecutive_invisible: u32,
    total_visible: u32,
    state: TrackState,
}

impl Person {
    pub fn new(
        id: u64,
        channel: u32,
        first: Point2<f64>,
        second: Point2<f64>,
        config: &TrackerConfig,
    ) -> Self {
        Self {
            id,
            channel,
            legs: [Leg::new(first, config), Leg::new(second, config)],
            leg_stats: LegStats::new(config),
            age: 0,
            consecutive_invisible: 0,
            total_visible: 0,
            state: TrackState::New,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn channel(&self) -> u32 {
        self.channel
    }

    #[inline]
    pub fn legs(&self) -> &[Leg; 2] {
        &self.legs
    }

    #[inline]
    pub fn leg(&self, i: usize) -> &Leg {
        &self.legs[i]
    }

    #[inline]
    pub fn leg_stats(&self) -> &LegStats {
        &self.leg_stats
    }

    #[inline]
    pub fn age(&self) -> u32 {
        self.age
    }

    #[inline]
    pub fn consecutive_invisible(&self) -> u32 {
        self.consecutive_invisible
    }

    #[inline]
    pub fn total_visible(&self) -> u32 {
        self.total_visible
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Midpoint of the legs.
    pub fn position(&self) -> Point2<f64> {
        nalgebra::center(&self.legs[0].position, &self.legs[1].position)
    }

    /// Mean of the leg velocities.
    pub fn velocity(&self) -> Vector2<f64> {
        (self.legs[0].velocity + self.legs[1].velocity) / 2.0
    }

    /// Mean leg diameter.
    pub fn diameter(&self) -> f64 {
        (self.legs[0].diameter + self.legs[1].diameter) / 2.0
    }

    /// Current distance between the leg estimates.
    pub fn leg_separation(&self) -> f64 {
        (self.legs[0].position - self.legs[1].position).norm()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_dead(&self, config: &TrackerConfig) -> bool {
        self.consecutive_invisible > config.invisible_for_too_long
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    /// Advance both legs by `nsteps` frames.
    pub fn predict(&mut self, nsteps: u32, config: &TrackerConfig) {
        // Prediction reads only the sibling's history, which predict leaves alone
        let (a, b) = self.legs.split_at_mut(1);
        a[0].predict(&b[0], nsteps, config);
        b[0].predict(&a[0], nsteps, config);
    }

    /// Log-likelihood that `pt` is an echo from leg `leg`.
    pub fn observation_like(
        &self,
        pt: &Point2<f64>,
        leg: usize,
        origin: &Point2<f64>,
        config: &TrackerConfig,
    ) -> f64 {
        self.legs[leg].observation_like(pt, origin, config)
    }

    /// Apply this tick's measurements.
    ///
    /// `points[k]` holds the scan indices assigned to leg `k`. The leg with
    /// more points is estimated first so the other one benefits from its
    /// updated position through the separation term.
    pub fn update(
        &mut self,
        frame: &ScanFrame,
        bglike: &[f64],
        points: &[Vec<usize>; 2],
        nsteps: u32,
        config: &TrackerConfig,
    ) -> Result<[LegUpdate; 2]> {
        let first = if points[1].len() > points[0].len() { 1 } else { 0 };
        let prior = self.leg_stats.prior();
        let mut outcome = [LegUpdate::LowConfidence; 2];

        for leg in [first, 1 - first] {
            // A brand-new person has no usable sibling estimate
            let sibling = (self.age > 0).then(|| self.legs[1 - leg].sibling_view());
            outcome[leg] =
                self.legs[leg].update(frame, bglike, &points[leg], prior, sibling, config)?;
        }

        let mut any_visible = false;
        let mut all_visible = true;
        for leg in &mut self.legs {
            leg.save_prior_position();
            leg.update_velocity(nsteps, config);
            let visible = leg.update_visibility(bglike, config);
            any_visible |= visible;
            all_visible &= visible;
        }

        if all_visible {
            let dist = self.leg_separation();
            self.leg_stats.observe(dist, config);
        }

        self.age += 1;
        if any_visible {
            self.consecutive_invisible = 0;
            self.total_visible += 1;
        } else {
            self.consecutive_invisible += 1;
        }

        self.state = if self.age < config.age_threshold {
            TrackState::New
        } else if any_visible {
            TrackState::Tracked
        } else {
            TrackState::Lost
        };
        trace!(
            id = self.id,
            age = self.age,
            invisible = self.consecutive_invisible,
            state = ?self.state,
            "Person updated"
        );
        Ok(outcome)
    }
}
