//! Tracker configuration.
//!
//! All distances are in metres, times in seconds and rates per second unless a
//! field says otherwise. Every field has a default so a TOML file only needs to
//! name the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tracker::error::{Result, TrackerError};

/// Configuration for the [`World`](crate::tracker::World).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Scan frames per second delivered by the sensor
    pub frame_rate: f64,
    /// Frames used to learn the background before any track may be born
    pub bg_init_frames: u32,
    /// Time constant (frames) of the background running average once converged
    pub bg_update_tc: f64,
    /// Background log-likelihood reported for bins never observed
    pub unknown_bg_like: f64,

    /// Expected number of people entering per minute
    pub entry_rate: f64,
    /// Average number of scan hits produced by a newly entered person
    pub expected_hits_per_entry: f64,
    /// Factor applied to the entry probability after a birth in the same tick
    pub entry_boost: f64,
    /// Minimum number of unassigned points required to create a track
    pub min_create_hits: usize,

    /// Expected distance between the two legs of a person
    pub mean_leg_sep: f64,
    /// Standard deviation of the leg separation prior
    pub leg_sep_sigma: f64,
    /// Largest plausible leg separation
    pub max_leg_sep: f64,
    /// Time constant (frames) of the per-person separation estimate
    pub leg_sep_tc: f64,

    /// Range noise of the sensor (1 sigma)
    pub sensor_sigma: f64,
    /// Position variance given to a newly created leg
    pub initial_position_var: f64,
    /// Ceiling on leg position variance
    pub max_position_var: f64,

    /// Legs slower than this (m/s) are treated as stationary
    pub stationary_velocity: f64,
    /// Fraction of the way a stationary leg moves toward its new estimate
    pub stationary_fraction: f64,
    /// Time constant (frames) of the leg velocity average
    pub vel_update_tc: f64,
    /// Leg speed cap (m/s)
    pub max_leg_speed: f64,

    /// Age (frames) at which a person becomes active and is announced
    pub age_threshold: u32,
    /// A person dies once its invisible count exceeds this many frames
    pub invisible_for_too_long: u32,
    /// A leg stays visible only if one of its hits has background
    /// log-likelihood below `max_like - max_bg_like_for_visible`
    pub max_bg_like_for_visible: f64,

    /// Leg diameter given to new legs
    pub initial_leg_diameter: f64,
    pub min_leg_diameter: f64,
    pub max_leg_diameter: f64,
    /// Prior uncertainty of the leg diameter (1 sigma)
    pub leg_diameter_sigma: f64,
    /// Time constant (frames) of the leg diameter average
    pub leg_diameter_tc: f64,
    /// Re-estimate leg diameters from the prediction error
    pub update_diameter: bool,

    /// Number of grid cells per axis of the leg likelihood grid
    pub grid_resolution: usize,
    /// Grid cells more than this many nats below the maximum are ignored
    pub likelihood_window: f64,
    /// Leg updates whose best log-likelihood is below this are discarded
    pub min_like_for_updates: f64,
    /// Probability floor for any single observation or grid cell
    pub random_point_prob: f64,
    /// Number of entries in the separation lookup table
    pub sep_table_size: usize,

    /// Distance below which two people join a group
    pub group_dist: f64,
    /// Distance above which two grouped people separate
    pub ungroup_dist: f64,

    /// Maximum usable sensor range, used for exit distances
    pub max_range: f64,

    /// Weights used to predict leg positions from prior positions
    pub prediction: PredictionWeights,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            frame_rate: 50.0,
            bg_init_frames: 50,
            bg_update_tc: 100.0,
            unknown_bg_like: 0.0,

            entry_rate: 2.0,
            expected_hits_per_entry: 10.0,
            entry_boost: 100.0,
            min_create_hits: 5,

            mean_leg_sep: 0.3,
            leg_sep_sigma: 0.1,
            max_leg_sep: 0.8,
            leg_sep_tc: 100.0,

            sensor_sigma: 0.01,
            initial_position_var: 0.1 * 0.1,
            max_position_var: 1.0,

            stationary_velocity: 0.05,
            stationary_fraction: 0.1,
            vel_update_tc: 10.0,
            max_leg_speed: 5.0,

            age_threshold: 5,
            invisible_for_too_long: 25,
            max_bg_like_for_visible: 20.0,

            initial_leg_diameter: 0.15,
            min_leg_diameter: 0.08,
            max_leg_diameter: 0.4,
            leg_diameter_sigma: 0.05,
            leg_diameter_tc: 50.0,
            update_diameter: false,

            grid_resolution: 41,
            likelihood_window: 12.0,
            min_like_for_updates: -50.0,
            random_point_prob: 1e-30,
            sep_table_size: 200,

            group_dist: 0.5,
            ungroup_dist: 0.8,

            max_range: 6.0,

            prediction: PredictionWeights::default(),
        }
    }
}

impl TrackerConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check relationships between parameters that the estimator relies on.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(TrackerError::Config(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        }

        positive("frame_rate", self.frame_rate)?;
        positive("bg_update_tc", self.bg_update_tc)?;
        positive("expected_hits_per_entry", self.expected_hits_per_entry)?;
        positive("entry_boost", self.entry_boost)?;
        positive("mean_leg_sep", self.mean_leg_sep)?;
        positive("leg_sep_sigma", self.leg_sep_sigma)?;
        positive("leg_sep_tc", self.leg_sep_tc)?;
        positive("sensor_sigma", self.sensor_sigma)?;
        positive("initial_position_var", self.initial_position_var)?;
        positive("vel_update_tc", self.vel_update_tc)?;
        positive("max_leg_speed", self.max_leg_speed)?;
        positive("min_leg_diameter", self.min_leg_diameter)?;
        positive("leg_diameter_sigma", self.leg_diameter_sigma)?;
        positive("leg_diameter_tc", self.leg_diameter_tc)?;
        positive("likelihood_window", self.likelihood_window)?;
        positive("random_point_prob", self.random_point_prob)?;
        positive("max_range", self.max_range)?;
        positive("group_dist", self.group_dist)?;

        if self.entry_rate < 0.0 {
            return Err(TrackerError::Config(format!(
                "entry_rate must not be negative, got {}",
                self.entry_rate
            )));
        }
        if self.max_position_var < self.sensor_sigma * self.sensor_sigma {
            return Err(TrackerError::Config(format!(
                "max_position_var ({}) is below the sensor noise variance ({})",
                self.max_position_var,
                self.sensor_sigma * self.sensor_sigma
            )));
        }
        if self.max_leg_sep < self.mean_leg_sep {
            return Err(TrackerError::Config(format!(
                "max_leg_sep ({}) is below mean_leg_sep ({})",
                self.max_leg_sep, self.mean_leg_sep
            )));
        }
        if !(self.min_leg_diameter <= self.initial_leg_diameter
            && self.initial_leg_diameter <= self.max_leg_diameter)
        {
            return Err(TrackerError::Config(format!(
                "initial_leg_diameter ({}) must lie in [{}, {}]",
                self.initial_leg_diameter, self.min_leg_diameter, self.max_leg_diameter
            )));
        }
        if !(0.0..=1.0).contains(&self.stationary_fraction) {
            return Err(TrackerError::Config(format!(
                "stationary_fraction must lie in [0, 1], got {}",
                self.stationary_fraction
            )));
        }
        if self.ungroup_dist <= self.group_dist {
            return Err(TrackerError::Config(format!(
                "ungroup_dist ({}) must exceed group_dist ({})",
                self.ungroup_dist, self.group_dist
            )));
        }
        if self.grid_resolution < 2 {
            return Err(TrackerError::Config(format!(
                "grid_resolution must be at least 2, got {}",
                self.grid_resolution
            )));
        }
        if self.sep_table_size < 2 {
            return Err(TrackerError::Config(format!(
                "sep_table_size must be at least 2, got {}",
                self.sep_table_size
            )));
        }
        if self.min_create_hits < 2 {
            return Err(TrackerError::Config(format!(
                "min_create_hits must be at least 2, got {}",
                self.min_create_hits
            )));
        }
        if self.min_like_for_updates <= self.random_point_prob.ln() {
            return Err(TrackerError::Config(format!(
                "min_like_for_updates ({}) must exceed ln(random_point_prob) ({})",
                self.min_like_for_updates,
                self.random_point_prob.ln()
            )));
        }
        Ok(())
    }

    /// Log of the probability floor.
    pub fn random_point_like(&self) -> f64 {
        self.random_point_prob.ln()
    }
}

/// Weights applied to prior leg positions when predicting the next one.
///
/// The weights of both tables are normalised so they sum to one; otherwise the
/// prediction would drift toward or away from the world origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPredictionWeights")]
pub struct PredictionWeights {
    same: Vec<f64>,
    other: Vec<f64>,
}

#[derive(Deserialize)]
struct RawPredictionWeights {
    same: Vec<f64>,
    #[serde(default)]
    other: Vec<f64>,
}

impl From<RawPredictionWeights> for PredictionWeights {
    fn from(raw: RawPredictionWeights) -> Self {
        PredictionWeights::new(raw.same, raw.other)
    }
}

impl Default for PredictionWeights {
    fn default() -> Self {
        // Fitted to recorded walking data
        let same = vec![
            0.7561, 0.3262, 0.0190, -0.0110, -0.0025, 0.0006, 0.0066, -0.0408, 0.0072, -0.0718,
        ];
        let other = vec![
            0.0376, 0.0006, 0.0045, -0.0001, 0.0038, -0.0052, 0.0038, 0.0005, -0.0229, -0.0124,
        ];
        PredictionWeights::new(same, other)
    }
}

impl PredictionWeights {
    /// Build normalised weights. An all-zero table falls back to a
    /// zero-order hold.
    pub fn new(mut same: Vec<f64>, mut other: Vec<f64>) -> Self {
        let total: f64 = same.iter().chain(other.iter()).sum();
        if total.abs() < 1e-9 || !total.is_finite() {
            return Self::zero_order_hold();
        }
        for w in same.iter_mut().chain(other.iter_mut()) {
            *w /= total;
        }
        Self { same, other }
    }

    /// Predict the last known position.
    pub fn zero_order_hold() -> Self {
        Self {
            same: vec![1.0],
            other: Vec::new(),
        }
    }

    /// Weights for prior positions of the leg being predicted (newest first).
    pub fn same(&self) -> &[f64] {
        &self.same
    }

    /// Weights for prior positions of the sibling leg (newest first).
    pub fn other(&self) -> &[f64] {
        &self.other
    }
}
