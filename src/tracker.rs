mod assignment;
mod background;
mod config;
mod error;
mod geometry;
mod group;
mod leg;
mod matching;
mod person;
mod report;
mod scan;
mod stats;
mod track_state;
mod world;

pub use assignment::{
    Assignments, PointLabel, SplitOutcome, entry_likelihood, make_assignments, resolve_leg_split,
};
pub use background::{BackgroundModel, BinStats};
pub use config::{PredictionWeights, TrackerConfig};
pub use error::{Result, TrackerError};
pub use geometry::BoundingBox;
pub use group::{Group, GroupEvent, GroupTracker};
pub use leg::{Leg, LegUpdate, LikelihoodGrid, SeparationPrior, SiblingLeg};
pub use person::{LegStats, Person};
pub use report::{
    EntryEvent, FrameReport, GeoReport, GroupReport, LegReport, PersonUpdate, WorldSnapshot,
};
pub use scan::ScanFrame;
pub use track_state::TrackState;
pub use world::World;
