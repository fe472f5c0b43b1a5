use serde::Serialize;

/// Lifecycle state of a person track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackState {
    /// Younger than the age threshold, not yet reported
    #[default]
    New,
    /// At least one leg visible this frame
    Tracked,
    /// Both legs currently invisible
    Lost,
    /// Invisible for too long, about to be pruned
    Removed,
}

impl TrackState {
    /// Whether the track is reported to downstream consumers.
    pub fn is_active(self) -> bool {
        matches!(self, TrackState::Tracked | TrackState::Lost)
    }
}
