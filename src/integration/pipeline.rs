//! TrackerPipeline for driving the tracker from a scan source.

use thiserror::Error;

use crate::tracker::{FrameReport, TrackerConfig, TrackerError, World};

use super::{Destinations, ScanSource};

/// Failure of one pipeline step.
#[derive(Error, Debug)]
pub enum PipelineError<E> {
    #[error("Scan source failed: {0}")]
    Source(E),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Bundles a [`ScanSource`] with a [`World`] and runs one tick per frame.
///
/// Elapsed time is derived from frame numbers and the configured frame rate,
/// counted from the first frame seen.
pub struct TrackerPipeline<S: ScanSource> {
    source: S,
    world: World,
    first_frame: Option<u32>,
}

impl<S: ScanSource> TrackerPipeline<S> {
    /// Create a new pipeline with the given source and tracker config.
    pub fn new(source: S, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            source,
            world: World::new(config)?,
            first_frame: None,
        })
    }

    /// Create a new pipeline with default tracker configuration.
    pub fn with_default_config(source: S) -> Result<Self, TrackerError> {
        Self::new(source, TrackerConfig::default())
    }

    /// Pull one frame and track it. Returns `Ok(None)` once the source is
    /// exhausted.
    pub fn process_next(&mut self) -> Result<Option<FrameReport>, PipelineError<S::Error>> {
        let Some(frame) = self.source.next_frame().map_err(PipelineError::Source)? else {
            return Ok(None);
        };
        let first = *self.first_frame.get_or_insert(frame.frame_id());
        let elapsed =
            f64::from(frame.frame_id().saturating_sub(first)) / self.world.config().frame_rate;
        let report = self.world.track(&frame, elapsed)?;
        Ok(Some(report))
    }

    /// Track every remaining frame, publishing each report. Returns the
    /// number of frames processed.
    pub fn run(&mut self, destinations: &mut Destinations) -> Result<usize, PipelineError<S::Error>> {
        let mut frames = 0;
        while let Some(report) = self.process_next()? {
            destinations.publish(&report);
            frames += 1;
        }
        Ok(frames)
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a mutable reference to the underlying source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Get a reference to the underlying tracker.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get a mutable reference to the underlying tracker.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}
