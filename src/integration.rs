//! Integration module for connecting scan sources and message consumers
//! with the tracker.
//!
//! The tracking core performs no I/O. This module provides the traits and
//! the driving loop that sit around it.

mod builder;
mod pipeline;
mod publish;
mod source;

pub use builder::ScanFrameBuilder;
pub use pipeline::{PipelineError, TrackerPipeline};
pub use publish::{Destinations, FrameSink, MAX_SEND_FAILURES, PublishError};
pub use source::ScanSource;
