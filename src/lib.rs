//! Real-time multi-person tracking from a single 2D range scanner.
//!
//! [`World`] consumes one [`ScanFrame`] per tick and returns a
//! [`FrameReport`]. The [`integration`] module connects it to scan sources
//! and message sinks.

pub mod integration;
pub mod tracker;

pub use integration::{Destinations, FrameSink, ScanFrameBuilder, ScanSource, TrackerPipeline};
pub use tracker::{FrameReport, ScanFrame, TrackerConfig, TrackerError, World};
