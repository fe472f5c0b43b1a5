//! Fan-out of frame reports to downstream consumers.

use thiserror::Error;
use tracing::{trace, warn};

use crate::tracker::FrameReport;

/// Consecutive failures after which a destination is dropped.
pub const MAX_SEND_FAILURES: u32 = 100;

/// Error returned by a [`FrameSink`].
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Destination {name} unreachable: {reason}")]
    Unreachable { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A consumer of per-tick reports, such as a network message encoder.
///
/// Sinks receive owned copies of the tracker state and never see it change.
pub trait FrameSink {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    fn send(&mut self, report: &FrameReport) -> Result<(), PublishError>;
}

struct Destination {
    sink: Box<dyn FrameSink>,
    failures: u32,
}

/// Set of sinks that each report is delivered to.
///
/// A sink that fails more than the allowed number of times in a row is
/// removed. Delivery failures never affect tracking.
pub struct Destinations {
    entries: Vec<Destination>,
    max_failures: u32,
}

impl Default for Destinations {
    fn default() -> Self {
        Self::new()
    }
}

impl Destinations {
    pub fn new() -> Self {
        Self::with_max_failures(MAX_SEND_FAILURES)
    }

    pub fn with_max_failures(max_failures: u32) -> Self {
        Self {
            entries: Vec::new(),
            max_failures,
        }
    }

    pub fn add(&mut self, sink: impl FrameSink + 'static) {
        self.entries.push(Destination {
            sink: Box::new(sink),
            failures: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the current destinations.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.sink.name()).collect()
    }

    /// Send `report` to every destination. Returns how many accepted it.
    pub fn publish(&mut self, report: &FrameReport) -> usize {
        let mut delivered = 0;
        for dest in &mut self.entries {
            match dest.sink.send(report) {
                Ok(()) => {
                    dest.failures = 0;
                    delivered += 1;
                }
                Err(e) => {
                    dest.failures += 1;
                    trace!(sink = dest.sink.name(), failures = dest.failures, error = %e, "Send failed");
                }
            }
        }

        let max_failures = self.max_failures;
        self.entries.retain(|d| {
            let keep = d.failures <= max_failures;
            if !keep {
                warn!(sink = d.sink.name(), failures = d.failures, "Dropping unreachable destination");
            }
            keep
        });
        delivered
    }
}
