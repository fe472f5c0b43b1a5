//! Error types for the tracking core.

use thiserror::Error;

/// Tracker error type.
///
/// Low-confidence leg updates and frames that produce no new track are not
/// errors; they are ordinary outcomes reported through return values.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal contract violation (degenerate likelihood table, empty grid,
    /// non-finite score). The tick that raised it must not be published.
    #[error("Invariant violated in {context}: {detail}")]
    Invariant {
        context: &'static str,
        detail: String,
    },
}

impl TrackerError {
    pub(crate) fn invariant(context: &'static str, detail: impl Into<String>) -> Self {
        TrackerError::Invariant {
            context,
            detail: detail.into(),
        }
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(e: toml::de::Error) -> Self {
        TrackerError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
