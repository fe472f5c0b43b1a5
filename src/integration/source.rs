//! Trait for range-scanner frame sources.

use crate::tracker::ScanFrame;

/// Source of scan frames, typically a device driver or a recording.
///
/// # Example
///
/// ```ignore
/// use legtrack_rs::{ScanFrame, ScanSource};
///
/// struct Recording {
///     frames: std::vec::IntoIter<ScanFrame>,
/// }
///
/// impl ScanSource for Recording {
///     type Error = std::convert::Infallible;
///
///     fn next_frame(&mut self) -> Result<Option<ScanFrame>, Self::Error> {
///         Ok(self.frames.next())
///     }
/// }
/// ```
pub trait ScanSource {
    /// Error type for acquisition failures.
    type Error;

    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<ScanFrame>, Self::Error>;
}

impl ScanSource for std::vec::IntoIter<ScanFrame> {
    type Error = std::convert::Infallible;

    fn next_frame(&mut self) -> Result<Option<ScanFrame>, Self::Error> {
        Ok(self.next())
    }
}
