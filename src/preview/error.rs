use std::time::Duration;

use thiserror::Error;

/// Failures of the scrub-preview pipeline. None of these are fatal to playback.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PreviewError {
    /// Seeking or rasterizing the hidden resource failed.
    #[error("failed to decode frame at {timestamp:.3}s: {reason}")]
    DecodeFailure { timestamp: f64, reason: String },

    /// The hidden resource did not confirm the seek in time.
    #[error("decoder did not respond within {after:?} for frame at {timestamp:.3}s")]
    DecodeTimeout { timestamp: f64, after: Duration },

    #[error("no media loaded")]
    NoMedia,
}

impl PreviewError {
    pub fn failure(timestamp: f64, reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            timestamp,
            reason: reason.into(),
        }
    }
}
