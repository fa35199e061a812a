use crate::estimator::{self, EstimatorError};
use crate::frame::FrameData;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Default throttle window between analyzed frames
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);

/// One luminance measurement produced for an admitted frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LuminanceSample {
    /// Arrival timestamp of the analyzed frame, in monotonic milliseconds
    pub timestamp_ms: u64,
    /// Average luma of the frame, in [0.0, 255.0]
    pub average_luma: f64,
}

/// Push seam for frame delivery.
///
/// The caller must serialize invocations on a single sink instance; the
/// sink itself carries no locking. Frame data is borrowed for the duration
/// of one call only.
pub trait FrameSink {
    /// Handle one delivered frame, returning a sample when the frame was
    /// admitted for analysis and `None` when it was dropped.
    fn on_frame(&mut self, frame: &FrameData) -> Result<Option<LuminanceSample>, EstimatorError>;
}

/// Throttled frame sampler.
///
/// Admits at most one frame per throttle window: a frame is analyzed only
/// when at least `interval` has elapsed since the last analyzed frame's
/// timestamp. The very first frame a fresh sampler sees is always admitted.
/// The single piece of state, the last analyzed timestamp, moves only when
/// a frame is admitted, so it is monotonically non-decreasing for the
/// lifetime of a sampler.
#[derive(Debug)]
pub struct FrameSampler {
    interval_ms: u64,
    last_analyzed_ms: Option<u64>,
}

impl FrameSampler {
    /// Create a sampler with the default one-second throttle window
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SAMPLE_INTERVAL)
    }

    /// Create a sampler with a custom throttle window
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_analyzed_ms: None,
        }
    }

    /// Get the configured throttle window
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Get the timestamp of the most recently analyzed frame, or `None`
    /// when no frame has been analyzed yet
    pub fn last_analyzed_ms(&self) -> Option<u64> {
        self.last_analyzed_ms
    }

    fn admits(&self, timestamp_ms: u64) -> bool {
        match self.last_analyzed_ms {
            None => true,
            // A frame timestamped at or before the last admitted one
            // saturates to elapsed 0 and is dropped, keeping the state
            // monotonic.
            Some(last) => timestamp_ms.saturating_sub(last) >= self.interval_ms,
        }
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FrameSampler {
    fn on_frame(&mut self, frame: &FrameData) -> Result<Option<LuminanceSample>, EstimatorError> {
        if !self.admits(frame.timestamp_ms) {
            trace!(
                "Dropping frame {} at t={}ms (window {}ms)",
                frame.id,
                frame.timestamp_ms,
                self.interval_ms
            );
            return Ok(None);
        }

        let average_luma = estimator::average_of_frame(frame)?;
        self.last_analyzed_ms = Some(frame.timestamp_ms);

        debug!(
            "Analyzed frame {} at t={}ms: average luma {:.2}",
            frame.id, frame.timestamp_ms, average_luma
        );

        Ok(Some(LuminanceSample {
            timestamp_ms: frame.timestamp_ms,
            average_luma,
        }))
    }
}
