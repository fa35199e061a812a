use crate::sampler::LuminanceSample;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Errors produced by the event bus
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

/// Events that can occur in the lumacam system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LumacamEvent {
    /// A luminance sample was produced for an admitted frame
    LuminanceMeasured { sample: LuminanceSample },
    /// A frame was dropped by the throttle gate
    FrameDropped { frame_id: u64, timestamp_ms: u64 },
    /// Analysis of one frame failed; subsequent frames are unaffected
    AnalysisFailed { frame_id: u64, error: String },
    /// Frame source started or stopped producing frames
    SourceStatusChanged { running: bool },
    /// System shutdown requested
    ShutdownRequested { reason: String },
}

impl LumacamEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            LumacamEvent::LuminanceMeasured { .. } => "luminance_measured",
            LumacamEvent::FrameDropped { .. } => "frame_dropped",
            LumacamEvent::AnalysisFailed { .. } => "analysis_failed",
            LumacamEvent::SourceStatusChanged { .. } => "source_status_changed",
            LumacamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            LumacamEvent::LuminanceMeasured { sample } => {
                format!(
                    "Average luminosity {:.2} at t={}ms",
                    sample.average_luma, sample.timestamp_ms
                )
            }
            LumacamEvent::FrameDropped {
                frame_id,
                timestamp_ms,
            } => {
                format!("Frame {} dropped at t={}ms", frame_id, timestamp_ms)
            }
            LumacamEvent::AnalysisFailed { frame_id, error } => {
                format!("Analysis of frame {} failed: {}", frame_id, error)
            }
            LumacamEvent::SourceStatusChanged { running } => {
                format!(
                    "Frame source {}",
                    if *running { "started" } else { "stopped" }
                )
            }
            LumacamEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<LumacamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<LumacamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Publishing with no subscribers is not an error for callers that only
    /// report; they get `Ok(0)` back.
    pub fn publish(&self, event: LumacamEvent) -> Result<usize, EventBusError> {
        match &event {
            LumacamEvent::LuminanceMeasured { sample } => {
                info!(
                    "Average luminosity: {:.2} (t={}ms)",
                    sample.average_luma, sample.timestamp_ms
                );
            }
            LumacamEvent::AnalysisFailed { frame_id, error } => {
                error!("Analysis failed for frame {}: {}", frame_id, error);
            }
            LumacamEvent::SourceStatusChanged { running } => {
                if *running {
                    info!("Frame source started");
                } else {
                    warn!("Frame source stopped");
                }
            }
            LumacamEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            LumacamEvent::FrameDropped { .. } => {
                debug!("Event: {}", event.description());
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = LumacamEvent::LuminanceMeasured {
            sample: LuminanceSample {
                timestamp_ms: 1_000,
                average_luma: 42.5,
            },
        };

        let subscriber_count = event_bus.publish(event).unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        match received {
            LumacamEvent::LuminanceMeasured { sample } => {
                assert_eq!(sample.average_luma, 42.5);
                assert_eq!(sample.timestamp_ms, 1_000);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());

        let result = event_bus.publish(LumacamEvent::SourceStatusChanged { running: true });
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(LumacamEvent::ShutdownRequested {
                reason: "test".to_string(),
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_properties() {
        let event = LumacamEvent::LuminanceMeasured {
            sample: LuminanceSample {
                timestamp_ms: 2_500,
                average_luma: 127.5,
            },
        };

        assert_eq!(event.event_type(), "luminance_measured");
        assert!(event.description().contains("127.50"));

        let failed = LumacamEvent::AnalysisFailed {
            frame_id: 3,
            error: "empty plane".to_string(),
        };
        assert_eq!(failed.event_type(), "analysis_failed");
        assert!(failed.description().contains("frame 3"));
    }
}
