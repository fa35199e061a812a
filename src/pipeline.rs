use crate::error::{LumacamError, Result};
use crate::events::{EventBus, LumacamEvent};
use crate::frame::FrameData;
use crate::sampler::{FrameSampler, FrameSink};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Counters for pipeline monitoring
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Total frames received from the source
    pub frames_seen: AtomicU64,
    /// Frames admitted through the throttle gate and analyzed
    pub frames_admitted: AtomicU64,
    /// Frames dropped by the throttle gate
    pub frames_dropped: AtomicU64,
    /// Frames whose analysis failed
    pub analysis_failures: AtomicU64,
}

impl PipelineStats {
    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_admitted: self.frames_admitted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            analysis_failures: self.analysis_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Copy)]
pub struct PipelineStatsSnapshot {
    pub frames_seen: u64,
    pub frames_admitted: u64,
    pub frames_dropped: u64,
    pub analysis_failures: u64,
}

/// Pipeline connecting a frame channel to the throttled sampler.
///
/// One worker task owns both the channel receiver and the sampler, so every
/// `on_frame` call is serialized by construction - the sampler needs no
/// locking. An analysis failure on one frame is published and counted, and
/// the worker moves on to the next frame.
pub struct SamplerPipeline {
    sampler: Option<FrameSampler>,
    rx: Option<mpsc::Receiver<FrameData>>,
    event_bus: Arc<EventBus>,
    stats: Arc<PipelineStats>,
    worker_task: Option<JoinHandle<()>>,
}

impl SamplerPipeline {
    /// Create a new pipeline over a frame channel
    pub fn new(
        sampler: FrameSampler,
        rx: mpsc::Receiver<FrameData>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            sampler: Some(sampler),
            rx: Some(rx),
            event_bus,
            stats: Arc::new(PipelineStats::default()),
            worker_task: None,
        }
    }

    /// Start the pipeline worker task
    pub fn start(&mut self) -> Result<()> {
        if self.worker_task.is_some() {
            warn!("Sampler pipeline is already running");
            return Ok(());
        }

        let mut sampler = self
            .sampler
            .take()
            .ok_or_else(|| LumacamError::component("sampler_pipeline", "sampler already taken"))?;
        let mut rx = self
            .rx
            .take()
            .ok_or_else(|| LumacamError::component("sampler_pipeline", "receiver already taken"))?;
        let event_bus = Arc::clone(&self.event_bus);
        let stats = Arc::clone(&self.stats);

        info!(
            "Starting sampler pipeline (throttle window {:?})",
            sampler.interval()
        );

        let task = tokio::spawn(async move {
            info!("Sampler worker task started");

            while let Some(frame) = rx.recv().await {
                stats.frames_seen.fetch_add(1, Ordering::Relaxed);

                match sampler.on_frame(&frame) {
                    Ok(Some(sample)) => {
                        stats.frames_admitted.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) =
                            event_bus.publish(LumacamEvent::LuminanceMeasured { sample })
                        {
                            error!("Failed to publish luminance sample: {}", e);
                        }
                    }
                    Ok(None) => {
                        stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        trace!("Frame {} dropped by throttle gate", frame.id);
                        if let Err(e) = event_bus.publish(LumacamEvent::FrameDropped {
                            frame_id: frame.id,
                            timestamp_ms: frame.timestamp_ms,
                        }) {
                            debug!("Failed to publish frame-dropped event: {}", e);
                        }
                    }
                    Err(e) => {
                        // One bad frame never stops delivery; the next frame
                        // gets a fresh evaluation.
                        stats.analysis_failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Analysis failed for frame {}: {}", frame.id, e);
                        if let Err(publish_err) =
                            event_bus.publish(LumacamEvent::AnalysisFailed {
                                frame_id: frame.id,
                                error: e.to_string(),
                            })
                        {
                            error!(
                                "Failed to publish analysis failure event: {}",
                                publish_err
                            );
                        }
                    }
                }
            }

            info!("Frame channel closed, sampler worker task ending");
        });

        self.worker_task = Some(task);
        Ok(())
    }

    /// Stop the pipeline, waiting for the worker to drain and exit
    ///
    /// The worker exits when the frame channel closes; callers stop the
    /// source (dropping the sender) before calling this.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.worker_task.take() else {
            warn!("Sampler pipeline is not running");
            return Ok(());
        };

        info!("Stopping sampler pipeline");

        match tokio::time::timeout(Duration::from_secs(3), task).await {
            Ok(Ok(())) => {
                info!("Sampler worker task completed successfully");
            }
            Ok(Err(e)) => {
                error!("Error stopping sampler worker task: {}", e);
                return Err(LumacamError::component(
                    "sampler_pipeline",
                    "worker task panicked",
                ));
            }
            Err(_) => {
                warn!("Sampler worker task did not complete within timeout");
            }
        }

        Ok(())
    }

    /// Check whether the worker task is active
    pub fn is_running(&self) -> bool {
        self.worker_task.is_some()
    }

    /// Get a handle to the pipeline statistics
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }
}

/// Builder for SamplerPipeline
pub struct SamplerPipelineBuilder {
    sampler: Option<FrameSampler>,
    rx: Option<mpsc::Receiver<FrameData>>,
    event_bus: Option<Arc<EventBus>>,
}

impl SamplerPipelineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            sampler: None,
            rx: None,
            event_bus: None,
        }
    }

    /// Set the sampler
    pub fn sampler(mut self, sampler: FrameSampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Set the frame channel receiver
    pub fn receiver(mut self, rx: mpsc::Receiver<FrameData>) -> Self {
        self.rx = Some(rx);
        self
    }

    /// Set the event bus
    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<SamplerPipeline> {
        let sampler = self.sampler.unwrap_or_default();

        let rx = self.rx.ok_or_else(|| {
            LumacamError::component("sampler_pipeline_builder", "Frame receiver is required")
        })?;

        let event_bus = self.event_bus.ok_or_else(|| {
            LumacamError::component("sampler_pipeline_builder", "Event bus is required")
        })?;

        Ok(SamplerPipeline::new(sampler, rx, event_bus))
    }
}

impl Default for SamplerPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use crate::sampler::LuminanceSample;

    fn luma_frame(id: u64, timestamp_ms: u64, luma: &[u8]) -> FrameData {
        FrameData::tight(
            id,
            timestamp_ms,
            luma.to_vec(),
            luma.len() as u32,
            1,
            PixelFormat::Yuv420,
        )
    }

    async fn collect_samples(
        mut receiver: tokio::sync::broadcast::Receiver<LumacamEvent>,
        expected: usize,
    ) -> Vec<LuminanceSample> {
        let mut samples = Vec::new();
        while samples.len() < expected {
            let event = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event bus closed");
            if let LumacamEvent::LuminanceMeasured { sample } = event {
                samples.push(sample);
            }
        }
        samples
    }

    #[tokio::test]
    async fn test_pipeline_emits_throttled_samples() {
        let event_bus = Arc::new(EventBus::new(64));
        let (tx, rx) = mpsc::channel(16);
        let mut pipeline = SamplerPipelineBuilder::new()
            .receiver(rx)
            .event_bus(Arc::clone(&event_bus))
            .build()
            .unwrap();

        let events = event_bus.subscribe();
        pipeline.start().unwrap();

        let schedule: [(u64, Vec<u8>); 5] = [
            (0, vec![10, 20]),
            (500, vec![50]),
            (999, vec![60]),
            (1_000, vec![0, 255]),
            (2_500, vec![128]),
        ];
        for (id, (ts, luma)) in schedule.iter().enumerate() {
            tx.send(luma_frame(id as u64, *ts, luma)).await.unwrap();
        }
        drop(tx);

        let samples = collect_samples(events, 3).await;
        assert_eq!(samples[0].timestamp_ms, 0);
        assert_eq!(samples[0].average_luma, 15.0);
        assert_eq!(samples[1].timestamp_ms, 1_000);
        assert_eq!(samples[1].average_luma, 127.5);
        assert_eq!(samples[2].timestamp_ms, 2_500);

        pipeline.stop().await.unwrap();

        let stats = pipeline.stats().snapshot();
        assert_eq!(stats.frames_seen, 5);
        assert_eq!(stats.frames_admitted, 3);
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.analysis_failures, 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_does_not_stop_delivery() {
        let event_bus = Arc::new(EventBus::new(64));
        let (tx, rx) = mpsc::channel(16);
        let mut pipeline = SamplerPipelineBuilder::new()
            .receiver(rx)
            .event_bus(Arc::clone(&event_bus))
            .build()
            .unwrap();

        let mut events = event_bus.subscribe();
        pipeline.start().unwrap();

        // Zero-area frame fails analysis; the following frame still works
        let bad = FrameData::tight(1, 1_000, Vec::new(), 0, 0, PixelFormat::Yuv420);
        tx.send(bad).await.unwrap();
        tx.send(luma_frame(2, 1_001, &[40, 60])).await.unwrap();
        drop(tx);

        let mut saw_failure = false;
        let mut sample = None;
        while sample.is_none() {
            let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
                .await
                .expect("timed out waiting for events")
                .expect("event bus closed");
            match event {
                LumacamEvent::AnalysisFailed { frame_id, .. } => {
                    assert_eq!(frame_id, 1);
                    saw_failure = true;
                }
                LumacamEvent::LuminanceMeasured { sample: s } => sample = Some(s),
                _ => {}
            }
        }

        assert!(saw_failure);
        assert_eq!(sample.unwrap().average_luma, 50.0);

        pipeline.stop().await.unwrap();

        let stats = pipeline.stats().snapshot();
        assert_eq!(stats.frames_seen, 2);
        assert_eq!(stats.analysis_failures, 1);
        assert_eq!(stats.frames_admitted, 1);
    }

    #[tokio::test]
    async fn test_pipeline_stop_without_start() {
        let event_bus = Arc::new(EventBus::new(8));
        let (_tx, rx) = mpsc::channel::<FrameData>(4);
        let mut pipeline = SamplerPipelineBuilder::new()
            .receiver(rx)
            .event_bus(event_bus)
            .build()
            .unwrap();

        assert!(!pipeline.is_running());
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_builder_requires_receiver_and_bus() {
        assert!(SamplerPipelineBuilder::new().build().is_err());

        let (_tx, rx) = mpsc::channel::<FrameData>(4);
        assert!(SamplerPipelineBuilder::new().receiver(rx).build().is_err());
    }
}
