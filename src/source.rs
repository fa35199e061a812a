use crate::config::SourceConfig;
use crate::error::{LumacamError, Result};
use crate::events::{EventBus, LumacamEvent};
use crate::frame::{FrameData, PixelFormat};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Synthetic frame source.
///
/// Stand-in for the platform capture pipeline: produces YUV 4:2:0 frames at
/// a fixed rate into an mpsc channel. The single-consumer channel is what
/// gives the downstream sampler its serialized-delivery guarantee. Frame
/// timestamps are monotonic milliseconds anchored to the moment the source
/// starts.
pub struct FrameSource {
    config: SourceConfig,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    capture_task: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl FrameSource {
    /// Create a new frame source
    pub fn new(config: SourceConfig) -> Self {
        info!(
            "Initializing synthetic frame source ({}x{} @ {}fps, row padding {})",
            config.resolution.0, config.resolution.1, config.fps, config.stride_padding
        );

        Self {
            config,
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            capture_task: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Start producing frames into the given channel
    pub async fn start(
        &self,
        tx: mpsc::Sender<FrameData>,
        event_bus: Arc<EventBus>,
    ) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("Frame source is already running");
            return Ok(());
        }

        info!("Starting frame source");
        self.is_running.store(true, Ordering::Relaxed);

        let config = self.config.clone();
        let is_running = Arc::clone(&self.is_running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let capture_task = Arc::clone(&self.capture_task);

        if let Err(e) = event_bus.publish(LumacamEvent::SourceStatusChanged { running: true }) {
            error!("Failed to publish source status event: {}", e);
        }

        let task = tokio::spawn(async move {
            let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
            let mut interval_timer = tokio::time::interval(frame_interval);
            let epoch = Instant::now();

            info!("Frame source loop started");

            while is_running.load(Ordering::Relaxed) {
                interval_timer.tick().await;

                if !is_running.load(Ordering::Relaxed) {
                    break;
                }

                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let timestamp_ms = epoch.elapsed().as_millis() as u64;
                let frame = Self::generate_frame(&config, frame_id, timestamp_ms);

                trace!(
                    "Generated frame {} at t={}ms ({}x{}, stride {})",
                    frame_id,
                    timestamp_ms,
                    frame.width,
                    frame.height,
                    frame.stride
                );

                // A full channel means the consumer is behind; drop the
                // frame rather than stall the producer.
                match tx.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(frame)) => {
                        warn!("Frame channel full, discarding frame {}", frame.id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        info!("Frame channel closed, stopping source loop");
                        break;
                    }
                }
            }

            if let Err(e) =
                event_bus.publish(LumacamEvent::SourceStatusChanged { running: false })
            {
                debug!("Failed to publish source stop event: {}", e);
            }

            info!("Frame source loop stopped");
        });

        *capture_task.lock().await = Some(task);
        Ok(())
    }

    /// Generate one synthetic YUV 4:2:0 frame.
    ///
    /// Luma follows a slow per-frame ramp so live runs show a moving
    /// average; padding bytes are set to 0xEE so a stride bug shows up in
    /// the measured values immediately.
    fn generate_frame(config: &SourceConfig, frame_id: u64, timestamp_ms: u64) -> FrameData {
        let (width, height) = config.resolution;
        let stride = width + config.stride_padding;

        let luma_value = ((frame_id * 3) % 256) as u8;
        let mut data = Vec::with_capacity((stride * height) as usize);
        for _ in 0..height {
            data.resize(data.len() + width as usize, luma_value);
            data.resize(data.len() + config.stride_padding as usize, 0xEE);
        }
        // Quarter-resolution chroma planes, neutral gray
        let chroma_len = (width as usize / 2) * (height as usize / 2) * 2;
        data.resize(data.len() + chroma_len, 128);

        FrameData::new(
            frame_id,
            timestamp_ms,
            data,
            width,
            height,
            stride,
            PixelFormat::Yuv420,
        )
    }

    /// Stop producing frames
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running.load(Ordering::Relaxed) {
            debug!("Frame source is not running");
            return Ok(());
        }

        info!("Stopping frame source");
        self.is_running.store(false, Ordering::Relaxed);

        if let Some(task) = self.capture_task.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(3), task).await {
                Ok(Ok(())) => {
                    info!("Frame source task completed successfully");
                }
                Ok(Err(e)) => {
                    error!("Error waiting for frame source task: {}", e);
                    return Err(LumacamError::component(
                        "frame_source",
                        "source task panicked",
                    ));
                }
                Err(_) => {
                    warn!("Frame source task did not complete within timeout");
                }
            }
        }

        info!("Frame source stopped");
        Ok(())
    }

    /// Check if the source is currently producing frames
    pub fn is_capturing(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Get the source configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Get the number of frames produced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }
}
