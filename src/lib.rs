pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod frame;
pub mod pipeline;
pub mod sampler;
pub mod source;

pub use config::{LumacamConfig, SamplerConfig, SourceConfig, SystemConfig};
pub use error::{LumacamError, Result};
pub use estimator::EstimatorError;
pub use events::{EventBus, EventBusError, LumacamEvent};
pub use frame::{FrameData, PixelFormat};
pub use pipeline::{SamplerPipeline, SamplerPipelineBuilder, PipelineStats, PipelineStatsSnapshot};
pub use sampler::{FrameSampler, FrameSink, LuminanceSample, DEFAULT_SAMPLE_INTERVAL};
pub use source::FrameSource;
