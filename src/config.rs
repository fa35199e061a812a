use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LumacamConfig {
    pub source: SourceConfig,
    pub sampler: SamplerConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Frame resolution (width, height)
    #[serde(default = "default_source_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second delivered by the source
    #[serde(default = "default_source_fps")]
    pub fps: u32,

    /// Extra padding bytes appended to each luma row (stride = width + padding)
    #[serde(default = "default_stride_padding")]
    pub stride_padding: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplerConfig {
    /// Throttle window between analyzed frames, in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,
}

impl SamplerConfig {
    /// Get the throttle window as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Frame delivery channel capacity (number of in-flight frames)
    #[serde(default = "default_frame_channel_capacity")]
    pub frame_channel_capacity: usize,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl LumacamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("lumacam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default(
                "source.resolution",
                vec![
                    default_source_resolution().0,
                    default_source_resolution().1,
                ],
            )?
            .set_default("source.fps", default_source_fps())?
            .set_default("source.stride_padding", default_stride_padding())?
            .set_default("sampler.interval_ms", default_sample_interval_ms())?
            .set_default(
                "system.frame_channel_capacity",
                default_frame_channel_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with LUMACAM_ prefix
            .add_source(Environment::with_prefix("LUMACAM").separator("_"))
            .build()?;

        let config: LumacamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.resolution.0 == 0 || self.source.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Source resolution must be greater than 0".to_string(),
            ));
        }

        if self.source.fps == 0 {
            return Err(ConfigError::Message(
                "Source fps must be greater than 0".to_string(),
            ));
        }

        if self.sampler.interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sampler interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.system.frame_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "Frame channel capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LumacamConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                resolution: default_source_resolution(),
                fps: default_source_fps(),
                stride_padding: default_stride_padding(),
            },
            sampler: SamplerConfig {
                interval_ms: default_sample_interval_ms(),
            },
            system: SystemConfig {
                frame_channel_capacity: default_frame_channel_capacity(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_source_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_source_fps() -> u32 {
    30
}
fn default_stride_padding() -> u32 {
    0
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_frame_channel_capacity() -> usize {
    16
}
fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LumacamConfig::default();

        assert_eq!(config.source.resolution, (640, 480));
        assert_eq!(config.source.fps, 30);
        assert_eq!(config.sampler.interval_ms, 1000);
        assert_eq!(config.sampler.interval(), Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LumacamConfig::default();

        config.source.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.source.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.sampler.interval_ms = 0;
        assert!(config.validate().is_err());
        config.sampler.interval_ms = 500;
        assert!(config.validate().is_ok());

        config.system.frame_channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = LumacamConfig::load_from_file("/nonexistent/lumacam.toml").unwrap();
        assert_eq!(config.sampler.interval_ms, 1000);
        assert_eq!(config.source.fps, 30);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[sampler]\ninterval_ms = 250\n\n[source]\nfps = 10\nstride_padding = 8\n"
        )
        .unwrap();

        let config = LumacamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.sampler.interval_ms, 250);
        assert_eq!(config.source.fps, 10);
        assert_eq!(config.source.stride_padding, 8);
        // Untouched sections keep defaults
        assert_eq!(config.system.event_bus_capacity, 100);
    }
}
