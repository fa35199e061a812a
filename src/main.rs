use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use lumacam::{
    EventBus, FrameSampler, FrameSource, LumacamConfig, LumacamEvent, SamplerPipelineBuilder,
};

#[derive(Parser, Debug)]
#[command(name = "lumacam")]
#[command(about = "Rust-based camera luminance monitor with throttled frame analysis")]
#[command(version)]
#[command(long_about = "A camera luminance monitor that samples a frame stream at most once \
per throttle window, computes the average luminance of each admitted frame, and reports the \
samples. Ships with a synthetic frame source for demonstration; real capture hardware sits \
behind the frame channel seam.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lumacam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Run duration in seconds (0 = run until interrupted)
    #[arg(long, default_value_t = 0, value_name = "SECONDS", help = "Stop after this many seconds; 0 runs until ctrl-c")]
    duration: u64,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config();
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting lumacam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let config = match LumacamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {}", e);
        e
    })?;

    // Wire the system: source -> frame channel -> sampler pipeline -> event bus
    let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
    let (frame_tx, frame_rx) = mpsc::channel(config.system.frame_channel_capacity);

    let sampler = FrameSampler::with_interval(config.sampler.interval());
    let mut pipeline = SamplerPipelineBuilder::new()
        .sampler(sampler)
        .receiver(frame_rx)
        .event_bus(Arc::clone(&event_bus))
        .build()?;

    let source = FrameSource::new(config.source.clone());

    // Logging reporter: subscribe before anything publishes
    let reporter_task = spawn_reporter(event_bus.subscribe());

    pipeline.start()?;
    source.start(frame_tx, Arc::clone(&event_bus)).await?;

    // Run until ctrl-c or the requested duration elapses
    if args.duration > 0 {
        info!("Running for {} seconds", args.duration);
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(args.duration)) => {
                info!("Run duration elapsed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
            }
        }
    } else {
        info!("Running until interrupted (ctrl-c to stop)");
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received");
    }

    let _ = event_bus.publish(LumacamEvent::ShutdownRequested {
        reason: "run complete".to_string(),
    });

    // Stop the source first so the channel closes and the worker drains
    source.stop().await?;
    pipeline.stop().await?;
    reporter_task.abort();

    let stats = pipeline.stats().snapshot();
    info!(
        "Final stats: {} frames seen, {} analyzed, {} dropped, {} failures",
        stats.frames_seen, stats.frames_admitted, stats.frames_dropped, stats.analysis_failures
    );

    Ok(())
}

/// Spawn the logging reporter: consumes luminance samples from the bus
fn spawn_reporter(
    mut receiver: tokio::sync::broadcast::Receiver<LumacamEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(LumacamEvent::LuminanceMeasured { sample }) => {
                    info!(
                        target: "lumacam::reporter",
                        "Average luminosity: {:.2} (t={}ms)",
                        sample.average_luma,
                        sample.timestamp_ms
                    );
                }
                Ok(LumacamEvent::ShutdownRequested { .. }) => {
                    break;
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    info!("Reporter lagged behind by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    })
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lumacam={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        }
        Some("compact") => {
            fmt::layer()
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .boxed()
        }
        Some("pretty") | None => {
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# Lumacam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();

    let default_config = r#"[source]
# Frame resolution (width, height)
resolution = [640, 480]
# Frames per second delivered by the source
fps = 30
# Extra padding bytes appended to each luma row (stride = width + padding)
stride_padding = 0

[sampler]
# Throttle window between analyzed frames, in milliseconds
interval_ms = 1000

[system]
# Frame delivery channel capacity (number of in-flight frames)
frame_channel_capacity = 16
# Event bus capacity
event_bus_capacity = 100
"#;

    println!("{}", default_config);
}
