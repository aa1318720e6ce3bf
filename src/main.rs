use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use roiscan::events::{EventFilter, EventReceiver, ExtractionEvent};
use roiscan::frame::{FrameSource, ImageFrameSource, SourceKind};
use roiscan::{recognition, AppConfig, ExtractionApp};

#[derive(Parser, Debug)]
#[command(name = "roiscan")]
#[command(about = "Periodic text extraction from regions of a video frame")]
#[command(version)]
#[command(long_about = "Samples named rectangular regions of a frame source on a fixed \
interval, runs each region through a text recognition engine and collects the non-empty \
results into a time-stamped log that is exported as JSON when the run ends.")]
struct Args {
    /// Image to use as the frame source
    #[arg(short, long, value_name = "IMAGE", help = "Image file used as the frame source")]
    source: Option<PathBuf>,

    /// Treat the source as a live stream
    #[arg(long, help = "Treat the source as a live stream instead of a seekable file")]
    live: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "roiscan.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS", help = "Stop capturing after the given number of seconds")]
    duration: Option<f64>,

    /// Skip writing the result log on exit
    #[arg(long, help = "Do not write the result log when the run ends")]
    no_export: bool,

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
    #[arg(long, help = "Validate configuration file and exit without capturing")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting roiscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match AppConfig::load_from_file(&args.config) {
        Ok(config) => config,
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

    let source_path = args
        .source
        .as_ref()
        .context("--source <IMAGE> is required to capture")?;
    let kind = if args.live {
        SourceKind::Live
    } else {
        SourceKind::File
    };
    let source: Arc<dyn FrameSource> = Arc::new(
        ImageFrameSource::open(source_path, kind)
            .with_context(|| format!("Failed to open frame source {}", source_path.display()))?,
    );

    let recognizer = recognition::from_config(&config.recognizer);
    info!("Using recognition engine: {}", recognizer.name());

    let mut app = ExtractionApp::new(config, Some(source), recognizer).map_err(|e| {
        error!("Failed to create extraction session: {}", e);
        e
    })?;
    app.set_export_on_exit(!args.no_export);

    spawn_record_printer(&app);

    let duration = match args.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => anyhow::bail!("--duration must be a positive number of seconds, got {}", secs),
        None => None,
    };

    let exit_code = app.run(duration).await.map_err(|e| {
        error!("Error during extraction: {}", e);
        e
    })?;

    info!("Roiscan exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

/// Echo every appended record to stdout as it arrives
fn spawn_record_printer(app: &ExtractionApp) {
    let mut receiver = EventReceiver::new(
        app.event_bus().subscribe(),
        EventFilter::EventTypes(vec!["record_appended"]),
        "record_printer".to_string(),
    );

    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            if let ExtractionEvent::RecordAppended { record, .. } = event {
                println!("[{}] {}: {}", record.formatted_time, record.key, record.value);
            }
        }
    });
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roiscan={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    // Logs go to stderr so stdout carries only records
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = toml::to_string_pretty(&AppConfig::default())
        .context("Failed to render default configuration")?;

    println!("# Roiscan configuration file");
    println!("# Every section may be omitted; values shown are the defaults.");
    println!("# Environment overrides use ROISCAN_<SECTION>__<KEY>, e.g. ROISCAN_CAPTURE__INTERVAL_MS=500");
    println!();
    println!("{}", rendered);
    Ok(())
}
