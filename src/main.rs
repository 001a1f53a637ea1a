use anyhow::{Context, Result};
use clap::Parser;
use photobooth::config::CameraBackendKind;
use photobooth::{BoothApp, PhotoboothConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "photobooth")]
#[command(about = "Camera photobooth that prints a photo strip and an animated GIF")]
#[command(version)]
#[command(long_about = "Takes a timed set of six photos from a camera, prints them on a decorated \
strip and exports the strip and a looping GIF, in original or pixelated form. Test mode skips the \
camera and prints numbered placeholder photos instead.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "photobooth.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Use placeholder photos instead of the camera
    #[arg(long, help = "Print placeholder photos and save the test strip without a camera")]
    test_mode: bool,

    /// Use the generated test pattern as the camera
    #[arg(long, help = "Use the synthetic test-pattern camera instead of hardware")]
    synthetic_camera: bool,

    /// Override the download directory
    #[arg(long, value_name = "DIR", help = "Directory downloads are saved into")]
    output_dir: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the booth")]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        return print_default_config();
    }

    init_logging(&args)?;

    info!("Starting photobooth v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = PhotoboothConfig::load_from_file(&args.config)
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })
        .with_context(|| format!("loading {}", args.config))?;

    if args.synthetic_camera {
        config.camera.backend = CameraBackendKind::Synthetic;
    }
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut app = BoothApp::new(config, args.test_mode);
    app.set_keyboard_enabled(true);

    let reason = app.run().await.map_err(|e| {
        error!("Photobooth error: {}", e);
        e
    })?;

    info!("Photobooth exited: {:?}", reason);
    Ok(())
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
        .unwrap_or_else(|_| EnvFilter::new(format!("photobooth={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
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
        .try_init()
        .context("installing the log subscriber")?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let rendered = PhotoboothConfig::default()
        .to_toml_string()
        .context("rendering the default configuration")?;

    println!("# Photobooth Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Any value can be overridden with PHOTOBOOTH__SECTION__FIELD, e.g. PHOTOBOOTH__EXPORT__OUTPUT_DIR");
    println!("# Set system.timestamp_timezone to an IANA zone such as \"Asia/Bangkok\"; local time is used when unset");
    println!();
    println!("{}", rendered);
    Ok(())
}
