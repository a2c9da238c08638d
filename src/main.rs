use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use lenscam::{
    Capability, CapturedImage, GestureKind, HostBridge, HostEmitter, HostEvent, LensCamConfig,
    LensDescriptor, MainContext, MockCameraEngine, PermissionOutcome, Rect, WidgetAdapter,
    WidgetProps, REQUIRED_CAPABILITIES,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "lenscam")]
#[command(about = "AR camera widget controller with a simulated camera engine")]
#[command(version)]
#[command(long_about = "Drives one AR camera widget through its attach cycle against an \
in-process camera engine: permission request, session creation, lens catalog and apply, \
capture and teardown. Host events are printed to stdout as JSON lines.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lenscam.toml", help = "Path to TOML configuration file")]
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
    #[arg(long, help = "Validate configuration file and exit without starting the widget")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Host props as JSON, e.g. '{"apiToken":"t1","groupId":"g1","lensId":"l1"}'
    #[arg(long, value_name = "JSON")]
    props: Option<String>,

    /// Lens ids the simulated catalog delivers, in catalog order
    #[arg(long, value_delimiter = ',', default_value = "lens-1,lens-2")]
    lenses: Vec<String>,

    /// Simulate the user denying the camera permission
    #[arg(long)]
    deny_permission: bool,

    /// Simulate a device the engine does not support
    #[arg(long)]
    unsupported: bool,

    /// Lens to pick from the selection list after the catalog arrives
    #[arg(long, value_name = "LENS_ID")]
    select: Option<String>,

    /// Number of snapshot gestures to perform
    #[arg(long, default_value_t = 1)]
    captures: u32,
}

/// Prints host events as JSON lines
struct StdoutEmitter;

#[async_trait]
impl HostEmitter for StdoutEmitter {
    async fn emit(&self, event: HostEvent) -> lenscam::Result<()> {
        let line = serde_json::json!({ "event": event.name, "payload": event.payload });
        println!("{}", serde_json::to_string(&line)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting lenscam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match LensCamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        let result = config.validate().and_then(|_| config.props.validate());
        match result {
            Ok(()) => {
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

    if let Some(json) = &args.props {
        config.props = WidgetProps::from_json(json)?;
    }

    run_simulation(&args, config).await
}

async fn run_simulation(args: &Args, config: LensCamConfig) -> Result<()> {
    let permissions = if args.deny_permission {
        PermissionOutcome::new().with(Capability::Camera, false)
    } else {
        PermissionOutcome::granting(REQUIRED_CAPABILITIES)
    };
    let catalog: Vec<LensDescriptor> = args
        .lenses
        .iter()
        .filter(|id| !id.trim().is_empty())
        .map(LensDescriptor::new)
        .collect();

    let engine = MockCameraEngine::new()
        .with_supported(!args.unsupported)
        .with_auto_permissions(permissions)
        .with_auto_catalog(catalog)
        .with_auto_snapshot(CapturedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 1,
            height: 1,
        });

    let main = MainContext::spawn();
    let mut adapter = WidgetAdapter::builder()
        .widget_id("cli")
        .config(config)
        .engine(Arc::new(engine))
        .main_context(main.clone())
        .build()?;
    let bridge = HostBridge::spawn(adapter.bus(), Arc::new(StdoutEmitter));

    adapter.set_status_bar_offset(0);
    adapter.set_capture_button(Rect::new(440, 1700, 640, 1900));
    adapter.on_layout_change(Rect::new(0, 0, 0, 0), Rect::new(0, 0, 1080, 1920));
    adapter.attach();
    settle(&main).await;

    info!("Widget state after attach: {}", adapter.state());

    if let Some(lens_id) = &args.select {
        if let Err(e) = adapter.select_lens(lens_id) {
            warn!("Lens selection failed: {}", e);
        }
        settle(&main).await;
    }

    for _ in 0..args.captures {
        adapter.on_gesture_start();
        adapter.on_gesture_end(GestureKind::Snapshot);
        settle(&main).await;
    }

    adapter.detach();
    settle(&main).await;
    info!("Widget state after detach: {}", adapter.state());

    bridge.shutdown().await;
    main.shutdown();
    Ok(())
}

/// Let posted callbacks, executor jobs and the host bridge catch up
async fn settle(main: &MainContext) {
    for _ in 0..5 {
        main.flush().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
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
        .unwrap_or_else(|_| EnvFilter::new(format!("lenscam={}", log_level)));

    // Logs go to stderr, stdout carries host events
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
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
                .boxed()
        }
    };

    let mut layers = vec![fmt_layer];
    let mut guard = None;
    if let Some(dir) = &args.log_dir {
        std::fs::create_dir_all(dir)?;
        let (writer, worker_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "lenscam.log"));
        layers.push(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        );
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() {
    let defaults = LensCamConfig::default();

    println!("# Lenscam Configuration File");
    println!("# Every key can be overridden from the environment, e.g. LENSCAM_PROPS__API_TOKEN");
    println!();
    println!(
        r#"[props]
# API token for the camera engine (required)
api_token = ""
# Lens applied on start (required when single_lens = true)
lens_id = ""
# Lens group the catalog is queried from (required)
group_id = ""
# true: apply lens_id only; false: show the group's lenses in a selection list
single_lens = true
# Open the built-in preview after a capture
show_preview = true
# Start on the front camera
show_front_camera = false

[preview]
# Whether the platform mirrors front camera frames on its own
platform_mirrors_front = false
# Desired mirroring of the front camera output
mirror_front = true
# Desired mirroring of the back camera output
mirror_back = false
aspect_ratio = "16:9"

[capture]
# Directory captured images are written to
cache_dir = "{}"
file_extension = "jpg"

[events]
# Event bus capacity
bus_capacity = 100
debug_logging = false"#,
        defaults.capture.cache_dir.display()
    );
}
