use anyhow::{Context, Result};
use clap::Parser;
use memotion::{EngineEvent, EngineOutput, LandmarkSet, MemotionConfig, SessionRegistry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "memotion")]
#[command(about = "Motion analysis engine for guided rehabilitation exercises")]
#[command(version)]
#[command(long_about = "Runs a MEMOTION session over recorded pose landmarks. \
Each input line is a JSON frame with pose landmarks, optional face landmarks and a \
timestamp in milliseconds. One engine output per frame is written to stdout as JSON.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "memotion.toml", help = "Path to TOML configuration file")]
    config: String,

    /// JSON-lines frame file; stdin when omitted
    #[arg(short, long, value_name = "FILE", help = "Read frames from FILE instead of stdin")]
    frames: Option<PathBuf>,

    /// User the session is calibrated for
    #[arg(short, long, default_value = "anonymous")]
    user_id: String,

    /// Override the profile directory from the configuration
    #[arg(long, value_name = "DIR")]
    profile_dir: Option<PathBuf>,

    /// Only print outputs that carry a phase transition
    #[arg(long, help = "Print only outputs with a phase transition")]
    transitions_only: bool,

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
    #[arg(long, help = "Validate configuration file and exit without running a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// One line of the frame input
#[derive(Debug, Deserialize)]
struct FrameInput {
    timestamp_ms: u64,
    #[serde(alias = "landmarks")]
    pose: LandmarkSet,
    #[serde(default, alias = "face_landmarks")]
    face: Option<LandmarkSet>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args)?;

    info!("Starting MEMOTION v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match MemotionConfig::load_from_file(&args.config) {
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

    let profile_dir = args
        .profile_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.session.profile_dir));
    let sweep_interval = Duration::from_secs(config.session.sweep_interval_s.max(1));

    let registry = Arc::new(SessionRegistry::new(config));
    let shutdown = CancellationToken::new();
    let sweeper = registry.spawn_sweeper(sweep_interval, shutdown.clone());

    let session_id = registry.create_session(&args.user_id);
    info!("Session {} ready for user {}", session_id, args.user_id);

    let result = match &args.frames {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open frame file {}", path.display()))?;
            run_session(&registry, &session_id, &args, &profile_dir, file, &shutdown).await
        }
        None => {
            run_session(
                &registry,
                &session_id,
                &args,
                &profile_dir,
                tokio::io::stdin(),
                &shutdown,
            )
            .await
        }
    };

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Session sweeper ended abnormally: {}", e);
    }
    registry.remove(&session_id);

    match &result {
        Ok(frames) => info!("Processed {} frames", frames),
        Err(e) => error!("Session failed: {:#}", e),
    }
    result.map(|_| ())
}

/// Feed every frame from `input` to the session until EOF or Ctrl-C
async fn run_session<R: AsyncRead + Unpin>(
    registry: &SessionRegistry,
    session_id: &str,
    args: &Args,
    profile_dir: &Path,
    input: R,
    shutdown: &CancellationToken,
) -> Result<usize> {
    let mut lines = BufReader::new(input).lines();
    let mut processed = 0usize;
    let mut line_number = 0usize;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping session");
                break;
            }
            line = lines.next_line() => line.context("Failed to read frame input")?,
        };
        let Some(line) = line else { break };
        line_number += 1;

        if line.trim().is_empty() {
            continue;
        }

        let frame: FrameInput = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping malformed frame on line {}: {}", line_number, e);
                continue;
            }
        };

        let output = registry.process_frame(
            session_id,
            &frame.pose,
            frame.face.as_ref(),
            frame.timestamp_ms,
        )?;
        processed += 1;

        emit_output(&output, args.transitions_only)?;
        handle_events(registry, session_id, profile_dir);

        if output.final_report.is_some() && output.transition.is_some() {
            info!("Session complete after {} frames", processed);
        }
    }

    Ok(processed)
}

fn emit_output(output: &EngineOutput, transitions_only: bool) -> Result<()> {
    if transitions_only && output.transition.is_none() {
        return Ok(());
    }
    println!("{}", output.to_json()?);
    Ok(())
}

/// Log drained engine events and persist calibration profiles
fn handle_events(registry: &SessionRegistry, session_id: &str, profile_dir: &Path) {
    let Some(engine) = registry.get(session_id) else {
        return;
    };
    let events = engine.lock().drain_events();

    for event in events {
        debug!("Engine event: {}", event.description());
        if let EngineEvent::ProfileReady { profile, .. } = &event {
            match profile.save_to_dir(profile_dir) {
                Ok(path) => info!("Saved profile to {}", path.display()),
                Err(e) => error!("Failed to save profile: {}", e),
            }
        }
    }
}

fn init_logging(args: &Args) -> Result<WorkerGuard> {
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
        .unwrap_or_else(|_| EnvFilter::new(format!("memotion={}", log_level)));

    // stdout carries engine output, so logs go to stderr or a file
    let (writer, guard) = match &args.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path {}", path.display()))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };
    let ansi = args.log_file.is_none();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# MEMOTION Configuration File");
    println!("# Every option with its default value");
    println!("# Environment overrides use MEMOTION_<SECTION>__<KEY>, e.g. MEMOTION_SYNC__USE_3D=true");
    println!();
    println!("{}", MemotionConfig::default_toml()?);
    Ok(())
}
