use crate::config::BootstrapSettings;
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of the rotating log files.
pub const LOG_PREFIX: &str = "ytmshell";

/// Setup logging with a daily rotating file appender.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_prefix` - Prefix for log files (e.g., "ytmshell")
/// * `debug_mode` - If true, use debug level; otherwise use info level
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &str, log_prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    install(log_dir, log_prefix, debug_mode, false, false)
}

/// Setup logging with optional console output for debugging.
pub fn setup_logging_with_console(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<WorkerGuard> {
    install(log_dir, log_prefix, debug_mode, console_output, false)
}

/// Setup logging as described by the bootstrap settings.
pub fn setup_from_settings(settings: &BootstrapSettings) -> Result<WorkerGuard> {
    install(
        &settings.log_dir,
        LOG_PREFIX,
        settings.debug,
        settings.console_log,
        settings.json_log,
    )
}

fn ensure_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8Path::new(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// `RUST_LOG` wins over the debug flag when set.
fn env_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug_mode { "debug" } else { "info" }))
}

fn install(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
    json_output: bool,
) -> Result<WorkerGuard> {
    ensure_log_dir(log_dir)?;

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let file_layer = if json_output {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    let console_layer = console_output.then(|| fmt::layer().with_ansi(true).with_target(false));

    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output,
        json_output
    );

    Ok(guard)
}
