//! YTMShell - headless entry point for the shell core.
//!
//! # Overview
//!
//! Runs the orchestration core without a desktop session. It initializes:
//! - Bootstrap settings from `YTMSHELL_*` environment variables
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime
//! - The persisted settings store ([`ConfigStore`]), running migrations
//! - The shell controller ([`ShellController`]) with every shipped integration
//!
//! # Execution Flow
//!
//! 1. Load bootstrap settings and initialize logging
//! 2. Create the tokio runtime
//! 3. Load `<data_dir>/config.yaml`; a failure here is fatal before any surface exists
//! 4. Initialize the controller and its orchestrator loop
//! 5. Run until Ctrl-C (or until the orchestrator loop dies, which is fatal)
//! 6. Tear down: stop timers, disable integrations, persist playback state
//! 7. Shut down the tokio runtime with a 5s timeout

use anyhow::{Context, Result};
use semver::Version;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use ytmshell::ui::HeadlessHost;
use ytmshell::{
    APP_NAME, BootstrapSettings, ConfigSnapshot, ConfigStore, IntegrationOutputs, ShellController,
    VERSION, default_registry,
};

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    let settings = BootstrapSettings::load().context("Failed to read bootstrap settings")?;
    let _guard = ytmshell::logging::setup_from_settings(&settings)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("ytmshell-worker")
        .build()?;

    let result = runtime.block_on(run(settings));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");

    result
}

async fn run(settings: BootstrapSettings) -> Result<()> {
    let version = Version::parse(VERSION).context("Invalid package version")?;

    let config = match ConfigStore::load(&settings.data_dir, &version) {
        Ok(config) => config,
        Err(e) if settings.may_continue_after_fatal() => {
            tracing::error!("Fatal configuration error, continuing with defaults: {}", e);
            ConfigStore::in_memory(ConfigSnapshot::default())
        }
        Err(e) => {
            tracing::error!("Fatal configuration error: {}", e);
            return Err(e).context("Failed to load settings");
        }
    };

    let mut controller = ShellController::new(config, Arc::new(HeadlessHost));
    let (registry, outputs) = default_registry();
    let output_task = spawn_output_logger(outputs);
    controller.init(registry).await?;
    tracing::info!("Player view start URL: {}", controller.start_url());

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.context("Failed to listen for Ctrl-C"),
        fatal = controller.wait_for_orchestrator() => fatal,
    };
    if let Err(e) = &outcome {
        tracing::error!("{:#}", e);
    }

    match tokio::time::timeout(TEARDOWN_TIMEOUT, controller.teardown()).await {
        Ok(result) => result?,
        Err(_) => tracing::warn!("Teardown timed out after {:?}", TEARDOWN_TIMEOUT),
    }
    output_task.abort();

    outcome
}

/// Without a desktop session there is no scrobble submitter or presence
/// client, so integration outputs are only logged.
fn spawn_output_logger(outputs: IntegrationOutputs) -> JoinHandle<()> {
    let IntegrationOutputs {
        mut scrobbles,
        mut presence,
    } = outputs;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                scrobble = scrobbles.recv() => match scrobble {
                    Ok(s) => tracing::info!("Scrobble ready: {} - {} ({})", s.artist, s.track, s.timestamp),
                    Err(RecvError::Lagged(skipped)) => tracing::warn!("Dropped {} scrobbles", skipped),
                    Err(RecvError::Closed) => break,
                },
                changed = presence.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let details = presence.borrow_and_update().as_ref().map(|a| a.details.clone());
                    tracing::info!("Presence activity: {:?}", details);
                }
            }
        }
    })
}
