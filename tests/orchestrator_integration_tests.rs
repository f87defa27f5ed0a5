//! Integration tests for the integration lifecycle
//!
//! These tests verify that the orchestrator:
//! - Calls enable/disable exactly on boolean transitions
//! - Cycles restart-coupled integrations and never overlaps the cycles
//! - Keeps one failing integration from affecting the others
//! - Applies host side effects once per batch
//! - Runs exactly one auto-clear timer for the pairing window

use async_trait::async_trait;
use mockall::mock;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep};
use ytmshell::integrations::{Integration, IntegrationBinding, IntegrationContext, IntegrationError};
use ytmshell::metrics::Metrics;
use ytmshell::models::{ConfigSnapshot, RemoteCommand, ShortcutsConfig};
use ytmshell::state::{AUTH_WINDOW_TTL, COMPANION_AUTH_WINDOW_KEY};
use ytmshell::ui::{BroadcastRouter, ShellController, ShellHost};
use ytmshell::{
    ConfigChange, ConfigStore, EphemeralStore, IntegrationOrchestrator, PlayerStateAggregator,
    TimerRegistry,
};

#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

struct Recording {
    name: &'static str,
    journal: Journal,
    fail_enable: bool,
    disable_delay: Option<Duration>,
}

impl Recording {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fail_enable: false,
            disable_delay: None,
        }
    }

    fn failing(mut self) -> Self {
        self.fail_enable = true;
        self
    }

    fn slow_disable(mut self, delay: Duration) -> Self {
        self.disable_delay = Some(delay);
        self
    }
}

#[async_trait]
impl Integration for Recording {
    fn provide(&mut self, _ctx: IntegrationContext) {}

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        self.journal.push(format!("{}:enable", self.name));
        if self.fail_enable {
            return Err(IntegrationError::Enable {
                name: self.name,
                message: "refused".to_string(),
            });
        }
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        if let Some(delay) = self.disable_delay {
            self.journal.push(format!("{}:disable-begin", self.name));
            sleep(delay).await;
        }
        self.journal.push(format!("{}:disable", self.name));
        Ok(())
    }
}

/// Host that writes every call into a journal.
#[derive(Default)]
struct RecordingHost {
    calls: Mutex<Vec<String>>,
}

impl RecordingHost {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ShellHost for RecordingHost {
    fn set_zoom_factor(&self, factor: f64) {
        self.record(format!("zoom:{:.2}", factor));
    }

    fn set_login_item(&self, open_at_login: bool, open_as_hidden: bool) {
        self.record(format!("login:{}:{}", open_at_login, open_as_hidden));
    }

    fn register_shortcuts(&self, bindings: &[(RemoteCommand, String)]) -> anyhow::Result<()> {
        self.record(format!("shortcuts:{}", bindings.len()));
        Ok(())
    }

    fn set_taskbar_progress(&self, progress: Option<f64>) {
        self.record(format!("taskbar:{:?}", progress));
    }

    fn open_external(&self, url: &str) {
        self.record(format!("external:{}", url));
    }

    fn show_notification(&self, title: &str, _body: &str) {
        self.record(format!("notify:{}", title));
    }

    fn confirm_pairing(&self, app_name: &str, _code: &str) -> bool {
        self.record(format!("pairing:{}", app_name));
        true
    }
}

mock! {
    pub Host {}

    impl ShellHost for Host {
        fn set_zoom_factor(&self, factor: f64);
        fn set_login_item(&self, open_at_login: bool, open_as_hidden: bool);
        fn register_shortcuts(&self, bindings: &[(RemoteCommand, String)]) -> anyhow::Result<()>;
        fn set_taskbar_progress(&self, progress: Option<f64>);
        fn open_external(&self, url: &str);
        fn show_notification(&self, title: &str, body: &str);
        fn confirm_pairing(&self, app_name: &str, code: &str) -> bool;
    }
}

fn context(snapshot: ConfigSnapshot, host: Arc<dyn ShellHost>) -> IntegrationContext {
    let metrics = Arc::new(Metrics::new());
    IntegrationContext {
        config: ConfigStore::in_memory(snapshot),
        ephemeral: EphemeralStore::new(),
        player: PlayerStateAggregator::new(Arc::clone(&metrics)),
        router: BroadcastRouter::new(metrics),
        host,
    }
}

fn orchestrator(
    bindings: Vec<IntegrationBinding>,
    host: Arc<dyn ShellHost>,
) -> (IntegrationOrchestrator, Arc<Metrics>) {
    orchestrator_at(ConfigSnapshot::default(), bindings, host)
}

/// Orchestrator whose last acted-on snapshot is `snapshot`.
fn orchestrator_at(
    snapshot: ConfigSnapshot,
    bindings: Vec<IntegrationBinding>,
    host: Arc<dyn ShellHost>,
) -> (IntegrationOrchestrator, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let orchestrator = IntegrationOrchestrator::new(
        context(snapshot, host),
        bindings,
        TimerRegistry::new(),
        Arc::clone(&metrics),
    );
    (orchestrator, metrics)
}

fn volume_binding(journal: &Journal) -> IntegrationBinding {
    IntegrationBinding::new(
        "volume",
        |s| s.playback.ratio_volume,
        Box::new(Recording::new("volume", journal)),
    )
    .restart_when(|new, old| new.playback.enable_speaker_fill != old.playback.enable_speaker_fill)
}

fn change(old: &ConfigSnapshot, edit: impl FnOnce(&mut ConfigSnapshot)) -> ConfigChange {
    let mut new = old.clone();
    edit(&mut new);
    ConfigChange {
        new: Arc::new(new),
        old: Arc::new(old.clone()),
    }
}

fn set_shortcut(shortcuts: &mut ShortcutsConfig, index: usize, accelerator: String) {
    match index {
        0 => shortcuts.play_pause = accelerator,
        1 => shortcuts.next = accelerator,
        2 => shortcuts.previous = accelerator,
        3 => shortcuts.thumbs_up = accelerator,
        4 => shortcuts.thumbs_down = accelerator,
        5 => shortcuts.volume_up = accelerator,
        _ => shortcuts.volume_down = accelerator,
    }
}

proptest! {
    #[test]
    fn transitions_drive_exactly_the_expected_calls(
        was in any::<bool>(),
        is in any::<bool>(),
        sub_setting_changed in any::<bool>(),
    ) {
        let journal = Journal::default();
        let mut old = ConfigSnapshot::default();
        old.playback.ratio_volume = was;
        let (mut orchestrator, _metrics) = orchestrator_at(
            old.clone(),
            vec![volume_binding(&journal)],
            Arc::new(RecordingHost::default()),
        );

        let batch = change(&old, |s| {
            s.playback.ratio_volume = is;
            if sub_setting_changed {
                s.playback.enable_speaker_fill = true;
            }
        });

        tokio_test::block_on(orchestrator.handle_config_change(&batch));

        let expected: &[&str] = match (was, is) {
            (false, true) => &["volume:enable"],
            (true, false) => &["volume:disable"],
            (true, true) if sub_setting_changed => &["volume:disable", "volume:enable"],
            _ => &[],
        };
        prop_assert_eq!(journal.take(), expected);
    }

    #[test]
    fn any_shortcut_subset_registers_once(mask in prop::collection::vec(any::<bool>(), 7)) {
        let host = Arc::new(RecordingHost::default());
        let (mut orchestrator, _metrics) = orchestrator(Vec::new(), host.clone());

        let batch = change(&ConfigSnapshot::default(), |s| {
            for (index, _) in mask.iter().enumerate().filter(|(_, changed)| **changed) {
                set_shortcut(&mut s.shortcuts, index, format!("CmdOrCtrl+Shift+{}", index));
            }
        });
        let changed = mask.iter().filter(|changed| **changed).count();

        tokio_test::block_on(orchestrator.handle_config_change(&batch));

        let registrations: Vec<String> = host
            .take()
            .into_iter()
            .filter(|call| call.starts_with("shortcuts:"))
            .collect();
        if changed == 0 {
            prop_assert!(registrations.is_empty());
        } else {
            prop_assert_eq!(registrations, vec![format!("shortcuts:{}", changed)]);
        }
    }
}

#[tokio::test]
async fn test_shortcut_batch_registers_once_with_all_bindings() {
    let mut host = MockHost::new();
    host.expect_register_shortcuts()
        .withf(|bindings| {
            bindings.len() == 3 && bindings.iter().any(|(command, _)| *command == RemoteCommand::Next)
        })
        .times(1)
        .returning(|_| Ok(()));
    host.expect_set_zoom_factor().never();
    host.expect_set_login_item().never();

    let (mut orchestrator, _metrics) = orchestrator(Vec::new(), Arc::new(host));

    let batch = change(&ConfigSnapshot::default(), |s| {
        s.shortcuts.play_pause = "CmdOrCtrl+Shift+P".to_string();
        s.shortcuts.next = "CmdOrCtrl+Shift+N".to_string();
        s.shortcuts.previous = "CmdOrCtrl+Shift+B".to_string();
    });
    orchestrator.handle_config_change(&batch).await;
}

#[tokio::test]
async fn test_shortcut_registration_failure_is_logged_not_fatal() {
    let journal = Journal::default();
    let mut host = MockHost::new();
    host.expect_register_shortcuts()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("accelerator already taken")));
    host.expect_set_zoom_factor().times(1).return_const(());

    let (mut orchestrator, metrics) = orchestrator(vec![volume_binding(&journal)], Arc::new(host));

    let batch = change(&ConfigSnapshot::default(), |s| {
        s.shortcuts.play_pause = "Ctrl+P".to_string();
        s.appearance.zoom = 150;
        s.playback.ratio_volume = true;
    });
    orchestrator.handle_config_change(&batch).await;

    assert_eq!(journal.take(), ["volume:enable"]);
    assert_eq!(metrics.integration_failures.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_failing_integration_is_isolated() {
    let journal = Journal::default();
    let host = Arc::new(RecordingHost::default());
    let bindings = vec![
        IntegrationBinding::new(
            "presence",
            |s| s.integrations.discord_presence_enabled,
            Box::new(Recording::new("presence", &journal).failing()),
        ),
        IntegrationBinding::new(
            "scrobbler",
            |s| s.integrations.last_fm_enabled,
            Box::new(Recording::new("scrobbler", &journal)),
        ),
    ];
    let (mut orchestrator, metrics) = orchestrator(bindings, host.clone());

    let batch = change(&ConfigSnapshot::default(), |s| {
        s.integrations.discord_presence_enabled = true;
        s.integrations.last_fm_enabled = true;
        s.appearance.zoom = 125;
    });
    orchestrator.handle_config_change(&batch).await;

    assert_eq!(journal.take(), ["presence:enable", "scrobbler:enable"]);
    assert_eq!(host.take(), ["zoom:1.25"]);
    assert_eq!(metrics.integration_failures.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_init_applies_every_host_effect() {
    let host = Arc::new(RecordingHost::default());
    let (mut orchestrator, _metrics) = orchestrator(Vec::new(), host.clone());

    orchestrator.init().await;

    assert_eq!(host.take(), ["zoom:1.00", "login:false:false", "shortcuts:0"]);
}

#[tokio::test]
async fn test_taskbar_cleared_when_disabled() {
    let host = Arc::new(RecordingHost::default());
    let mut old = ConfigSnapshot::default();
    old.playback.progress_in_taskbar = true;
    let (mut orchestrator, _metrics) = orchestrator_at(old.clone(), Vec::new(), host.clone());

    orchestrator
        .handle_config_change(&change(&old, |s| s.playback.progress_in_taskbar = false))
        .await;

    assert_eq!(host.take(), ["taskbar:None"]);
}

#[tokio::test]
async fn test_login_item_follows_both_flags() {
    let host = Arc::new(RecordingHost::default());
    let (mut orchestrator, _metrics) = orchestrator(Vec::new(), host.clone());

    orchestrator
        .handle_config_change(&change(&ConfigSnapshot::default(), |s| {
            s.general.start_on_boot = true;
            s.general.start_minimized = true;
        }))
        .await;

    assert_eq!(host.take(), ["login:true:true"]);
}

fn companion_snapshot() -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.integrations.companion_server_enabled = true;
    snapshot
}

fn companion_binding(journal: &Journal) -> IntegrationBinding {
    IntegrationBinding::new(
        "server",
        |s| s.integrations.companion_server_enabled,
        Box::new(Recording::new("server", journal).slow_disable(Duration::from_millis(50))),
    )
    .restart_when(|new, old| new.integrations.companion_server_port != old.integrations.companion_server_port)
    .owning(&[COMPANION_AUTH_WINDOW_KEY])
}

async fn controller(journal: &Journal) -> ShellController {
    let config = ConfigStore::in_memory(companion_snapshot());
    let mut controller = ShellController::new(config, Arc::new(RecordingHost::default()));
    controller
        .init(vec![companion_binding(journal)])
        .await
        .expect("init");
    controller
}

/// Let the orchestrator drain what is queued.
async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_cycles_never_overlap() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    assert_eq!(journal.take(), ["server:enable"]);

    controller
        .config()
        .update(|s| s.integrations.companion_server_port = 9000)
        .unwrap();
    controller
        .config()
        .update(|s| s.integrations.companion_server_port = 9001)
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(
        journal.take(),
        [
            "server:disable-begin",
            "server:disable",
            "server:enable",
            "server:disable-begin",
            "server:disable",
            "server:enable",
        ]
    );
    assert_eq!(
        controller.metrics().integration_restarts.load(Ordering::Relaxed),
        2
    );
    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_auth_window_clears_itself_after_ttl() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    let ephemeral = controller.ephemeral().clone();

    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;
    assert_eq!(controller.timers().active_count(), 1);

    sleep(AUTH_WINDOW_TTL - Duration::from_secs(1)).await;
    assert!(ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY));

    sleep(Duration::from_secs(2)).await;
    assert!(!ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY));
    assert_eq!(controller.timers().active_count(), 0);

    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_repeated_set_keeps_a_single_timer() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    let ephemeral = controller.ephemeral().clone();

    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;
    sleep(Duration::from_secs(100)).await;

    // The window is not extended by a second write
    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;
    assert_eq!(controller.timers().active_count(), 1);

    sleep(AUTH_WINDOW_TTL - Duration::from_secs(100)).await;
    assert!(!ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY));

    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_manual_clear_cancels_timer() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    let ephemeral = controller.ephemeral().clone();

    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;
    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(false));
    settle().await;
    assert_eq!(controller.timers().active_count(), 0);

    // Reopening starts a fresh window
    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;
    sleep(AUTH_WINDOW_TTL / 2).await;
    assert!(ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY));

    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disabling_owner_clears_the_window() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    let ephemeral = controller.ephemeral().clone();

    ephemeral.set(COMPANION_AUTH_WINDOW_KEY, Value::Bool(true));
    settle().await;

    controller
        .config()
        .update(|s| s.integrations.companion_server_enabled = false)
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    assert!(!ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY));
    assert_eq!(controller.timers().active_count(), 0);
    assert_eq!(
        journal.take(),
        ["server:enable", "server:disable-begin", "server:disable"]
    );

    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_lagging_loop_converges_on_store() {
    let journal = Journal::default();
    let config = ConfigStore::in_memory(ConfigSnapshot::default());
    let mut controller = ShellController::new(config, Arc::new(RecordingHost::default()));
    controller
        .init(vec![volume_binding(&journal)])
        .await
        .unwrap();

    // No await in between, so the loop falls behind the channel capacity
    for i in 0..151 {
        controller
            .config()
            .update(|s| s.playback.ratio_volume = i % 2 == 0)
            .unwrap();
    }
    settle().await;

    assert!(controller.config().snapshot().playback.ratio_volume);
    let calls = journal.take();
    assert_eq!(calls.last().map(String::as_str), Some("volume:enable"));
    // Whatever was skipped, calls still alternate
    assert!(calls.windows(2).all(|pair| pair[0] != pair[1]), "{:?}", calls);

    controller.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_transition_inside_a_lagged_burst_enables_once() {
    let journal = Journal::default();
    let config = ConfigStore::in_memory(ConfigSnapshot::default());
    let mut controller = ShellController::new(config, Arc::new(RecordingHost::default()));
    controller
        .init(vec![volume_binding(&journal)])
        .await
        .unwrap();

    // Unrelated edits on both sides of the one transition, with no await in
    // between, overflow the channel
    for i in 0..100 {
        controller
            .config()
            .update(|s| s.appearance.zoom = if i % 2 == 0 { 110 } else { 120 })
            .unwrap();
    }
    controller
        .config()
        .update(|s| s.playback.ratio_volume = true)
        .unwrap();
    for i in 0..100 {
        controller
            .config()
            .update(|s| s.appearance.zoom = if i % 2 == 0 { 130 } else { 140 })
            .unwrap();
    }
    settle().await;

    assert_eq!(journal.take(), ["volume:enable"]);

    controller.teardown().await.unwrap();
    assert_eq!(journal.take(), ["volume:disable"]);
}

#[tokio::test]
async fn test_teardown_disables_enabled_integrations() {
    let journal = Journal::default();
    let controller = controller(&journal).await;
    journal.take();

    controller.teardown().await.unwrap();

    assert_eq!(journal.take(), ["server:disable-begin", "server:disable"]);
}
