use crate::models::RemoteCommand;

/// Operating-system facilities the core drives but does not implement.
///
/// Implementations must be cheap and non-blocking: they are called from the
/// orchestrator loop between change batches.
pub trait ShellHost: Send + Sync {
    /// Scale the hosted surface. `factor` is already clamped, `1.0` is 100%.
    fn set_zoom_factor(&self, factor: f64);

    fn set_login_item(&self, open_at_login: bool, open_as_hidden: bool);

    /// Replace every registered global shortcut with `bindings`.
    fn register_shortcuts(&self, bindings: &[(RemoteCommand, String)]) -> anyhow::Result<()>;

    /// `None` clears the indicator.
    fn set_taskbar_progress(&self, progress: Option<f64>);

    /// Open `url` in the default browser.
    fn open_external(&self, url: &str);

    fn show_notification(&self, title: &str, body: &str);

    /// Ask the user to approve a companion app pairing showing `code`.
    ///
    /// May block until the user answers; callers run it off the async
    /// workers.
    fn confirm_pairing(&self, app_name: &str, code: &str) -> bool;
}

/// Host without a desktop session. Every call is logged and otherwise ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessHost;

impl ShellHost for HeadlessHost {
    fn set_zoom_factor(&self, factor: f64) {
        tracing::info!("Zoom factor set to {:.2}", factor);
    }

    fn set_login_item(&self, open_at_login: bool, open_as_hidden: bool) {
        tracing::info!(
            "Login item updated (open at login: {}, hidden: {})",
            open_at_login,
            open_as_hidden
        );
    }

    fn register_shortcuts(&self, bindings: &[(RemoteCommand, String)]) -> anyhow::Result<()> {
        tracing::info!("Registering {} global shortcuts", bindings.len());
        for (command, accelerator) in bindings {
            tracing::debug!("  {} -> {:?}", accelerator, command);
        }
        Ok(())
    }

    fn set_taskbar_progress(&self, progress: Option<f64>) {
        match progress {
            Some(fraction) => tracing::trace!("Taskbar progress {:.3}", fraction),
            None => tracing::trace!("Taskbar progress cleared"),
        }
    }

    fn open_external(&self, url: &str) {
        tracing::info!("Opening externally: {}", url);
    }

    fn show_notification(&self, title: &str, body: &str) {
        tracing::info!("Notification: {} - {}", title, body);
    }

    /// Nobody can approve, so every pairing is declined.
    fn confirm_pairing(&self, app_name: &str, code: &str) -> bool {
        tracing::warn!("Declining pairing of {} (code {}): no user to confirm", app_name, code);
        false
    }
}
