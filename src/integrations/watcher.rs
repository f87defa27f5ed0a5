use crate::models::PlayerState;
use crate::services::PlayerStateAggregator;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Background task feeding canonical player updates to an integration.
#[derive(Default)]
pub(crate) struct PlayerWatcher {
    task: Option<JoinHandle<()>>,
}

impl PlayerWatcher {
    /// Start watching. No-op if already running.
    pub fn start<F>(&mut self, name: &'static str, player: &PlayerStateAggregator, mut on_state: F)
    where
        F: FnMut(&PlayerState) + Send + 'static,
    {
        if self.task.is_some() {
            return;
        }

        let mut state_rx = player.subscribe();
        self.task = Some(tokio::spawn(async move {
            loop {
                match state_rx.recv().await {
                    Ok(state) => on_state(&state),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("{} lagged behind by {} player updates", name, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for PlayerWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
