//! Single-slot periodic sync. At most one timer runs at a time, bound to one user.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::sync::Reconciler;

struct ActiveSync {
    user_id: String,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owned handle to the periodic sync task.
///
/// `start` for the bound user is a no-op; `start` for another user stops the
/// current timer first. `stop` lets an in-flight tick finish and prevents the
/// next one.
pub struct SyncScheduler {
    reconciler: Arc<Reconciler>,
    active: Option<ActiveSync>,
}

impl SyncScheduler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            active: None,
        }
    }

    pub fn start(&mut self, user_id: &str, interval: Duration) {
        if let Some(active) = &self.active {
            if active.user_id == user_id && !active.handle.is_finished() {
                info!(user_id, "sync already running for this user");
                return;
            }
        }
        self.stop();

        let interval = interval.max(Duration::from_millis(1));
        info!(user_id, interval_ms = interval.as_millis() as u64, "starting periodic sync");

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let reconciler = self.reconciler.clone();
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }
                debug!(user_id = %user, "running scheduled sync");
                match reconciler.sync_instances_from_api(&user).await {
                    Ok(result) if !result.success => {
                        warn!(user_id = %user, errors = ?result.errors, "scheduled sync finished with errors");
                    }
                    Ok(_) => {}
                    Err(err) => error!(user_id = %user, ?err, "scheduled sync failed"),
                }
            }
            debug!(user_id = %user, "periodic sync loop exited");
        });

        self.active = Some(ActiveSync {
            user_id: user_id.to_string(),
            stop_tx,
            handle,
        });
    }

    /// Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.stop_tx.send(());
            info!(user_id = %active.user_id, "periodic sync stopped");
        }
    }

    /// Stop and wait for an in-flight tick to finish.
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.stop_tx.send(());
            if let Err(err) = active.handle.await {
                warn!(?err, "periodic sync task ended abnormally");
            }
            info!(user_id = %active.user_id, "periodic sync shut down");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.user_id.as_str())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
