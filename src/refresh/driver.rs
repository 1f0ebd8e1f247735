//! Wires the visibility source and the background timer to a policy.
//!
//! One driver task per activated policy multiplexes the event sources with
//! `tokio::select!`. Triggered refreshes are spawned rather than awaited, so a
//! new trigger can start a second refresh before the first settles; the
//! invalidations are idempotent, so that race is accepted.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::duration_millis;
use super::events::RefreshTrigger;
use super::policy::{StalenessRefreshPolicy, Visibility};

/// Host-facing handle to an active policy.
///
/// Exposes only [`refresh`](Self::refresh) and [`is_stale`](Self::is_stale).
/// Dropping the handle tears the policy down just like
/// [`deactivate`](Self::deactivate), minus waiting for the driver to exit.
pub struct RefreshHandle {
    policy: Arc<StalenessRefreshPolicy>,
    shutdown: Option<oneshot::Sender<()>>,
    driver: Option<JoinHandle<()>>,
}

impl StalenessRefreshPolicy {
    /// Attach the policy to a host.
    ///
    /// Restamps the refresh time, starts listening on `visibility` and, when
    /// `background_enabled` is set, starts the background timer. Must be called
    /// from within a tokio runtime.
    pub fn activate(self, visibility: mpsc::Receiver<Visibility>) -> RefreshHandle {
        let policy = Arc::new(self);
        policy.attach();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = tokio::spawn(drive(Arc::clone(&policy), visibility, shutdown_rx));

        tracing::info!(
            groups = policy.config().data_groups.len(),
            stale_after_ms = duration_millis(policy.config().stale_after),
            background = policy.config().background_enabled,
            "Refresh policy activated"
        );

        RefreshHandle {
            policy,
            shutdown: Some(shutdown_tx),
            driver: Some(driver),
        }
    }
}

impl RefreshHandle {
    /// Manually refresh. Never fails; see [`StalenessRefreshPolicy::refresh`].
    pub async fn refresh(&self) {
        self.policy.refresh_for(RefreshTrigger::Manual).await;
    }

    pub fn is_stale(&self) -> bool {
        self.policy.is_stale()
    }

    /// Detach the policy and wait for the driver to release its listener and timer.
    pub async fn deactivate(mut self) {
        self.policy.detach();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "Refresh driver panicked");
                }
            }
        }
        tracing::info!("Refresh policy deactivated");
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.policy.detach();
        if let Some(driver) = self.driver.take() {
            driver.abort();
            tracing::debug!("Refresh handle dropped, driver aborted");
        }
    }
}

async fn drive(
    policy: Arc<StalenessRefreshPolicy>,
    mut visibility: mpsc::Receiver<Visibility>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let period = policy.config().background_interval;
    let background = policy.config().background_enabled;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut visibility_open = true;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            signal = visibility.recv(), if visibility_open => match signal {
                Some(signal) => {
                    if policy.on_visibility(signal) {
                        spawn_refresh(&policy, RefreshTrigger::Visibility);
                    }
                }
                None => {
                    tracing::debug!("Visibility source closed, keeping last known visibility");
                    visibility_open = false;
                }
            },

            _ = ticker.tick(), if background => {
                if policy.on_background_tick() {
                    spawn_refresh(&policy, RefreshTrigger::Background);
                }
            }
        }
    }

    tracing::debug!("Refresh driver stopped");
}

fn spawn_refresh(policy: &Arc<StalenessRefreshPolicy>, trigger: RefreshTrigger) {
    let policy = Arc::clone(policy);
    tokio::spawn(async move {
        policy.refresh_for(trigger).await;
    });
}
