use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::config::{PolicyConfigError, RefreshPolicyConfig};
use super::events::{RefreshEvent, RefreshObserver, RefreshTrigger};
use crate::cache::{Invalidate, MatchMode};

/// Absence after which returning to the foreground forces a refresh.
///
/// Deliberately coarser than any sensible `stale_after` so quick tab switches
/// do not refresh.
pub const LONG_ABSENCE: Duration = Duration::from_secs(15 * 60);

/// Host visibility signal (browser tab, terminal focus, window state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Mutable state owned by one policy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyState {
    /// Time of the last successful refresh, or of activation. Never moves backwards.
    pub last_refresh_at: Instant,
    /// Only changed by visibility transitions.
    pub tab_active: bool,
    /// True between activation and deactivation; completions after teardown are dropped.
    pub attached: bool,
}

/// Decides when to invalidate a fixed set of data groups and does so
/// without ever surfacing an error.
///
/// Three independent triggers feed [`refresh`](Self::refresh):
/// explicit calls, a visibility transition after [`LONG_ABSENCE`], and a
/// background tick while the tab is active and the data is stale. The
/// triggers are wired by [`activate`](Self::activate); the decision methods
/// ([`on_visibility`](Self::on_visibility), [`on_background_tick`](Self::on_background_tick))
/// are plain functions of the state so each can be exercised in isolation.
pub struct StalenessRefreshPolicy {
    config: RefreshPolicyConfig,
    state: Mutex<PolicyState>,
    invalidator: Arc<dyn Invalidate>,
    observer: Option<Arc<dyn RefreshObserver>>,
}

impl StalenessRefreshPolicy {
    /// Build a policy that is not yet attached to a host.
    ///
    /// Staleness is measured from construction until [`activate`](Self::activate)
    /// restamps it.
    pub fn new(
        config: RefreshPolicyConfig,
        invalidator: Arc<dyn Invalidate>,
    ) -> Result<Self, PolicyConfigError> {
        config.validate()?;
        if config.data_groups.is_empty() {
            tracing::warn!("Refresh policy configured without data groups; refreshes will do nothing");
        }
        Ok(Self {
            config,
            state: Mutex::new(PolicyState {
                last_refresh_at: Instant::now(),
                tab_active: true,
                attached: false,
            }),
            invalidator,
            observer: None,
        })
    }

    /// Attach a diagnostics observer.
    pub fn with_observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &RefreshPolicyConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PolicyState {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: RefreshEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    fn stale(&self, state: &PolicyState) -> bool {
        Instant::now().saturating_duration_since(state.last_refresh_at) >= self.config.stale_after
    }

    /// True once `stale_after` has elapsed since the last successful refresh.
    pub fn is_stale(&self) -> bool {
        let state = self.lock();
        self.stale(&state)
    }

    /// Mark the policy as mounted and restart the staleness clock.
    pub(crate) fn attach(&self) {
        let mut state = self.lock();
        state.attached = true;
        state.tab_active = true;
        state.last_refresh_at = state.last_refresh_at.max(Instant::now());
    }

    /// Mark the policy as unmounted. In-flight refreshes will not record completion.
    pub(crate) fn detach(&self) {
        self.lock().attached = false;
    }

    /// Invalidate every configured group, best effort.
    ///
    /// All invalidations are dispatched at once and awaited together. The
    /// refresh time only advances when every one of them succeeds and the
    /// policy is still attached; failures are logged and reported to the
    /// observer, never returned.
    pub async fn refresh(&self) {
        if self.config.refresh_only_when_stale && !self.is_stale() {
            tracing::debug!("Data still fresh, skipping refresh");
            self.notify(RefreshEvent::Skipped);
            return;
        }

        let groups = &self.config.data_groups;
        if groups.is_empty() {
            tracing::debug!("No data groups to refresh");
            return;
        }

        let results = join_all(
            groups
                .iter()
                .map(|group| self.invalidator.invalidate(group, MatchMode::Prefix)),
        )
        .await;

        let mut failed = false;
        for (group, result) in groups.iter().zip(results) {
            if let Err(e) = result {
                failed = true;
                tracing::warn!(group = %group, error = %e, "Invalidation failed, will retry on next trigger");
                self.notify(RefreshEvent::Failed {
                    group: group.clone(),
                    error: e.to_string(),
                });
            }
        }
        if failed {
            return;
        }

        {
            let mut state = self.lock();
            if !state.attached {
                tracing::debug!("Refresh settled after teardown, not recording it");
                return;
            }
            state.last_refresh_at = state.last_refresh_at.max(Instant::now());
        }

        tracing::info!(groups = groups.len(), "Data groups refreshed");
        self.notify(RefreshEvent::Completed {
            groups: groups.len(),
        });
    }

    /// Apply a visibility signal. Returns true when a refresh should be triggered.
    ///
    /// Only a Hidden → Visible transition can trigger, and only when more than
    /// [`LONG_ABSENCE`] has passed since the last refresh. Repeated signals for
    /// the current state are ignored.
    pub fn on_visibility(&self, visibility: Visibility) -> bool {
        let mut state = self.lock();
        match visibility {
            Visibility::Hidden => {
                if state.tab_active {
                    state.tab_active = false;
                    tracing::debug!("Host hidden, background refresh paused");
                }
                false
            }
            Visibility::Visible => {
                if state.tab_active {
                    return false;
                }
                state.tab_active = true;
                let since_refresh = Instant::now().saturating_duration_since(state.last_refresh_at);
                let trigger = since_refresh > LONG_ABSENCE;
                tracing::debug!(
                    since_refresh_secs = since_refresh.as_secs(),
                    trigger,
                    "Host visible again"
                );
                trigger
            }
        }
    }

    /// Background timer decision: refresh only while active and stale. No state is touched.
    pub fn on_background_tick(&self) -> bool {
        let state = self.lock();
        state.tab_active && self.stale(&state)
    }

    /// Run a refresh on behalf of `trigger`, reporting the trigger to the observer first.
    pub(crate) async fn refresh_for(&self, trigger: RefreshTrigger) {
        tracing::debug!(?trigger, "Refresh triggered");
        self.notify(RefreshEvent::Triggered(trigger));
        self.refresh().await;
    }
}
