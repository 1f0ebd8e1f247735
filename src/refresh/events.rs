use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::DataGroupKey;

/// What caused a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Called directly by the host (e.g. a refresh key).
    Manual,
    /// Tab came back to the foreground after a long absence.
    Visibility,
    /// Background timer found the data stale.
    Background,
}

/// Diagnostic notifications emitted by the policy.
///
/// None of these reach the caller of `refresh()`; they exist so a host can
/// log, count or display what the policy decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    Triggered(RefreshTrigger),
    /// Data was still fresh and `refresh_only_when_stale` is set.
    Skipped,
    Completed { groups: usize },
    Failed { group: DataGroupKey, error: String },
}

/// Receives [`RefreshEvent`]s. Must not block.
pub trait RefreshObserver: Send + Sync {
    fn on_event(&self, event: &RefreshEvent);
}

impl<F> RefreshObserver for F
where
    F: Fn(&RefreshEvent) + Send + Sync,
{
    fn on_event(&self, event: &RefreshEvent) {
        self(event)
    }
}

/// Forwards events into a bounded channel, dropping them when the receiver lags.
pub struct ChannelObserver {
    tx: mpsc::Sender<RefreshEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<RefreshEvent>) -> Arc<Self> {
        Arc::new(Self { tx })
    }
}

impl RefreshObserver for ChannelObserver {
    fn on_event(&self, event: &RefreshEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            tracing::debug!(error = %e, "Dropping refresh event (receiver full or closed)");
        }
    }
}
