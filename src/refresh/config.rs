use std::time::Duration;
use thiserror::Error;

use crate::cache::DataGroupKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyConfigError {
    #[error("stale_after must be greater than zero")]
    ZeroStaleAfter,

    /// A zero period would make the background timer spin.
    #[error("background_interval must be greater than zero")]
    ZeroBackgroundInterval,
}

/// Immutable configuration of a [`StalenessRefreshPolicy`](super::StalenessRefreshPolicy).
///
/// Built with [`RefreshPolicyConfig::new`] and the chained setters:
///
/// ```
/// use catalog_admin::cache::DataGroupKey;
/// use catalog_admin::refresh::RefreshPolicyConfig;
/// use std::time::Duration;
///
/// let config = RefreshPolicyConfig::new([DataGroupKey::from("categories")])
///     .stale_after(Duration::from_secs(60))
///     .refresh_only_when_stale(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicyConfig {
    /// Groups invalidated together by every refresh. Duplicates are removed, order kept.
    pub data_groups: Vec<DataGroupKey>,
    /// Age after which data counts as stale.
    pub stale_after: Duration,
    /// Period of the background check while the tab is active.
    pub background_interval: Duration,
    /// When set, a refresh of fresh data is a silent no-op.
    pub refresh_only_when_stale: bool,
    /// Whether the background timer runs at all.
    pub background_enabled: bool,
}

impl RefreshPolicyConfig {
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(300_000);
    pub const DEFAULT_BACKGROUND_INTERVAL: Duration = Duration::from_millis(1_800_000);

    pub fn new(data_groups: impl IntoIterator<Item = DataGroupKey>) -> Self {
        let mut groups: Vec<DataGroupKey> = Vec::new();
        for group in data_groups {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        Self {
            data_groups: groups,
            stale_after: Self::DEFAULT_STALE_AFTER,
            background_interval: Self::DEFAULT_BACKGROUND_INTERVAL,
            refresh_only_when_stale: false,
            background_enabled: false,
        }
    }

    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn background_interval(mut self, interval: Duration) -> Self {
        self.background_interval = interval;
        self
    }

    pub fn refresh_only_when_stale(mut self, only_when_stale: bool) -> Self {
        self.refresh_only_when_stale = only_when_stale;
        self
    }

    pub fn background_enabled(mut self, enabled: bool) -> Self {
        self.background_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), PolicyConfigError> {
        if self.stale_after.is_zero() {
            return Err(PolicyConfigError::ZeroStaleAfter);
        }
        if self.background_interval.is_zero() {
            return Err(PolicyConfigError::ZeroBackgroundInterval);
        }
        Ok(())
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
