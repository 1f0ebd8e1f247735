//! Staleness-driven refresh of cached data groups.
//!
//! A [`StalenessRefreshPolicy`] remembers when its data groups were last
//! refreshed and invalidates all of them together when:
//!
//! - the host asks for it ([`RefreshHandle::refresh`]), optionally only when stale,
//! - the host becomes visible again after more than [`LONG_ABSENCE`],
//! - the background timer ticks while the host is visible and the data is stale.
//!
//! Failures of the invalidation collaborator are logged and reported to an
//! optional [`RefreshObserver`]; they never reach the caller.
//!
//! # Example
//!
//! ```no_run
//! use catalog_admin::cache::{DataGroupKey, QueryCache};
//! use catalog_admin::refresh::{RefreshPolicyConfig, StalenessRefreshPolicy};
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let cache = Arc::new(QueryCache::default());
//! let config = RefreshPolicyConfig::new([DataGroupKey::from("categories")]);
//! let (_visibility_tx, visibility_rx) = mpsc::channel(8);
//!
//! let handle = StalenessRefreshPolicy::new(config, cache)?.activate(visibility_rx);
//! if handle.is_stale() {
//!     handle.refresh().await;
//! }
//! handle.deactivate().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod driver;
mod events;
mod policy;

pub(crate) use config::duration_millis;
pub use config::{PolicyConfigError, RefreshPolicyConfig};
pub use driver::RefreshHandle;
pub use events::{ChannelObserver, RefreshEvent, RefreshObserver, RefreshTrigger};
pub use policy::{PolicyState, StalenessRefreshPolicy, Visibility, LONG_ABSENCE};
