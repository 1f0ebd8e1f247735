//! Category administration for a storefront admin API.
//!
//! - [`api`] - HTTP client and record types
//! - [`cache`] - query cache and the invalidation contract
//! - [`catalog`] - category/subcategory reads, mutations and stats
//! - [`refresh`] - staleness-driven refresh policy
//! - [`config`] - `config.toml` loading
//! - [`util`] - URL validation and text helpers

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod refresh;
pub mod util;
