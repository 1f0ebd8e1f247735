//! The category screen's data layer.
//!
//! [`CategoryManager`] reads categories, subcategories and product counts
//! through the shared [`QueryCache`](crate::cache::QueryCache), performs
//! mutations against the API, and supplies the data groups a
//! [`StalenessRefreshPolicy`](crate::refresh::StalenessRefreshPolicy) keeps fresh.

mod manager;
mod stats;

pub use manager::CategoryManager;
pub use stats::{CatalogStats, CategoryCount};
