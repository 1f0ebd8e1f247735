//! HTTP client for the storefront admin API.
//!
//! - [`CatalogClient`] - category, subcategory and product endpoints
//! - [`types`] - records returned by the API and request drafts
//!
//! Responses are parsed leniently: lists may be bare arrays or wrapped under a
//! known key, and records may be bare or wrapped (see `shape`).

mod client;
mod shape;
pub mod types;

pub use client::CatalogClient;
pub use types::{Category, CategoryDraft, Product, Subcategory, SubcategoryDraft};

use thiserror::Error;

/// Errors from talking to the admin API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    /// Non-2xx response; `message` is the server's own explanation when it sent one.
    #[error("HTTP error: status {status}{}", .message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    HttpStatus { status: u16, message: Option<String> },

    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),

    #[error("Invalid JSON in response: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Body was JSON but neither an array nor a known wrapper.
    #[error("Unexpected response shape for {resource}: {found}")]
    UnexpectedShape { resource: String, found: String },

    #[error("Could not decode {resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// True for 404 responses.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::HttpStatus { status: 404, .. })
    }
}
