use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::shape::{decode_list, decode_record};
use super::types::{Category, CategoryDraft, Product, Subcategory, SubcategoryDraft};
use super::ApiError;
use crate::util::validate_base_url;

/// Upper bound on any response body.
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Client for the category, subcategory and product endpoints.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CatalogClient {
    /// Build a client for `base_url` (e.g. `https://shop.example.com/api`).
    ///
    /// HTTPS is required except for localhost, which keeps the bearer token off
    /// plaintext connections to remote hosts.
    pub fn new(base_url: &str, token: Option<SecretString>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            validate_base_url(base_url).map_err(|e| ApiError::InvalidBaseUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let body = self.send(Method::GET, &["categories"], None::<&()>).await?;
        decode_list(body, "categories")
    }

    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category, ApiError> {
        let body = self.send(Method::POST, &["categories"], Some(draft)).await?;
        decode_record(body, "category")
    }

    pub async fn update_category(&self, id: &str, draft: &CategoryDraft) -> Result<Category, ApiError> {
        let body = self.send(Method::PUT, &["categories", id], Some(draft)).await?;
        decode_record(body, "category")
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &["categories", id], None::<&()>).await?;
        Ok(())
    }

    // ========================================================================
    // Subcategories
    // ========================================================================

    pub async fn list_subcategories(&self) -> Result<Vec<Subcategory>, ApiError> {
        let body = self.send(Method::GET, &["subcategories"], None::<&()>).await?;
        decode_list(body, "subcategories")
    }

    pub async fn create_subcategory(&self, draft: &SubcategoryDraft) -> Result<Subcategory, ApiError> {
        let body = self.send(Method::POST, &["subcategories"], Some(draft)).await?;
        decode_record(body, "subcategory")
    }

    pub async fn update_subcategory(
        &self,
        id: &str,
        draft: &SubcategoryDraft,
    ) -> Result<Subcategory, ApiError> {
        let body = self.send(Method::PUT, &["subcategories", id], Some(draft)).await?;
        decode_record(body, "subcategory")
    }

    pub async fn delete_subcategory(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &["subcategories", id], None::<&()>).await?;
        Ok(())
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// Products filed under a category. A 404 means "no products", not an error.
    pub async fn list_products_by_category(&self, category_id: &str) -> Result<Vec<Product>, ApiError> {
        match self
            .send(Method::GET, &["products", "category", category_id], None::<&()>)
            .await
        {
            Ok(body) => decode_list(body, "products"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(category_id, "No products endpoint result for category");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the parsed JSON body (`Null` for empty bodies).
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(method = %method, url = %url, "API request");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(ApiError::InvalidJson)?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e)
            }
        })?;

        let status = response.status();
        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;

        if !status.is_success() {
            let message = server_message(&bytes);
            tracing::warn!(method = %method, url = %url, status = status.as_u16(), ?message, "API request failed");
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(ApiError::InvalidJson)
    }
}

/// Read a response body, refusing anything larger than `limit`.
async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e)
            }
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// The `message` or `error` string of an error body, if it has one.
fn server_message(bytes: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(bytes).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(|s| crate::util::strip_control_chars(s).into_owned())
}
