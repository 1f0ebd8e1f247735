use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Why an API base URL was refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to anything but the local machine.
    #[error("HTTPS required for {0} (plain HTTP is only allowed for localhost)")]
    InsecureRemote(String),
    #[error("URL cannot be used as a base (missing host or path)")]
    NotABase,
    #[error("URL must not carry credentials, a query or a fragment")]
    UnexpectedParts,
}

/// Validate the admin API base URL.
///
/// The bearer token travels with every request, so the base must be HTTPS
/// unless it points at the local machine (`localhost`, `127.0.0.1`, `::1`).
/// Credentials, queries and fragments are rejected since endpoint paths are
/// appended to the base.
///
/// ```
/// use catalog_admin::util::validate_base_url;
///
/// assert!(validate_base_url("https://shop.example.com/api").is_ok());
/// assert!(validate_base_url("http://localhost:5000/api").is_ok());
/// assert!(validate_base_url("http://shop.example.com/api").is_err());
/// assert!(validate_base_url("ftp://shop.example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(UrlValidationError::NotABase);
    }
    if !url.username().is_empty()
        || url.password().is_some()
        || url.query().is_some()
        || url.fragment().is_some()
    {
        return Err(UrlValidationError::UnexpectedParts);
    }

    match url.scheme() {
        "https" => {}
        "http" => {
            let host = url.host_str().unwrap_or_default();
            if !is_local_host(host) {
                return Err(UrlValidationError::InsecureRemote(host.to_owned()));
            }
            tracing::warn!(base_url = %url, "Using plain HTTP API base URL (localhost only)");
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url)
}

fn is_local_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}
