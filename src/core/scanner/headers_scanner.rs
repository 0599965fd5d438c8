// src/core/scanner/headers_scanner.rs

use tracing::{debug, info, warn};

use crate::core::error::ProbeError;
use crate::core::models::HeadResponse;
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Flattens a `HeaderMap` into lower-cased names. When a header repeats, the
/// last value wins. Non-UTF-8 values are kept as a placeholder so presence
/// checks still see them.
pub fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for (name, value) in headers {
        let value = match value.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                warn!(header_name = %name, "Header found but contained invalid UTF-8.");
                "[Invalid UTF-8]".to_string()
            }
        };
        collected.insert(name.as_str().to_ascii_lowercase(), value);
    }
    collected
}

/// Issues a HEAD request (redirects followed by `client`) and reports the
/// final status and headers.
pub async fn run_headers_scan(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<HeadResponse, ProbeError> {
    info!(%url, "Starting headers scan.");

    let response = client
        .head(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            warn!(%url, error = %e, "HEAD request failed.");
            ProbeError::Http(e)
        })?;

    let status_code = response.status().as_u16();
    let headers = collect_headers(response.headers());
    debug!(status_code, count = headers.len(), "Collected response headers.");
    info!(status_code, "Headers scan finished.");

    Ok(HeadResponse {
        status_code,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SERVER, SET_COOKIE};

    #[test]
    fn test_repeated_header_keeps_last_value() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers.insert(SERVER, HeaderValue::from_static("nginx"));

        let collected = collect_headers(&headers);
        assert_eq!(collected.get("set-cookie").map(String::as_str), Some("b=2"));
        assert_eq!(collected.get("server").map(String::as_str), Some("nginx"));
        assert_eq!(collected.len(), 2);
    }

    #[test]
    fn test_non_utf8_value_is_kept_as_placeholder() {
        let mut headers = HeaderMap::new();
        headers.insert("x-odd", HeaderValue::from_bytes(&[0xFF, 0xFE]).unwrap());
        let collected = collect_headers(&headers);
        assert_eq!(collected.get("x-odd").map(String::as_str), Some("[Invalid UTF-8]"));
    }
}
