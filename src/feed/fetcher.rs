use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::source::FetchSettings;
use crate::util::UrlValidationError;

/// Why a feed could not be fetched.
///
/// Every variant is fatal to the scheduling pass that triggered the fetch.
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The source was asked to fetch before any URL was configured.
    #[error("no feed URL configured")]
    NotConfigured,
    /// The configured URL failed validation.
    #[error("{0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The fetch did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Feed bytes could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A feed fetch failed. Carries the URL that failed and the cause.
#[derive(Debug, Error)]
#[error("failed to fetch feed {url}: {failure}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub failure: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, failure: FetchFailure) -> Self {
        Self {
            url: url.into(),
            failure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, FetchFailure::Timeout(_))
    }
}

/// Downloads one feed document, bounded by the configured timeout.
///
/// The timeout covers every attempt of the retry loop, including body reads,
/// so a slow or stalled server cannot hold the pass open indefinitely.
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    settings: &FetchSettings,
) -> Result<Vec<u8>, FetchFailure> {
    tokio::time::timeout(settings.timeout, fetch_with_retries(client, url, settings))
        .await
        .map_err(|_| FetchFailure::Timeout(settings.timeout))?
}

async fn fetch_with_retries(
    client: &reqwest::Client,
    url: &str,
    settings: &FetchSettings,
) -> Result<Vec<u8>, FetchFailure> {
    let mut retry_count = 0;

    loop {
        let response = client.get(url).send().await?;
        let status = response.status();

        // Rate limiting and server errors back off exponentially (1s, 2s, 4s, ...)
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= settings.max_retries {
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(FetchFailure::RateLimited(settings.max_retries));
                }
                return Err(FetchFailure::HttpStatus(status.as_u16()));
            }

            let delay_secs = 2u64.pow(retry_count);
            tracing::warn!(
                url = %url,
                status = %status,
                retry = retry_count,
                delay_secs = delay_secs,
                "Feed server refused request, backing off"
            );
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            retry_count += 1;
            continue;
        }

        // 4xx other than 429 fail immediately
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, settings.max_feed_bytes).await {
            Ok(bytes) => return Ok(bytes),
            Err(FetchFailure::IncompleteResponse { expected, received }) => {
                if retry_count >= settings.max_retries {
                    return Err(FetchFailure::IncompleteResponse { expected, received });
                }

                let delay_secs = 2u64.pow(retry_count);
                tracing::debug!(
                    url = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    delay_secs = delay_secs,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchFailure> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchFailure::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchFailure::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchFailure::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
