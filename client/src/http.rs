//! Blocking HTTP client for the blockchain API.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use hotspot_types::{ChallengeRecord, Hotspot};

use crate::source::{ChallengeSource, DirectorySource, Page};
use crate::FetchError;

/// Public API root.
pub const DEFAULT_API_URL: &str = "https://api.helium.io/v1";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait used when a 429 response carries no usable hint.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Height {
    height: u64,
}

#[derive(Deserialize)]
struct TooBusy {
    error: String,
    come_back_in_ms: u64,
}

/// Extract the wait hint from a `{"error":"Too Busy","come_back_in_ms":N}` body.
pub fn parse_rate_limit(body: &str) -> Option<Duration> {
    let busy: TooBusy = serde_json::from_str(body).ok()?;
    (busy.error == "Too Busy").then(|| Duration::from_millis(busy.come_back_in_ms))
}

/// Decode a page body one element at a time. Elements that do not decode
/// as `T` are logged and dropped; the rest of the page is kept.
pub fn decode_page<T: DeserializeOwned>(body: &str, what: &str) -> Result<Page<T>, FetchError> {
    let raw: Page<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("{what}: {e}")))?;
    let mut data = Vec::with_capacity(raw.data.len());
    for (index, value) in raw.data.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(item) => data.push(item),
            Err(e) => tracing::warn!(what, index, error = %e, "skipping malformed entry"),
        }
    }
    Ok(Page {
        data,
        cursor: raw.cursor,
    })
}

/// Map a response status onto the fetch error taxonomy.
pub fn classify_status(
    status: u16,
    body: &str,
    rate_limit_fallback: Duration,
) -> Result<(), FetchError> {
    match status {
        200..=299 => Ok(()),
        429 => {
            let wait = parse_rate_limit(body).unwrap_or_else(|| {
                tracing::warn!(body, "rate limited without a usable hint");
                rate_limit_fallback
            });
            Err(FetchError::RateLimited { wait })
        }
        500..=599 => Err(FetchError::Server {
            status,
            body: body.to_string(),
        }),
        _ => Err(FetchError::Http {
            status,
            body: body.to_string(),
        }),
    }
}

/// One request per call; retries and paging live in [`crate::Fetcher`].
pub struct HttpClient {
    base_url: String,
    http: reqwest::blocking::Client,
    rate_limit_fallback: Duration,
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        rate_limit_fallback: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            rate_limit_fallback,
        })
    }

    /// Client for the public API with default timeouts.
    pub fn mainnet() -> Result<Self, FetchError> {
        Self::new(DEFAULT_API_URL, DEFAULT_TIMEOUT, DEFAULT_RATE_LIMIT_WAIT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and return the body of a successful response.
    fn get_body(&self, path: &str, cursor: Option<&str>) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).header(ACCEPT, "application/json");
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        tracing::debug!(%url, cursor, "GET");

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Transport(format!("request timed out: {e}"))
            } else if e.is_connect() {
                FetchError::Transport(format!("connection failed: {e}"))
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| FetchError::Transport(format!("failed to read body: {e}")))?;

        classify_status(status, &body, self.rate_limit_fallback)?;
        Ok(body)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let body = self.get_body(path, None)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(format!("{path}: {e}")))
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        cursor: Option<&str>,
    ) -> Result<Page<T>, FetchError> {
        decode_page(&self.get_body(path, cursor)?, path)
    }
}

impl ChallengeSource for HttpClient {
    fn fetch_page(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> Result<Page<ChallengeRecord>, FetchError> {
        self.get_page(&format!("/hotspots/{address}/challenges"), cursor)
    }
}

impl DirectorySource for HttpClient {
    fn fetch_hotspot_page(&self, cursor: Option<&str>) -> Result<Page<Hotspot>, FetchError> {
        self.get_page("/hotspots", cursor)
    }

    fn fetch_hotspot(&self, address: &str) -> Result<Option<Hotspot>, FetchError> {
        match self.get_json::<Envelope<Hotspot>>(&format!("/hotspots/{address}")) {
            Ok(envelope) => Ok(Some(envelope.data)),
            Err(FetchError::Http { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn current_height(&self) -> Result<u64, FetchError> {
        let envelope: Envelope<Height> = self.get_json("/blocks/height")?;
        Ok(envelope.data.height)
    }
}
