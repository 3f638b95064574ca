//! HTTP client wrapper for probing and streaming downloads.
//!
//! This module provides the `HttpClient` struct which issues HEAD probes and
//! ranged GET requests, streaming response bodies into a file sink.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::{Client, Method, Proxy, Response};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PROBE_TIMEOUT_SECS};
use super::error::DownloadError;
use super::probe::Probe;
use crate::user_agent;

/// Settings applied when building an [`HttpClient`].
///
/// Built once by the caller and treated as immutable afterwards.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Proxy URL applied to all schemes, e.g. `http://127.0.0.1:8080` or `socks5://...`.
    pub proxy: Option<String>,
    /// User-Agent override; defaults to [`user_agent::default_download_user_agent`].
    pub user_agent: Option<String>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Cookie jar attached to every request.
    pub cookie_jar: Option<Arc<Jar>>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Total timeout for HEAD probes. The GET has none.
    pub probe_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: None,
            headers: Vec::new(),
            cookie_jar: None,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }
}

impl ClientOptions {
    /// Routes all requests through `proxy`.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Overrides the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches a cookie jar.
    #[must_use]
    pub fn with_cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Sets the HEAD probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// HTTP client for probing and downloading a single resource.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    probe_timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::from_options(&ClientOptions::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidProxy`], [`DownloadError::InvalidHeader`],
    /// or [`DownloadError::ClientBuild`] when the options cannot be applied.
    #[instrument(level = "debug", skip(options), fields(proxy = options.proxy.is_some()))]
    pub fn from_options(options: &ClientOptions) -> Result<Self, DownloadError> {
        let user_agent = options
            .user_agent
            .clone()
            .unwrap_or_else(user_agent::default_download_user_agent);

        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .user_agent(user_agent)
            .default_headers(build_headers(&options.headers)?);

        if let Some(proxy) = options.proxy.as_deref() {
            let resolved = Proxy::all(proxy).map_err(|source| DownloadError::InvalidProxy {
                proxy: proxy.to_string(),
                source,
            })?;
            builder = builder.proxy(resolved);
        }
        if let Some(jar) = options.cookie_jar.clone() {
            builder = builder.cookie_provider(jar);
        }

        let client = builder
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            probe_timeout: options.probe_timeout,
        })
    }

    /// Issues a HEAD request and reads size and range support.
    ///
    /// Never fails: network errors, timeouts, and non-2xx responses all
    /// produce [`Probe::unknown`].
    #[instrument(skip(self), fields(url = %url))]
    pub async fn probe(&self, url: &Url) -> Probe {
        match self
            .send_request(Method::HEAD, url, None, Some(self.probe_timeout))
            .await
        {
            Ok(response) => {
                let probe = Probe::from_headers(response.headers());
                debug!(
                    expected_size = ?probe.expected_size,
                    supports_range = probe.supports_range,
                    "probe complete"
                );
                probe
            }
            Err(e) => {
                debug!(error = %e, "probe failed, remote treated as unknown");
                Probe::unknown()
            }
        }
    }

    /// Remote `Content-Length`, or `None` when it cannot be determined.
    pub async fn probe_remote_size(&self, url: &Url) -> Option<u64> {
        self.probe(url).await.expected_size
    }

    /// Whether the remote advertises `Accept-Ranges: bytes`.
    pub async fn probe_range_support(&self, url: &Url) -> bool {
        self.probe(url).await.supports_range
    }

    /// Sends a GET with an optional `Range` header and no total timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`], [`DownloadError::Timeout`] (connect
    /// phase), or [`DownloadError::HttpStatus`] for non-2xx responses.
    pub async fn get(&self, url: &Url, range: Option<&str>) -> Result<Response, DownloadError> {
        self.send_request(Method::GET, url, range, None).await
    }

    async fn send_request(
        &self,
        method: Method,
        url: &Url,
        range_header: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Response, DownloadError> {
        let mut request = self.client.request(method, url.clone());
        if let Some(range) = range_header {
            request = request.header(RANGE, range);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn build_headers(headers: &[(String, String)]) -> Result<HeaderMap, DownloadError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = || DownloadError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Streams a response body into `sink`, returning bytes written.
///
/// # Errors
///
/// Returns [`DownloadError::Network`] if the body stream fails, or
/// [`DownloadError::Io`] if writing to `sink` fails.
pub(crate) async fn stream_to_sink<W>(
    sink: W,
    response: Response,
    url: &Url,
    sink_path: &std::path::Path,
) -> Result<u64, DownloadError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(sink);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(sink_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(sink_path, e))?;

    Ok(bytes_written)
}
