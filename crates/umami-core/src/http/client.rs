use std::time::{Duration, Instant};

use crate::error::UmamiError;
use crate::http::request::{ApiRequest, HttpMethod};
use crate::http::response::ApiResponse;

const POOL_MAX_IDLE_PER_HOST: usize = 2;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// reqwest client bound to one timeout and User-Agent.
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("umami-mcp/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn build(self) -> Result<HttpClient, UmamiError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(self.user_agent)
            .gzip(true)
            .build()?;

        Ok(HttpClient {
            inner: client,
            timeout: self.timeout,
        })
    }
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Send a single request and return its status and body.
    ///
    /// Non-2xx statuses are returned as a normal [`ApiResponse`]; only
    /// transport failures are errors. A request that exceeds the configured
    /// timeout yields [`UmamiError::Timeout`].
    pub async fn send(&self, input: &ApiRequest) -> Result<ApiResponse, UmamiError> {
        let mut builder = match input.method {
            HttpMethod::Get => self.inner.get(&input.url),
            HttpMethod::Post => self.inner.post(&input.url),
        };

        for (key, value) in &input.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        if !input.query.is_empty() {
            builder = builder.query(&input.query);
        }

        if let Some(body) = &input.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| self.map_err(e))?;
        let status = response.status().as_u16();
        let body_bytes = response.bytes().await.map_err(|e| self.map_err(e))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %input.method,
            url = %input.url,
            status,
            elapsed_ms,
            "umami request completed"
        );

        Ok(ApiResponse {
            status,
            body: String::from_utf8_lossy(&body_bytes).into_owned(),
        })
    }

    fn map_err(&self, err: reqwest::Error) -> UmamiError {
        if err.is_timeout() {
            UmamiError::Timeout(self.timeout)
        } else {
            UmamiError::Http(err)
        }
    }
}
