use std::sync::Arc;

use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::error::UmamiError;
use crate::http::{ApiRequest, HttpClient};
use crate::params::{ActiveQuery, MetricsQuery, PageviewsQuery, StatsQuery, WebsitesParams};
use crate::retry::{RetryPolicy, RetryTrigger};
use crate::session::Session;
use crate::time_range::{Clock, SystemClock};

/// Authenticated client for the Umami REST API.
///
/// Owns the process-wide [`Session`] and applies the two bounded retries:
/// re-login after a 401 in self-hosted mode, and the `url`/`path` dimension
/// swap for metrics queries.
pub struct UmamiClient {
    http: HttpClient,
    session: Session,
    clock: Arc<dyn Clock>,
}

impl UmamiClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, UmamiError> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            session: Session::new(config),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to resolve symbolic ranges.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Authenticated GET returning the parsed JSON body.
    ///
    /// In self-hosted mode a 401 invalidates the cached token and the request
    /// is sent once more with fresh credentials. A second 401, or any 401 in
    /// cloud mode, is returned as [`UmamiError::UpstreamHttp`].
    pub async fn get(&self, path: &str, query: Vec<(String, String)>) -> Result<Value, UmamiError> {
        let url = self.session.api_url(path);
        let mut policy = RetryPolicy::once(RetryTrigger::AuthExpired);

        loop {
            match self.get_once(&url, &query).await {
                Err(err) if !self.session.is_cloud() && policy.should_retry(&err) => {
                    tracing::info!(path, "Umami token rejected, logging in again");
                    self.session.invalidate().await;
                }
                other => return other,
            }
        }
    }

    async fn get_once(&self, url: &str, query: &[(String, String)]) -> Result<Value, UmamiError> {
        let auth = self.session.auth_headers(&self.http).await?;
        let request = ApiRequest::get(url)
            .with_headers(self.session.common_headers().iter().cloned())
            .with_headers(auth)
            .with_query(query.to_vec());

        tracing::debug!(url = %request.display_url(), "GET");
        self.http.send(&request).await?.into_json()
    }

    pub async fn get_websites(&self, params: &WebsitesParams) -> Result<Value, UmamiError> {
        self.get("/websites", params.query()).await
    }

    pub async fn get_stats(&self, query: &StatsQuery) -> Result<Value, UmamiError> {
        self.get(&query.path(), query.query()).await
    }

    pub async fn get_pageviews(&self, query: &PageviewsQuery) -> Result<Value, UmamiError> {
        self.get(&query.path(), query.query()).await
    }

    /// Metrics breakdown.
    ///
    /// Umami versions disagree on whether the page dimension is `url` or
    /// `path`; a 400 for either is retried once with the other name.
    pub async fn get_metrics(&self, query: &MetricsQuery) -> Result<Value, UmamiError> {
        let mut policy = RetryPolicy::once(RetryTrigger::DimensionAlias);
        let mut current = query.clone();

        loop {
            let err = match self.get(&current.path(), current.query()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            match current.metric_type.alias() {
                Some(alias) if policy.should_retry(&err) => {
                    tracing::info!(
                        from = %current.metric_type,
                        to = %alias,
                        "metrics dimension rejected, retrying with alias"
                    );
                    current = current.with_type(alias);
                }
                _ => return Err(err),
            }
        }
    }

    pub async fn get_active(&self, query: &ActiveQuery) -> Result<Value, UmamiError> {
        self.get(&query.path(), Vec::new()).await
    }
}
