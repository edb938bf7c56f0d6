use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::{ResolvedConfig, SessionMode};
use crate::error::UmamiError;
use crate::http::{ApiRequest, HttpClient};

pub const API_KEY_HEADER: &str = "x-umami-api-key";

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Process-wide authentication state.
///
/// The mode is fixed at construction. In self-hosted mode a bearer token is
/// obtained on first use and cached until [`Session::invalidate`] is called.
/// The cache lock is held across the login so concurrent callers never log
/// in twice.
pub struct Session {
    mode: SessionMode,
    base_url: String,
    common_headers: Vec<(String, String)>,
    token: Mutex<Option<String>>,
}

impl Session {
    pub fn new(config: &ResolvedConfig) -> Self {
        let mut common_headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(access) = &config.access {
            common_headers.push(("CF-Access-Client-Id".to_string(), access.client_id.clone()));
            common_headers.push((
                "CF-Access-Client-Secret".to_string(),
                access.client_secret.clone(),
            ));
        }

        Self {
            mode: config.mode.clone(),
            base_url: config.base_url.clone(),
            common_headers,
            token: Mutex::new(None),
        }
    }

    pub fn is_cloud(&self) -> bool {
        self.mode.is_cloud()
    }

    /// Absolute URL for an API path such as `/websites`.
    ///
    /// Cloud serves the API under `/v1`, self-hosted instances under `/api`.
    pub fn api_url(&self, path: &str) -> String {
        let prefix = if self.is_cloud() { "/v1" } else { "/api" };
        format!("{}{prefix}{path}", self.base_url)
    }

    /// Headers sent with every request regardless of mode.
    pub fn common_headers(&self) -> &[(String, String)] {
        &self.common_headers
    }

    /// Authentication headers for the current mode, logging in if needed.
    pub async fn auth_headers(
        &self,
        http: &HttpClient,
    ) -> Result<Vec<(String, String)>, UmamiError> {
        match &self.mode {
            SessionMode::Cloud { api_key } => {
                Ok(vec![(API_KEY_HEADER.to_string(), api_key.clone())])
            }
            SessionMode::SelfHosted { username, password } => {
                let mut cached = self.token.lock().await;
                let token = match cached.as_ref() {
                    Some(token) => token.clone(),
                    None => {
                        let token = self.login(http, username, password).await?;
                        *cached = Some(token.clone());
                        token
                    }
                };
                Ok(vec![("Authorization".to_string(), format!("Bearer {token}"))])
            }
        }
    }

    /// Drop the cached token so the next [`Session::auth_headers`] logs in
    /// again. A no-op in cloud mode or when nothing is cached.
    pub async fn invalidate(&self) {
        let mut cached = self.token.lock().await;
        if cached.take().is_some() {
            tracing::debug!("cached Umami token invalidated");
        }
    }

    pub async fn has_cached_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    async fn login(
        &self,
        http: &HttpClient,
        username: &str,
        password: &str,
    ) -> Result<String, UmamiError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let request = ApiRequest::post_json(
            url,
            serde_json::json!({ "username": username, "password": password }),
        )
        .with_headers(self.common_headers.iter().cloned());

        let response = http
            .send(&request)
            .await
            .map_err(|e| UmamiError::Auth(format!("login request failed: {e}")))?;

        if !response.is_success() {
            return Err(UmamiError::Auth(format!(
                "login returned HTTP {}: {}",
                response.status, response.body
            )));
        }

        let parsed: LoginResponse = serde_json::from_str(&response.body)
            .map_err(|e| UmamiError::Auth(format!("unreadable login response: {e}")))?;

        match parsed.token {
            Some(token) if !token.is_empty() => {
                tracing::info!(base_url = %self.base_url, "logged in to self-hosted Umami");
                Ok(token)
            }
            _ => Err(UmamiError::Auth(
                "login response did not contain a token".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessHeaders, Config};

    fn cloud_session() -> Session {
        let config = Config {
            api_key: Some("key-123".to_string()),
            ..Config::default()
        };
        Session::new(&config.validate().unwrap())
    }

    fn self_hosted_session(url: &str) -> Session {
        let config = Config {
            url: Some(url.to_string()),
            username: Some("admin".to_string()),
            password: Some("umami".to_string()),
            ..Config::default()
        };
        Session::new(&config.validate().unwrap())
    }

    #[test]
    fn cloud_paths_use_v1_prefix() {
        let session = cloud_session();
        assert_eq!(session.api_url("/websites"), "https://api.umami.is/v1/websites");
    }

    #[test]
    fn self_hosted_paths_use_api_prefix() {
        let session = self_hosted_session("https://umami.example.com/api");
        assert_eq!(
            session.api_url("/websites/abc/active"),
            "https://umami.example.com/api/websites/abc/active"
        );
    }

    #[test]
    fn common_headers_include_access_pair_when_configured() {
        let mut resolved = Config {
            api_key: Some("k".to_string()),
            ..Config::default()
        }
        .validate()
        .unwrap();
        resolved.access = Some(AccessHeaders {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
        });
        let session = Session::new(&resolved);
        let names: Vec<_> = session.common_headers().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["Accept", "CF-Access-Client-Id", "CF-Access-Client-Secret"]
        );
    }

    #[tokio::test]
    async fn cloud_auth_is_static_api_key() {
        let session = cloud_session();
        let http = HttpClient::builder().build().unwrap();
        let headers = session.auth_headers(&http).await.unwrap();
        assert_eq!(headers, vec![(API_KEY_HEADER.to_string(), "key-123".to_string())]);
        assert!(!session.has_cached_token().await);
    }

    #[tokio::test]
    async fn invalidate_without_token_is_noop() {
        let session = self_hosted_session("https://umami.example.com");
        session.invalidate().await;
        session.invalidate().await;
        assert!(!session.has_cached_token().await);
    }

    #[tokio::test]
    async fn unreachable_login_is_auth_error() {
        let session = self_hosted_session("http://127.0.0.1:9");
        let http = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let err = session.auth_headers(&http).await.unwrap_err();
        assert!(matches!(err, UmamiError::Auth(_)));
        assert!(!session.has_cached_token().await);
    }
}
