use std::time::Duration;

use crate::error::UmamiError;

/// API host used in cloud mode when no URL is configured.
pub const DEFAULT_CLOUD_URL: &str = "https://api.umami.is";

/// Dashboard host that is commonly mistaken for the API host.
const CLOUD_DASHBOARD_HOST: &str = "cloud.umami.is";

/// Raw settings collected from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub cf_access_client_id: Option<String>,
    pub cf_access_client_secret: Option<String>,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            username: None,
            password: None,
            user_agent: format!("umami-mcp/{}", env!("CARGO_PKG_VERSION")),
            cf_access_client_id: None,
            cf_access_client_secret: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Authentication mode, fixed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Cloud { api_key: String },
    SelfHosted { username: String, password: String },
}

impl SessionMode {
    pub fn is_cloud(&self) -> bool {
        matches!(self, SessionMode::Cloud { .. })
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionMode::Cloud { .. } => "cloud",
            SessionMode::SelfHosted { .. } => "self-hosted",
        };
        write!(f, "{s}")
    }
}

/// Optional proxy-auth header pair sent with every outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessHeaders {
    pub client_id: String,
    pub client_secret: String,
}

/// Validated configuration: the session mode plus the normalized API root.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub mode: SessionMode,
    /// Base URL without the `/v1` or `/api` prefix and without a trailing slash.
    pub base_url: String,
    pub user_agent: String,
    pub access: Option<AccessHeaders>,
    pub timeout: Duration,
}

impl Config {
    /// Decide the session mode and normalize the base URL.
    ///
    /// An API key selects cloud mode even when a username and password are
    /// also present.
    pub fn validate(&self) -> Result<ResolvedConfig, UmamiError> {
        if self.timeout.is_zero() {
            return Err(UmamiError::Config(
                "UMAMI_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let credentials = (
            non_empty(&self.api_key),
            non_empty(&self.username),
            non_empty(&self.password),
        );
        let mode = match credentials {
            (Some(key), _, _) => SessionMode::Cloud {
                api_key: key.to_string(),
            },
            (None, Some(user), Some(pass)) => SessionMode::SelfHosted {
                username: user.to_string(),
                password: pass.to_string(),
            },
            _ => {
                return Err(UmamiError::Config(concat!(
                    "Set UMAMI_API_KEY (for Umami Cloud) or both UMAMI_USERNAME ",
                    "and UMAMI_PASSWORD (for self-hosted)"
                )
                .to_string()))
            }
        };

        let base_url = match (&mode, non_empty(&self.url)) {
            (SessionMode::Cloud { .. }, None) => DEFAULT_CLOUD_URL.to_string(),
            (SessionMode::SelfHosted { .. }, None) => {
                return Err(UmamiError::Config(
                    "UMAMI_URL is required for self-hosted mode".to_string(),
                ))
            }
            (_, Some(url)) => normalize_base_url(url, mode.is_cloud()),
        };

        reqwest::Url::parse(&base_url)
            .map_err(|e| UmamiError::Config(format!("Invalid UMAMI_URL '{base_url}': {e}")))?;

        let access = match (
            non_empty(&self.cf_access_client_id),
            non_empty(&self.cf_access_client_secret),
        ) {
            (Some(id), Some(secret)) => Some(AccessHeaders {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            (None, None) => None,
            _ => {
                tracing::warn!(concat!(
                    "Only one of UMAMI_CF_ACCESS_CLIENT_ID / UMAMI_CF_ACCESS_CLIENT_SECRET ",
                    "is set; access headers will not be sent"
                ));
                None
            }
        };

        Ok(ResolvedConfig {
            mode,
            base_url,
            user_agent: self.user_agent.clone(),
            access,
            timeout: self.timeout,
        })
    }
}

impl ResolvedConfig {
    /// True when cloud mode points at the dashboard host instead of the API.
    pub fn targets_cloud_dashboard(&self) -> bool {
        self.mode.is_cloud()
            && reqwest::Url::parse(&self.base_url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(CLOUD_DASHBOARD_HOST)))
                .unwrap_or(false)
    }
}

/// Strip trailing slashes and the mode's own path prefix from a configured URL.
pub fn normalize_base_url(url: &str, cloud: bool) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let suffix = if cloud { "/v1" } else { "/api" };
    trimmed
        .strip_suffix(suffix)
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud_config() -> Config {
        Config {
            api_key: Some("key-123".to_string()),
            ..Config::default()
        }
    }

    fn self_hosted_config(url: Option<&str>) -> Config {
        Config {
            url: url.map(str::to_string),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn api_key_selects_cloud_with_default_url() {
        let resolved = cloud_config().validate().unwrap();
        assert!(resolved.mode.is_cloud());
        assert_eq!(resolved.base_url, DEFAULT_CLOUD_URL);
    }

    #[test]
    fn api_key_wins_over_credentials() {
        let mut config = self_hosted_config(Some("https://umami.example.com"));
        config.api_key = Some("key-123".to_string());
        let resolved = config.validate().unwrap();
        assert_eq!(
            resolved.mode,
            SessionMode::Cloud {
                api_key: "key-123".to_string()
            }
        );
    }

    #[test]
    fn cloud_strips_v1_suffix() {
        let mut config = cloud_config();
        config.url = Some("https://api.umami.is/v1/".to_string());
        assert_eq!(config.validate().unwrap().base_url, "https://api.umami.is");
    }

    #[test]
    fn self_hosted_strips_api_suffix() {
        let resolved = self_hosted_config(Some("https://umami.example.com/api/"))
            .validate()
            .unwrap();
        assert_eq!(resolved.base_url, "https://umami.example.com");
        assert_eq!(resolved.mode.to_string(), "self-hosted");
    }

    #[test]
    fn self_hosted_requires_url() {
        let err = self_hosted_config(None).validate().unwrap_err();
        assert!(matches!(err, UmamiError::Config(_)));
        assert!(err.to_string().contains("UMAMI_URL"));
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let config = Config {
            username: Some("admin".to_string()),
            password: Some("  ".to_string()),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("UMAMI_API_KEY"));
    }

    #[test]
    fn unparsable_url_is_config_error() {
        let err = self_hosted_config(Some("not a url")).validate().unwrap_err();
        assert!(matches!(err, UmamiError::Config(_)));
    }

    #[test]
    fn access_headers_need_both_halves() {
        let mut config = cloud_config();
        config.cf_access_client_id = Some("id".to_string());
        assert!(config.validate().unwrap().access.is_none());

        config.cf_access_client_secret = Some("secret".to_string());
        assert_eq!(
            config.validate().unwrap().access,
            Some(AccessHeaders {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            })
        );
    }

    #[test]
    fn dashboard_host_is_detected() {
        let mut config = cloud_config();
        config.url = Some("https://cloud.umami.is".to_string());
        assert!(config.validate().unwrap().targets_cloud_dashboard());
        assert!(!cloud_config().validate().unwrap().targets_cloud_dashboard());
    }

    #[test]
    fn zero_timeout_is_config_error() {
        let mut config = cloud_config();
        config.timeout = std::time::Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, UmamiError::Config(_)));
        assert!(err.to_string().contains("UMAMI_TIMEOUT_SECS"));
    }

    #[test]
    fn default_user_agent_names_the_crate() {
        assert!(Config::default().user_agent.starts_with("umami-mcp/"));
    }
}
