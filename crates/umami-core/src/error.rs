use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum UmamiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Umami API error {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("Umami API request timed out after {}", display_duration(.0))]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Whole seconds as `30s`, anything finer as `250ms`.
fn display_duration(d: &Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

impl UmamiError {
    /// Status code of a non-2xx downstream response, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UmamiError::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures that originate on the remote side of the bridge.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            UmamiError::UpstreamHttp { .. } | UmamiError::Timeout(_)
        )
    }
}
