use serde_json::Value;

use crate::error::UmamiError;

/// Status and raw body of a completed request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP response status code (e.g. 200, 401).
    pub status: u16,

    /// Response body decoded as UTF-8 (replacement characters for invalid
    /// sequences).
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse a 2xx body as JSON, or turn the response into an upstream error.
    ///
    /// An empty 2xx body parses as `null`.
    pub fn into_json(self) -> Result<Value, UmamiError> {
        if !self.is_success() {
            return Err(self.into_error());
        }
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn into_error(self) -> UmamiError {
        UmamiError::UpstreamHttp {
            status: self.status,
            body: self.body,
        }
    }
}
