use serde_json::Value;

/// HTTP methods used against the Umami API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        };
        write!(f, "{s}")
    }
}

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,

    /// Absolute URL without the query string.
    pub url: String,

    /// Header name/value pairs, applied in order.
    pub headers: Vec<(String, String)>,

    /// Query parameters. Absent values are never added here.
    pub query: Vec<(String, String)>,

    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// URL including the encoded query string, for logging.
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        match reqwest::Url::parse_with_params(&self.url, &self.query) {
            Ok(url) => url.to_string(),
            Err(_) => self.url.clone(),
        }
    }
}
