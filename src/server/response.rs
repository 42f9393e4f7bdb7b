use std::time::Duration;

use serde_json::Value;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Headers sent in reply to every `OPTIONS` preflight.
pub const PREFLIGHT_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Credentials", "false"),
    ("Access-Control-Max-Age", "86400"),
    (
        "Access-Control-Allow-Headers",
        "X-Requested-With, X-HTTP-Method-Override, Content-Type, Accept, X-Authorization, X-Admin",
    ),
];

/// Outcome of the pipeline, ready to be written by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Artificial delay to wait before writing, when throttling is on.
    pub delay: Option<Duration>,
}

impl Response {
    fn with_cors(status: u16) -> Self {
        Self {
            status,
            headers: vec![(ALLOW_ORIGIN.to_string(), "*".to_string())],
            body: None,
            delay: None,
        }
    }

    /// A JSON body with the given status.
    pub fn json(status: u16, body: &Value) -> Self {
        let mut response = Self::with_cors(status);
        response
            .headers
            .push((CONTENT_TYPE.to_string(), "application/json".to_string()));
        response.body = Some(body.to_string());
        response
    }

    /// 204 with neither body nor content type.
    pub fn no_content() -> Self {
        Self::with_cors(204)
    }

    /// 200 preflight answer with the permissive CORS set.
    pub fn preflight() -> Self {
        let mut response = Self::with_cors(200);
        response.headers.extend(
            PREFLIGHT_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        response
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse the body back into JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_str(body).ok())
    }
}
