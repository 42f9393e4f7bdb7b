//! Transport-independent request representation.

use std::collections::HashMap;

use serde_json::Value;

/// Flat query-string parameters.
pub type Query = HashMap<String, String>;

/// An inbound request as the pipeline sees it.
///
/// Header names are lower-cased. The body is parsed as JSON when possible and
/// kept as a raw string otherwise.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Query,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    pub fn new(method: impl AsRef<str>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Query::new()),
        };
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            body: Value::String(String::new()),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body from raw bytes, parsing JSON when possible.
    pub fn body_bytes(mut self, bytes: &[u8]) -> Self {
        self.body = parse_body(bytes);
        self
    }

    /// Set an already-parsed JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.as_str())
    }

    /// Service name and remaining path tokens. Empty segments are dropped.
    pub fn route(&self) -> (Option<&str>, Vec<&str>) {
        let mut tokens = self.path.split('/').filter(|t| !t.is_empty());
        let service = tokens.next();
        (service, tokens.collect())
    }
}

/// Split on `&` then `=`, percent-decoding values. Empty segments are skipped.
pub fn parse_query(query: &str) -> Query {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), percent_decode(value)),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// JSON when the bytes parse as JSON, the raw text otherwise.
pub fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Decode `%XX` escapes. `+` is kept literally. Malformed input is returned as-is.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            match escaped {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                    continue;
                }
                None => return input.to_string(),
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}
