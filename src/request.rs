//! Transport-independent view of an incoming request.
//!
//! Only the parts the matching engine looks at are kept: the method and path
//! (for logging), every header value and the decoded query string.

use std::borrow::Cow;

/// An incoming request as seen by condition sets.
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl RequestView {
    /// Create a view with no headers and no query parameters.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Build a view from a path, raw query string and header pairs.
    pub fn from_parts<I, K, V>(
        method: impl Into<String>,
        path: impl Into<String>,
        query_string: Option<&str>,
        headers: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: method.into(),
            path: path.into(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            query: parse_query_string(query_string.unwrap_or("")),
        }
    }

    /// Add a header value. Repeated names keep every value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the query parameters with the decoded contents of `query_string`.
    pub fn with_query(mut self, query_string: &str) -> Self {
        self.query = parse_query_string(query_string);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// All values for a header, matched case-insensitively by name.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All values for a query parameter. Names are case-sensitive.
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Parse a query string into decoded key-value pairs, keeping repeats.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(part), String::new()),
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let decoded = urlencoding::decode(&spaced).map(Cow::into_owned).ok();
    decoded.unwrap_or(spaced)
}
