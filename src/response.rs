//! Response definitions and rendering.
//!
//! A [`ResponseSpec`] is validated when the fixtures document is built.
//! [`render`] writes it to any [`ResponseWriter`], serializing the body
//! according to the declared `content-type`.

use crate::error::{FixtureError, RenderError};
use hyper::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Content type assumed when a response does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Response body as declared in a fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// A string body. Written verbatim for `text/plain`.
    Text(String),
    /// Any other structured value (mapping, sequence, number, boolean).
    Structured(serde_json::Value),
}

impl Body {
    /// Convert a declared value. `null` means no body.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Body::Text(s)),
            other => Some(Body::Structured(other)),
        }
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Body::Text(text) => serializer.serialize_str(text),
            Body::Structured(value) => value.serialize(serializer),
        }
    }
}

/// Response definition as written in a fixtures document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ResponseDefinition {
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

pub(crate) fn default_status() -> u16 {
    200
}

/// A validated response: status, headers and optional body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ResponseDefinition")]
pub struct ResponseSpec {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Option<Body>,
}

impl ResponseSpec {
    /// Build and validate a response.
    ///
    /// Rejects status codes outside 100-599, header names or values that
    /// cannot appear on the wire, and non-string bodies declared as
    /// `text/plain`.
    pub fn new(
        status: u16,
        headers: BTreeMap<String, String>,
        body: Option<serde_json::Value>,
    ) -> Result<Self, FixtureError> {
        if !(100..=599).contains(&status) {
            return Err(FixtureError::InvalidStatus(status));
        }

        for (name, value) in &headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| FixtureError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            HeaderValue::from_str(value).map_err(|e| FixtureError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        }

        let spec = Self {
            status,
            headers,
            body: body.and_then(Body::from_value),
        };

        let declares_text = spec
            .header("content-type")
            .and_then(|ct| media_type(ct).ok())
            .is_some_and(|mt| mt == "text/plain");
        if declares_text && matches!(spec.body, Some(Body::Structured(_))) {
            return Err(FixtureError::NonTextBody);
        }

        Ok(spec)
    }

    /// A response with only a status code.
    pub fn with_status(status: u16) -> Result<Self, FixtureError> {
        Self::new(status, BTreeMap::new(), None)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Look up a declared header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl TryFrom<ResponseDefinition> for ResponseSpec {
    type Error = FixtureError;

    fn try_from(def: ResponseDefinition) -> Result<Self, Self::Error> {
        Self::new(def.status, def.headers, def.body)
    }
}

/// Destination for a rendered response.
pub trait ResponseWriter {
    fn set_header(&mut self, name: &str, value: &str);
    fn set_status(&mut self, status: u16);
    fn write_body(&mut self, bytes: &[u8]);
}

/// In-memory response, handed to the transport once rendering is done.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl MockResponse {
    /// An empty-bodied response with the given status.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }
}

impl ResponseWriter for MockResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn write_body(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }
}

/// Write a response: headers, then status, then the serialized body.
///
/// On error the headers and status have already been written and no body
/// is written.
pub fn render<W: ResponseWriter + ?Sized>(
    spec: &ResponseSpec,
    writer: &mut W,
) -> Result<(), RenderError> {
    for (name, value) in &spec.headers {
        writer.set_header(name, value);
    }
    writer.set_status(spec.status);

    let Some(body) = &spec.body else {
        return Ok(());
    };

    let content_type = spec.header("content-type").unwrap_or(DEFAULT_CONTENT_TYPE);
    let output = encode_body(body, &media_type(content_type)?)?;
    writer.write_body(&output);
    Ok(())
}

/// Serialize a body for a media type (without parameters).
pub fn encode_body(body: &Body, media_type: &str) -> Result<Vec<u8>, RenderError> {
    match media_type {
        "application/json" => Ok(serde_json::to_vec(body)?),
        "application/x-yaml" | "application/yaml" | "text/yaml" => {
            Ok(serde_yaml::to_string(body)?.into_bytes())
        }
        "text/plain" => match body {
            Body::Text(text) => Ok(text.as_bytes().to_vec()),
            Body::Structured(_) => Err(RenderError::BodyNotText),
        },
        other => Err(RenderError::UnsupportedMediaType(other.to_string())),
    }
}

/// Extract the lower-cased `type/subtype` from a content type, dropping
/// parameters such as `charset`.
pub fn media_type(content_type: &str) -> Result<String, RenderError> {
    let invalid = || RenderError::InvalidMediaType(content_type.to_string());

    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let (kind, subtype) = essence.split_once('/').ok_or_else(invalid)?;
    let is_token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };
    if !is_token(kind) || !is_token(subtype) {
        return Err(invalid());
    }

    Ok(essence.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(status: u16, headers: &[(&str, &str)], body: Option<serde_json::Value>) -> ResponseSpec {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResponseSpec::new(status, headers, body).unwrap()
    }

    fn rendered(spec: &ResponseSpec) -> (MockResponse, Result<(), RenderError>) {
        let mut response = MockResponse::default();
        let result = render(spec, &mut response);
        (response, result)
    }

    #[test]
    fn test_plaintext_response() {
        let (response, result) = rendered(&spec(
            418,
            &[("content-type", "text/plain")],
            Some(json!("OK")),
        ));
        assert!(result.is_ok());
        assert_eq!(response.status, 418);
        assert_eq!(response.body_str(), "OK");
    }

    #[test]
    fn test_json_is_default() {
        let (response, result) = rendered(&spec(418, &[], Some(json!("OK"))));
        assert!(result.is_ok());
        assert_eq!(response.body_str(), r#""OK""#);
    }

    #[test]
    fn test_json_body_bytes() {
        let (response, _) = rendered(&spec(
            200,
            &[("content-type", "application/json")],
            Some(json!({"greeting": "hi"})),
        ));
        assert_eq!(response.body, br#"{"greeting":"hi"}"#);
    }

    #[test]
    fn test_yaml_body() {
        let (response, result) = rendered(&spec(
            418,
            &[("content-type", "application/x-yaml")],
            Some(json!({"greeting": "hi"})),
        ));
        assert!(result.is_ok());
        assert_eq!(response.body_str(), "greeting: hi\n");
    }

    #[test]
    fn test_adds_headers() {
        let (response, _) = rendered(&spec(
            418,
            &[("X-Request-Id", "tid_1234")],
            Some(json!("OK")),
        ));
        assert_eq!(response.header("x-request-id"), Some("tid_1234"));
        assert_eq!(response.headers[0].0, "X-Request-Id");
        assert_eq!(response.body_str(), r#""OK""#);
    }

    #[test]
    fn test_no_body() {
        let (response, result) = rendered(&spec(202, &[("content-type", "nonsense")], None));
        assert!(result.is_ok());
        assert_eq!(response.status, 202);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_null_body_is_no_body() {
        let spec = spec(204, &[], Some(serde_json::Value::Null));
        assert!(spec.body().is_none());
    }

    #[test]
    fn test_content_type_lookup_ignores_case_and_parameters() {
        let (response, result) = rendered(&spec(
            200,
            &[("Content-Type", "Text/Plain; charset=utf-8")],
            Some(json!("plain words")),
        ));
        assert!(result.is_ok());
        assert_eq!(response.body_str(), "plain words");
    }

    #[test]
    fn test_unsupported_media_type_keeps_status_and_headers() {
        let (response, result) = rendered(&spec(
            200,
            &[("content-type", "application/xml")],
            Some(json!("<a/>")),
        ));
        assert!(matches!(result, Err(RenderError::UnsupportedMediaType(ref mt)) if mt == "application/xml"));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/xml"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_invalid_media_type() {
        let (response, result) = rendered(&spec(
            201,
            &[("content-type", "not a media type")],
            Some(json!({"a": 1})),
        ));
        assert!(matches!(result, Err(RenderError::InvalidMediaType(_))));
        assert_eq!(response.status, 201);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_text_plain_requires_string_body() {
        let err = ResponseSpec::new(
            200,
            BTreeMap::from([("content-type".to_string(), "text/plain".to_string())]),
            Some(json!({"not": "text"})),
        )
        .unwrap_err();
        assert!(matches!(err, FixtureError::NonTextBody));

        let body = Body::Structured(json!([1, 2]));
        assert!(matches!(
            encode_body(&body, "text/plain"),
            Err(RenderError::BodyNotText)
        ));
    }

    #[test]
    fn test_invalid_status() {
        assert!(matches!(
            ResponseSpec::with_status(99),
            Err(FixtureError::InvalidStatus(99))
        ));
        assert!(matches!(
            ResponseSpec::with_status(600),
            Err(FixtureError::InvalidStatus(600))
        ));
        assert!(ResponseSpec::with_status(501).is_ok());
    }

    #[test]
    fn test_invalid_header_name() {
        let err = ResponseSpec::new(
            200,
            BTreeMap::from([("bad header".to_string(), "v".to_string())]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FixtureError::InvalidHeader { ref name, .. } if name == "bad header"));
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("application/json").unwrap(), "application/json");
        assert_eq!(
            media_type("application/JSON ; charset=UTF-8").unwrap(),
            "application/json"
        );
        assert!(media_type("").is_err());
        assert!(media_type("json").is_err());
        assert!(media_type("/json").is_err());
    }

    #[test]
    fn test_deserialize_response() {
        let yaml = r#"
status: 400
headers:
  content-type: text/plain
body: OK
"#;
        let spec: ResponseSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.status(), 400);
        assert_eq!(spec.body(), Some(&Body::Text("OK".to_string())));

        let spec: ResponseSpec = serde_yaml::from_str("{}").unwrap();
        assert_eq!(spec.status(), 200);
        assert!(spec.body().is_none());
    }
}
