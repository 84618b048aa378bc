//! Error types.
//!
//! Fixture errors are raised while a document is built and are fatal for the
//! document. Render errors are raised per request and never abort a response
//! that has already been started.

use std::path::PathBuf;
use thiserror::Error;

/// Errors detected while loading or building a fixtures document.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixtures file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed fixtures document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("fixtures document has no version tag")]
    MissingVersion,

    #[error("unsupported ersatz version '{0}', please confirm the fixtures version number")]
    UnsupportedVersion(String),

    #[error("unknown action '{action}' in '{raw}', expected ${{exists}} or ${{missing}}")]
    UnknownAction { action: String, raw: String },

    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("invalid response header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("text/plain response body must be a string")]
    NonTextBody,

    #[error("invalid route {method} {path}: {reason}")]
    InvalidRoute {
        method: String,
        path: String,
        reason: String,
    },
}

/// Errors raised while serializing a response body.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to parse media type '{0}'")]
    InvalidMediaType(String),

    #[error("unsupported media type '{0}'")]
    UnsupportedMediaType(String),

    #[error("body for text/plain must be a string")]
    BodyNotText,

    #[error("failed to marshal body as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to marshal body as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
