//! Fixtures document loading.
//!
//! The document is YAML or JSON with a top-level `version` tag and a
//! `fixtures` table. The version tag is read first and decides which schema
//! the table is parsed with.

use crate::error::FixtureError;
use crate::fixtures::Fixtures;
use serde_yaml::Value;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A parsed, validated fixtures document.
#[derive(Debug, Clone)]
pub struct FixtureDocument {
    version: String,
    fixtures: Fixtures,
}

impl FixtureDocument {
    /// Load a document from a YAML or JSON file.
    pub fn from_file(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read(path).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&content)
    }

    /// Parse a document from YAML or JSON text.
    pub fn from_yaml(text: &str) -> Result<Self, FixtureError> {
        Self::from_value(serde_yaml::from_str(text)?)
    }

    /// Parse a document from raw YAML or JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FixtureError> {
        Self::from_value(serde_yaml::from_slice(bytes)?)
    }

    fn from_value(mut root: Value) -> Result<Self, FixtureError> {
        let version = match root.get("version") {
            Some(Value::String(tag)) => tag.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(FixtureError::MissingVersion),
        };

        let table = root
            .get_mut("fixtures")
            .map(|v| std::mem::replace(v, Value::Null))
            .filter(|v| !v.is_null());

        debug!(version = %version, "Parsing fixtures document");

        let fixtures = match version.as_str() {
            "1.0.0-rc1" | "1.0.0" => Fixtures::V1(parse_table(table)?),
            "2.0.0-rc1" => Fixtures::V2(parse_table(table)?),
            "2.0.0" => Fixtures::V3(parse_table(table)?),
            _ => return Err(FixtureError::UnsupportedVersion(version)),
        };

        Ok(Self { version, fixtures })
    }

    /// Wrap already-built fixtures.
    pub fn new(version: impl Into<String>, fixtures: Fixtures) -> Self {
        Self {
            version: version.into(),
            fixtures,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    pub fn into_fixtures(self) -> Fixtures {
        self.fixtures
    }

    /// Counts of declared paths, method entries and candidates.
    pub fn summary(&self) -> DocumentSummary {
        let resources = self.fixtures.resources();
        DocumentSummary {
            version: self.version.clone(),
            paths: self.fixtures.paths(),
            methods: resources.len(),
            candidates: resources.iter().map(|(_, _, r)| r.candidates()).sum(),
        }
    }
}

fn parse_table<T>(table: Option<Value>) -> Result<T, FixtureError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match table {
        Some(value) => Ok(serde_yaml::from_value(value)?),
        None => Ok(T::default()),
    }
}

/// Summary reported by `--validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSummary {
    pub version: String,
    pub paths: usize,
    pub methods: usize,
    pub candidates: usize,
}

impl fmt::Display for DocumentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {}: {} paths, {} method entries, {} candidates",
            self.version, self.paths, self.methods, self.candidates
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Resource, Selection};
    use crate::request::RequestView;
    use std::io::Write;

    const EXAMPLE: &str = r#"
version: 2.0.0
fixtures:
  /example:
    get:
      - status: 200
        expectations:
          - queryParams:
              id: expected-id
    post:
      status: 201
      body:
        created: true
  /other/:id:
    put:
      - status: 200
        expectations:
          headers:
            x-tenant: ${exists}
      - status: 403
"#;

    #[test]
    fn test_parse_latest_version() {
        let doc = FixtureDocument::from_yaml(EXAMPLE).unwrap();
        assert_eq!(doc.version(), "2.0.0");
        assert_eq!(doc.fixtures().schema(), 3);
        assert_eq!(
            doc.summary(),
            DocumentSummary {
                version: "2.0.0".to_string(),
                paths: 2,
                methods: 3,
                candidates: 4,
            }
        );
    }

    #[test]
    fn test_version_dispatch() {
        let v1 = FixtureDocument::from_yaml("version: 1.0.0\nfixtures: {}").unwrap();
        assert_eq!(v1.fixtures().schema(), 1);

        let rc1 = FixtureDocument::from_yaml("version: 1.0.0-rc1\nfixtures: {}").unwrap();
        assert_eq!(rc1.fixtures().schema(), 1);

        let v2 = FixtureDocument::from_yaml("version: 2.0.0-rc1\nfixtures: {}").unwrap();
        assert_eq!(v2.fixtures().schema(), 2);
    }

    #[test]
    fn test_unsupported_version() {
        let err = FixtureDocument::from_yaml("version: 3.1.4\nfixtures: {}").unwrap_err();
        assert!(matches!(err, FixtureError::UnsupportedVersion(ref v) if v == "3.1.4"));

        let err = FixtureDocument::from_yaml("version: 2\nfixtures: {}").unwrap_err();
        assert!(matches!(err, FixtureError::UnsupportedVersion(ref v) if v == "2"));
    }

    #[test]
    fn test_missing_version() {
        let err = FixtureDocument::from_yaml("fixtures: {}").unwrap_err();
        assert!(matches!(err, FixtureError::MissingVersion));
    }

    #[test]
    fn test_missing_fixtures_table_is_empty() {
        let doc = FixtureDocument::from_yaml("version: 2.0.0").unwrap();
        assert_eq!(doc.summary().methods, 0);
    }

    #[test]
    fn test_malformed_document() {
        let err = FixtureDocument::from_yaml("version: [unclosed").unwrap_err();
        assert!(matches!(err, FixtureError::Parse(_)));

        let err = FixtureDocument::from_yaml("version: 2.0.0\nfixtures:\n  /x:\n    get: 12\n")
            .unwrap_err();
        assert!(matches!(err, FixtureError::Parse(_)));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let yaml = r#"
version: 2.0.0
fixtures:
  /x:
    get:
      status: 200
      expectations:
        headers:
          x-test: ${sometimes}
"#;
        let err = FixtureDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown action 'sometimes'"));
    }

    #[test]
    fn test_miss_action_alias() {
        let yaml = r#"
version: 2.0.0
fixtures:
  /x:
    get:
      status: 200
      expectations:
        queryParams:
          debug: ${miss}
"#;
        let doc = FixtureDocument::from_yaml(yaml).unwrap();
        let resources = doc.fixtures().resources();
        let (_, _, resource) = resources[0];

        let plain = RequestView::new("GET", "/x");
        let flagged = RequestView::new("GET", "/x").with_query("debug=1");
        assert!(matches!(resource.select(&plain), Selection::Matched(_)));
        assert_eq!(resource.select(&flagged), Selection::NoMatch);
    }

    #[test]
    fn test_text_body_must_be_string() {
        let yaml = r#"
version: 1.0.0
fixtures:
  /x:
    get:
      status: 200
      headers:
        content-type: text/plain
      body:
        not: text
"#;
        let err = FixtureDocument::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("text/plain"));
    }

    #[test]
    fn test_json_document() {
        let json = r#"{
            "version": "2.0.0",
            "fixtures": {
                "/example": {
                    "get": [{"status": 200, "expectations": [{"queryParams": {"id": "expected-id"}}]}]
                }
            }
        }"#;
        let doc = FixtureDocument::from_slice(json.as_bytes()).unwrap();
        assert_eq!(doc.summary().candidates, 1);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();

        let doc = FixtureDocument::from_file(file.path()).unwrap();
        assert_eq!(doc.summary().paths, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FixtureDocument::from_file(&dir.path().join("nope.yml")).unwrap_err();
        assert!(matches!(err, FixtureError::Io { .. }));
    }

    #[test]
    fn test_summary_display() {
        let doc = FixtureDocument::from_yaml(EXAMPLE).unwrap();
        assert_eq!(
            doc.summary().to_string(),
            "version 2.0.0: 2 paths, 3 method entries, 4 candidates"
        );
    }
}
