//! Versioned fixture schemas.
//!
//! Every schema version maps `path -> method -> resource`. What a resource
//! looks like, and how it picks a response for a request, differs per
//! version. Each version module owns its resource type and implements
//! [`Resource`] for it.

pub mod v1;
pub mod v2;
pub mod v3;

use crate::error::FixtureError;
use crate::matcher::{ConditionSet, Expectations};
use crate::request::RequestView;
use crate::response::{default_status, ResponseSpec};
use serde::de::{self, DeserializeOwned, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Outcome of selecting a response for a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection<'a> {
    Matched(&'a ResponseSpec),
    NoMatch,
}

/// The configured behavior for one path and method.
pub trait Resource: fmt::Debug + Send + Sync {
    /// Pick the response for a request.
    fn select(&self, request: &RequestView) -> Selection<'_>;

    /// Number of alternative responses configured.
    fn candidates(&self) -> usize;

    /// Number of candidates that can never be selected because an
    /// unconditional candidate precedes them.
    fn shadowed(&self) -> usize {
        0
    }
}

/// A response guarded by optional expectations.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "CandidateDefinition")]
pub struct Candidate {
    pub expectations: Option<Expectations>,
    pub response: ResponseSpec,
}

impl Candidate {
    /// A candidate that matches every request.
    pub fn unconditional(response: ResponseSpec) -> Self {
        Self {
            expectations: None,
            response,
        }
    }

    pub fn guarded(expectations: Option<Expectations>, response: ResponseSpec) -> Self {
        Self {
            expectations,
            response,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.expectations.is_none()
    }

    /// Whether the candidate matches every request, guarded or not.
    pub fn always_matches(&self) -> bool {
        self.expectations
            .as_ref()
            .map_or(true, Expectations::always_holds)
    }

    pub fn matches(&self, request: &RequestView) -> bool {
        self.expectations
            .as_ref()
            .map_or(true, |e| e.is_satisfied(request))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CandidateDefinition {
    #[serde(default = "default_status")]
    status: u16,

    #[serde(default)]
    headers: BTreeMap<String, String>,

    #[serde(default)]
    body: Option<serde_json::Value>,

    #[serde(default, deserialize_with = "one_or_many")]
    expectations: Vec<ConditionSet>,

    #[serde(default)]
    all_expectations_check: bool,
}

impl TryFrom<CandidateDefinition> for Candidate {
    type Error = FixtureError;

    fn try_from(def: CandidateDefinition) -> Result<Self, Self::Error> {
        Ok(Self {
            expectations: Expectations::new(def.expectations, def.all_expectations_check),
            response: ResponseSpec::new(def.status, def.headers, def.body)?,
        })
    }
}

/// `path -> method -> resource`, shared by every schema version.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PathTable<R> {
    paths: BTreeMap<String, BTreeMap<String, R>>,
}

impl<R> Default for PathTable<R> {
    fn default() -> Self {
        Self {
            paths: BTreeMap::new(),
        }
    }
}

impl<R> PathTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, replacing any previous one for the same key.
    pub fn insert(&mut self, path: impl Into<String>, method: impl Into<String>, resource: R) {
        self.paths
            .entry(path.into())
            .or_default()
            .insert(method.into(), resource);
    }

    pub fn paths(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &R)> {
        self.paths.iter().flat_map(|(path, methods)| {
            methods
                .iter()
                .map(move |(method, resource)| (path.as_str(), method.as_str(), resource))
        })
    }
}

impl<R: 'static> IntoIterator for PathTable<R> {
    type Item = (String, String, R);
    type IntoIter = Box<dyn Iterator<Item = (String, String, R)>>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.paths.into_iter().flat_map(|(path, methods)| {
            methods
                .into_iter()
                .map(move |(method, resource)| (path.clone(), method, resource))
        }))
    }
}

/// Fixtures of any supported schema version.
#[derive(Debug, Clone)]
pub enum Fixtures {
    V1(v1::Fixtures),
    V2(v2::Fixtures),
    V3(v3::Fixtures),
}

impl Fixtures {
    /// Schema generation number.
    pub fn schema(&self) -> u8 {
        match self {
            Fixtures::V1(_) => 1,
            Fixtures::V2(_) => 2,
            Fixtures::V3(_) => 3,
        }
    }

    pub fn paths(&self) -> usize {
        match self {
            Fixtures::V1(table) => table.paths(),
            Fixtures::V2(table) => table.paths(),
            Fixtures::V3(table) => table.paths(),
        }
    }

    /// Borrow every declared resource as `(path, method key, resource)`.
    pub fn resources(&self) -> Vec<(&str, &str, &dyn Resource)> {
        match self {
            Fixtures::V1(table) => collect_refs(table),
            Fixtures::V2(table) => collect_refs(table),
            Fixtures::V3(table) => collect_refs(table),
        }
    }

    /// Move every declared resource out as `(path, method key, resource)`.
    pub fn into_resources(self) -> Vec<(String, String, Arc<dyn Resource>)> {
        match self {
            Fixtures::V1(table) => collect_owned(table),
            Fixtures::V2(table) => collect_owned(table),
            Fixtures::V3(table) => collect_owned(table),
        }
    }
}

fn collect_refs<R: Resource>(table: &PathTable<R>) -> Vec<(&str, &str, &dyn Resource)> {
    table
        .iter()
        .map(|(path, method, resource)| (path, method, resource as &dyn Resource))
        .collect()
}

fn collect_owned<R: Resource + 'static>(
    table: PathTable<R>,
) -> Vec<(String, String, Arc<dyn Resource>)> {
    table
        .into_iter()
        .map(|(path, method, resource)| (path, method, Arc::new(resource) as Arc<dyn Resource>))
        .collect()
}

/// Deserialize either a single item or a sequence of items into a `Vec`.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    struct OneOrMany<T>(PhantomData<T>);

    impl<'de, T: DeserializeOwned> Visitor<'de> for OneOrMany<T> {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping or a sequence of mappings")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
            Vec::deserialize(de::value::SeqAccessDeserializer::new(seq))
        }

        fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
            T::deserialize(de::value::MapAccessDeserializer::new(map)).map(|item| vec![item])
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(OneOrMany(PhantomData))
}
