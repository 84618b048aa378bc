//! Request matching logic.
//!
//! A [`ValueMatcher`] checks the values a request presents for one field.
//! A [`ConditionSet`] groups matchers for headers and query parameters, and
//! [`Expectations`] combine several condition sets under an any/all policy.
//!
//! Matchers are written in fixtures as plain strings. A string of the form
//! `${exists}` or `${missing}` (also spelled `${miss}`) is an action;
//! anything else is compared literally.

use crate::error::FixtureError;
use crate::request::RequestView;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

static ACTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{(?P<action>.+)\}$").expect("action pattern is valid"));

/// Expected value or structural check for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ValueMatcher {
    /// One of the observed values must equal this exactly.
    Equals(String),
    /// The field must be present with a non-empty value.
    Exists,
    /// The field must be absent or empty.
    Missing,
}

impl ValueMatcher {
    /// Parse a fixture value, recognizing `${exists}`, `${missing}` and `${miss}`.
    pub fn parse(raw: &str) -> Result<Self, FixtureError> {
        let Some(captures) = ACTION_PATTERN.captures(raw) else {
            return Ok(ValueMatcher::Equals(raw.to_string()));
        };
        match &captures["action"] {
            "exists" => Ok(ValueMatcher::Exists),
            "missing" | "miss" => Ok(ValueMatcher::Missing),
            other => Err(FixtureError::UnknownAction {
                action: other.to_string(),
                raw: raw.to_string(),
            }),
        }
    }

    /// Evaluate against every value the request presents for the field.
    pub fn evaluate(&self, observed: &[&str]) -> bool {
        match self {
            ValueMatcher::Equals(expected) => observed.iter().any(|v| v == expected),
            ValueMatcher::Exists => observed.iter().any(|v| !v.is_empty()),
            ValueMatcher::Missing => observed.iter().all(|v| v.is_empty()),
        }
    }
}

impl TryFrom<String> for ValueMatcher {
    type Error = FixtureError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

/// Header and query parameter conditions that must all hold.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionSet {
    /// Header conditions, keyed by case-insensitive header name
    #[serde(default)]
    pub headers: HashMap<String, ValueMatcher>,

    /// Query parameter conditions
    #[serde(default, rename = "queryParams")]
    pub query_params: HashMap<String, ValueMatcher>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header condition.
    pub fn header(mut self, name: impl Into<String>, matcher: ValueMatcher) -> Self {
        self.headers.insert(name.into(), matcher);
        self
    }

    /// Add a query parameter condition.
    pub fn query(mut self, name: impl Into<String>, matcher: ValueMatcher) -> Self {
        self.query_params.insert(name.into(), matcher);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query_params.is_empty()
    }

    /// Whether the request satisfies every header and query condition.
    pub fn is_satisfied(&self, request: &RequestView) -> bool {
        for (name, matcher) in &self.headers {
            if !matcher.evaluate(&request.header_values(name)) {
                debug!(
                    path = %request.path(),
                    header = %name,
                    expected = ?matcher,
                    "Header condition not satisfied"
                );
                return false;
            }
        }

        for (name, matcher) in &self.query_params {
            if !matcher.evaluate(&request.query_values(name)) {
                debug!(
                    path = %request.path(),
                    query_param = %name,
                    expected = ?matcher,
                    "Query parameter condition not satisfied"
                );
                return false;
            }
        }

        true
    }
}

/// One or more condition sets guarding a candidate.
#[derive(Debug, Clone)]
pub struct Expectations {
    sets: Vec<ConditionSet>,
    match_all: bool,
}

impl Expectations {
    /// Build from declared condition sets. An empty list guards nothing.
    pub fn new(sets: Vec<ConditionSet>, match_all: bool) -> Option<Self> {
        if sets.is_empty() {
            None
        } else {
            Some(Self { sets, match_all })
        }
    }

    /// Satisfied when at least one condition set passes.
    pub fn any(sets: Vec<ConditionSet>) -> Option<Self> {
        Self::new(sets, false)
    }

    /// Satisfied only when every condition set passes.
    pub fn all(sets: Vec<ConditionSet>) -> Option<Self> {
        Self::new(sets, true)
    }

    pub fn match_all(&self) -> bool {
        self.match_all
    }

    pub fn sets(&self) -> &[ConditionSet] {
        &self.sets
    }

    /// Whether every request satisfies these expectations, as with
    /// `expectations: [{}]`.
    pub fn always_holds(&self) -> bool {
        if self.match_all {
            self.sets.iter().all(ConditionSet::is_empty)
        } else {
            self.sets.iter().any(ConditionSet::is_empty)
        }
    }

    pub fn is_satisfied(&self, request: &RequestView) -> bool {
        if self.match_all {
            self.sets.iter().all(|set| set.is_satisfied(request))
        } else {
            self.sets.iter().any(|set| set.is_satisfied(request))
        }
    }
}
