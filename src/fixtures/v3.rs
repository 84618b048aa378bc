//! Schema v3 (`2.0.0`), the current format.
//!
//! Each method declares one candidate or an ordered list of candidates.
//! Candidates are tried in order and the first whose expectations hold
//! wins. A candidate without expectations always matches, so anything
//! after it is unreachable.
//!
//! ```yaml
//! version: 2.0.0
//! fixtures:
//!   /things:
//!     get:
//!       - status: 200
//!         expectations:
//!           - queryParams: { id: expected-id }
//!       - status: 404
//! ```

use super::{one_or_many, Candidate, PathTable, Resource, Selection};
use crate::request::RequestView;
use serde::{Deserialize, Deserializer};

pub type Fixtures = PathTable<CandidateList>;

/// Ordered alternative responses for a path and method.
#[derive(Debug, Clone)]
pub struct CandidateList(pub Vec<Candidate>);

impl<'de> Deserialize<'de> for CandidateList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        one_or_many(deserializer).map(CandidateList)
    }
}

impl Resource for CandidateList {
    fn select(&self, request: &RequestView) -> Selection<'_> {
        self.0
            .iter()
            .find(|candidate| candidate.matches(request))
            .map_or(Selection::NoMatch, |c| Selection::Matched(&c.response))
    }

    fn candidates(&self) -> usize {
        self.0.len()
    }

    fn shadowed(&self) -> usize {
        self.0
            .iter()
            .position(Candidate::always_matches)
            .map_or(0, |i| self.0.len() - i - 1)
    }
}
