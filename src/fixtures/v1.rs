//! Schema v1 (`1.0.0-rc1`, `1.0.0`).
//!
//! Each method declares exactly one response, optionally guarded by
//! expectations:
//!
//! ```yaml
//! version: 1.0.0
//! fixtures:
//!   /things:
//!     get:
//!       status: 200
//!       body: { name: thing }
//!       expectations:
//!         - queryParams: { id: expected-id }
//! ```

use super::{Candidate, PathTable, Resource, Selection};
use crate::request::RequestView;
use serde::Deserialize;

pub type Fixtures = PathTable<SingleResource>;

/// The one response configured for a path and method.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct SingleResource(pub Candidate);

impl Resource for SingleResource {
    fn select(&self, request: &RequestView) -> Selection<'_> {
        if self.0.matches(request) {
            Selection::Matched(&self.0.response)
        } else {
            Selection::NoMatch
        }
    }

    fn candidates(&self) -> usize {
        1
    }
}
