//! Schema v2 (`2.0.0-rc1`).
//!
//! Each method declares either a plain response or an ordered list of
//! discriminators, each pairing a `when` condition set with a response:
//!
//! ```yaml
//! version: 2.0.0-rc1
//! fixtures:
//!   /things:
//!     get:
//!       - when:
//!           headers: { x-example: example }
//!         response:
//!           status: 200
//!     post:
//!       status: 201
//! ```

use super::{PathTable, Resource, Selection};
use crate::matcher::ConditionSet;
use crate::request::RequestView;
use crate::response::ResponseSpec;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;

pub type Fixtures = PathTable<DiscriminatedResource>;

/// A response selected when its condition set holds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Discriminator {
    #[serde(default)]
    pub when: ConditionSet,
    pub response: ResponseSpec,
}

/// Either a single response or a list of discriminated responses.
#[derive(Debug, Clone)]
pub enum DiscriminatedResource {
    Plain(ResponseSpec),
    Discriminated(Vec<Discriminator>),
}

impl Resource for DiscriminatedResource {
    fn select(&self, request: &RequestView) -> Selection<'_> {
        match self {
            DiscriminatedResource::Plain(response) => Selection::Matched(response),
            DiscriminatedResource::Discriminated(discriminators) => discriminators
                .iter()
                .find(|d| d.when.is_satisfied(request))
                .map_or(Selection::NoMatch, |d| Selection::Matched(&d.response)),
        }
    }

    fn candidates(&self) -> usize {
        match self {
            DiscriminatedResource::Plain(_) => 1,
            DiscriminatedResource::Discriminated(discriminators) => discriminators.len(),
        }
    }

    fn shadowed(&self) -> usize {
        match self {
            DiscriminatedResource::Plain(_) => 0,
            DiscriminatedResource::Discriminated(discriminators) => discriminators
                .iter()
                .position(|d| d.when.is_empty())
                .map_or(0, |i| discriminators.len() - i - 1),
        }
    }
}

impl<'de> Deserialize<'de> for DiscriminatedResource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResourceVisitor;

        impl<'de> Visitor<'de> for ResourceVisitor {
            type Value = DiscriminatedResource;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a response or a list of discriminators")
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                ResponseSpec::deserialize(de::value::MapAccessDeserializer::new(map))
                    .map(DiscriminatedResource::Plain)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
                Vec::deserialize(de::value::SeqAccessDeserializer::new(seq))
                    .map(DiscriminatedResource::Discriminated)
            }
        }

        deserializer.deserialize_any(ResourceVisitor)
    }
}
