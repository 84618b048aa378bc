//! Ersatz
//!
//! A fixture-driven mock HTTP server. A versioned YAML or JSON document
//! declares, per path and method, the responses to return and the request
//! conditions that select them.
//!
//! # Features
//!
//! - **Versioned Fixtures**: Three schema generations, chosen by the `version` tag
//! - **Request Matching**: Header and query conditions with `${exists}` / `${missing}`
//! - **Any/All Policy**: Require one or every expectation set to hold
//! - **Content Negotiation**: JSON, YAML and plain text bodies by `content-type`
//! - **Runtime Configuration**: Install fixtures once over HTTP
//!
//! # Example Fixtures
//!
//! ```yaml
//! version: 2.0.0
//! fixtures:
//!   /example:
//!     get:
//!       - status: 200
//!         headers:
//!           content-type: application/json
//!         body:
//!           message: "Hello, World!"
//!         expectations:
//!           - queryParams:
//!               id: expected-id
//! ```
//!
//! A `GET /example?id=expected-id` gets the 200 above. Any other `GET
//! /example` gets `501 Not Implemented`.
//!
//! Action literals can be written bare in block style (`x-tenant: ${exists}`),
//! but inside a flow mapping they must be quoted, since `}` closes the
//! mapping: `headers: { x-tenant: "${exists}" }`.

pub mod config;
pub mod error;
pub mod fixtures;
pub mod matcher;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use config::{DocumentSummary, FixtureDocument};
pub use error::{FixtureError, RenderError};
pub use fixtures::{Fixtures, Resource, Selection};
pub use request::RequestView;
pub use response::{render, MockResponse, ResponseSpec, ResponseWriter};
pub use router::{enumerate, register_routes, Method, ResourceHandler, Route, Router};
pub use server::{FixtureSlot, Installed, MockServer, RequestStats, RouteTable};
