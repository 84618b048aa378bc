//! Route enumeration.
//!
//! Walks a fixtures document and binds a [`ResourceHandler`] to every
//! declared path and method. Registration goes through the [`Router`]
//! trait so any HTTP router can host the routes.

use crate::fixtures::{Fixtures, Resource, Selection};
use crate::request::RequestView;
use crate::response::{render, MockResponse};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Status returned when a route exists but no candidate matches.
pub const NO_MATCH_STATUS: u16 = 501;

/// HTTP methods a fixture can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Recognize a method name, ignoring case. Other methods yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Method::Get),
            "post" => Some(Method::Post),
            "put" => Some(Method::Put),
            "delete" => Some(Method::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects and renders the response for one path and method.
#[derive(Clone)]
pub struct ResourceHandler {
    resource: Arc<dyn Resource>,
}

impl fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("candidates", &self.resource.candidates())
            .finish()
    }
}

impl ResourceHandler {
    pub fn new(resource: Arc<dyn Resource>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    /// Answer a request.
    ///
    /// The selected response is rendered; a render failure is logged and the
    /// body is left empty. When nothing matches the answer is 501 with no
    /// body.
    pub fn handle(&self, request: &RequestView) -> MockResponse {
        self.try_handle(request)
            .unwrap_or_else(|| MockResponse::empty(NO_MATCH_STATUS))
    }

    /// Like [`handle`](Self::handle), but `None` when no candidate matches.
    pub fn try_handle(&self, request: &RequestView) -> Option<MockResponse> {
        match self.resource.select(request) {
            Selection::Matched(spec) => {
                let mut response = MockResponse::default();
                if let Err(e) = render(spec, &mut response) {
                    error!(
                        method = %request.method(),
                        path = %request.path(),
                        status = spec.status(),
                        error = %e,
                        "Failed to render response body"
                    );
                }
                debug!(
                    method = %request.method(),
                    path = %request.path(),
                    status = response.status,
                    "Request matched fixture"
                );
                Some(response)
            }
            Selection::NoMatch => {
                warn!(
                    method = %request.method(),
                    path = %request.path(),
                    "No fixture candidate satisfied by request"
                );
                None
            }
        }
    }
}

/// A handler bound to a path pattern and method.
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub method: Method,
    pub handler: ResourceHandler,
}

/// Something that can dispatch requests to registered handlers.
pub trait Router {
    type Error;

    fn route(&mut self, method: Method, path: &str, handler: ResourceHandler)
        -> Result<(), Self::Error>;
}

/// Turn fixtures into routes, sorted by path then method.
///
/// Method keys other than GET, POST, PUT and DELETE are skipped. When two
/// keys under one path name the same method (`GET` and `get`), only the
/// first is kept.
pub fn enumerate(fixtures: Fixtures) -> Vec<Route> {
    let mut routes: Vec<Route> = fixtures
        .into_resources()
        .into_iter()
        .filter_map(|(path, key, resource)| {
            let Some(method) = Method::from_key(&key) else {
                debug!(path = %path, method = %key, "Ignoring unsupported method");
                return None;
            };

            let shadowed = resource.shadowed();
            if shadowed > 0 {
                warn!(
                    path = %path,
                    method = %method,
                    shadowed,
                    "Unconditional candidate makes later candidates unreachable"
                );
            }

            Some(Route {
                path,
                method,
                handler: ResourceHandler::new(resource),
            })
        })
        .collect();

    routes.sort_by(|a, b| (&a.path, a.method).cmp(&(&b.path, b.method)));
    routes.dedup_by(|later, kept| {
        let duplicate = later.path == kept.path && later.method == kept.method;
        if duplicate {
            warn!(
                path = %later.path,
                method = %later.method,
                "Method declared more than once for path, ignoring the duplicate"
            );
        }
        duplicate
    });
    routes
}

/// Register every route from `fixtures` on `router`, returning the count.
pub fn register_routes<R: Router>(router: &mut R, fixtures: Fixtures) -> Result<usize, R::Error> {
    let routes = enumerate(fixtures);
    let count = routes.len();
    for route in routes {
        router.route(route.method, &route.path, route.handler)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FixtureDocument;
    use crate::fixtures::{v1, Candidate};
    use crate::response::ResponseSpec;

    fn unconditional(status: u16) -> Candidate {
        Candidate::unconditional(ResponseSpec::with_status(status).unwrap())
    }

    #[derive(Default)]
    struct RecordingRouter {
        routes: Vec<(Method, String, ResourceHandler)>,
    }

    impl Router for RecordingRouter {
        type Error = std::convert::Infallible;

        fn route(
            &mut self,
            method: Method,
            path: &str,
            handler: ResourceHandler,
        ) -> Result<(), Self::Error> {
            self.routes.push((method, path.to_string(), handler));
            Ok(())
        }
    }

    fn fixtures(yaml: &str) -> Fixtures {
        FixtureDocument::from_yaml(yaml).unwrap().into_fixtures()
    }

    fn handler_for(router: &RecordingRouter, method: Method, path: &str) -> ResourceHandler {
        router
            .routes
            .iter()
            .find(|(m, p, _)| *m == method && p == path)
            .map(|(_, _, h)| h.clone())
            .unwrap()
    }

    #[test]
    fn test_method_from_key() {
        assert_eq!(Method::from_key("get"), Some(Method::Get));
        assert_eq!(Method::from_key("DELETE"), Some(Method::Delete));
        assert_eq!(Method::from_key("Put"), Some(Method::Put));
        assert_eq!(Method::from_key("patch"), None);
        assert_eq!(Method::Post.to_string(), "POST");
    }

    #[test]
    fn test_registers_every_method() {
        let yaml = r#"
version: 1.0.0
fixtures:
  /example:
    get: { status: 200 }
    post: { status: 200 }
    put: { status: 200 }
    delete: { status: 200 }
"#;
        let mut router = RecordingRouter::default();
        let count = register_routes(&mut router, fixtures(yaml)).unwrap();
        assert_eq!(count, 4);

        let registered: Vec<_> = router
            .routes
            .iter()
            .map(|(m, p, _)| (*m, p.as_str()))
            .collect();
        assert_eq!(
            registered,
            vec![
                (Method::Get, "/example"),
                (Method::Post, "/example"),
                (Method::Put, "/example"),
                (Method::Delete, "/example"),
            ]
        );
    }

    #[test]
    fn test_unsupported_methods_are_ignored() {
        let yaml = r#"
version: 2.0.0
fixtures:
  /example:
    GET: { status: 200 }
    patch: { status: 200 }
    options: { status: 200 }
"#;
        let routes = enumerate(fixtures(yaml));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].method, Method::Get);
    }

    #[test]
    fn test_handler_end_to_end() {
        let yaml = r#"
version: 2.0.0
fixtures:
  /example:
    get:
      - status: 200
        expectations:
          - queryParams:
              id: expected-id
"#;
        let mut router = RecordingRouter::default();
        register_routes(&mut router, fixtures(yaml)).unwrap();
        let handler = handler_for(&router, Method::Get, "/example");

        let ok = handler.handle(&RequestView::new("GET", "/example").with_query("id=expected-id"));
        assert_eq!(ok.status, 200);

        let wrong = handler.handle(&RequestView::new("GET", "/example").with_query("id=wrong"));
        assert_eq!(wrong.status, 501);
        assert!(wrong.body.is_empty());

        let missing = handler.handle(&RequestView::new("GET", "/example"));
        assert_eq!(missing.status, 501);
    }

    #[test]
    fn test_handler_renders_body() {
        let yaml = r#"
version: 2.0.0-rc1
fixtures:
  /greeting:
    get:
      - when:
          headers:
            accept: application/x-yaml
        response:
          status: 200
          headers:
            content-type: application/x-yaml
          body:
            greeting: hi
      - when: {}
        response:
          status: 200
          body:
            greeting: hi
"#;
        let routes = enumerate(fixtures(yaml));
        let handler = &routes[0].handler;

        let yaml_response = handler.handle(
            &RequestView::new("GET", "/greeting").with_header("Accept", "application/x-yaml"),
        );
        assert_eq!(yaml_response.body_str(), "greeting: hi\n");

        let json_response = handler.handle(&RequestView::new("GET", "/greeting"));
        assert_eq!(json_response.body_str(), r#"{"greeting":"hi"}"#);
    }

    #[test]
    fn test_render_failure_keeps_status() {
        let yaml = r#"
version: 1.0.0
fixtures:
  /xml:
    get:
      status: 202
      headers:
        content-type: application/xml
      body: "<a/>"
"#;
        let routes = enumerate(fixtures(yaml));
        let response = routes[0].handler.handle(&RequestView::new("GET", "/xml"));
        assert_eq!(response.status, 202);
        assert_eq!(response.header("content-type"), Some("application/xml"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_duplicate_method_keys_collapse() {
        let mut table = v1::Fixtures::new();
        table.insert("/a", "GET", v1::SingleResource(unconditional(200)));
        table.insert("/a", "get", v1::SingleResource(unconditional(201)));
        table.insert("/b", "get", v1::SingleResource(unconditional(202)));

        let routes = enumerate(Fixtures::V1(table));
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/a");
        // BTreeMap order puts "GET" before "get"
        let kept = routes[0].handler.handle(&RequestView::new("GET", "/a"));
        assert_eq!(kept.status, 200);
    }

    #[test]
    fn test_try_handle_distinguishes_no_match() {
        let yaml = r#"
version: 2.0.0
fixtures:
  /x:
    get:
      status: 501
      expectations:
        headers:
          x-mode: "${exists}"
"#;
        let routes = enumerate(fixtures(yaml));
        let handler = &routes[0].handler;

        let declared = handler.try_handle(&RequestView::new("GET", "/x").with_header("x-mode", "on"));
        assert_eq!(declared.map(|r| r.status), Some(501));
        assert!(handler.try_handle(&RequestView::new("GET", "/x")).is_none());
    }

    #[test]
    fn test_routes_are_sorted() {
        let yaml = r#"
version: 1.0.0
fixtures:
  /b:
    get: { status: 200 }
  /a:
    delete: { status: 200 }
    get: { status: 200 }
"#;
        let routes: Vec<_> = enumerate(fixtures(yaml))
            .into_iter()
            .map(|r| (r.path, r.method))
            .collect();
        assert_eq!(
            routes,
            vec![
                ("/a".to_string(), Method::Get),
                ("/a".to_string(), Method::Delete),
                ("/b".to_string(), Method::Get),
            ]
        );
    }
}
