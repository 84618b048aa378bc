//! HTTP transport for the fixture engine.
//!
//! [`RouteTable`] hosts the enumerated routes on one `matchit` router per
//! method. [`FixtureSlot`] publishes a route table exactly once, either at
//! startup or through the configuration endpoint, and [`MockServer`] serves
//! it over HTTP/1.1 with hyper.

use crate::config::FixtureDocument;
use crate::error::FixtureError;
use crate::request::RequestView;
use crate::response::MockResponse;
use crate::router::{register_routes, Method, ResourceHandler, Router, NO_MATCH_STATUS};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Path of the one-shot configuration endpoint.
pub const CONFIGURE_PATH: &str = "/__ersatz/fixtures";

/// Largest fixtures document accepted on [`CONFIGURE_PATH`].
pub const MAX_CONFIGURE_BODY: usize = 1024 * 1024;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Routes for every declared path and method.
#[derive(Default)]
pub struct RouteTable {
    routers: HashMap<Method, matchit::Router<ResourceHandler>>,
    routes: usize,
    /// Total requests dispatched.
    requests_total: AtomicU64,
    /// Requests answered by a fixture candidate.
    requests_matched: AtomicU64,
    /// Requests to a declared route that no candidate matched.
    requests_unmatched: AtomicU64,
    /// Requests to an undeclared path or method.
    requests_not_found: AtomicU64,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot of the request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub total: u64,
    pub matched: u64,
    pub unmatched: u64,
    pub not_found: u64,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table holding every route of a document.
    pub fn build(document: FixtureDocument) -> Result<Self, FixtureError> {
        let mut table = Self::new();
        register_routes(&mut table, document.into_fixtures())?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Answer a request. Unknown paths and methods get an empty 404.
    pub fn dispatch(&self, method: &str, request: &RequestView) -> MockResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let handler = Method::from_key(method)
            .and_then(|m| self.routers.get(&m))
            .and_then(|router| router.at(request.path()).ok())
            .map(|matched| matched.value);

        let Some(handler) = handler else {
            self.requests_not_found.fetch_add(1, Ordering::Relaxed);
            debug!(method = %method, path = %request.path(), "No route declared");
            return MockResponse::empty(StatusCode::NOT_FOUND.as_u16());
        };

        match handler.try_handle(request) {
            Some(response) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                response
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                MockResponse::empty(NO_MATCH_STATUS)
            }
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    pub fn total_not_found(&self) -> u64 {
        self.requests_not_found.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RequestStats {
        RequestStats {
            total: self.total_requests(),
            matched: self.total_matched(),
            unmatched: self.total_unmatched(),
            not_found: self.total_not_found(),
        }
    }
}

impl Router for RouteTable {
    type Error = FixtureError;

    fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: ResourceHandler,
    ) -> Result<(), Self::Error> {
        self.routers
            .entry(method)
            .or_insert_with(matchit::Router::new)
            .insert(route_pattern(path), handler)
            .map_err(|e| FixtureError::InvalidRoute {
                method: method.to_string(),
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        self.routes += 1;
        Ok(())
    }
}

/// Convert a fixture path to matchit syntax.
///
/// `:name` segments become `{name}` and a `*` or `*name` segment becomes a
/// catch-all. Paths already using `{name}` pass through unchanged.
pub fn route_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*') {
                let name = if name.is_empty() { "rest" } else { name };
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Result of a configuration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    /// This call published the routes.
    Published { routes: usize },
    /// Routes were already published; nothing changed.
    AlreadyInstalled,
}

/// Holds the route table once it has been published.
///
/// The first successful install wins. Later installs are no-ops, and
/// readers never see a partially built table.
#[derive(Debug, Default)]
pub struct FixtureSlot {
    table: OnceCell<Arc<RouteTable>>,
}

impl FixtureSlot {
    /// An empty slot awaiting configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already holds a table.
    pub fn with_table(table: RouteTable) -> Self {
        let slot = Self::new();
        slot.publish(table);
        slot
    }

    pub fn get(&self) -> Option<&Arc<RouteTable>> {
        self.table.get()
    }

    pub fn is_installed(&self) -> bool {
        self.table.get().is_some()
    }

    /// Publish a built table unless one is already present.
    pub fn publish(&self, table: RouteTable) -> Installed {
        let routes = table.len();
        match self.table.set(Arc::new(table)) {
            Ok(()) => Installed::Published { routes },
            Err(_) => Installed::AlreadyInstalled,
        }
    }

    /// Parse, validate and publish a document from raw YAML or JSON.
    ///
    /// Once installed, the body is not even parsed.
    pub fn install(&self, body: &[u8]) -> Result<Installed, FixtureError> {
        if self.is_installed() {
            return Ok(Installed::AlreadyInstalled);
        }
        let document = FixtureDocument::from_slice(body)?;
        let table = RouteTable::build(document)?;
        Ok(self.publish(table))
    }
}

/// Fixture-driven HTTP server.
#[derive(Debug, Default)]
pub struct MockServer {
    slot: FixtureSlot,
}

impl MockServer {
    /// A server that waits for fixtures on [`CONFIGURE_PATH`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A server with fixtures installed from a document.
    pub fn with_document(document: FixtureDocument) -> Result<Self, FixtureError> {
        let version = document.version().to_string();
        let table = RouteTable::build(document)?;
        info!(version = %version, routes = table.len(), "Fixtures installed");
        Ok(Self {
            slot: FixtureSlot::with_table(table),
        })
    }

    pub fn slot(&self) -> &FixtureSlot {
        &self.slot
    }

    /// Request counters, once fixtures are installed.
    pub fn stats(&self) -> Option<RequestStats> {
        self.slot.get().map(|table| table.stats())
    }

    /// Answer one HTTP request and write an access log line for it.
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let response = self.respond(req).await;

        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "Request handled"
        );
        Ok(response)
    }

    async fn respond<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        if req.uri().path() == CONFIGURE_PATH && req.method() == hyper::Method::POST {
            return self.configure(req).await;
        }

        let Some(table) = self.slot.get() else {
            warn!(path = %req.uri().path(), "Request received before fixtures were installed");
            return plain_response(StatusCode::SERVICE_UNAVAILABLE, "fixtures not installed");
        };

        let request = RequestView::from_parts(
            req.method().as_str(),
            req.uri().path(),
            req.uri().query(),
            req.headers().iter().filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            }),
        );

        into_http_response(table.dispatch(req.method().as_str(), &request))
    }

    async fn configure<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        if self.slot.is_installed() {
            debug!("Fixtures already installed, ignoring configuration request");
            return plain_response(StatusCode::OK, "fixtures already installed");
        }

        let body = match Limited::new(req.into_body(), MAX_CONFIGURE_BODY).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(limit = MAX_CONFIGURE_BODY, "Configuration body too large");
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, &e.to_string());
            }
            Err(e) => {
                warn!(error = %e, "Failed to read configuration body");
                return plain_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        match self.slot.install(&body) {
            Ok(Installed::Published { routes }) => {
                info!(routes, "Fixtures installed");
                plain_response(StatusCode::CREATED, "fixtures installed")
            }
            Ok(Installed::AlreadyInstalled) => {
                plain_response(StatusCode::OK, "fixtures already installed")
            }
            Err(e) => {
                warn!(error = %e, "Rejected fixtures document");
                plain_response(StatusCode::BAD_REQUEST, &e.to_string())
            }
        }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "Ready to simulate requests!");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { server.handle(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(remote_addr = %remote_addr, error = %err, "Error serving connection");
                }
            });
        }
    }
}

fn plain_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{message}\n"))));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain"),
    );
    response
}

/// Convert a rendered response into a hyper response.
pub fn into_http_response(mock: MockResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(mock.body)));
    *response.status_mut() =
        StatusCode::from_u16(mock.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid response header"),
        }
    }

    response
}
