//! Application instance: declaration surface plus the dispatcher.
//!
//! An [`App`] owns the metadata store, the route registry, and the global
//! middleware list. Two apps in one process never share declarations.
//! Declaration happens during bootstrap ([`expose`](App::expose),
//! [`register`](App::register), [`use_middleware`](App::use_middleware) and
//! friends); after that the app is shared read-only across connections and
//! [`handle`](App::handle) dispatches each request.
//!
//! # Dispatch order
//!
//! 1. Parse the method, URL, query string, and (for JSON bodies) the body.
//! 2. Run the global middleware tier to completion. An ended response here
//!    is an early exit: matching never runs.
//! 3. Match the route; no match is a 404.
//! 4. Run class- and method-scoped middleware, then the handler.
//! 5. Emit whatever the response side accumulated.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde_json::json;
use tracing::{debug, error, warn};
use url::Url;

use crate::controller::{Controller, ExposedController};
use crate::error::Error;
use crate::matcher::Matcher;
use crate::metadata::{MetadataKind, MetadataStore, MetadataValue};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::pipeline;
use crate::registry::{RouteRegistry, RouteTarget};
use crate::request::RequestParts;
use crate::Context;

/// The engine instance. See the [module docs](self).
pub struct App {
    store: MetadataStore,
    registry: RouteRegistry,
    globals: Vec<Middleware>,
    exposed: Vec<Arc<ExposedController>>,
    all_seen: HashSet<(Method, String, usize)>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            store: MetadataStore::new(),
            registry: RouteRegistry::new(),
            globals: Vec::new(),
            exposed: Vec::new(),
            all_seen: HashSet::new(),
        }
    }

    // ── Declaration ───────────────────────────────────────────────────────────

    /// Records a controller's declarations in the metadata store and makes it
    /// eligible for mounting. Mounting itself happens via [`register`] or
    /// [`init`](App::init).
    ///
    /// [`register`]: App::register
    pub fn expose(&mut self, controller: Controller) -> Arc<ExposedController> {
        let id = self.store.alloc_target();
        self.store.init(
            MetadataKind::RoutePrefix,
            MetadataValue::Str(controller.prefix.clone()),
            id,
            None,
        );
        if !controller.class_middleware.is_empty() {
            self.store.init(
                MetadataKind::ClassMiddlewares,
                MetadataValue::Middlewares(controller.class_middleware),
                id,
                None,
            );
        }
        let mut actions = Vec::with_capacity(controller.actions.len());
        for action in controller.actions {
            self.store.init(
                MetadataKind::Verb,
                MetadataValue::Verb(action.verb),
                id,
                Some(&action.name),
            );
            if !action.sub_path.is_empty() {
                self.store.init(
                    MetadataKind::SubPath,
                    MetadataValue::Str(action.sub_path),
                    id,
                    Some(&action.name),
                );
            }
            if !action.middleware.is_empty() {
                self.store.init(
                    MetadataKind::Middlewares,
                    MetadataValue::Middlewares(action.middleware),
                    id,
                    Some(&action.name),
                );
            }
            actions.push((action.name, action.handler));
        }
        let exposed = Arc::new(ExposedController::new(id, controller.name, actions));
        self.exposed.push(Arc::clone(&exposed));
        exposed
    }

    /// Mounts controllers in the registry, in the given order.
    ///
    /// # Panics
    ///
    /// Panics when a controller was not exposed through this app.
    pub fn register(&mut self, controllers: impl IntoIterator<Item = Arc<ExposedController>>) {
        for controller in controllers {
            let prefix = self
                .store
                .get(MetadataKind::RoutePrefix, controller.id(), None)
                .and_then(MetadataValue::as_str)
                .unwrap_or_else(|| {
                    panic!("controller `{}` was not exposed on this app", controller.name())
                })
                .to_owned();
            debug!(controller = controller.name(), prefix, "mounting controller");
            self.registry
                .register(&prefix, RouteTarget::Controller(controller));
        }
    }

    /// Mounts every exposed controller, in declaration order. Idempotent:
    /// re-mounting replaces the target but keeps its registry position.
    pub fn init(&mut self) {
        let exposed = self.exposed.clone();
        self.register(exposed);
    }

    /// Appends global middleware, run for every request before matching.
    /// Entries already present in the batch (same underlying callable) are
    /// skipped.
    pub fn use_middleware(&mut self, handlers: impl IntoIterator<Item = Middleware>) {
        pipeline::process(
            None,
            handlers.into_iter().collect(),
            &mut self.registry,
            &mut self.globals,
        );
    }

    /// Appends global middleware that only fires when the request path starts
    /// with `path`. Each handler is also registered as a route under `path`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed path.
    pub fn use_at(&mut self, path: &str, handlers: impl IntoIterator<Item = Middleware>) {
        pipeline::process(
            Some(path),
            handlers.into_iter().collect(),
            &mut self.registry,
            &mut self.globals,
        );
    }

    /// Registers `handler` at `path` for every method. Calling it again with
    /// the same `(path, handler)` pair is a no-op, so it is safe inside code
    /// that may run more than once.
    pub fn all(&mut self, path: &str, handler: Middleware) {
        let identity = handler.identity();
        let mut fresh = false;
        for method in Method::ALL {
            fresh |= self.all_seen.insert((method, path.to_owned(), identity));
        }
        if fresh {
            self.registry.register(path, RouteTarget::Handler(handler));
        } else {
            debug!(path, "all(): duplicate registration skipped");
        }
    }

    // ── Read access ───────────────────────────────────────────────────────────

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn matcher(&self) -> Matcher<'_> {
        Matcher::new(&self.registry, &self.store)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Dispatches one request and produces the response to emit. Never
    /// returns an error: every failure is mapped to a status code here.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let (head, body) = req.into_parts();

        let Ok(method) = head.method.as_str().parse::<Method>() else {
            warn!(method = %head.method, "unsupported method");
            return plain_status(StatusCode::METHOD_NOT_ALLOWED);
        };

        // Reconstruct an absolute URL so path and query parse uniformly.
        // Scheme honours x-forwarded-proto when a proxy set it.
        let scheme = head
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let host = head
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        let base = format!("{scheme}://{host}");
        let target = head
            .uri
            .path_and_query()
            .map_or_else(|| head.uri.path().to_owned(), |pq| pq.to_string());
        let url = match Url::parse(&base).and_then(|b| b.join(&target)) {
            Ok(url) => url,
            Err(e) => {
                warn!(%e, target, "unparseable request target");
                return plain_status(StatusCode::BAD_REQUEST);
            }
        };
        let path = url.path().to_owned();
        let query: HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let raw_body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(%e, "failed to read request body");
                return plain_status(StatusCode::BAD_REQUEST);
            }
        };

        // Bodies on mutating JSON requests parse eagerly, so a malformed one
        // is rejected before any middleware runs.
        let is_json = head
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let parse_body = matches!(method, Method::Post | Method::Put | Method::Patch)
            && is_json
            && !raw_body.is_empty();
        let parsed = if parse_body {
            match serde_json::from_slice(&raw_body) {
                Ok(value) => Some(value),
                Err(e) => return self.error_response(Error::BodyParse(e)),
            }
        } else {
            None
        };

        let ctx = Context::new(
            RequestParts {
                method,
                path: path.clone(),
                base,
                headers: head.headers,
                raw_body,
            },
            query,
        );
        if let Some(value) = parsed {
            ctx.set_parsed_body(value);
        }

        // Global tier runs first and completely, before matching.
        if let Err(e) = pipeline::execute(ctx.clone(), self.globals.clone(), None).await {
            return self.error_response(e);
        }
        if ctx.ended() {
            debug!(path, "response ended in global tier");
            return into_http(&ctx);
        }

        let Some(route) = self.matcher().find_match(&path, method) else {
            debug!(path, %method, "no route matched");
            return plain_status(StatusCode::NOT_FOUND);
        };
        ctx.set_params(route.params);

        let result = match route.target {
            RouteTarget::Handler(handler) => {
                pipeline::execute(ctx.clone(), Vec::new(), Some(handler)).await
            }
            RouteTarget::Controller(controller) => {
                // action is always set for controller targets
                let Some(action) = route.action.as_deref() else {
                    error!(controller = controller.name(), "matched without an action");
                    return plain_status(StatusCode::INTERNAL_SERVER_ERROR);
                };
                let Some(terminal) = controller.handler(action).cloned() else {
                    error!(
                        controller = controller.name(),
                        action, "matched action has no handler"
                    );
                    return plain_status(StatusCode::INTERNAL_SERVER_ERROR);
                };
                let mut scoped = Vec::new();
                if let Some(class) = self
                    .store
                    .get(MetadataKind::ClassMiddlewares, controller.id(), None)
                    .and_then(MetadataValue::as_middlewares)
                {
                    scoped.extend_from_slice(class);
                }
                if let Some(method_scoped) = self
                    .store
                    .get(MetadataKind::Middlewares, controller.id(), Some(action))
                    .and_then(MetadataValue::as_middlewares)
                {
                    scoped.extend_from_slice(method_scoped);
                }
                pipeline::execute(ctx.clone(), scoped, Some(terminal)).await
            }
        };
        if let Err(e) = result {
            return self.error_response(e);
        }
        into_http(&ctx)
    }

    /// Maps a pipeline error to the response to emit.
    fn error_response(&self, err: Error) -> http::Response<Full<Bytes>> {
        match err {
            Error::BodyParse(e) => {
                warn!(%e, "rejecting malformed json body");
                let body = json!({ "error": e.to_string() }).to_string();
                let mut response = http::Response::new(Full::new(Bytes::from(body)));
                *response.status_mut() = StatusCode::BAD_REQUEST;
                response.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                response
            }
            other => {
                error!(error = %other, "request pipeline failed");
                plain_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// A bare status-code response with the canonical reason phrase as body.
pub(crate) fn plain_status(status: StatusCode) -> http::Response<Full<Bytes>> {
    let body = status.canonical_reason().unwrap_or("");
    let mut response = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Emits whatever the response side accumulated.
fn into_http(ctx: &Context) -> http::Response<Full<Bytes>> {
    let (status, headers, body) = ctx.take_response();
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
