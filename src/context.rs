//! The per-request context adapter.
//!
//! One addressable object per request, merging the request side and the
//! response side, plus three adapter-owned fields (`body`, `params`,
//! `query`) populated during dispatch. Every middleware and handler receives
//! a clone of the same [`Context`]; clones are handles onto shared state,
//! so a header set in one middleware is visible to the next.
//!
//! # Property precedence
//!
//! The documented fields have typed accessors. Everything else goes through
//! the generic string-property surface, with a fixed precedence:
//!
//! - [`get`](Context::get): adapter-owned extras → response headers →
//!   request headers.
//! - [`set`](Context::set): a name the response already defines is written
//!   there (and shadows the request side); else a name the request defines
//!   is written there; else the write lands in adapter-owned storage.
//! - [`contains`](Context::contains) and [`remove`](Context::remove) consult
//!   only the request and response sides — adapter-owned fields and extras
//!   are invisible to them. This narrowing is deliberate, observed behavior.
//!
//! Locks are internal and never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::method::Method;
use crate::request::{Request, RequestParts};
use crate::response::{Response, ResponseParts};

/// Everything a single request owns.
pub(crate) struct ContextState {
    pub(crate) request: RequestParts,
    pub(crate) response: ResponseParts,
    pub(crate) body: Option<Value>,
    pub(crate) params: HashMap<String, String>,
    pub(crate) query: HashMap<String, String>,
    extras: HashMap<String, String>,
}

/// Shared handle on [`ContextState`]. A poisoned lock is recovered rather
/// than propagated: the state is plain data and stays coherent.
#[derive(Clone)]
pub(crate) struct SharedState(Arc<Mutex<ContextState>>);

impl SharedState {
    pub(crate) fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The unified per-request view passed to every middleware and handler.
#[derive(Clone)]
pub struct Context {
    shared: SharedState,
}

impl Context {
    pub(crate) fn new(request: RequestParts, query: HashMap<String, String>) -> Self {
        Self {
            shared: SharedState(Arc::new(Mutex::new(ContextState {
                request,
                response: ResponseParts::default(),
                body: None,
                params: HashMap::new(),
                query,
                extras: HashMap::new(),
            }))),
        }
    }

    /// Splits into the two side views. Both share state with `self`; this
    /// is how callback-style middleware receives its `(request, response)`
    /// pair.
    pub fn split(&self) -> (Request, Response) {
        (
            Request { shared: self.shared.clone() },
            Response { shared: self.shared.clone() },
        )
    }

    // ── Request-derived fields ────────────────────────────────────────────────

    pub fn method(&self) -> Method {
        self.shared.lock().request.method
    }

    pub fn path(&self) -> String {
        self.shared.lock().request.path.clone()
    }

    pub fn base(&self) -> String {
        self.shared.lock().request.base.clone()
    }

    /// Request header lookup (case-insensitive).
    pub fn header(&self, name: &str) -> Option<String> {
        self.shared
            .lock()
            .request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Extracted path parameter, e.g. `param("id")` is `"42"` for
    /// `/users/:id` matched against `/users/42`.
    pub fn param(&self, name: &str) -> Option<String> {
        self.shared.lock().params.get(name).cloned()
    }

    pub fn query(&self, name: &str) -> Option<String> {
        self.shared.lock().query.get(name).cloned()
    }

    /// The parsed JSON body, when the dispatcher parsed one.
    pub fn body(&self) -> Option<Value> {
        self.shared.lock().body.clone()
    }

    /// Parses the raw body as JSON on demand; see [`Request::json`].
    pub fn json(&self) -> Result<Option<Value>, Error> {
        self.split().0.json()
    }

    // ── Response capabilities ─────────────────────────────────────────────────

    pub fn set_status(&self, status: StatusCode) {
        self.split().1.set_status(status)
    }

    pub fn set_header(&self, name: &str, value: &str) {
        self.split().1.set_header(name, value)
    }

    pub fn write(&self, data: impl AsRef<[u8]>) {
        self.split().1.write(data)
    }

    pub fn end(&self) {
        self.split().1.end()
    }

    pub fn ended(&self) -> bool {
        self.shared.lock().response.ended
    }

    pub fn send_text(&self, body: impl AsRef<str>) {
        self.split().1.send_text(body)
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        self.split().1.send_json(value)
    }

    // ── Generic property surface ──────────────────────────────────────────────

    /// Reads a property: adapter extras, then response headers, then
    /// request headers.
    pub fn get(&self, name: &str) -> Option<String> {
        let inner = self.shared.lock();
        if let Some(v) = inner.extras.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = inner.response.headers.get(name) {
            return v.to_str().ok().map(str::to_owned);
        }
        inner
            .request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Writes a property. A name the response side already defines is
    /// written there; else a name the request side defines; else the value
    /// lands in adapter-owned storage.
    pub fn set(&self, name: &str, value: &str) {
        let mut inner = self.shared.lock();
        if inner.response.headers.contains_key(name) {
            if let Ok(v) = http::HeaderValue::try_from(value) {
                if let Ok(n) = http::header::HeaderName::try_from(name) {
                    inner.response.headers.insert(n, v);
                }
            }
            return;
        }
        if inner.request.headers.contains_key(name) {
            if let Ok(v) = http::HeaderValue::try_from(value) {
                if let Ok(n) = http::header::HeaderName::try_from(name) {
                    inner.request.headers.insert(n, v);
                }
            }
            return;
        }
        inner.extras.insert(name.to_owned(), value.to_owned());
    }

    /// Existence check over the request and response sides only.
    /// Adapter-owned fields (`body`, `params`, `query`) and extras are
    /// invisible here.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.shared.lock();
        inner.response.headers.contains_key(name) || inner.request.headers.contains_key(name)
    }

    /// Deletes a request-side property. Response-side and adapter-owned
    /// names are untouched (the narrowing mirrors `contains`).
    pub fn remove(&self, name: &str) -> bool {
        self.shared.lock().request.headers.remove(name).is_some()
    }

    // ── Dispatcher hooks ──────────────────────────────────────────────────────

    pub(crate) fn set_params(&self, params: HashMap<String, String>) {
        self.shared.lock().params = params;
    }

    pub(crate) fn set_parsed_body(&self, value: Value) {
        self.shared.lock().body = Some(value);
    }

    pub(crate) fn take_response(&self) -> (StatusCode, http::HeaderMap, Bytes) {
        self.split().1.take_parts()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use http::HeaderMap;

    /// Builds a context the way the dispatcher would, without a socket.
    pub(crate) fn context(method: Method, path: &str, headers: &[(&str, &str)]) -> Context {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                http::header::HeaderName::try_from(*name).expect("test header name"),
                http::HeaderValue::try_from(*value).expect("test header value"),
            );
        }
        Context::new(
            RequestParts {
                method,
                path: path.to_owned(),
                base: "http://test.local".to_owned(),
                headers: map,
                raw_body: Bytes::new(),
            },
            HashMap::new(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::context;
    use super::*;

    #[test]
    fn write_to_response_name_shadows_request_side() {
        let ctx = context(Method::Get, "/", &[("x-tag", "from-request")]);
        let (_, response) = ctx.split();
        response.set_header("x-tag", "from-response");

        ctx.set("x-tag", "updated");

        assert_eq!(response.header("x-tag").as_deref(), Some("updated"));
        assert_eq!(ctx.get("x-tag").as_deref(), Some("updated"));
        // the request side kept its original value
        assert_eq!(ctx.header("x-tag").as_deref(), Some("from-request"));
    }

    #[test]
    fn unknown_names_land_in_adapter_storage() {
        let ctx = context(Method::Get, "/", &[]);
        ctx.set("trace-id", "abc");
        assert_eq!(ctx.get("trace-id").as_deref(), Some("abc"));
        // quirk: extras are invisible to contains/remove
        assert!(!ctx.contains("trace-id"));
        assert!(!ctx.remove("trace-id"));
        assert_eq!(ctx.get("trace-id").as_deref(), Some("abc"));
    }

    #[test]
    fn read_falls_through_to_request_side() {
        let ctx = context(Method::Get, "/", &[("accept", "application/json")]);
        assert_eq!(ctx.get("accept").as_deref(), Some("application/json"));
        assert!(ctx.contains("accept"));
        assert!(ctx.remove("accept"));
        assert_eq!(ctx.get("accept"), None);
    }

    #[test]
    fn adapter_fields_are_excluded_from_existence_checks() {
        let ctx = context(Method::Get, "/", &[]);
        ctx.set_params([("id".to_owned(), "7".to_owned())].into());
        assert_eq!(ctx.param("id").as_deref(), Some("7"));
        assert!(!ctx.contains("params"));
        assert!(!ctx.contains("body"));
        assert!(!ctx.contains("query"));
    }

    #[test]
    fn response_accumulates_until_taken() {
        let ctx = context(Method::Get, "/", &[]);
        ctx.set_status(StatusCode::CREATED);
        ctx.set_header("location", "/users/9");
        ctx.write(b"created");
        ctx.end();
        assert!(ctx.ended());

        let (status, headers, body) = ctx.take_response();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(headers.get("location").unwrap(), "/users/9");
        assert_eq!(&body[..], b"created");
    }
}
