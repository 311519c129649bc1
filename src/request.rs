//! Request-side view of the per-request state.

use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;
use tracing::warn;

use crate::context::SharedState;
use crate::error::Error;
use crate::method::Method;

/// The request-derived fields, parsed once by the dispatcher.
pub(crate) struct RequestParts {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) base: String,
    pub(crate) headers: HeaderMap,
    pub(crate) raw_body: Bytes,
}

/// Read access to the request side of a [`Context`](crate::Context).
///
/// Shares state with the context it was split from — this is a view, not a
/// copy. Handed to callback-style middleware as its first argument.
#[derive(Clone)]
pub struct Request {
    pub(crate) shared: SharedState,
}

impl Request {
    pub fn method(&self) -> Method {
        self.shared.lock().request.method
    }

    pub fn path(&self) -> String {
        self.shared.lock().request.path.clone()
    }

    /// The base URL the request was addressed to, e.g. `http://example.com`.
    /// Scheme comes from `x-forwarded-proto` when present.
    pub fn base(&self) -> String {
        self.shared.lock().request.base.clone()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<String> {
        self.shared
            .lock()
            .request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<String> {
        self.shared.lock().params.get(name).cloned()
    }

    /// Returns a query-string value.
    pub fn query(&self, name: &str) -> Option<String> {
        self.shared.lock().query.get(name).cloned()
    }

    pub fn params(&self) -> HashMap<String, String> {
        self.shared.lock().params.clone()
    }

    /// The raw, unparsed body bytes.
    pub fn body_bytes(&self) -> Bytes {
        self.shared.lock().request.raw_body.clone()
    }

    /// The parsed JSON body, if the dispatcher parsed one.
    pub fn body(&self) -> Option<Value> {
        self.shared.lock().body.clone()
    }

    /// Parses the body as JSON on demand.
    ///
    /// Returns the dispatcher's eagerly-parsed value when there is one,
    /// `Ok(None)` for an empty body, and [`Error::BodyParse`] for malformed
    /// input.
    pub fn json(&self) -> Result<Option<Value>, Error> {
        let (parsed, raw) = {
            let inner = self.shared.lock();
            (inner.body.clone(), inner.request.raw_body.clone())
        };
        if parsed.is_some() {
            return Ok(parsed);
        }
        if raw.is_empty() {
            warn!("request body is empty");
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}
