//! Response-side view of the per-request state.
//!
//! Handlers build the response by mutating this view — set a status, add
//! headers, write bytes, then [`end`](Response::end). The dispatcher emits
//! whatever has accumulated once the pipeline finishes. The `send_*`
//! shortcuts cover the common cases in one call.

use bytes::{Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::context::SharedState;
use crate::error::Error;

/// The response-side state, owned by the context for the request lifetime.
pub(crate) struct ResponseParts {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: BytesMut,
    pub(crate) ended: bool,
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            ended: false,
        }
    }
}

/// Write access to the response side of a [`Context`](crate::Context).
///
/// Shares state with the context it was split from. Handed to
/// callback-style middleware as its second argument.
#[derive(Clone)]
pub struct Response {
    pub(crate) shared: SharedState,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.shared.lock().response.status
    }

    pub fn set_status(&self, status: StatusCode) {
        self.shared.lock().response.status = status;
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.shared
            .lock()
            .response
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    /// Sets a response header, replacing any existing value. Invalid header
    /// names or values are dropped with a debug log rather than panicking
    /// mid-request.
    pub fn set_header(&self, name: &str, value: &str) {
        let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) else {
            debug!(name, "dropping invalid response header");
            return;
        };
        self.shared.lock().response.headers.insert(name, value);
    }

    /// Appends bytes to the response body. Writes after [`end`](Self::end)
    /// are ignored.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        let mut inner = self.shared.lock();
        if inner.response.ended {
            debug!("write after end ignored");
            return;
        }
        inner.response.body.extend_from_slice(data.as_ref());
    }

    /// Marks the response complete. Later middleware may still run, but the
    /// dispatcher treats an ended response in the global tier as an early
    /// exit.
    pub fn end(&self) {
        self.shared.lock().response.ended = true;
    }

    pub fn ended(&self) -> bool {
        self.shared.lock().response.ended
    }

    /// `text/plain` body, then end.
    pub fn send_text(&self, body: impl AsRef<str>) {
        self.set_header("content-type", "text/plain; charset=utf-8");
        self.write(body.as_ref().as_bytes());
        self.end();
    }

    /// Serialises `value` as an `application/json` body, then ends.
    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), Error> {
        let bytes = serde_json::to_vec(value)?;
        let mut inner = self.shared.lock();
        if !inner.response.ended {
            inner.response.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            inner.response.body.extend_from_slice(&bytes);
            inner.response.ended = true;
        }
        Ok(())
    }

    /// Redirects to `location`. Non-3xx statuses fall back to `302 Found`.
    pub fn redirect(&self, location: &str, status: StatusCode) {
        let status = if status.is_redirection() {
            status
        } else {
            debug!(%status, "redirect called with non-3xx status, using 302");
            StatusCode::FOUND
        };
        let mut inner = self.shared.lock();
        inner.response.status = status;
        if let Ok(value) = HeaderValue::try_from(location) {
            inner.response.headers.insert(LOCATION, value);
        }
        inner.response.ended = true;
    }

    pub(crate) fn take_parts(&self) -> (StatusCode, HeaderMap, Bytes) {
        let mut inner = self.shared.lock();
        let parts = std::mem::take(&mut inner.response);
        (parts.status, parts.headers, parts.body.freeze())
    }
}
