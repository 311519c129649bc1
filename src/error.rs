//! Unified error type.
//!
//! Route misconfiguration — a bad prefix, a sub-path with two `:name`
//! segments, an unknown action — panics at declaration time instead of
//! producing an `Error`: those are programmer mistakes and must never be
//! deferred to request handling. `Error` covers what can legitimately go
//! wrong once traffic is flowing.
//!
//! A missing route is *not* an error. The matcher returns `None` and the
//! dispatcher turns that into a 404.

/// The error type carried through the middleware pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request body claimed to be JSON and was not (or a response body
    /// failed to serialise). The dispatcher maps this to `400 Bad Request`.
    #[error("invalid json body: {0}")]
    BodyParse(#[from] serde_json::Error),

    /// A middleware rejected the request or failed mid-chain. The dispatcher
    /// maps this to `500 Internal Server Error`.
    #[error("pipeline: {0}")]
    Pipeline(String),

    /// Socket-level failure: binding the listener or accepting a connection.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a pipeline rejection with a message.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }
}
