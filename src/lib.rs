//! # switchyard
//!
//! A request-dispatch engine for Rust services behind a reverse proxy.
//!
//! ## The contract
//!
//! nginx handles TLS, body-size limits, and slow clients. switchyard does
//! not — by design. The proxy does proxy things. The engine does engine
//! things: declaration-driven routing, a three-tier middleware pipeline, and
//! a unified per-request context.
//!
//! - **Controllers** — a route prefix plus named actions, each bound to a
//!   verb and a sub-path with at most one `:name` parameter segment.
//!   Declarations live in a metadata side table, mounting order decides how
//!   ambiguous paths resolve.
//! - **Middleware** — three explicit calling conventions
//!   ([`Middleware::simple`], [`Middleware::continuation`],
//!   [`Middleware::callback`]) at three scopes: global, class, and method.
//!   Global middleware always runs first and completely; a continuation
//!   entry that never calls `next.run()` short-circuits everything after it.
//! - **Context** — one addressable object per request merging the request
//!   and response sides, handed as a cheap clone to every entry in the chain.
//! - **Serving** — hyper over tokio, HTTP/1.1 and HTTP/2, graceful
//!   SIGTERM / Ctrl-C shutdown, optional bounded admission with request
//!   deduplication.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::{App, Context, Controller, Middleware, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = App::new();
//!
//!     let users = app.expose(
//!         Controller::new("users", "/users")
//!             .get("show", "/:id", show_user)
//!             .post("create", "", create_user)
//!             .mid("create", Middleware::continuation(require_auth)),
//!     );
//!     app.register([users]);
//!     app.use_middleware([Middleware::simple(log_request)]);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn show_user(ctx: Context) {
//!     let id = ctx.param("id").unwrap_or_default();
//!     ctx.send_json(&serde_json::json!({ "id": id })).unwrap();
//! }
//!
//! async fn create_user(ctx: Context) {
//!     ctx.set_status(http::StatusCode::CREATED);
//!     ctx.send_text("created");
//! }
//!
//! async fn log_request(ctx: Context) {
//!     tracing::info!(method = %ctx.method(), path = ctx.path(), "request");
//! }
//!
//! async fn require_auth(ctx: Context, next: switchyard::Next) -> Result<(), switchyard::Error> {
//!     if ctx.header("authorization").is_some() {
//!         next.run().await
//!     } else {
//!         ctx.set_status(http::StatusCode::UNAUTHORIZED);
//!         ctx.end();
//!         Ok(())
//!     }
//! }
//! ```

mod app;
mod context;
mod controller;
mod error;
mod matcher;
mod metadata;
mod method;
mod middleware;
mod pipeline;
mod queue;
mod registry;
mod request;
mod response;
mod server;

pub mod health;

pub use app::App;
pub use context::Context;
pub use controller::{Controller, ExposedController};
pub use error::Error;
pub use matcher::{Matcher, ParsedRoute};
pub use metadata::{MetadataKind, MetadataStore, MetadataValue, TargetId};
pub use method::{Method, Verb};
pub use middleware::{Done, Handler, IntoOutcome, Middleware};
pub use pipeline::{execute, Next};
pub use queue::{AdmissionPermit, AdmissionQueue};
pub use registry::{RouteRegistry, RouteTarget};
pub use request::Request;
pub use response::Response;
pub use server::Server;
