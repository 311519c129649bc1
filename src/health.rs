//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. switchyard answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Mount them like any other handler:
//!
//! ```rust,no_run
//! use switchyard::{App, Controller, health};
//!
//! let mut app = App::new();
//! let probes = app.expose(
//!     Controller::new("probes", "")
//!         .get("liveness", "/healthz", health::liveness)
//!         .get("readiness", "/readyz", health::readiness),
//! );
//! app.register([probes]);
//! ```
//!
//! Override `readiness` with a custom handler if you need to gate on
//! dependency availability (database connections, downstream services, etc.):
//!
//! ```rust,no_run
//! use switchyard::Context;
//!
//! async fn readiness(ctx: Context) {
//!     if dependencies_are_healthy().await {
//!         ctx.send_text("ready");
//!     } else {
//!         ctx.set_status(http::StatusCode::SERVICE_UNAVAILABLE);
//!         ctx.end();
//!     }
//! }
//!
//! async fn dependencies_are_healthy() -> bool { true }
//! ```

use crate::Context;

/// Kubernetes liveness probe handler.
///
/// Always returns `200 OK` with body `"ok"`. If the process can respond to
/// HTTP at all, it is alive — this handler intentionally has no dependencies.
pub async fn liveness(ctx: Context) {
    ctx.send_text("ok");
}

/// Kubernetes readiness probe handler (default implementation).
///
/// Returns `200 OK` with body `"ready"`. Replace this with your own handler
/// if your application needs a warm-up period or must verify dependency health
/// before accepting traffic.
pub async fn readiness(ctx: Context) {
    ctx.send_text("ready");
}
