//! Minimal switchyard example — a users controller with all three middleware
//! scopes, plus health checks behind an admission queue.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -H 'authorization: Bearer dev' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/admin/stats        # guarded by /admin middleware
//!   curl http://localhost:3000/healthz

use http::StatusCode;
use switchyard::{AdmissionQueue, App, Context, Controller, Middleware, Next, Server, health};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut app = App::new();

    // Class middleware runs before every action; method middleware only
    // before the action it is attached to.
    let users = app.expose(
        Controller::new("users", "/users")
            .get("show", "/:id", show_user)
            .post("create", "", create_user)
            .mids([Middleware::callback(stamp_request)])
            .mid("create", Middleware::continuation(require_auth)),
    );
    let probes = app.expose(
        Controller::new("probes", "")
            .get("liveness", "/healthz", health::liveness)
            .get("readiness", "/readyz", health::readiness),
    );
    app.register([users, probes]);

    // Global tier: logging for every request, a guard only under /admin.
    app.use_middleware([Middleware::simple(log_request)]);
    app.use_at("/admin", [Middleware::simple(admin_stats)]);

    Server::bind("0.0.0.0:3000")
        .with_admission(AdmissionQueue::with_dedupe(256, 1024))
        .serve(app)
        .await
        .expect("server error");
}

async fn log_request(ctx: Context) {
    tracing::info!(method = %ctx.method(), path = ctx.path(), "request");
}

// Callback convention: sync body, completion via the handle.
fn stamp_request(_req: switchyard::Request, res: switchyard::Response, done: switchyard::Done) {
    res.set_header("x-served-by", "switchyard");
    done.ok();
}

async fn require_auth(ctx: Context, next: Next) -> Result<(), switchyard::Error> {
    if ctx.header("authorization").is_some() {
        next.run().await
    } else {
        ctx.set_status(StatusCode::UNAUTHORIZED);
        ctx.send_text("missing authorization header");
        Ok(())
    }
}

// GET /users/:id
async fn show_user(ctx: Context) {
    let id = ctx.param("id").unwrap_or_default();
    let _ = ctx.send_json(&serde_json::json!({ "id": id, "name": "alice" }));
}

// POST /users — the dispatcher already parsed the JSON body (or rejected it
// with a 400 before any middleware ran).
async fn create_user(ctx: Context) {
    let name = ctx
        .body()
        .and_then(|b| b.get("name").and_then(|n| n.as_str().map(str::to_owned)))
        .unwrap_or_else(|| "anonymous".to_owned());
    ctx.set_status(StatusCode::CREATED);
    ctx.set_header("location", "/users/99");
    let _ = ctx.send_json(&serde_json::json!({ "id": "99", "name": name }));
}

// Registered under /admin through use_at: runs as global middleware for
// matching paths and doubles as the route target for /admin itself.
async fn admin_stats(ctx: Context) {
    if !ctx.ended() {
        let _ = ctx.send_json(&serde_json::json!({ "requests": "plenty" }));
    }
}
