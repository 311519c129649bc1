//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()` — no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Set `terminationGracePeriodSeconds` in your pod spec to a value longer
//! than your slowest request.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::{plain_status, App};
use crate::error::Error;
use crate::queue::AdmissionQueue;

/// Requests carrying this header participate in admission deduplication.
const ADMISSION_TAG: &str = "x-request-id";

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    admission: Option<Arc<AdmissionQueue>>,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use switchyard::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self {
            addr,
            admission: None,
        }
    }

    /// Gates dispatch behind `queue`. Requests beyond the concurrency bound
    /// wait their turn; requests suppressed by the dedupe cache get a
    /// `429 Too Many Requests` without running any middleware.
    pub fn with_admission(mut self, queue: AdmissionQueue) -> Self {
        self.admission = Some(Arc::new(queue));
        self
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Arc so connection tasks share one declaration set without copying.
        let app = Arc::new(app);
        let admission = self.admission;

        info!(addr = %self.addr, routes = app.registry().len(), "switchyard listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        // Pin the shutdown future so we can poll it in a loop.
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` makes select! check arms top-to-bottom instead of
                // randomly. Shutdown is first so a SIGTERM immediately stops
                // accepting, even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let admission = admission.clone();
                    // TokioIo adapts tokio's AsyncRead/AsyncWrite to the hyper
                    // IO traits.
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // `service_fn` turns a plain async function into a
                        // hyper `Service`. The closure runs once per request
                        // on the connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            let admission = admission.clone();
                            async move { dispatch(app, admission, req).await }
                        });

                        // `auto::Builder` transparently handles both HTTP/1.1
                        // and HTTP/2 — whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection before returning.
        while tasks.join_next().await.is_some() {}

        info!("switchyard stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Per-request entry point: admission first, then the app's dispatch.
///
/// The error type is [`Infallible`](std::convert::Infallible) — every failure
/// is mapped to a status code internally, so hyper never sees an error.
async fn dispatch<B>(
    app: Arc<App>,
    admission: Option<Arc<AdmissionQueue>>,
    req: hyper::Request<B>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible>
where
    B: hyper::body::Body + Send,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    let _permit = match &admission {
        Some(queue) => {
            let tag = req
                .headers()
                .get(ADMISSION_TAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            match queue.admit(tag.as_deref()).await {
                Some(permit) => Some(permit),
                None => {
                    warn!(
                        tag = tag.as_deref().unwrap_or("-"),
                        "request suppressed by admission queue"
                    );
                    return Ok(plain_status(http::StatusCode::TOO_MANY_REQUESTS));
                }
            }
        }
        None => None,
    };

    Ok(app.handle(req).await)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // `pending()` never resolves — on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;
    use http_body_util::Full;

    use super::*;
    use crate::middleware::Middleware;
    use crate::Context;

    fn ping_app() -> Arc<App> {
        let mut app = App::new();
        app.all(
            "/ping",
            Middleware::simple(|ctx: Context| async move {
                ctx.send_text("pong");
            }),
        );
        Arc::new(app)
    }

    fn request(id: Option<&str>) -> hyper::Request<Full<Bytes>> {
        let mut builder = http::Request::builder()
            .method("GET")
            .uri("http://t/ping")
            .header("host", "t");
        if let Some(id) = id {
            builder = builder.header(ADMISSION_TAG, id);
        }
        builder.body(Full::new(Bytes::new())).expect("test request")
    }

    #[tokio::test]
    async fn duplicate_tagged_requests_get_429() {
        let app = ping_app();
        let admission = Some(Arc::new(AdmissionQueue::with_dedupe(4, 16)));

        let first = dispatch(Arc::clone(&app), admission.clone(), request(Some("dup")))
            .await
            .expect("infallible");
        assert_eq!(first.status(), StatusCode::OK);

        let second = dispatch(Arc::clone(&app), admission.clone(), request(Some("dup")))
            .await
            .expect("infallible");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // a distinct tag and an untagged request both pass
        let other = dispatch(Arc::clone(&app), admission.clone(), request(Some("other")))
            .await
            .expect("infallible");
        assert_eq!(other.status(), StatusCode::OK);
        let untagged = dispatch(Arc::clone(&app), admission, request(None))
            .await
            .expect("infallible");
        assert_eq!(untagged.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dispatch_without_a_queue_is_ungated() {
        let app = ping_app();
        let response = dispatch(Arc::clone(&app), None, request(Some("dup")))
            .await
            .expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        let again = dispatch(app, None, request(Some("dup")))
            .await
            .expect("infallible");
        assert_eq!(again.status(), StatusCode::OK);
    }
}
