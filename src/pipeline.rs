//! Middleware pipeline composition and execution.
//!
//! [`execute`] is continuation-passing composition over an ordered entry
//! list: a cursor starts before the first entry, and each advance invokes
//! the entry at that position under its calling convention (see
//! [`Middleware`](crate::Middleware)). When the cursor exhausts the list,
//! the optional terminal handler runs the same way.
//!
//! A continuation entry that never calls `next.run()` halts everything
//! after it — that is how auth and validation middleware reject a request.
//! Errors from any entry reject the whole composition and propagate to the
//! dispatcher's error boundary.
//!
//! The dispatcher calls `execute` twice per request: once for the global
//! tier, then once for the class- and method-scoped tiers with the matched
//! handler as terminal. That split is what guarantees global middleware
//! runs first and completely.

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxFuture, Middleware};
use crate::registry::{RouteRegistry, RouteTarget};

/// Continuation handle given to [`Middleware::continuation`] entries.
///
/// Consuming it with [`run`](Next::run) advances the chain; dropping it
/// without running halts the chain (short-circuit).
pub struct Next {
    ctx: Context,
    entries: Arc<[Middleware]>,
    cursor: usize,
    terminal: Option<Middleware>,
}

impl Next {
    fn new(
        ctx: Context,
        entries: Arc<[Middleware]>,
        cursor: usize,
        terminal: Option<Middleware>,
    ) -> Self {
        Self { ctx, entries, cursor, terminal }
    }

    /// Runs the rest of the chain: the entry at the cursor, or the terminal
    /// handler once the list is exhausted.
    pub fn run(self) -> BoxFuture<Result<(), Error>> {
        Box::pin(async move {
            if self.cursor < self.entries.len() {
                let entry = self.entries[self.cursor].clone();
                let next = Next::new(
                    self.ctx.clone(),
                    Arc::clone(&self.entries),
                    self.cursor + 1,
                    self.terminal.clone(),
                );
                entry.invoke(self.ctx, next).await
            } else if let Some(terminal) = self.terminal {
                // the terminal gets a chain that resolves immediately
                let tail = Next::new(
                    self.ctx.clone(),
                    Arc::clone(&self.entries),
                    self.entries.len(),
                    None,
                );
                terminal.invoke(self.ctx, tail).await
            } else {
                Ok(())
            }
        })
    }
}

/// Runs `entries` in order against `ctx`, then the optional terminal
/// handler.
pub async fn execute(
    ctx: Context,
    entries: Vec<Middleware>,
    terminal: Option<Middleware>,
) -> Result<(), Error> {
    Next::new(ctx, Arc::from(entries), 0, terminal).run().await
}

/// Registers `handlers` for [`App::use_at`](crate::App::use_at) /
/// [`use_middleware`](crate::App::use_middleware).
///
/// With a path, every handler is registered in the registry under that
/// prefix (so it is also matchable as a route) and wrapped into a
/// path-guarded entry appended to `into`. Without a path, handlers are
/// appended directly, deduplicated by identity within the batch.
pub(crate) fn process(
    path: Option<&str>,
    handlers: Vec<Middleware>,
    registry: &mut RouteRegistry,
    into: &mut Vec<Middleware>,
) {
    match path {
        Some(prefix) => {
            assert!(
                prefix.is_empty() || prefix.starts_with('/'),
                "middleware path must be empty or start with '/', got `{prefix}`"
            );
            for handler in handlers {
                registry.register(prefix, RouteTarget::Handler(handler.clone()));
                into.push(path_guard(prefix.to_owned(), handler));
            }
        }
        None => {
            let mut seen: Vec<usize> = Vec::new();
            for handler in handlers {
                if seen.contains(&handler.identity()) {
                    continue;
                }
                seen.push(handler.identity());
                into.push(handler);
            }
        }
    }
}

/// Wraps `handler` so it only runs when the request path starts with
/// `prefix`; any other path delegates straight to the rest of the chain.
fn path_guard(prefix: String, handler: Middleware) -> Middleware {
    Middleware::continuation(move |ctx: Context, next: Next| {
        let prefix = prefix.clone();
        let handler = handler.clone();
        async move {
            if ctx.path().starts_with(&prefix) {
                handler.invoke(ctx, next).await
            } else {
                next.run().await
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::context::testing::context;
    use crate::method::Method;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn mark(log: &Log, tag: &'static str) -> Middleware {
        let log = Arc::clone(log);
        Middleware::continuation(move |_ctx, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(tag);
                next.run().await
            }
        })
    }

    fn mark_simple(log: &Log, tag: &'static str) -> Middleware {
        let log = Arc::clone(log);
        Middleware::simple(move |_ctx| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(tag);
            }
        })
    }

    #[tokio::test]
    async fn entries_run_in_list_order() {
        let log = log();
        let ctx = context(Method::Get, "/", &[]);
        let entries = vec![mark(&log, "a"), mark(&log, "b"), mark(&log, "c")];
        execute(ctx, entries, Some(mark_simple(&log, "terminal")))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c", "terminal"]);
    }

    #[tokio::test]
    async fn omitting_next_halts_everything_after() {
        let log = log();
        let ctx = context(Method::Get, "/", &[]);
        let halt = {
            let log = Arc::clone(&log);
            Middleware::continuation(move |_ctx, _next| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push("b");
                    // next dropped without running
                }
            })
        };
        let entries = vec![mark(&log, "a"), halt, mark(&log, "c")];
        execute(ctx, entries, Some(mark_simple(&log, "terminal")))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[tokio::test]
    async fn simple_entries_auto_advance() {
        let log = log();
        let ctx = context(Method::Get, "/", &[]);
        let entries = vec![mark_simple(&log, "a"), mark_simple(&log, "b")];
        execute(ctx, entries, Some(mark_simple(&log, "terminal")))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["a", "b", "terminal"]);
    }

    #[tokio::test]
    async fn callback_completion_advances_and_error_rejects() {
        let log = log();
        let ctx = context(Method::Get, "/", &[]);
        let ok_cb = Middleware::callback(|_request, response, done| {
            response.set_header("x-seen", "yes");
            done.ok();
        });
        execute(
            ctx.clone(),
            vec![ok_cb],
            Some(mark_simple(&log, "terminal")),
        )
        .await
        .unwrap();
        assert_eq!(*log.lock().unwrap(), ["terminal"]);
        assert_eq!(ctx.split().1.header("x-seen").as_deref(), Some("yes"));

        let failing = Middleware::callback(|_request, _response, done| {
            done.err("nope");
        });
        let result = execute(
            context(Method::Get, "/", &[]),
            vec![failing],
            Some(mark_simple(&log, "unreached")),
        )
        .await;
        assert!(matches!(result, Err(Error::Pipeline(_))));
        assert_eq!(*log.lock().unwrap(), ["terminal"]);
    }

    #[tokio::test]
    async fn error_from_an_entry_stops_the_chain() {
        let log = log();
        let failing = Middleware::simple(|_ctx| async {
            Err::<(), _>(Error::pipeline("boom"))
        });
        let result = execute(
            context(Method::Get, "/", &[]),
            vec![failing, mark_simple(&log, "later")],
            None,
        )
        .await;
        assert!(result.is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_guard_skips_non_matching_requests() {
        let log = log();
        let mut registry = RouteRegistry::new();
        let mut globals = Vec::new();
        process(
            Some("/api"),
            vec![mark_simple(&log, "guarded")],
            &mut registry,
            &mut globals,
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(globals.len(), 1);

        execute(context(Method::Get, "/other", &[]), globals.clone(), None)
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());

        execute(context(Method::Get, "/api/x", &[]), globals, None)
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["guarded"]);
    }

    #[tokio::test]
    async fn batch_registration_dedupes_by_identity() {
        let log = log();
        let mut registry = RouteRegistry::new();
        let mut globals = Vec::new();
        let entry = mark_simple(&log, "once");
        process(
            None,
            vec![entry.clone(), entry.clone(), mark_simple(&log, "other")],
            &mut registry,
            &mut globals,
        );
        assert_eq!(globals.len(), 2);
        assert_eq!(registry.len(), 0);
    }
}
