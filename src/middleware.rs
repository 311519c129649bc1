//! Middleware entries and their calling conventions.
//!
//! # Three conventions, one tagged type
//!
//! Every entry in a pipeline is a [`Middleware`] whose kind is chosen
//! explicitly at construction — a closed set, not inferred from anything:
//!
//! - **Simple** — `async fn(Context)`. Runs to completion, then the executor
//!   advances the chain on its behalf. It cannot short-circuit except by
//!   returning an error.
//! - **Continuation** — `async fn(Context, Next)`. The entry decides whether
//!   the chain continues: calling `next.run().await` advances the cursor,
//!   omitting the call halts everything after it.
//! - **Callback** — `fn(Request, Response, Done)`. For middleware written
//!   against the request/response/callback convention. The executor awaits
//!   the [`Done`] handle: `Done::ok` advances, `Done::err` rejects the step
//!   and the error propagates to the dispatcher.
//!
//! # How handlers are stored
//!
//! Pipelines hold entries of *different* concrete types in one `Vec`, so
//! each callable is boxed behind an `Arc<dyn Fn…>`. The chain from user code
//! to the dispatch call is:
//!
//! ```text
//! async fn show(ctx: Context) { … }            ← user writes this
//!        ↓ controller.get("show", "/:id", show)
//! show.into_middleware()                       ← Handler blanket impl
//!        ↓
//! Middleware { kind: Simple(Arc::new(…)) }     ← heap-allocated wrapper
//!        ↓
//! entry.invoke(ctx, next)  at request time     ← one virtual call
//! ```
//!
//! Cloning a `Middleware` is one atomic increment; clones share identity,
//! which is what the registration-time dedupe keys compare.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::context::Context;
use crate::error::Error;
use crate::pipeline::Next;
use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send +
/// 'static` so tokio may move it across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type SimpleFn = dyn Fn(Context) -> BoxFuture<Result<(), Error>> + Send + Sync;
type ContinuationFn = dyn Fn(Context, Next) -> BoxFuture<Result<(), Error>> + Send + Sync;
type CallbackFn = dyn Fn(Request, Response, Done) + Send + Sync;

/// One middleware entry. See the [module docs](self) for the three kinds.
#[derive(Clone)]
pub struct Middleware {
    kind: Kind,
}

#[derive(Clone)]
enum Kind {
    Simple(Arc<SimpleFn>),
    Continuation(Arc<ContinuationFn>),
    Callback(Arc<CallbackFn>),
}

impl Middleware {
    /// A simple entry: invoked with the context only, auto-advanced.
    pub fn simple<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + Send + 'static,
    {
        Self {
            kind: Kind::Simple(Arc::new(move |ctx| {
                let fut = f(ctx);
                Box::pin(async move { fut.await.into_outcome() })
            })),
        }
    }

    /// A continuation entry: invoked with `(ctx, next)`, advances only if it
    /// calls `next.run().await`.
    pub fn continuation<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + Send + 'static,
    {
        Self {
            kind: Kind::Continuation(Arc::new(move |ctx, next| {
                let fut = f(ctx, next);
                Box::pin(async move { fut.await.into_outcome() })
            })),
        }
    }

    /// A callback entry: invoked with `(request, response, done)`.
    ///
    /// The entry runs synchronously; work that must await should
    /// `tokio::spawn` and resolve `done` from the task.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Request, Response, Done) + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Callback(Arc::new(f)),
        }
    }

    /// Pointer identity of the underlying callable. Clones share it; two
    /// separately-constructed entries never do, even for the same `fn` item.
    pub(crate) fn identity(&self) -> usize {
        match &self.kind {
            Kind::Simple(f) => Arc::as_ptr(f) as *const () as usize,
            Kind::Continuation(f) => Arc::as_ptr(f) as *const () as usize,
            Kind::Callback(f) => Arc::as_ptr(f) as *const () as usize,
        }
    }

    /// Runs this entry under its convention, with `next` as the rest of the
    /// chain. Called by the pipeline executor and by path guards.
    pub(crate) fn invoke(&self, ctx: Context, next: Next) -> BoxFuture<Result<(), Error>> {
        match &self.kind {
            Kind::Simple(f) => {
                let fut = f(ctx);
                Box::pin(async move {
                    fut.await?;
                    next.run().await
                })
            }
            Kind::Continuation(f) => f(ctx, next),
            Kind::Callback(f) => {
                let (tx, rx) = oneshot::channel();
                let (request, response) = ctx.split();
                f(request, response, Done { tx });
                Box::pin(async move {
                    match rx.await {
                        Ok(Ok(())) => next.run().await,
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(Error::pipeline(
                            "callback middleware dropped its completion handle",
                        )),
                    }
                })
            }
        }
    }
}

/// Completion handle passed to callback-style middleware.
///
/// Exactly one of [`ok`](Done::ok) or [`err`](Done::err) should be called.
/// Dropping the handle unresolved fails the step.
pub struct Done {
    tx: oneshot::Sender<Result<(), Error>>,
}

impl Done {
    /// Signals success; the executor advances to the next entry.
    pub fn ok(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Signals failure; the pipeline rejects and the dispatcher surfaces it.
    pub fn err(self, msg: impl Into<String>) {
        let _ = self.tx.send(Err(Error::pipeline(msg)));
    }
}

// ── Handler conversion ────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a pipeline outcome.
///
/// Lets handlers be written as `async fn(ctx)` (unit return) or as
/// `async fn(ctx) -> Result<(), Error>` when they want `?`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), Error>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), Error> {
        Ok(())
    }
}

impl IntoOutcome for Result<(), Error> {
    fn into_outcome(self) -> Result<(), Error> {
        self
    }
}

/// Implemented for every valid terminal route handler.
///
/// You never implement this yourself: it is automatically satisfied for any
/// `async fn` with the signature
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoOutcome
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it, keeping the API surface stable.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_middleware(self) -> Middleware;
}

/// The sealing module. `Sealed` is private, so external crates cannot name
/// it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_middleware(self) -> Middleware {
        Middleware::simple(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_fresh_entries_do_not() {
        let a = Middleware::simple(|_ctx: Context| async {});
        let b = a.clone();
        assert_eq!(a.identity(), b.identity());

        async fn noop(_ctx: Context) {}
        let c = noop.into_middleware();
        let d = noop.into_middleware();
        assert_ne!(c.identity(), d.identity());
    }
}
