//! Ordered route registry.
//!
//! Prefix → target, in registration order. Matching iterates this order and
//! takes the first hit, so callers register routes in the order ambiguities
//! should resolve. Re-registering a prefix replaces the target but keeps the
//! original position — last registration wins for the value, not the slot.
//!
//! Populated during bootstrap only; shared read-only while serving.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::controller::ExposedController;
use crate::middleware::Middleware;

/// What a prefix resolves to.
#[derive(Clone)]
pub enum RouteTarget {
    /// A handler-bearing type; actions are resolved through the metadata
    /// store.
    Controller(Arc<ExposedController>),
    /// A plain callable: catch-all for the prefix, any verb.
    Handler(Middleware),
}

/// The prefix → target table.
#[derive(Default)]
pub struct RouteRegistry {
    routes: IndexMap<String, RouteTarget>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the mapping for `prefix`. The prefix may be
    /// empty (root) or must start with `/`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed prefix.
    pub fn register(&mut self, prefix: &str, target: RouteTarget) {
        assert!(
            prefix.is_empty() || prefix.starts_with('/'),
            "route prefix must be empty or start with '/', got `{prefix}`"
        );
        self.routes.insert(prefix.to_owned(), target);
    }

    /// Entries in registration order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &RouteTarget)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::middleware::Handler;

    async fn noop(_ctx: Context) {}

    #[test]
    fn iteration_preserves_registration_order() {
        let mut registry = RouteRegistry::new();
        registry.register("/b", RouteTarget::Handler(noop.into_middleware()));
        registry.register("/a", RouteTarget::Handler(noop.into_middleware()));
        registry.register("/c", RouteTarget::Handler(noop.into_middleware()));
        let prefixes: Vec<&str> = registry.iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, ["/b", "/a", "/c"]);
    }

    #[test]
    fn reregistration_replaces_value_but_keeps_position() {
        let mut registry = RouteRegistry::new();
        let first = noop.into_middleware();
        let second = noop.into_middleware();
        registry.register("/a", RouteTarget::Handler(first));
        registry.register("/z", RouteTarget::Handler(noop.into_middleware()));
        registry.register("/a", RouteTarget::Handler(second.clone()));

        assert_eq!(registry.len(), 2);
        let (prefix, target) = registry.iter().next().unwrap();
        assert_eq!(prefix, "/a");
        match target {
            RouteTarget::Handler(h) => assert_eq!(h.identity(), second.identity()),
            RouteTarget::Controller(_) => panic!("expected handler target"),
        }
    }
}
