//! Route matcher.
//!
//! Resolves an incoming `(path, method)` against the registry, in
//! registration order — first match wins, so ambiguities resolve in the
//! order routes were registered.
//!
//! A prefix hit is only a preliminary filter. For controller targets the
//! match is confirmed by reconstructing the full route path (`prefix` +
//! declared sub-path, with the single `:name` segment substituted from the
//! incoming path) and requiring exact equality — `/user` never satisfies
//! `/users`. Plain handler targets match on the prefix alone, with
//! parameters extracted directly against the prefix pattern.
//!
//! No match is a normal negative result, not an error: the dispatcher
//! decides what an unmatched request becomes (a 404).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::controller::ExposedController;
use crate::metadata::{MetadataKind, MetadataStore, MetadataValue};
use crate::method::Method;
use crate::registry::{RouteRegistry, RouteTarget};

/// The result of a successful match. Ephemeral: built per request,
/// discarded when the response completes.
pub struct ParsedRoute {
    pub target: RouteTarget,
    /// The action to invoke, for controller targets.
    pub action: Option<String>,
    /// The concrete path that matched (equals the request path).
    pub full_path: String,
    /// Extracted `:name` parameter values.
    pub params: HashMap<String, String>,
}

/// Borrowing view over the registry and metadata store, valid for one
/// lookup. Cheap to construct per request.
pub struct Matcher<'a> {
    registry: &'a RouteRegistry,
    store: &'a MetadataStore,
}

impl<'a> Matcher<'a> {
    pub fn new(registry: &'a RouteRegistry, store: &'a MetadataStore) -> Self {
        Self { registry, store }
    }

    /// Finds the first registered route satisfying `(path, method)`.
    pub fn find_match(&self, path: &str, method: Method) -> Option<ParsedRoute> {
        for (prefix, target) in self.registry.iter() {
            match target {
                RouteTarget::Handler(_) => {
                    if !prefix_matches(prefix, path) {
                        continue;
                    }
                    debug!(prefix, path, "handler target matched");
                    return Some(ParsedRoute {
                        target: target.clone(),
                        action: None,
                        full_path: path.to_owned(),
                        params: extract_params(prefix, path),
                    });
                }
                RouteTarget::Controller(controller) => {
                    if !path.starts_with(prefix) {
                        continue;
                    }
                    if let Some(found) =
                        self.match_controller(prefix, controller, path, method)
                    {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    fn match_controller(
        &self,
        prefix: &str,
        controller: &Arc<ExposedController>,
        path: &str,
        method: Method,
    ) -> Option<ParsedRoute> {
        for action in controller.action_names() {
            let Some(verb) = self
                .store
                .get(MetadataKind::Verb, controller.id(), Some(action))
                .and_then(MetadataValue::as_verb)
            else {
                continue;
            };
            let sub = self
                .store
                .get(MetadataKind::SubPath, controller.id(), Some(action))
                .and_then(MetadataValue::as_str)
                .unwrap_or("");
            let full = join_paths(prefix, sub);

            let (candidate, params) = if has_param(&full) {
                let params = extract_params(&full, path);
                (substitute(&full, &params), params)
            } else {
                (full.clone(), HashMap::new())
            };

            if candidate == path && verb.matches(method) {
                debug!(
                    controller = controller.name(),
                    action,
                    %method,
                    path,
                    "route matched"
                );
                return Some(ParsedRoute {
                    target: RouteTarget::Controller(Arc::clone(controller)),
                    action: Some(action.to_owned()),
                    full_path: path.to_owned(),
                    params,
                });
            }
        }
        None
    }
}

/// Joins a mount prefix and a declared sub-path, collapsing the duplicate
/// slash when the prefix is (or ends with) `/`.
pub(crate) fn join_paths(prefix: &str, sub: &str) -> String {
    if sub.is_empty() {
        return prefix.to_owned();
    }
    if prefix.ends_with('/') {
        format!("{}{}", &prefix[..prefix.len() - 1], sub)
    } else {
        format!("{prefix}{sub}")
    }
}

fn has_param(pattern: &str) -> bool {
    pattern.split('/').any(|seg| seg.starts_with(':'))
}

/// Whether `path` falls under a handler-target prefix. Plain prefixes
/// compare literally; a prefix carrying `:name` segments compares
/// segment-wise, with each `:name` capturing whatever the path has in that
/// position.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if !has_param(prefix) {
        return path.starts_with(prefix);
    }
    let pattern: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() < pattern.len() {
        return false;
    }
    pattern
        .iter()
        .zip(&parts)
        .all(|(seg, part)| seg.starts_with(':') || seg == part)
}

/// Extracts `:name` values from `path` by positional segment comparison
/// against `pattern`. Segments missing in the path simply yield no entry.
pub(crate) fn extract_params(pattern: &str, path: &str) -> HashMap<String, String> {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut params = HashMap::new();
    for (index, seg) in pattern.split('/').filter(|s| !s.is_empty()).enumerate() {
        if let Some(name) = seg.strip_prefix(':') {
            if let Some(value) = parts.get(index) {
                params.insert(name.to_owned(), (*value).to_owned());
            }
        }
    }
    params
}

/// Rebuilds `pattern` with each `:name` segment replaced by its extracted
/// value. An unresolved segment is left literal, so the equality test fails.
fn substitute(pattern: &str, params: &HashMap<String, String>) -> String {
    pattern
        .split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => params.get(name).map_or(seg, String::as_str),
            None => seg,
        })
        .collect::<Vec<&str>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::method::Verb;
    use crate::middleware::Handler;

    async fn noop(_ctx: Context) {}

    struct Fixture {
        registry: RouteRegistry,
        store: MetadataStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: RouteRegistry::new(),
                store: MetadataStore::new(),
            }
        }

        /// Mounts a controller at `prefix` with `(action, verb, sub_path)`
        /// declarations, the way `App::expose` records them.
        fn controller(&mut self, name: &str, prefix: &str, actions: &[(&str, Verb, &str)]) {
            let id = self.store.alloc_target();
            self.store.init(
                MetadataKind::RoutePrefix,
                MetadataValue::Str(prefix.to_owned()),
                id,
                None,
            );
            let mut table = Vec::new();
            for &(action, verb, sub) in actions {
                self.store
                    .init(MetadataKind::Verb, MetadataValue::Verb(verb), id, Some(action));
                if !sub.is_empty() {
                    self.store.init(
                        MetadataKind::SubPath,
                        MetadataValue::Str(sub.to_owned()),
                        id,
                        Some(action),
                    );
                }
                table.push((action.to_owned(), noop.into_middleware()));
            }
            self.registry.register(
                prefix,
                RouteTarget::Controller(Arc::new(ExposedController::new(
                    id,
                    name.to_owned(),
                    table,
                ))),
            );
        }

        fn find(&self, path: &str, method: Method) -> Option<ParsedRoute> {
            Matcher::new(&self.registry, &self.store).find_match(path, method)
        }
    }

    #[test]
    fn parameterized_sub_path_round_trip() {
        let mut fx = Fixture::new();
        fx.controller("users", "/users", &[("show", Verb::Get, "/:id")]);

        let route = fx.find("/users/42", Method::Get).expect("should match");
        assert_eq!(route.action.as_deref(), Some("show"));
        assert_eq!(route.full_path, "/users/42");
        assert_eq!(route.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn prefix_hit_does_not_imply_a_match() {
        let mut fx = Fixture::new();
        fx.controller("user", "/user", &[("index", Verb::Get, "")]);

        assert!(fx.find("/user", Method::Get).is_some());
        // `/user` is a string-prefix of `/users`, but reconstruction fails
        assert!(fx.find("/users", Method::Get).is_none());
    }

    #[test]
    fn verb_must_match_too() {
        let mut fx = Fixture::new();
        fx.controller("root", "/", &[("about", Verb::Get, "/about")]);

        assert!(fx.find("/about", Method::Get).is_some());
        assert!(fx.find("/about", Method::Post).is_none());
    }

    #[test]
    fn all_verb_actions_match_every_method() {
        let mut fx = Fixture::new();
        fx.controller("ping", "/ping", &[("any", Verb::All, "")]);
        for method in Method::ALL {
            assert!(fx.find("/ping", method).is_some());
        }
    }

    #[test]
    fn first_registration_wins_on_ambiguity() {
        let mut fx = Fixture::new();
        fx.controller("first", "/dup", &[("index", Verb::Get, "")]);
        // a root controller whose reconstruction also equals /dup
        fx.controller("shadow", "/", &[("dup", Verb::Get, "/dup")]);

        let route = fx.find("/dup", Method::Get).expect("should match");
        match route.target {
            RouteTarget::Controller(c) => assert_eq!(c.name(), "first"),
            RouteTarget::Handler(_) => panic!("expected controller"),
        }
    }

    #[test]
    fn handler_targets_match_immediately_with_prefix_params() {
        let mut fx = Fixture::new();
        fx.registry.register(
            "/files/:name",
            RouteTarget::Handler(noop.into_middleware()),
        );

        let route = fx.find("/files/a.txt", Method::Delete).expect("should match");
        assert!(route.action.is_none());
        assert_eq!(route.params.get("name").map(String::as_str), Some("a.txt"));

        // extra trailing segments still fall under the prefix
        assert!(fx.find("/files/a.txt/meta", Method::Get).is_some());
        // a literal segment mismatch or a missing segment does not
        assert!(fx.find("/docs/a.txt", Method::Get).is_none());
        assert!(fx.find("/files", Method::Get).is_none());
    }

    #[test]
    fn unmatched_paths_yield_none() {
        let mut fx = Fixture::new();
        fx.controller("users", "/users", &[("show", Verb::Get, "/:id")]);
        assert!(fx.find("/nothing", Method::Get).is_none());
        assert!(fx.find("/users/1/extra", Method::Get).is_none());
    }
}
