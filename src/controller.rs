//! Declaration surface for handler-bearing types.
//!
//! A [`Controller`] is the builder form: a route prefix, class-scoped
//! middleware, and a list of actions each carrying a verb, a sub-path, and
//! optional method-scoped middleware. Declarations are captured here and
//! written into the [`MetadataStore`](crate::MetadataStore) when the
//! controller is passed to [`App::expose`](crate::App::expose) — the store,
//! not the controller, is what the matcher reads at request time.
//!
//! Misdeclarations (a prefix without a leading `/`, two `:name` segments in
//! one sub-path, a duplicate action name) panic immediately. Only a single
//! `:name` segment per sub-path is supported by the matching contract.

use crate::method::Verb;
use crate::middleware::{Handler, Middleware};

/// A handler-bearing type under construction.
pub struct Controller {
    pub(crate) name: String,
    pub(crate) prefix: String,
    pub(crate) class_middleware: Vec<Middleware>,
    pub(crate) actions: Vec<ActionDef>,
}

pub(crate) struct ActionDef {
    pub(crate) name: String,
    pub(crate) verb: Verb,
    pub(crate) sub_path: String,
    pub(crate) middleware: Vec<Middleware>,
    pub(crate) handler: Middleware,
}

impl Controller {
    /// Starts a controller mounted at `prefix`. The prefix may be empty
    /// (root) or must start with `/`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed prefix.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        let name = name.into();
        let prefix = prefix.into();
        assert!(
            prefix.is_empty() || prefix.starts_with('/'),
            "controller `{name}`: prefix must be empty or start with '/', got `{prefix}`"
        );
        Self {
            name,
            prefix,
            class_middleware: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Attaches class-scoped middleware, run before every action's own.
    pub fn mids(mut self, middleware: impl IntoIterator<Item = Middleware>) -> Self {
        self.class_middleware.extend(middleware);
        self
    }

    /// Attaches method-scoped middleware to a previously declared action.
    ///
    /// # Panics
    ///
    /// Panics when `action` has not been declared yet.
    pub fn mid(mut self, action: &str, middleware: Middleware) -> Self {
        let Some(def) = self.actions.iter_mut().find(|a| a.name == action) else {
            panic!("unknown action `{action}` on controller `{}`", self.name);
        };
        def.middleware.push(middleware);
        self
    }

    pub fn get(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Get, action, sub_path, handler.into_middleware())
    }

    pub fn post(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Post, action, sub_path, handler.into_middleware())
    }

    pub fn put(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Put, action, sub_path, handler.into_middleware())
    }

    pub fn delete(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Delete, action, sub_path, handler.into_middleware())
    }

    pub fn patch(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Patch, action, sub_path, handler.into_middleware())
    }

    pub fn head(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Head, action, sub_path, handler.into_middleware())
    }

    pub fn options(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::Options, action, sub_path, handler.into_middleware())
    }

    /// Declares an action answering every verb.
    pub fn any(self, action: &str, sub_path: &str, handler: impl Handler) -> Self {
        self.handle(Verb::All, action, sub_path, handler.into_middleware())
    }

    /// Declares an action with an explicit [`Middleware`] entry — the raw
    /// form behind the verb shorthands. Use it to mount a continuation- or
    /// callback-style handler as a terminal.
    ///
    /// # Panics
    ///
    /// Panics on a malformed sub-path, more than one `:name` segment, or a
    /// duplicate action name.
    pub fn handle(
        mut self,
        verb: Verb,
        action: &str,
        sub_path: &str,
        handler: Middleware,
    ) -> Self {
        assert!(
            sub_path.is_empty() || sub_path.starts_with('/'),
            "controller `{}`: sub-path must be empty or start with '/', got `{sub_path}`",
            self.name
        );
        let param_segments = sub_path.split('/').filter(|s| s.starts_with(':')).count();
        assert!(
            param_segments <= 1,
            "controller `{}`: at most one `:name` segment per sub-path, got `{sub_path}`",
            self.name
        );
        assert!(
            self.actions.iter().all(|a| a.name != action),
            "controller `{}`: duplicate action `{action}`",
            self.name
        );
        self.actions.push(ActionDef {
            name: action.to_owned(),
            verb,
            sub_path: sub_path.to_owned(),
            middleware: Vec::new(),
            handler,
        });
        self
    }
}

/// A controller after [`App::expose`](crate::App::expose): its identity and
/// the ordered action table. Verbs, sub-paths, and attached middleware live
/// in the metadata store, keyed by the [`TargetId`](crate::TargetId).
pub struct ExposedController {
    id: crate::metadata::TargetId,
    name: String,
    actions: Vec<(String, Middleware)>,
}

impl ExposedController {
    pub(crate) fn new(
        id: crate::metadata::TargetId,
        name: String,
        actions: Vec<(String, Middleware)>,
    ) -> Self {
        Self { id, name, actions }
    }

    pub fn id(&self) -> crate::metadata::TargetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action names in declaration order — the order matching enumerates.
    pub(crate) fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn handler(&self, action: &str) -> Option<&Middleware> {
        self.actions
            .iter()
            .find(|(name, _)| name == action)
            .map(|(_, handler)| handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    async fn noop(_ctx: Context) {}

    #[test]
    #[should_panic(expected = "at most one `:name` segment")]
    fn multi_param_sub_paths_are_rejected() {
        let _ = Controller::new("bad", "/a").get("x", "/:one/:two", noop);
    }

    #[test]
    #[should_panic(expected = "duplicate action")]
    fn duplicate_action_names_are_rejected() {
        let _ = Controller::new("bad", "/a")
            .get("x", "", noop)
            .post("x", "", noop);
    }

    #[test]
    #[should_panic(expected = "prefix must be empty or start with '/'")]
    fn malformed_prefix_is_rejected() {
        let _ = Controller::new("bad", "users");
    }
}
