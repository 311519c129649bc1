//! Metadata side table.
//!
//! The declaration surface (controllers, verbs, attached middleware) records
//! out-of-band facts here instead of carrying them on the handler values
//! themselves. Keys are composite: target identity, optional member name,
//! and the metadata kind. Targets are compared by identity — two controllers
//! declaring the same action name stay distinct because they hold different
//! [`TargetId`]s.
//!
//! Every write happens during bootstrap, before the server accepts a single
//! connection. Every read after that point is immutable, so the store is
//! shared across concurrent requests without locking.

use std::collections::HashMap;

use crate::method::Verb;
use crate::middleware::Middleware;

/// Identity of a declared target (a controller).
///
/// Allocated by [`MetadataStore::alloc_target`]; never reused within a store.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TargetId(u64);

/// What a metadata entry describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetadataKind {
    /// The path prefix a controller is mounted under. Target-level.
    RoutePrefix,
    /// The HTTP verb an action answers to. Member-level.
    Verb,
    /// The sub-path appended to the prefix for an action. Member-level.
    SubPath,
    /// Middleware attached to a single action. Member-level.
    Middlewares,
    /// Middleware attached to the whole controller. Target-level.
    ClassMiddlewares,
}

/// A stored metadata payload.
#[derive(Clone)]
pub enum MetadataValue {
    Str(String),
    Verb(Verb),
    Middlewares(Vec<Middleware>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_verb(&self) -> Option<Verb> {
        match self {
            Self::Verb(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_middlewares(&self) -> Option<&[Middleware]> {
        match self {
            Self::Middlewares(m) => Some(m),
            _ => None,
        }
    }
}

type Key = (TargetId, Option<String>, MetadataKind);

/// Process-lifetime associative store for declaration metadata.
#[derive(Default)]
pub struct MetadataStore {
    entries: HashMap<Key, MetadataValue>,
    next_target: u64,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh target identity.
    pub fn alloc_target(&mut self) -> TargetId {
        let id = TargetId(self.next_target);
        self.next_target += 1;
        id
    }

    /// Stores `value` under `(target, member, kind)`, overwriting any prior
    /// value for that exact composite key.
    pub fn init(
        &mut self,
        kind: MetadataKind,
        value: MetadataValue,
        target: TargetId,
        member: Option<&str>,
    ) {
        self.entries
            .insert((target, member.map(str::to_owned), kind), value);
    }

    /// Returns the stored value, or `None` when absent. Missing metadata is
    /// a normal negative result, never an error.
    pub fn get(
        &self,
        kind: MetadataKind,
        target: TargetId,
        member: Option<&str>,
    ) -> Option<&MetadataValue> {
        self.entries
            .get(&(target, member.map(str::to_owned), kind))
    }

    pub fn has(&self, kind: MetadataKind, target: TargetId, member: Option<&str>) -> bool {
        self.get(kind, target, member).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_for_same_composite_key() {
        let mut store = MetadataStore::new();
        let target = store.alloc_target();
        store.init(
            MetadataKind::SubPath,
            MetadataValue::Str("/a".into()),
            target,
            Some("show"),
        );
        store.init(
            MetadataKind::SubPath,
            MetadataValue::Str("/b".into()),
            target,
            Some("show"),
        );
        let got = store.get(MetadataKind::SubPath, target, Some("show"));
        assert_eq!(got.and_then(MetadataValue::as_str), Some("/b"));
    }

    #[test]
    fn targets_with_identical_members_stay_distinct() {
        let mut store = MetadataStore::new();
        let a = store.alloc_target();
        let b = store.alloc_target();
        store.init(
            MetadataKind::Verb,
            MetadataValue::Verb(Verb::Get),
            a,
            Some("show"),
        );
        store.init(
            MetadataKind::Verb,
            MetadataValue::Verb(Verb::Post),
            b,
            Some("show"),
        );
        let verb_a = store.get(MetadataKind::Verb, a, Some("show"));
        let verb_b = store.get(MetadataKind::Verb, b, Some("show"));
        assert_eq!(verb_a.and_then(MetadataValue::as_verb), Some(Verb::Get));
        assert_eq!(verb_b.and_then(MetadataValue::as_verb), Some(Verb::Post));
    }

    #[test]
    fn member_and_target_level_entries_do_not_collide() {
        let mut store = MetadataStore::new();
        let target = store.alloc_target();
        store.init(
            MetadataKind::RoutePrefix,
            MetadataValue::Str("/users".into()),
            target,
            None,
        );
        assert!(store.has(MetadataKind::RoutePrefix, target, None));
        assert!(!store.has(MetadataKind::RoutePrefix, target, Some("show")));
        assert!(store.get(MetadataKind::Verb, target, None).is_none());
    }
}
