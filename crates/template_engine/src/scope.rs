//! The lexical variable scope shared by the string-template and expression
//! layers.
//!
//! A [`Scope`] is an immutable, persistent mapping from variable name to
//! string value. `with_scope` layers new bindings over a parent without
//! mutating it, so a scope captured before a `for_each` iteration is
//! unaffected by bindings introduced inside it — this is what makes the
//! "nested scopes do not leak" invariant hold almost for free: the child
//! scope is simply a different value, and the parent keeps being what it
//! always was.

use std::collections::HashMap;
use std::sync::Arc;

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;

/// Variable names beginning with `_` are reserved for built-ins.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with('_')
}

#[derive(Debug, Clone)]
enum Frame {
    Root(Arc<HashMap<String, String>>),
    Child {
        parent: Box<Scope>,
        extras: Arc<HashMap<String, String>>,
    },
}

/// An immutable, lexically nested mapping from variable name to string
/// value.
#[derive(Debug, Clone)]
pub struct Scope(Frame);

impl Scope {
    /// Builds a root scope from an initial set of bindings.
    pub fn new(bindings: HashMap<String, String>) -> Self {
        Scope(Frame::Root(Arc::new(bindings)))
    }

    pub fn empty() -> Self {
        Scope::new(HashMap::new())
    }

    /// Returns a new scope that layers `extras` over `self`. Keys in
    /// `extras` shadow keys of the same name in `self`; `self` itself is
    /// untouched and can still be used by the caller after this call.
    pub fn with_scope(&self, extras: HashMap<String, String>) -> Scope {
        Scope(Frame::Child {
            parent: Box::new(self.clone()),
            extras: Arc::new(extras),
        })
    }

    /// Convenience for binding a single variable, as `for_each` does for
    /// its loop variable.
    pub fn with_binding(&self, name: impl Into<String>, value: impl Into<String>) -> Scope {
        let mut map = HashMap::with_capacity(1);
        map.insert(name.into(), value.into());
        self.with_scope(map)
    }

    /// Looks up a variable, searching child frames before parents.
    pub fn get(&self, name: &str) -> Option<&str> {
        match &self.0 {
            Frame::Root(map) => map.get(name).map(String::as_str),
            Frame::Child { parent, extras } => extras
                .get(name)
                .map(String::as_str)
                .or_else(|| parent.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
