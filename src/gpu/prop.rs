//! Shader Property Handles
//!
//! Render targets, compute parameters, kernels and full-screen effects are
//! all addressed by name. [`PropId`] interns those names process-wide so the
//! per-frame command stream carries compact, copyable ids instead of owned
//! strings. The pool is append-only: a handle never expires, only the
//! frame-scoped contents behind it do.

use std::sync::LazyLock;

use lasso::{Spur, ThreadedRodeo};

/// Global name pool shared by every pipeline instance in the process.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::new);

/// A stable handle derived from a property name.
///
/// Two handles compare equal exactly when their source strings are equal,
/// so equality and hashing are integer operations on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropId(Spur);

impl PropId {
    /// Interns `name` and returns its handle.
    ///
    /// Idempotent: interning the same string twice yields the same handle.
    #[inline]
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(INTERNER.get_or_intern(name))
    }

    /// Returns the handle for `name` if it was interned before.
    ///
    /// Never allocates; useful for probing without growing the pool.
    #[inline]
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        INTERNER.get(name).map(Self)
    }

    /// Resolves the handle back to its source name.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        INTERNER.resolve(&self.0)
    }
}

impl std::fmt::Display for PropId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_is_idempotent() {
        let a = PropId::named("_GBuffer0");
        let b = PropId::named("_GBuffer0");
        let c = PropId::named("_GBuffer1");

        assert_eq!(a, b);
        assert_ne!(a, c);

        assert_eq!(a.name(), "_GBuffer0");
        assert_eq!(c.name(), "_GBuffer1");
    }

    #[test]
    fn test_lookup_does_not_intern() {
        let _ = PropId::named("_ExistingProp");

        assert!(PropId::lookup("_ExistingProp").is_some());
        assert!(PropId::lookup("_NeverInterned").is_none());
    }

    #[test]
    fn test_display_matches_source() {
        let id = PropId::named("_FogColor");
        assert_eq!(id.to_string(), "_FogColor");
    }
}
