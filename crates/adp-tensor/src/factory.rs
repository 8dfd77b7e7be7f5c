//! Symbol factories.
//!
//! A factory is the naming convention under which a tensor's symbols were
//! minted. Tensors combine only when they share one; two factories are the
//! same exactly when their ids are equal, and clones share the id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adp_core::Symbol;
use ndarray::{ArrayD, IxDyn};
use uuid::Uuid;

#[derive(Debug)]
struct Inner {
    id: Uuid,
    prefix: String,
    next: AtomicU64,
}

/// Mints unique symbols under one convention.
#[derive(Debug, Clone)]
pub struct SymbolFactory {
    inner: Arc<Inner>,
}

impl SymbolFactory {
    /// A new factory whose symbols start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                prefix: prefix.into(),
                next: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// A symbol no other call on this factory (or its clones) returns.
    pub fn mint(&self) -> Symbol {
        let n = self.inner.next.fetch_add(1, Ordering::Relaxed);
        Symbol::new(format!("{}_{}_{n}", self.inner.prefix, self.inner.id.simple()))
    }

    /// One fresh symbol per element of `shape`, in row-major order.
    pub fn mint_array(&self, shape: &[usize]) -> ArrayD<Symbol> {
        ArrayD::from_shape_simple_fn(IxDyn(shape), || self.mint())
    }
}

impl Default for SymbolFactory {
    fn default() -> Self {
        Self::new("t")
    }
}

impl PartialEq for SymbolFactory {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for SymbolFactory {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_counter() {
        let f = SymbolFactory::new("x");
        let g = f.clone();
        assert_eq!(f, g);
        assert_ne!(f.mint(), g.mint());
        assert_ne!(f, SymbolFactory::new("x"));
    }

    #[test]
    fn mint_array_is_unique() {
        let f = SymbolFactory::default();
        let arr = f.mint_array(&[2, 3]);
        assert_eq!(arr.shape(), &[2, 3]);
        let distinct: std::collections::BTreeSet<_> = arr.iter().cloned().collect();
        assert_eq!(distinct.len(), 6);
        assert!(arr.iter().all(|s| s.as_str().starts_with("t_")));
    }
}
