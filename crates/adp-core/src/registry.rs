//! # Symbol Table
//!
//! Maps a [`Symbol`] back to the [`Leaf`] that defines it. Expressions store
//! bare symbols; search and evaluation code recover bounds and entities
//! through this table.
//!
//! ## Ownership
//!
//! The table owns only `Weak` back-references. A leaf is owned by the scalar
//! that created it and by every derived value depending on it, so an entry
//! stays resolvable exactly as long as some value can still reach it.
//! Entries whose leaf was dropped are dead: they resolve to `None`, may be
//! overwritten by a new registration, and are removed by [`SymbolTable::prune`].
//! Nothing prunes automatically; a long-lived process should call `prune`
//! periodically or the table grows with every leaf ever created.
//!
//! ## Concurrency
//!
//! Writes happen only at leaf construction; reads happen on every
//! evaluation. The `parking_lot::RwLock` serializes inserts and cannot be
//! poisoned by a panicking writer.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::error::RegistryError;
use crate::expr::Symbol;
use crate::leaf::Leaf;

/// Anything that can turn a symbol into its leaf record.
pub trait SymbolResolver {
    fn resolve(&self, symbol: &Symbol) -> Option<Arc<Leaf>>;
}

/// Registry of live leaves keyed by symbol.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: RwLock<HashMap<Symbol, Weak<Leaf>>>,
}

static GLOBAL: OnceLock<SymbolTable> = OnceLock::new();

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table used by scalar construction.
    pub fn global() -> &'static SymbolTable {
        GLOBAL.get_or_init(SymbolTable::new)
    }

    /// Register a leaf under its ssid.
    ///
    /// Fails if a *live* leaf already holds the symbol; a dead entry is
    /// replaced.
    pub fn register(&self, leaf: &Arc<Leaf>) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let symbol = leaf.ssid().clone();
        if let Some(existing) = entries.get(&symbol) {
            if existing.strong_count() > 0 {
                return Err(RegistryError::DuplicateSymbol(symbol.to_string()));
            }
        }
        tracing::trace!(symbol = %symbol, origin = leaf.origin().as_str(), "registered leaf");
        entries.insert(symbol, Arc::downgrade(leaf));
        Ok(())
    }

    /// Whether `symbol` currently resolves to a live leaf.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.entries
            .read()
            .get(symbol)
            .map(|w| w.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Number of entries, live or dead.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove entries whose leaf has been dropped. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, w| w.strong_count() > 0);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "pruned dead symbol entries");
        }
        removed
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve(&self, symbol: &Symbol) -> Option<Arc<Leaf>> {
        self.entries.read().get(symbol).and_then(Weak::upgrade)
    }
}

impl<R: SymbolResolver + ?Sized> SymbolResolver for &R {
    fn resolve(&self, symbol: &Symbol) -> Option<Arc<Leaf>> {
        (**self).resolve(symbol)
    }
}

impl SymbolResolver for HashMap<Symbol, Arc<Leaf>> {
    fn resolve(&self, symbol: &Symbol) -> Option<Arc<Leaf>> {
        self.get(symbol).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Entity, ScalarId};
    use crate::leaf::Origin;

    fn leaf(origin: Origin) -> Arc<Leaf> {
        Arc::new(Leaf::new(ScalarId::new(), origin, Entity::new(), None, 0.0, 1.0, 2.0).unwrap())
    }

    #[test]
    fn register_and_resolve() {
        let table = SymbolTable::new();
        let l = leaf(Origin::Phi);
        table.register(&l).unwrap();
        let found = table.resolve(l.ssid()).unwrap();
        assert_eq!(found.id(), l.id());
        assert!(table.contains(l.ssid()));
    }

    #[test]
    fn duplicate_live_symbol_rejected() {
        let table = SymbolTable::new();
        let l = leaf(Origin::Gamma);
        table.register(&l).unwrap();
        let err = table.register(&l).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSymbol(_)));
    }

    #[test]
    fn dropped_leaf_is_dead_and_prunable() {
        let table = SymbolTable::new();
        let l = leaf(Origin::Phi);
        let symbol = l.ssid().clone();
        table.register(&l).unwrap();
        drop(l);
        assert!(table.resolve(&symbol).is_none());
        assert!(!table.contains(&symbol));
        assert_eq!(table.len(), 1);
        assert_eq!(table.prune(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn dead_entry_can_be_replaced() {
        let table = SymbolTable::new();
        let id = ScalarId::new();
        let first = Arc::new(Leaf::new(id, Origin::Phi, Entity::new(), None, 0.0, 1.0, 2.0).unwrap());
        table.register(&first).unwrap();
        drop(first);
        let second = Arc::new(Leaf::new(id, Origin::Phi, Entity::new(), None, 5.0, 6.0, 7.0).unwrap());
        table.register(&second).unwrap();
        assert_eq!(table.resolve(second.ssid()).unwrap().value(), 6.0);
    }

    #[test]
    fn concurrent_registration_keeps_every_leaf() {
        let table = Arc::new(SymbolTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    let leaves: Vec<_> = (0..32).map(|_| leaf(Origin::Phi)).collect();
                    for l in &leaves {
                        table.register(l).unwrap();
                    }
                    assert!(leaves.iter().all(|l| table.contains(l.ssid())));
                    leaves
                })
            })
            .collect();
        let leaves: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(table.len(), 8 * 32);
        assert!(leaves.iter().all(|l| table.resolve(l.ssid()).is_some()));
    }

    #[test]
    fn table_survives_panic_while_locked() {
        let table = Arc::new(SymbolTable::new());
        let l = leaf(Origin::Gamma);
        table.register(&l).unwrap();
        let shared = Arc::clone(&table);
        let result = std::thread::spawn(move || {
            let _guard = shared.entries.write();
            panic!("writer aborted");
        })
        .join();
        assert!(result.is_err());
        assert!(table.contains(l.ssid()));
        let other = leaf(Origin::Phi);
        table.register(&other).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn global_is_shared() {
        let a = SymbolTable::global() as *const SymbolTable;
        let b = SymbolTable::global() as *const SymbolTable;
        assert_eq!(a, b);
    }
}
