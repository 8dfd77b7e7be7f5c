//! Resolution of an expression's free symbols into the leaves whose boxes
//! define the search space.

use std::sync::Arc;

use adp_core::{Entity, Expr, Leaf, Polynomial, SearchError, Symbol, SymbolResolver};

use crate::optimize::SearchBox;

/// The ordered leaves an expression depends on. Position `i` of every point
/// vector built from these inputs is the value of `leaves[i]`.
#[derive(Debug, Clone)]
pub struct SearchInputs {
    leaves: Vec<Arc<Leaf>>,
}

impl SearchInputs {
    /// Resolve every free symbol of `expr`. Fails on the first symbol with
    /// no live leaf.
    pub fn resolve<R: SymbolResolver + ?Sized>(expr: &Expr, resolver: &R) -> Result<Self, SearchError> {
        Self::from_symbols(expr.free_symbols(), resolver)
    }

    /// Resolve an explicit symbol list, keeping its order.
    pub fn from_symbols<R, I>(symbols: I, resolver: &R) -> Result<Self, SearchError>
    where
        R: SymbolResolver + ?Sized,
        I: IntoIterator<Item = Symbol>,
    {
        let leaves = symbols
            .into_iter()
            .map(|s| {
                resolver
                    .resolve(&s)
                    .ok_or_else(|| SearchError::UnknownSymbol(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { leaves })
    }

    pub fn leaves(&self) -> &[Arc<Leaf>] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.leaves.iter().map(|l| l.ssid().clone()).collect()
    }

    /// Current leaf values, in input order.
    pub fn point(&self) -> Vec<f64> {
        self.leaves.iter().map(|l| l.value()).collect()
    }

    /// Indices of the inputs belonging to `entity` (all inputs when `None`).
    pub fn selected(&self, entity: Option<&Entity>) -> Vec<usize> {
        self.leaves
            .iter()
            .enumerate()
            .filter(|(_, l)| entity.map_or(true, |e| l.entity() == e))
            .map(|(i, _)| i)
            .collect()
    }

    /// The leaf box, with inputs for which `pinned(i)` holds collapsed onto
    /// their current value.
    pub fn search_box(&self, pinned: impl Fn(usize) -> bool) -> Result<SearchBox, SearchError> {
        let (lower, upper) = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, l)| {
                if pinned(i) {
                    (l.value(), l.value())
                } else {
                    (l.min_val(), l.max_val())
                }
            })
            .unzip();
        SearchBox::new(lower, upper)
    }

    /// Evaluate a polynomial over these inputs at their current values.
    pub fn evaluate(&self, poly: &Polynomial) -> Result<f64, SearchError> {
        poly.evaluate(&|s: &Symbol| {
            self.leaves
                .iter()
                .find(|l| l.ssid() == s)
                .map(|l| l.value())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adp_core::{Origin, ScalarId};
    use std::collections::HashMap;

    fn leaf(entity: &Entity, min: f64, value: f64, max: f64) -> Arc<Leaf> {
        Arc::new(Leaf::new(ScalarId::new(), Origin::Phi, entity.clone(), None, min, value, max).unwrap())
    }

    #[test]
    fn resolves_and_pins() {
        let alice = Entity::named("alice");
        let bob = Entity::named("bob");
        let a = leaf(&alice, 0.0, 1.0, 2.0);
        let b = leaf(&bob, -1.0, 0.5, 1.0);
        let table: HashMap<Symbol, Arc<Leaf>> = [a.clone(), b.clone()]
            .into_iter()
            .map(|l| (l.ssid().clone(), l))
            .collect();
        let expr = a.expr() * b.expr();
        let inputs = SearchInputs::resolve(&expr, &table).unwrap();
        assert_eq!(inputs.len(), 2);

        let sel = inputs.selected(Some(&alice));
        assert_eq!(sel.len(), 1);
        assert_eq!(inputs.leaves()[sel[0]].entity(), &alice);

        let bx = inputs.search_box(|i| !sel.contains(&i)).unwrap();
        let b_index = 1 - sel[0];
        assert_eq!(bx.lower()[b_index], 0.5);
        assert_eq!(bx.upper()[b_index], 0.5);
        assert_eq!(bx.lower()[sel[0]], 0.0);
        assert_eq!(bx.upper()[sel[0]], 2.0);
    }

    #[test]
    fn unknown_symbol_is_reported() {
        let table: HashMap<Symbol, Arc<Leaf>> = HashMap::new();
        let expr = Expr::symbol(Symbol::new("nobody"));
        let err = SearchInputs::resolve(&expr, &table).unwrap_err();
        assert_eq!(err, SearchError::UnknownSymbol("nobody".into()));
    }
}
