//! # Polynomial Extremum Search
//!
//! Derived scalars do not propagate interval arithmetic. Their bounds are
//! the minimum and maximum of their polynomial over the box of the leaves
//! they depend on, which is tighter whenever a leaf appears more than once
//! (`x - x` has range `[0, 0]`, not `[min - max, max - min]`).
//!
//! The current point is always inside the box, so the reported bound is
//! widened to include the current value. This keeps `min ≤ value ≤ max`
//! exact even when the optimizer stops a hair short of the true extremum.

use adp_core::{Expr, SearchConfig, SearchError, Symbol, SymbolResolver};

use crate::inputs::SearchInputs;
use crate::optimize::{PolynomialObjective, Problem};

/// Which side of the range to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Minimum of `expr` over its input box.
pub fn min_val<R: SymbolResolver + ?Sized>(
    expr: &Expr,
    resolver: &R,
    config: &SearchConfig,
) -> Result<f64, SearchError> {
    extremum(expr, resolver, Extremum::Min, config)
}

/// Maximum of `expr` over its input box.
pub fn max_val<R: SymbolResolver + ?Sized>(
    expr: &Expr,
    resolver: &R,
    config: &SearchConfig,
) -> Result<f64, SearchError> {
    extremum(expr, resolver, Extremum::Max, config)
}

/// Current value of `expr`, substituting every leaf's value.
pub fn value<R: SymbolResolver + ?Sized>(expr: &Expr, resolver: &R) -> Result<f64, SearchError> {
    expr.evaluate(&|s: &Symbol| resolver.resolve(s).map(|l| l.value()))
}

/// Search for one end of the range of `expr`.
pub fn extremum<R: SymbolResolver + ?Sized>(
    expr: &Expr,
    resolver: &R,
    which: Extremum,
    config: &SearchConfig,
) -> Result<f64, SearchError> {
    let poly = expr.expand();
    if let Some(c) = poly.as_constant() {
        return Ok(c);
    }

    let inputs = SearchInputs::from_symbols(poly.free_symbols(), resolver)?;
    let current = inputs.evaluate(&poly)?;
    let compiled = poly.compile(&inputs.symbols())?;
    let objective = match which {
        Extremum::Min => PolynomialObjective::minimize(compiled),
        Extremum::Max => PolynomialObjective::maximize(compiled),
    };
    let bounds = inputs.search_box(|_| false)?;
    let found = Problem::new(&objective, bounds)
        .with_seed(inputs.point())
        .minimize(config)?;

    let bound = match which {
        Extremum::Min => found.fun.min(current),
        Extremum::Max => (-found.fun).max(current),
    };
    tracing::trace!(?which, bound, current, "polynomial extremum");
    Ok(bound)
}
