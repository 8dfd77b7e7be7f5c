//! # Jacobian Lipschitz Search
//!
//! For a polynomial `f`, the smallest Lipschitz constant over a box is the
//! maximum over the box of `‖∇f‖₂`. The search maximizes the squared norm
//! `Σ (∂f/∂x_i)²`, itself a polynomial, so the optimizer gets an analytic
//! gradient.
//!
//! Restricting to one entity keeps only that entity's partials. With
//! `data_dependent` set, the remaining inputs are pinned at their current
//! values; otherwise they range over their boxes too.

use adp_core::{Entity, Expr, Polynomial, SearchConfig, SearchError, Symbol, SymbolResolver};

use crate::inputs::SearchInputs;
use crate::lipschitz::{LipschitzBound, SearchMethod};
use crate::optimize::{Objective, PolynomialObjective, Problem};

/// Maximum jacobian norm of `expr`, over all inputs or only `entity`'s.
pub fn max_lipschitz_via_jacobian<R: SymbolResolver + ?Sized>(
    expr: &Expr,
    resolver: &R,
    entity: Option<&Entity>,
    config: &SearchConfig,
) -> Result<LipschitzBound, SearchError> {
    let poly = expr.expand();
    let inputs = SearchInputs::from_symbols(poly.free_symbols(), resolver)?;
    let symbols = inputs.symbols();
    let selected = inputs.selected(entity);

    let partials: Vec<Polynomial> = selected
        .iter()
        .map(|&i| poly.derivative(&symbols[i]))
        .filter(|p| !p.is_zero())
        .collect();
    if partials.is_empty() {
        tracing::debug!(inputs = inputs.len(), "no selected input affects the value");
        return Ok(LipschitzBound::exact(0.0, SearchMethod::Constant));
    }

    if config.try_hessian_shortcut {
        if let Some(norm) = constant_jacobian_norm(&partials, &symbols) {
            tracing::debug!(norm, "jacobian is constant, skipping search");
            return Ok(LipschitzBound::exact(norm, SearchMethod::HessianShortcut));
        }
    }

    let squared = partials
        .iter()
        .fold(Polynomial::zero(), |acc, p| acc.add(&p.mul(p)));
    if let Some(c) = squared.as_constant() {
        return Ok(LipschitzBound::exact(c.max(0.0).sqrt(), SearchMethod::Jacobian));
    }

    let pin_others = entity.is_some() && config.data_dependent;
    let bounds = inputs.search_box(|i| pin_others && !selected.contains(&i))?;
    let objective = PolynomialObjective::maximize(squared.compile(&symbols)?);
    let current = inputs.point();
    let at_current = -objective.value(&current);
    let found = Problem::new(&objective, bounds)
        .with_seed(current)
        .minimize(config)?;

    let value = (-found.fun).max(at_current).max(0.0).sqrt();
    tracing::debug!(
        value,
        selected = selected.len(),
        pinned = pin_others,
        iterations = found.iterations,
        "jacobian lipschitz search"
    );
    Ok(LipschitzBound {
        value,
        method: SearchMethod::Jacobian,
        argmax: found.x,
        iterations: found.iterations,
    })
}

/// If every second partial of the selected jacobian vanishes identically,
/// the jacobian is constant; return its norm.
fn constant_jacobian_norm(partials: &[Polynomial], symbols: &[Symbol]) -> Option<f64> {
    let hessian_is_zero = partials
        .iter()
        .all(|p| symbols.iter().all(|s| p.derivative(s).is_zero()));
    if !hessian_is_zero {
        return None;
    }
    let squared: f64 = partials
        .iter()
        .map(|p| p.as_constant().unwrap_or(0.0).powi(2))
        .sum();
    Some(squared.sqrt())
}
