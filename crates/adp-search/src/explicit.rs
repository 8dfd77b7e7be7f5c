//! # Explicit Constrained Lipschitz Search
//!
//! Searches directly for the pair of input points `r1`, `r2 = r1 + δ` that
//! maximizes `|f(r1) − f(r2)| / ‖δ‖`. Only the selected inputs are perturbed.
//!
//! Search variables are laid out as `[r1_0 .. r1_{n-1}, δ_0 .. δ_{k-1}]`
//! where `n` counts every input and `k` the perturbed ones. Each `δ_j` is
//! boxed by `±(max − min)` of its leaf; two inequalities per perturbed input
//! keep `r2` inside the leaf box, and `‖δ‖ ≥ perturbation_slack` keeps the
//! ratio away from `0/0`.
//!
//! Unlike the jacobian search this makes no smoothness assumption, at the
//! price of a search space twice as large and a finite-difference gradient.

use adp_core::{Entity, Expr, SearchConfig, SearchError, SymbolResolver};

use crate::inputs::SearchInputs;
use crate::lipschitz::{LipschitzBound, SearchMethod};
use crate::optimize::{FnObjective, InequalityConstraint, Problem, SearchBox};

/// Largest difference quotient of `expr` found by constrained search.
pub fn max_lipschitz_via_explicit_search<R: SymbolResolver + ?Sized>(
    expr: &Expr,
    resolver: &R,
    entity: Option<&Entity>,
    config: &SearchConfig,
) -> Result<LipschitzBound, SearchError> {
    let poly = expr.expand();
    let inputs = SearchInputs::from_symbols(poly.free_symbols(), resolver)?;
    let leaves = inputs.leaves();

    // A leaf with an empty box admits no perturbation.
    let perturbed: Vec<usize> = inputs
        .selected(entity)
        .into_iter()
        .filter(|&i| leaves[i].max_val() > leaves[i].min_val())
        .collect();
    if perturbed.is_empty() {
        tracing::debug!(inputs = inputs.len(), "nothing to perturb");
        return Ok(LipschitzBound::exact(0.0, SearchMethod::Constant));
    }

    let n = inputs.len();
    let compiled = poly.compile(&inputs.symbols())?;

    let pin_others = entity.is_some() && config.data_dependent;
    let r1_box = inputs.search_box(|i| pin_others && !perturbed.contains(&i))?;
    let mut lower = r1_box.lower().to_vec();
    let mut upper = r1_box.upper().to_vec();
    for &i in &perturbed {
        let span = leaves[i].max_val() - leaves[i].min_val();
        lower.push(-span);
        upper.push(span);
    }
    let bounds = SearchBox::new(lower, upper)?;

    let objective = {
        let perturbed = perturbed.clone();
        FnObjective(move |x: &[f64]| {
            let (r1, delta) = x.split_at(n);
            let mut r2 = r1.to_vec();
            for (d, &i) in delta.iter().zip(perturbed.iter()) {
                r2[i] += d;
            }
            let norm = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
            if norm == 0.0 {
                return 0.0;
            }
            -(compiled.eval(r1) - compiled.eval(&r2)).abs() / norm
        })
    };

    let mut problem = Problem::new(&objective, bounds);
    for (j, &i) in perturbed.iter().enumerate() {
        let (lo, hi) = (leaves[i].min_val(), leaves[i].max_val());
        let d = n + j;
        problem = problem
            .with_constraint(InequalityConstraint::new(
                format!("r2[{i}] >= min"),
                move |x| x[i] + x[d] - lo,
            ))
            .with_constraint(InequalityConstraint::new(
                format!("r2[{i}] <= max"),
                move |x| hi - x[i] - x[d],
            ));
    }
    let k = perturbed.len();
    let slack = config.perturbation_slack;
    problem = problem.with_constraint(InequalityConstraint::new("|delta| >= slack", move |x| {
        x[n..n + k].iter().map(|d| d * d).sum::<f64>().sqrt() - slack
    }));

    // Current point, each perturbed input pushed toward the farther face.
    let mut seed = inputs.point();
    for &i in &perturbed {
        let leaf = &leaves[i];
        let up = leaf.max_val() - leaf.value();
        let down = leaf.value() - leaf.min_val();
        seed.push(if up >= down { up } else { -down });
    }

    let found = problem.with_seed(seed).minimize(config)?;
    let value = (-found.fun).max(0.0);
    tracing::debug!(
        value,
        perturbed = k,
        starts = found.starts,
        iterations = found.iterations,
        "explicit lipschitz search"
    );
    Ok(LipschitzBound {
        value,
        method: SearchMethod::Explicit,
        argmax: found.x,
        iterations: found.iterations,
    })
}
