//! # Multi-Start Box-Constrained Minimization
//!
//! Global search without convexity assumptions: seed points are drawn from
//! the box corners, a brute-force grid, and uniform random samples; the best
//! seeds are refined by projected gradient descent with Armijo backtracking.
//!
//! Past `max_corner_dims` the corners cannot all be enumerated. Random
//! corners stand in for them, and the best seeds first get a cyclic
//! per-axis search over each axis's grid levels. That sweep lands on the
//! exact optimum of separable objectives whose per-axis optimum sits on a
//! level, which is the common case for polynomials over a box.
//! Inequality constraints `g(x) ≥ 0` enter the refinement as a quadratic
//! penalty and are checked exactly on the final candidates.
//!
//! The result is a best-effort global optimum. It is never silently wrong in
//! the failure direction: if no refined candidate is feasible, or the best one
//! stopped at the iteration cap, the call returns a [`SearchError`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use adp_core::{CompiledPolynomial, SearchConfig, SearchError};

/// Rounds of penalty tightening for a candidate that ends slightly infeasible.
const PENALTY_ROUNDS: usize = 4;

/// Hard cap on corner enumeration regardless of configuration.
const MAX_CORNER_DIMS: usize = 20;

// ---------------------------------------------------------------------------
// SearchBox
// ---------------------------------------------------------------------------

/// Per-variable `[lower, upper]` bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBox {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SearchBox {
    /// Build a box, rejecting inverted or non-finite intervals.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, SearchError> {
        debug_assert_eq!(lower.len(), upper.len());
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(SearchError::InvalidBox {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Largest interval width, floored at 1 so degenerate boxes still get a
    /// usable step scale.
    pub fn scale(&self) -> f64 {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| hi - lo)
            .fold(1.0, f64::max)
    }

    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut [f64]) {
        for ((xi, lo), hi) in x.iter_mut().zip(self.lower.iter()).zip(self.upper.iter()) {
            *xi = xi.clamp(*lo, *hi);
        }
    }

    pub fn midpoint(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| lo + 0.5 * (hi - lo))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Objective
// ---------------------------------------------------------------------------

/// A scalar function to minimize over a [`SearchBox`].
pub trait Objective {
    fn value(&self, x: &[f64]) -> f64;

    /// Gradient of [`value`](Self::value). Defaults to central differences
    /// clipped to the box.
    fn gradient(&self, x: &[f64], bounds: &SearchBox, out: &mut [f64]) {
        finite_difference(self, x, bounds, out);
    }
}

/// Central-difference gradient, one-sided at the box faces.
pub fn finite_difference<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64],
    bounds: &SearchBox,
    out: &mut [f64],
) {
    let mut probe = x.to_vec();
    for i in 0..x.len() {
        let h = 1e-6 * x[i].abs().max(1.0);
        let lo = (x[i] - h).max(bounds.lower[i]);
        let hi = (x[i] + h).min(bounds.upper[i]);
        if hi <= lo {
            out[i] = 0.0;
            continue;
        }
        probe[i] = hi;
        let f_hi = objective.value(&probe);
        probe[i] = lo;
        let f_lo = objective.value(&probe);
        probe[i] = x[i];
        out[i] = (f_hi - f_lo) / (hi - lo);
    }
}

/// An objective backed by a closure.
pub struct FnObjective<F>(pub F);

impl<F: Fn(&[f64]) -> f64> Objective for FnObjective<F> {
    fn value(&self, x: &[f64]) -> f64 {
        (self.0)(x)
    }
}

/// `sign · p(x)` for a compiled polynomial, with its analytic gradient.
/// Use `sign = -1` to maximize `p`.
#[derive(Debug, Clone)]
pub struct PolynomialObjective {
    poly: CompiledPolynomial,
    sign: f64,
}

impl PolynomialObjective {
    pub fn minimize(poly: CompiledPolynomial) -> Self {
        Self { poly, sign: 1.0 }
    }

    pub fn maximize(poly: CompiledPolynomial) -> Self {
        Self { poly, sign: -1.0 }
    }
}

impl Objective for PolynomialObjective {
    fn value(&self, x: &[f64]) -> f64 {
        self.sign * self.poly.eval(x)
    }

    fn gradient(&self, x: &[f64], _bounds: &SearchBox, out: &mut [f64]) {
        self.poly.gradient(x, out);
        out.iter_mut().for_each(|g| *g *= self.sign);
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// An inequality constraint, satisfied when `g(x) ≥ 0`.
///
/// The closure owns whatever indices and bounds it needs.
pub struct InequalityConstraint {
    label: String,
    fun: Box<dyn Fn(&[f64]) -> f64 + Send + Sync>,
}

impl InequalityConstraint {
    pub fn new(label: impl Into<String>, fun: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            fun: Box::new(fun),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn eval(&self, x: &[f64]) -> f64 {
        (self.fun)(x)
    }
}

impl std::fmt::Debug for InequalityConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InequalityConstraint")
            .field("label", &self.label)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Problem
// ---------------------------------------------------------------------------

/// The outcome of a successful minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Argmin.
    pub x: Vec<f64>,
    /// Objective value at `x` (without penalty).
    pub fun: f64,
    /// Local iterations spent on the winning candidate.
    pub iterations: usize,
    /// Number of seeds that were refined.
    pub starts: usize,
}

/// A box-constrained minimization problem with optional inequality
/// constraints and caller-supplied seed points.
pub struct Problem<'a> {
    objective: &'a dyn Objective,
    bounds: SearchBox,
    constraints: Vec<InequalityConstraint>,
    seeds: Vec<Vec<f64>>,
}

impl<'a> Problem<'a> {
    pub fn new(objective: &'a dyn Objective, bounds: SearchBox) -> Self {
        Self {
            objective,
            bounds,
            constraints: Vec::new(),
            seeds: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: InequalityConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a start point (projected into the box before use).
    pub fn with_seed(mut self, seed: Vec<f64>) -> Self {
        if seed.len() == self.bounds.dim() {
            self.seeds.push(seed);
        }
        self
    }

    pub fn bounds(&self) -> &SearchBox {
        &self.bounds
    }

    /// Whether every constraint holds at `x` within `tolerance`.
    pub fn is_feasible(&self, x: &[f64], tolerance: f64) -> bool {
        self.constraints.iter().all(|c| c.eval(x) >= -tolerance)
    }

    /// Run the multi-start search.
    pub fn minimize(&self, config: &SearchConfig) -> Result<Minimum, SearchError> {
        let n = self.bounds.dim();
        if n == 0 {
            let fun = self.objective.value(&[]);
            if !fun.is_finite() {
                return Err(SearchError::NonFinite);
            }
            if !self.is_feasible(&[], config.feasibility_tolerance) {
                return Err(SearchError::Infeasible { starts: 0 });
            }
            return Ok(Minimum {
                x: Vec::new(),
                fun,
                iterations: 0,
                starts: 0,
            });
        }

        let penalized = Penalized {
            problem: self,
            weight: config.penalty_weight,
        };

        let mut ranked: Vec<(f64, Vec<f64>)> = self
            .seed_points(config)
            .into_iter()
            .map(|mut x| {
                self.bounds.project(&mut x);
                let f = penalized.value(&x);
                (if f.is_finite() { f } else { f64::INFINITY }, x)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        if !self.enumerates_corners(config) && config.coordinate_sweeps > 0 {
            let swept: Vec<(f64, Vec<f64>)> = ranked
                .iter()
                .take(config.refine_top_k.max(1))
                .map(|(_, x)| coordinate_sweep(&penalized, &self.bounds, x.clone(), config))
                .collect();
            tracing::debug!(dim = n, swept = swept.len(), "coordinate sweep seeding");
            ranked.extend(swept);
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        }

        let take = if config.force_all_searches {
            ranked.len()
        } else {
            config.refine_top_k.min(ranked.len())
        };
        tracing::debug!(
            dim = n,
            seeds = ranked.len(),
            refined = take,
            constraints = self.constraints.len(),
            "multi-start search"
        );

        let mut best: Option<Local> = None;
        for (_, seed) in ranked.into_iter().take(take) {
            let mut local = refine(&penalized, &self.bounds, seed, config);
            let mut weight = config.penalty_weight;
            for _ in 0..PENALTY_ROUNDS {
                if self.is_feasible(&local.x, config.feasibility_tolerance) {
                    break;
                }
                weight *= 100.0;
                let stiffer = Penalized {
                    problem: self,
                    weight,
                };
                local = refine(&stiffer, &self.bounds, local.x, config);
            }
            let fun = self.objective.value(&local.x);
            if !fun.is_finite() || !self.is_feasible(&local.x, config.feasibility_tolerance) {
                continue;
            }
            let local = Local { fun, ..local };
            if best.as_ref().map_or(true, |b| local.fun < b.fun) {
                best = Some(local);
            }
        }

        let best = match best {
            Some(b) => b,
            None => {
                tracing::warn!(starts = take, "no feasible candidate found");
                return Err(SearchError::Infeasible { starts: take });
            }
        };
        if !best.converged {
            tracing::warn!(
                iterations = best.iterations,
                objective = best.fun,
                "best candidate did not converge"
            );
            return Err(SearchError::NotConverged {
                iterations: best.iterations,
                objective: best.fun,
            });
        }

        Ok(Minimum {
            x: best.x,
            fun: best.fun,
            iterations: best.iterations,
            starts: take,
        })
    }

    fn enumerates_corners(&self, config: &SearchConfig) -> bool {
        self.bounds.dim() <= config.max_corner_dims.min(MAX_CORNER_DIMS)
    }

    fn seed_points(&self, config: &SearchConfig) -> Vec<Vec<f64>> {
        let n = self.bounds.dim();
        let mut seeds = self.seeds.clone();
        seeds.push(self.bounds.midpoint());

        if self.enumerates_corners(config) {
            for mask in 0u64..(1u64 << n) {
                let corner = (0..n)
                    .map(|i| {
                        if mask & (1 << i) == 0 {
                            self.bounds.lower[i]
                        } else {
                            self.bounds.upper[i]
                        }
                    })
                    .collect();
                seeds.push(corner);
            }
        }

        let g = config.grid_points_per_axis;
        let grid_size = u32::try_from(n)
            .ok()
            .and_then(|n| g.checked_pow(n));
        if g >= 2 && grid_size.map_or(false, |size| size <= config.max_grid_seeds) {
            let total = grid_size.unwrap_or(0);
            for flat in 0..total {
                let mut rem = flat;
                let point = (0..n)
                    .map(|i| {
                        let k = rem % g;
                        rem /= g;
                        let t = k as f64 / (g - 1) as f64;
                        self.bounds.lower[i] + t * (self.bounds.upper[i] - self.bounds.lower[i])
                    })
                    .collect();
                seeds.push(point);
            }
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        for _ in 0..config.random_starts {
            let point = (0..n)
                .map(|i| {
                    let (lo, hi) = (self.bounds.lower[i], self.bounds.upper[i]);
                    if hi > lo {
                        rng.gen_range(lo..=hi)
                    } else {
                        lo
                    }
                })
                .collect();
            seeds.push(point);
        }

        if !self.enumerates_corners(config) {
            for _ in 0..config.random_starts {
                let corner = (0..n)
                    .map(|i| {
                        if rng.gen_bool(0.5) {
                            self.bounds.upper[i]
                        } else {
                            self.bounds.lower[i]
                        }
                    })
                    .collect();
                seeds.push(corner);
            }
        }
        seeds
    }
}

// ---------------------------------------------------------------------------
// Internal: penalty and local refinement
// ---------------------------------------------------------------------------

struct Penalized<'p, 'a> {
    problem: &'p Problem<'a>,
    weight: f64,
}

impl Penalized<'_, '_> {
    fn penalty(&self, x: &[f64]) -> f64 {
        self.problem
            .constraints
            .iter()
            .map(|c| {
                let g = c.eval(x);
                if g < 0.0 {
                    g * g
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            * self.weight
    }
}

impl Objective for Penalized<'_, '_> {
    fn value(&self, x: &[f64]) -> f64 {
        self.problem.objective.value(x) + self.penalty(x)
    }

    fn gradient(&self, x: &[f64], bounds: &SearchBox, out: &mut [f64]) {
        self.problem.objective.gradient(x, bounds, out);
        if self.problem.constraints.is_empty() {
            return;
        }
        let penalty = FnObjective(|p: &[f64]| self.penalty(p));
        let mut extra = vec![0.0; out.len()];
        finite_difference(&penalty, x, bounds, &mut extra);
        for (o, e) in out.iter_mut().zip(extra) {
            *o += e;
        }
    }
}

/// Cyclic coordinate search: for each axis in turn, try every grid level
/// of that axis with the other coordinates fixed and keep the best. Stops
/// after `coordinate_sweeps` passes or a pass without improvement.
fn coordinate_sweep(
    objective: &dyn Objective,
    bounds: &SearchBox,
    mut x: Vec<f64>,
    config: &SearchConfig,
) -> (f64, Vec<f64>) {
    let levels = config.grid_points_per_axis.max(3);
    let mut f = objective.value(&x);
    for _ in 0..config.coordinate_sweeps {
        let mut improved = false;
        for i in 0..x.len() {
            let (lo, hi) = (bounds.lower[i], bounds.upper[i]);
            if hi <= lo {
                continue;
            }
            let mut best = x[i];
            for k in 0..levels {
                x[i] = lo + (k as f64 / (levels - 1) as f64) * (hi - lo);
                let candidate = objective.value(&x);
                if candidate < f {
                    f = candidate;
                    best = x[i];
                    improved = true;
                }
            }
            x[i] = best;
        }
        if !improved {
            break;
        }
    }
    (if f.is_finite() { f } else { f64::INFINITY }, x)
}

#[derive(Debug, Clone)]
struct Local {
    x: Vec<f64>,
    fun: f64,
    iterations: usize,
    converged: bool,
}

/// Projected gradient descent with Armijo backtracking.
///
/// Converges when the projected step, or the objective change, falls under
/// the tolerance, or when no decrease exists at the smallest step length.
fn refine(objective: &dyn Objective, bounds: &SearchBox, mut x: Vec<f64>, config: &SearchConfig) -> Local {
    const ARMIJO: f64 = 1e-4;
    let n = x.len();
    let scale = bounds.scale();
    let min_step = config.tolerance * scale;
    let mut f = objective.value(&x);
    let mut g = vec![0.0; n];
    let mut step = 0.25 * scale;
    let mut trial = vec![0.0; n];

    for iteration in 0..config.max_iterations {
        objective.gradient(&x, bounds, &mut g);
        if g.iter().any(|v| !v.is_finite()) || !f.is_finite() {
            return Local {
                x,
                fun: f,
                iterations: iteration,
                converged: false,
            };
        }
        let g_norm = g.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if g_norm == 0.0 {
            return Local {
                x,
                fun: f,
                iterations: iteration,
                converged: true,
            };
        }

        let accepted = loop {
            for i in 0..n {
                trial[i] = x[i] - step * g[i] / g_norm;
            }
            bounds.project(&mut trial);
            let moved = x
                .iter()
                .zip(trial.iter())
                .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
            if moved <= min_step {
                break None;
            }
            let f_trial = objective.value(&trial);
            let decrease: f64 = g.iter().zip(x.iter().zip(trial.iter())).map(|(gi, (a, b))| gi * (a - b)).sum();
            if f_trial.is_finite() && f_trial <= f - ARMIJO * decrease {
                break Some(f_trial);
            }
            step *= 0.5;
            if step <= min_step {
                break None;
            }
        };

        let f_new = match accepted {
            Some(v) => v,
            None => {
                return Local {
                    x,
                    fun: f,
                    iterations: iteration,
                    converged: true,
                }
            }
        };

        let change = (f - f_new).abs();
        x.copy_from_slice(&trial);
        let previous = f;
        f = f_new;
        step = (step * 2.0).min(scale);
        if change <= config.tolerance * (1.0 + previous.abs().max(f.abs())) {
            return Local {
                x,
                fun: f,
                iterations: iteration + 1,
                converged: true,
            };
        }
    }

    Local {
        x,
        fun: f,
        iterations: config.max_iterations,
        converged: false,
    }
}
