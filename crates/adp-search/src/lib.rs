//! # adp-search — Bound and Sensitivity Search
//!
//! Numeric search over the box spanned by the leaves an expression depends
//! on. Three questions are answered here:
//!
//! - **Range** ([`bounds`]): the minimum and maximum of a polynomial over
//!   its input box.
//! - **Jacobian sensitivity** ([`jacobian`]): the largest gradient norm over
//!   the box, optionally restricted to one entity's inputs.
//! - **Explicit sensitivity** ([`explicit`]): the largest difference quotient
//!   between two points of the box, found by constrained search.
//!
//! All three are built on the multi-start minimizer in [`optimize`]. Every
//! search is deterministic given its [`SearchConfig`](adp_core::SearchConfig)
//! seed, and reports failure to converge as an error rather than returning a
//! possibly unsound bound.

pub mod bounds;
pub mod explicit;
pub mod inputs;
pub mod jacobian;
pub mod lipschitz;
pub mod optimize;

pub use bounds::{extremum, max_val, min_val, value, Extremum};
pub use explicit::max_lipschitz_via_explicit_search;
pub use inputs::SearchInputs;
pub use jacobian::max_lipschitz_via_jacobian;
pub use lipschitz::{LipschitzBound, SearchMethod};
pub use optimize::{
    finite_difference, FnObjective, InequalityConstraint, Minimum, Objective, PolynomialObjective, Problem,
    SearchBox,
};
