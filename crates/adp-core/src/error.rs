//! # Error Hierarchy
//!
//! Structured error types for the workspace, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Sensitivity failures are never masked: a search that cannot prove a
//! bound reports an error so the caller can refuse the release instead of
//! under-calibrating noise.

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum AdpError {
    /// A leaf was constructed with an invalid bound triple.
    #[error("bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// Symbol table failure.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Extremum or Lipschitz search failure.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// A derived value escaped its own bounds. This indicates a defect in
    /// bound propagation, not a recoverable condition.
    #[error("bound invariant violated: expected {min_val} <= {value} <= {max_val}")]
    BoundInvariant {
        /// Computed lower bound.
        min_val: f64,
        /// Computed point value.
        value: f64,
        /// Computed upper bound.
        max_val: f64,
    },

    /// The accountant refused or failed a publish.
    #[error("accountant error: {0}")]
    Accountant(String),

    /// A wire record lacked a field required to rebuild a scalar.
    #[error("incomplete record: missing {0}")]
    IncompleteRecord(&'static str),

    /// The wire record has no origin field, so only phi leaves and derived
    /// values may be encoded.
    #[error("{0} cannot be encoded as a wire record")]
    UnencodableScalar(&'static str),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors in a `(min_val, value, max_val)` triple.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    /// One of the three numbers is NaN or infinite.
    #[error("bounds must be finite: ({min_val}, {value}, {max_val})")]
    NonFinite {
        /// Lower bound.
        min_val: f64,
        /// Point value.
        value: f64,
        /// Upper bound.
        max_val: f64,
    },

    /// The point value lies outside `[min_val, max_val]`, or the box is inverted.
    #[error("value {value} outside [{min_val}, {max_val}]")]
    OutOfRange {
        /// Lower bound.
        min_val: f64,
        /// Point value.
        value: f64,
        /// Upper bound.
        max_val: f64,
    },
}

/// Errors in the symbol table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A live leaf is already registered under this symbol.
    #[error("symbol {0} is already registered to a live leaf")]
    DuplicateSymbol(String),
}

/// Errors from the global optimization routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The best candidate found stopped at the iteration cap before
    /// satisfying the convergence tolerance.
    #[error("optimizer did not converge after {iterations} iterations (best objective {objective})")]
    NotConverged {
        /// Iterations spent on the best candidate.
        iterations: usize,
        /// Objective value at the best candidate.
        objective: f64,
    },

    /// No start point produced a candidate satisfying every constraint.
    #[error("no feasible candidate among {starts} start points")]
    Infeasible {
        /// Number of start points refined.
        starts: usize,
    },

    /// A search box has an inverted or non-finite interval.
    #[error("invalid search box at index {index}: [{lower}, {upper}]")]
    InvalidBox {
        /// Variable index.
        index: usize,
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },

    /// A free symbol has no live leaf in the symbol table.
    #[error("symbol {0} does not resolve to a live leaf")]
    UnknownSymbol(String),

    /// The objective evaluated to NaN or infinity at the chosen optimum.
    #[error("objective is not finite at the optimum")]
    NonFinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_error_converts_into_top_level() {
        let err: AdpError = SearchError::Infeasible { starts: 4 }.into();
        assert!(matches!(err, AdpError::Search(SearchError::Infeasible { starts: 4 })));
        assert!(err.to_string().contains("4 start points"));
    }

    #[test]
    fn bound_invariant_message_names_all_three() {
        let err = AdpError::BoundInvariant {
            min_val: 0.0,
            value: 3.0,
            max_val: 2.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("0 <= 3 <= 2"), "got {msg}");
    }
}
