//! Result type shared by the Lipschitz searches.

/// How a Lipschitz bound was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchMethod {
    /// The expression does not depend on any perturbed input.
    Constant,
    /// Maximized jacobian norm over the input box.
    Jacobian,
    /// Jacobian proven constant; its norm was returned without search.
    HessianShortcut,
    /// Constrained search over input pairs.
    Explicit,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Constant => "constant",
            SearchMethod::Jacobian => "jacobian",
            SearchMethod::HessianShortcut => "hessian_shortcut",
            SearchMethod::Explicit => "explicit",
        }
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Lipschitz bound together with where it was attained.
#[derive(Debug, Clone, PartialEq)]
pub struct LipschitzBound {
    /// The bound, always `≥ 0`.
    pub value: f64,
    pub method: SearchMethod,
    /// Point of the search space at which `value` was attained. Empty for
    /// `Constant` and `HessianShortcut`.
    pub argmax: Vec<f64>,
    /// Local iterations spent on the winning candidate.
    pub iterations: usize,
}

impl LipschitzBound {
    pub(crate) fn exact(value: f64, method: SearchMethod) -> Self {
        Self {
            value,
            method,
            argmax: Vec::new(),
            iterations: 0,
        }
    }
}
