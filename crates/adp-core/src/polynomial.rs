//! # Canonical Polynomials
//!
//! The expanded, canonical form of an [`Expr`](crate::Expr): a map from
//! [`Monomial`] to coefficient with zero coefficients removed. Two
//! expressions with the same polynomial are algebraically equal, which makes
//! zero tests (the Hessian shortcut) exact.
//!
//! [`CompiledPolynomial`] binds symbols to vector positions so the optimizer
//! can evaluate value and gradient on `&[f64]` without hashing.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SearchError;
use crate::expr::{Expr, Symbol};

// ---------------------------------------------------------------------------
// Monomial
// ---------------------------------------------------------------------------

/// A product of symbols raised to positive integer powers.
///
/// Factors are kept sorted by symbol with no zero exponents, so equal
/// monomials compare equal. The empty monomial is the constant `1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Monomial {
    factors: Vec<(Symbol, u32)>,
}

impl Monomial {
    /// The unit monomial.
    pub fn one() -> Self {
        Self::default()
    }

    /// A single symbol to the first power.
    pub fn var(symbol: Symbol) -> Self {
        Self {
            factors: vec![(symbol, 1)],
        }
    }

    pub fn is_one(&self) -> bool {
        self.factors.is_empty()
    }

    /// Total degree.
    pub fn degree(&self) -> u32 {
        self.factors.iter().map(|(_, p)| p).sum()
    }

    pub fn factors(&self) -> &[(Symbol, u32)] {
        &self.factors
    }

    /// Exponent of `symbol` in this monomial (0 when absent).
    pub fn power_of(&self, symbol: &Symbol) -> u32 {
        self.factors
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }

    /// Product of two monomials (exponents add).
    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut merged: BTreeMap<Symbol, u32> = BTreeMap::new();
        for (s, p) in self.factors.iter().chain(other.factors.iter()) {
            *merged.entry(s.clone()).or_insert(0) += p;
        }
        Monomial {
            factors: merged.into_iter().collect(),
        }
    }

    /// Derivative with respect to `symbol`: `(coefficient multiplier, monomial)`.
    /// Returns `None` when the monomial does not contain `symbol`.
    pub fn derivative(&self, symbol: &Symbol) -> Option<(f64, Monomial)> {
        let power = self.power_of(symbol);
        if power == 0 {
            return None;
        }
        let factors = self
            .factors
            .iter()
            .filter_map(|(s, p)| {
                if s == symbol {
                    (power > 1).then(|| (s.clone(), power - 1))
                } else {
                    Some((s.clone(), *p))
                }
            })
            .collect();
        Some((f64::from(power), Monomial { factors }))
    }

    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64, SearchError>
    where
        F: Fn(&Symbol) -> Option<f64>,
    {
        let mut out = 1.0;
        for (s, p) in &self.factors {
            let v = lookup(s).ok_or_else(|| SearchError::UnknownSymbol(s.to_string()))?;
            out *= v.powi(*p as i32);
        }
        Ok(out)
    }

    /// Lower to an expression tree.
    pub fn to_expr(&self) -> Expr {
        self.factors
            .iter()
            .flat_map(|(s, p)| std::iter::repeat(s).take(*p as usize))
            .fold(Expr::Const(1.0), |acc, s| acc.mul_expr(&Expr::Sym(s.clone())))
    }
}

impl std::fmt::Display for Monomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.factors.is_empty() {
            return f.write_str("1");
        }
        for (i, (s, p)) in self.factors.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            if *p == 1 {
                write!(f, "{s}")?;
            } else {
                write!(f, "{s}^{p}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Polynomial
// ---------------------------------------------------------------------------

/// A sum of coefficient-weighted monomials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polynomial {
    terms: BTreeMap<Monomial, f64>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn constant(c: f64) -> Self {
        let mut p = Self::zero();
        p.push(Monomial::one(), c);
        p
    }

    pub fn variable(symbol: Symbol) -> Self {
        let mut p = Self::zero();
        p.push(Monomial::var(symbol), 1.0);
        p
    }

    /// Accumulate `coeff · monomial`, dropping the term if it cancels.
    pub fn push(&mut self, monomial: Monomial, coeff: f64) {
        if coeff == 0.0 {
            return;
        }
        let entry = self.terms.entry(monomial).or_insert(0.0);
        *entry += coeff;
        if *entry == 0.0 {
            self.terms.retain(|_, c| *c != 0.0);
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// The constant value, if the polynomial has no symbols.
    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self.terms.get(&Monomial::one()).copied(),
            _ => None,
        }
    }

    pub fn add(&self, other: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.push(m.clone(), *c);
        }
        out
    }

    pub fn mul(&self, other: &Polynomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.push(ma.mul(mb), ca * cb);
            }
        }
        out
    }

    pub fn scale(&self, k: f64) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, c) in &self.terms {
            out.push(m.clone(), c * k);
        }
        out
    }

    pub fn derivative(&self, symbol: &Symbol) -> Polynomial {
        let mut out = Polynomial::zero();
        for (m, c) in &self.terms {
            if let Some((k, dm)) = m.derivative(symbol) {
                out.push(dm, c * k);
            }
        }
        out
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.terms
            .keys()
            .flat_map(|m| m.factors.iter().map(|(s, _)| s.clone()))
            .collect()
    }

    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64, SearchError>
    where
        F: Fn(&Symbol) -> Option<f64>,
    {
        let mut out = 0.0;
        for (m, c) in &self.terms {
            out += c * m.evaluate(lookup)?;
        }
        Ok(out)
    }

    /// Bind symbols to positions in `order`. Fails if a symbol of this
    /// polynomial is missing from `order`.
    pub fn compile(&self, order: &[Symbol]) -> Result<CompiledPolynomial, SearchError> {
        let index: BTreeMap<&Symbol, usize> = order.iter().enumerate().map(|(i, s)| (s, i)).collect();
        let mut terms = Vec::with_capacity(self.terms.len());
        for (m, c) in &self.terms {
            let mut factors = Vec::with_capacity(m.factors.len());
            for (s, p) in &m.factors {
                let i = index
                    .get(s)
                    .copied()
                    .ok_or_else(|| SearchError::UnknownSymbol(s.to_string()))?;
                factors.push((i, *p as i32));
            }
            terms.push(CompiledTerm { coeff: *c, factors });
        }
        Ok(CompiledPolynomial {
            dim: order.len(),
            terms,
        })
    }

    pub fn to_expr(&self) -> Expr {
        self.terms
            .iter()
            .fold(Expr::Const(0.0), |acc, (m, c)| {
                acc.add_expr(&Expr::Const(*c).mul_expr(&m.to_expr()))
            })
    }
}

impl std::fmt::Display for Polynomial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        for (i, (m, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{c}*{m}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CompiledPolynomial
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CompiledTerm {
    coeff: f64,
    factors: Vec<(usize, i32)>,
}

/// A polynomial with symbols bound to vector indices.
#[derive(Debug, Clone)]
pub struct CompiledPolynomial {
    dim: usize,
    terms: Vec<CompiledTerm>,
}

impl CompiledPolynomial {
    /// Length of the point vector this polynomial expects.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn eval(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                t.factors
                    .iter()
                    .fold(t.coeff, |acc, (i, p)| acc * x[*i].powi(*p))
            })
            .sum()
    }

    /// Analytic gradient written into `out` (length `dim`).
    pub fn gradient(&self, x: &[f64], out: &mut [f64]) {
        out.iter_mut().for_each(|g| *g = 0.0);
        for t in &self.terms {
            for (k, (i, p)) in t.factors.iter().enumerate() {
                let mut partial = t.coeff * f64::from(*p) * x[*i].powi(p - 1);
                for (j, (i2, p2)) in t.factors.iter().enumerate() {
                    if j != k {
                        partial *= x[*i2].powi(*p2);
                    }
                }
                out[*i] += partial;
            }
        }
    }
}
