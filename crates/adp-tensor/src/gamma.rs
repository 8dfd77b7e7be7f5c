//! # Intermediate Gamma Tensor
//!
//! Each element of the tensor is a polynomial `Σ_t coeff[e, t] · term[e, t] + bias[e]`.
//! The three components are stored as separate arrays:
//!
//! - `term`: shape `E ++ [T]`, one [`Monomial`] per element and term slot;
//! - `coeff`: same shape as `term`;
//! - `bias`: shape `E`.
//!
//! `E` is the element shape, `T` the number of term slots. Slots are never
//! merged or dropped by the algebra: a slot with coefficient zero still
//! counts, so term counts follow the combination laws exactly.

use std::collections::BTreeSet;

use adp_core::{Expr, Monomial, Symbol, SymbolResolver};
use ndarray::{concatenate, ArrayD, Axis, Dimension, IxDyn};

use crate::error::TensorError;
use crate::factory::SymbolFactory;

#[derive(Debug, Clone)]
pub struct IntermediateGammaTensor {
    factory: SymbolFactory,
    term: ArrayD<Monomial>,
    coeff: ArrayD<f64>,
    bias: ArrayD<f64>,
}

/// `e ++ [k]` as an index.
fn slot(e: &[usize], k: usize) -> Vec<usize> {
    let mut v = Vec::with_capacity(e.len() + 1);
    v.extend_from_slice(e);
    v.push(k);
    v
}

impl IntermediateGammaTensor {
    /// Assemble a tensor from its components, checking their shapes agree.
    pub fn new(
        factory: SymbolFactory,
        term: ArrayD<Monomial>,
        coeff: ArrayD<f64>,
        bias: ArrayD<f64>,
    ) -> Result<Self, TensorError> {
        let consistent = term.ndim() >= 1
            && term.shape() == coeff.shape()
            && &term.shape()[..term.ndim() - 1] == bias.shape();
        if !consistent {
            return Err(TensorError::Inconsistent {
                term: term.shape().to_vec(),
                coeff: coeff.shape().to_vec(),
                bias: bias.shape().to_vec(),
            });
        }
        Ok(Self {
            factory,
            term,
            coeff,
            bias,
        })
    }

    /// One term per element: `1 · symbol`, bias zero.
    pub fn from_symbols(factory: SymbolFactory, symbols: &ArrayD<Symbol>) -> Result<Self, TensorError> {
        let mut full = symbols.shape().to_vec();
        full.push(1);
        let term = symbols
            .mapv(Monomial::var)
            .into_shape(IxDyn(&full))?;
        let coeff = ArrayD::from_elem(IxDyn(&full), 1.0);
        let bias = ArrayD::zeros(IxDyn(symbols.shape()));
        Self::new(factory, term, coeff, bias)
    }

    /// A tensor of freshly minted symbols.
    pub fn fresh(factory: SymbolFactory, shape: &[usize]) -> Result<Self, TensorError> {
        let symbols = factory.mint_array(shape);
        Self::from_symbols(factory, &symbols)
    }

    /// Every element equal to `value`, with no terms.
    pub fn constant(factory: SymbolFactory, shape: &[usize], value: f64) -> Self {
        let full = slot(shape, 0);
        Self {
            factory,
            term: ArrayD::from_shape_simple_fn(IxDyn(&full), Monomial::one),
            coeff: ArrayD::zeros(IxDyn(&full)),
            bias: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    pub fn factory(&self) -> &SymbolFactory {
        &self.factory
    }

    /// Element shape.
    pub fn shape(&self) -> &[usize] {
        self.bias.shape()
    }

    /// Shape of the term tensor: element shape plus the term axis.
    pub fn full_shape(&self) -> &[usize] {
        self.term.shape()
    }

    /// Number of term slots per element.
    pub fn term_count(&self) -> usize {
        self.term.shape().last().copied().unwrap_or(0)
    }

    pub fn term_tensor(&self) -> &ArrayD<Monomial> {
        &self.term
    }

    pub fn coeff_tensor(&self) -> &ArrayD<f64> {
        &self.coeff
    }

    pub fn bias_tensor(&self) -> &ArrayD<f64> {
        &self.bias
    }

    fn term_axis(&self) -> Axis {
        Axis(self.term.ndim() - 1)
    }

    fn check_axis(&self, axis: usize) -> Result<(), TensorError> {
        let ndim = self.bias.ndim();
        if axis >= ndim {
            return Err(TensorError::AxisOutOfRange { axis, ndim });
        }
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<(), TensorError> {
        if self.factory != other.factory {
            tracing::warn!(
                left = %self.factory.id(),
                right = %other.factory.id(),
                "refusing to combine tensors from different symbol factories"
            );
            return Err(TensorError::FactoryMismatch {
                left: self.factory.id(),
                right: other.factory.id(),
            });
        }
        if self.shape() != other.shape() {
            return Err(TensorError::ShapeMismatch {
                left: self.shape().to_vec(),
                right: other.shape().to_vec(),
            });
        }
        Ok(())
    }

    // -- reductions ---------------------------------------------------------

    /// Sum over element axis `axis`. The summed elements' term slots are
    /// laid side by side on the term axis, so a reduction over `k` elements
    /// of `T` slots yields `k · T` slots.
    pub fn sum(&self, axis: usize) -> Result<Self, TensorError> {
        self.check_axis(axis)?;
        let last = self.term.ndim() - 1;
        let mut order: Vec<usize> = (0..last).filter(|&a| a != axis).collect();
        order.push(axis);
        order.push(last);

        let mut merged: Vec<usize> = self
            .shape()
            .iter()
            .enumerate()
            .filter(|&(a, _)| a != axis)
            .map(|(_, &d)| d)
            .collect();
        merged.push(self.shape()[axis] * self.term_count());

        let term = self
            .term
            .view()
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&merged))?;
        let coeff = self
            .coeff
            .view()
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&merged))?;
        let bias = self.bias.sum_axis(Axis(axis));
        Self::new(self.factory.clone(), term, coeff, bias)
    }

    /// Product over element axis `axis`, folding [`mul`](Self::mul) across
    /// the slices. An empty axis yields the constant one.
    pub fn prod(&self, axis: usize) -> Result<Self, TensorError> {
        self.check_axis(axis)?;
        let reduced: Vec<usize> = self
            .shape()
            .iter()
            .enumerate()
            .filter(|&(a, _)| a != axis)
            .map(|(_, &d)| d)
            .collect();
        let mut acc = Self::constant(self.factory.clone(), &reduced, 1.0);
        for i in 0..self.shape()[axis] {
            let slice = Self::new(
                self.factory.clone(),
                self.term.index_axis(Axis(axis), i).to_owned(),
                self.coeff.index_axis(Axis(axis), i).to_owned(),
                self.bias.index_axis(Axis(axis), i).to_owned(),
            )?;
            acc = acc.mul(&slice)?;
        }
        Ok(acc)
    }

    // -- constants ----------------------------------------------------------

    /// Add `c` to every element; only the bias changes.
    pub fn add_scalar(&self, c: f64) -> Self {
        Self {
            bias: &self.bias + c,
            ..self.clone()
        }
    }

    /// Multiply every element by `c`.
    pub fn mul_scalar(&self, c: f64) -> Self {
        Self {
            coeff: &self.coeff * c,
            bias: &self.bias * c,
            ..self.clone()
        }
    }

    // -- tensor operands ----------------------------------------------------

    /// Elementwise sum: term slots concatenated, biases added.
    pub fn add(&self, other: &Self) -> Result<Self, TensorError> {
        self.check_compatible(other)?;
        let axis = self.term_axis();
        let term = concatenate(axis, &[self.term.view(), other.term.view()])?;
        let coeff = concatenate(axis, &[self.coeff.view(), other.coeff.view()])?;
        Self::new(self.factory.clone(), term, coeff, &self.bias + &other.bias)
    }

    pub fn sub(&self, other: &Self) -> Result<Self, TensorError> {
        self.add(&other.mul_scalar(-1.0))
    }

    /// Elementwise product by the distributive law:
    ///
    /// `(Σ_i a_i t_i + b)(Σ_j c_j s_j + d)
    ///   = Σ_ij a_i c_j t_i s_j + Σ_i a_i d t_i + Σ_j c_j b s_j + b d`
    ///
    /// Slots are laid out as the `m · n` cross terms (row-major in `i, j`),
    /// then the `m` self terms, then the `n` other terms.
    pub fn mul(&self, other: &Self) -> Result<Self, TensorError> {
        self.check_compatible(other)?;
        let (m, n) = (self.term_count(), other.term_count());
        let width = m * n + m + n;
        let full = slot(self.shape(), width);
        tracing::trace!(m, n, width, "tensor multiply");

        let term = ArrayD::from_shape_fn(IxDyn(&full), |idx| {
            let (e, t) = idx.slice().split_at(idx.ndim() - 1);
            let t = t[0];
            if t < m * n {
                let (i, j) = (t / n, t % n);
                self.term[slot(e, i).as_slice()].mul(&other.term[slot(e, j).as_slice()])
            } else if t < m * n + m {
                self.term[slot(e, t - m * n).as_slice()].clone()
            } else {
                other.term[slot(e, t - m * n - m).as_slice()].clone()
            }
        });
        let coeff = ArrayD::from_shape_fn(IxDyn(&full), |idx| {
            let (e, t) = idx.slice().split_at(idx.ndim() - 1);
            let t = t[0];
            if t < m * n {
                let (i, j) = (t / n, t % n);
                self.coeff[slot(e, i).as_slice()] * other.coeff[slot(e, j).as_slice()]
            } else if t < m * n + m {
                self.coeff[slot(e, t - m * n).as_slice()] * other.bias[e]
            } else {
                other.coeff[slot(e, t - m * n - m).as_slice()] * self.bias[e]
            }
        });
        let bias = &self.bias * &other.bias;
        Self::new(self.factory.clone(), term, coeff, bias)
    }

    // -- lowering -----------------------------------------------------------

    /// Symbols appearing in any term slot.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        self.term
            .iter()
            .flat_map(|m| m.factors().iter().map(|(s, _)| s.clone()))
            .collect()
    }

    /// Numeric value of every element, looking symbols up with `lookup`.
    pub fn evaluate_with<F>(&self, lookup: &F) -> Result<ArrayD<f64>, TensorError>
    where
        F: Fn(&Symbol) -> Option<f64>,
    {
        let t_count = self.term_count();
        let mut out = self.bias.clone();
        for (e, v) in out.indexed_iter_mut() {
            let e = e.slice();
            for t in 0..t_count {
                let k = slot(e, t);
                let c = self.coeff[k.as_slice()];
                if c == 0.0 {
                    continue;
                }
                let m = self.term[k.as_slice()]
                    .evaluate(lookup)
                    .map_err(|_| unknown_symbol(&self.term[k.as_slice()], lookup))?;
                *v += c * m;
            }
        }
        Ok(out)
    }

    /// Numeric value of every element, from the current values of the
    /// leaves the resolver knows.
    pub fn evaluate<R: SymbolResolver + ?Sized>(&self, resolver: &R) -> Result<ArrayD<f64>, TensorError> {
        self.evaluate_with(&|s: &Symbol| resolver.resolve(s).map(|l| l.value()))
    }

    /// Each element as an expression over its symbols.
    pub fn to_exprs(&self) -> ArrayD<Expr> {
        let t_count = self.term_count();
        ArrayD::from_shape_fn(IxDyn(self.shape()), |idx| {
            let e = idx.slice();
            (0..t_count).fold(Expr::constant(self.bias[e]), |acc, t| {
                let k = slot(e, t);
                let c = self.coeff[k.as_slice()];
                if c == 0.0 {
                    return acc;
                }
                acc.add_expr(&Expr::constant(c).mul_expr(&self.term[k.as_slice()].to_expr()))
            })
        })
    }
}

fn unknown_symbol<F>(monomial: &Monomial, lookup: &F) -> TensorError
where
    F: Fn(&Symbol) -> Option<f64>,
{
    let missing = monomial
        .factors()
        .iter()
        .find(|(s, _)| lookup(s).is_none())
        .map(|(s, _)| s.to_string())
        .unwrap_or_default();
    TensorError::UnknownSymbol(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Env {
        factory: SymbolFactory,
        values: HashMap<Symbol, f64>,
    }

    impl Env {
        fn new() -> Self {
            Self {
                factory: SymbolFactory::new("x"),
                values: HashMap::new(),
            }
        }

        /// A fresh tensor whose symbols take the given values.
        fn tensor(&mut self, shape: &[usize], values: &[f64]) -> IntermediateGammaTensor {
            let symbols = self.factory.mint_array(shape);
            for (s, v) in symbols.iter().zip(values) {
                self.values.insert(s.clone(), *v);
            }
            IntermediateGammaTensor::from_symbols(self.factory.clone(), &symbols).unwrap()
        }

        fn eval(&self, t: &IntermediateGammaTensor) -> Vec<f64> {
            t.evaluate_with(&|s: &Symbol| self.values.get(s).copied())
                .unwrap()
                .iter()
                .copied()
                .collect()
        }
    }

    #[test]
    fn from_symbols_shapes() {
        let mut env = Env::new();
        let t = env.tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.full_shape(), &[2, 3, 1]);
        assert_eq!(env.eval(&t), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn add_scalar_touches_bias_only() {
        let mut env = Env::new();
        let t = env.tensor(&[2], &[1.0, 2.0]);
        let u = t.add_scalar(10.0);
        assert_eq!(u.term_tensor(), t.term_tensor());
        assert_eq!(u.coeff_tensor(), t.coeff_tensor());
        assert_eq!(env.eval(&u), vec![11.0, 12.0]);
    }

    #[test]
    fn add_concatenates_terms() {
        let mut env = Env::new();
        let a = env.tensor(&[2], &[1.0, 2.0]).add_scalar(1.0);
        let b = env.tensor(&[2], &[10.0, 20.0]).add_scalar(2.0);
        let s = a.add(&b).unwrap();
        assert_eq!(s.full_shape(), &[2, 2]);
        assert_eq!(s.bias_tensor().iter().copied().collect::<Vec<_>>(), vec![3.0, 3.0]);
        assert_eq!(env.eval(&s), vec![14.0, 25.0]);
    }

    #[test]
    fn mul_follows_distributive_law() {
        let mut env = Env::new();
        // a = 2·x + 3·y + 1, b = 5·z + 4 (per element)
        let a = env
            .tensor(&[2], &[1.0, 2.0])
            .mul_scalar(2.0)
            .add(&env.tensor(&[2], &[3.0, 4.0]).mul_scalar(3.0))
            .unwrap()
            .add_scalar(1.0);
        let b = env.tensor(&[2], &[5.0, 6.0]).mul_scalar(5.0).add_scalar(4.0);
        assert_eq!(a.term_count(), 2);
        assert_eq!(b.term_count(), 1);

        let p = a.mul(&b).unwrap();
        assert_eq!(p.term_count(), 2 * 1 + 2 + 1);
        assert_eq!(p.full_shape(), &[2, 5]);

        let coeffs: Vec<f64> = p.coeff_tensor().index_axis(Axis(0), 0).iter().copied().collect();
        // cross: 2·5, 3·5; self·d: 2·4, 3·4; other·b: 5·1
        assert_eq!(coeffs, vec![10.0, 15.0, 8.0, 12.0, 5.0]);
        assert_eq!(p.bias_tensor()[[0usize].as_slice()], 4.0);

        let (va, vb) = (env.eval(&a), env.eval(&b));
        let expected: Vec<f64> = va.iter().zip(&vb).map(|(x, y)| x * y).collect();
        assert_eq!(env.eval(&p), expected);
    }

    #[test]
    fn factory_mismatch_is_fatal() {
        let mut env = Env::new();
        let a = env.tensor(&[2], &[1.0, 2.0]);
        let other = IntermediateGammaTensor::fresh(SymbolFactory::new("y"), &[2]).unwrap();
        assert!(matches!(a.add(&other), Err(TensorError::FactoryMismatch { .. })));
        assert!(matches!(a.mul(&other), Err(TensorError::FactoryMismatch { .. })));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut env = Env::new();
        let a = env.tensor(&[2], &[1.0, 2.0]);
        let b = env.tensor(&[3], &[1.0, 2.0, 3.0]);
        assert!(matches!(a.add(&b), Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn sum_merges_reduced_axis_into_terms() {
        let mut env = Env::new();
        let t = env
            .tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .add_scalar(1.0);
        let rows = t.sum(1).unwrap();
        assert_eq!(rows.shape(), &[2]);
        assert_eq!(rows.full_shape(), &[2, 3]);
        assert_eq!(env.eval(&rows), vec![9.0, 18.0]);

        let cols = t.sum(0).unwrap();
        assert_eq!(cols.full_shape(), &[3, 2]);
        assert_eq!(env.eval(&cols), vec![7.0, 9.0, 11.0]);

        assert!(matches!(t.sum(2), Err(TensorError::AxisOutOfRange { axis: 2, ndim: 2 })));
    }

    #[test]
    fn prod_multiplies_slices() {
        let mut env = Env::new();
        let t = env
            .tensor(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .add_scalar(1.0);
        let p = t.prod(1).unwrap();
        assert_eq!(p.shape(), &[2]);
        assert_eq!(env.eval(&p), vec![2.0 * 3.0 * 4.0, 5.0 * 6.0 * 7.0]);
    }

    #[test]
    fn to_exprs_lowers_each_element() {
        let mut env = Env::new();
        let t = env.tensor(&[2], &[3.0, 4.0]).mul_scalar(2.0).add_scalar(1.0);
        let exprs = t.to_exprs();
        let lookup = |s: &Symbol| env.values.get(s).copied();
        let values: Vec<f64> = exprs.iter().map(|e| e.evaluate(&lookup).unwrap()).collect();
        assert_eq!(values, vec![7.0, 9.0]);
    }

    #[test]
    fn unknown_symbol_reported() {
        let t = IntermediateGammaTensor::fresh(SymbolFactory::default(), &[1]).unwrap();
        let err = t.evaluate_with(&|_: &Symbol| None).unwrap_err();
        assert!(matches!(err, TensorError::UnknownSymbol(s) if s.starts_with("t_")));
    }
}
