//! Arithmetic on scalars.
//!
//! Dispatch is on the pair of sides:
//!
//! - phi ∘ phi, same entity: stays phi-side, entity kept;
//! - phi ∘ phi, different entities: both promoted, result gamma-side;
//! - anything ∘ gamma-side: the phi operand (if any) is promoted, result
//!   gamma-side;
//! - scalar ∘ constant: same side as the scalar.
//!
//! Promotion of a derived phi value runs an extremum search, so
//! scalar-by-scalar operators return `Result`. The operators and `try_*`
//! methods search with the default [`SearchConfig`]; the `try_*_with`
//! methods take one. Constant operands never promote and return a plain
//! [`Scalar`].

use adp_core::{AdpError, Expr, SearchConfig};

use crate::scalar::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
}

impl BinOp {
    fn apply(self, a: &Expr, b: &Expr) -> Expr {
        match self {
            BinOp::Add => a.add_expr(b),
            BinOp::Sub => a.sub_expr(b),
            BinOp::Mul => a.mul_expr(b),
        }
    }
}

/// `lhs ∘ rhs` for two scalars.
pub(crate) fn combine(lhs: &Scalar, rhs: &Scalar, op: BinOp, config: &SearchConfig) -> Result<Scalar, AdpError> {
    if let (Some(a), Some(b)) = (lhs.phi_entity(), rhs.phi_entity()) {
        if a == b {
            let poly = op.apply(&lhs.poly(), &rhs.poly());
            let leaves = lhs.held_leaves().iter().chain(rhs.held_leaves());
            return Ok(Scalar::intermediate_phi(poly, a.clone(), leaves));
        }
    }
    let l = lhs.gamma_with(config)?;
    let r = rhs.gamma_with(config)?;
    let poly = op.apply(&l.poly(), &r.poly());
    let leaves = l.held_leaves().iter().chain(r.held_leaves());
    Ok(Scalar::intermediate_gamma(poly, leaves))
}

/// `scalar ∘ c`, or `c ∘ scalar` when `constant_first`.
pub(crate) fn with_constant(scalar: &Scalar, c: f64, op: BinOp, constant_first: bool) -> Scalar {
    let k = Expr::constant(c);
    let poly = if constant_first {
        op.apply(&k, &scalar.poly())
    } else {
        op.apply(&scalar.poly(), &k)
    };
    match scalar.phi_entity() {
        Some(e) => Scalar::intermediate_phi(poly, e.clone(), scalar.held_leaves()),
        None => Scalar::intermediate_gamma(poly, scalar.held_leaves()),
    }
}

impl Scalar {
    pub fn try_add(&self, other: &Scalar) -> Result<Scalar, AdpError> {
        self.try_add_with(other, &SearchConfig::default())
    }

    pub fn try_sub(&self, other: &Scalar) -> Result<Scalar, AdpError> {
        self.try_sub_with(other, &SearchConfig::default())
    }

    pub fn try_mul(&self, other: &Scalar) -> Result<Scalar, AdpError> {
        self.try_mul_with(other, &SearchConfig::default())
    }

    /// `self + other`, promoting derived phi operands with `config`.
    pub fn try_add_with(&self, other: &Scalar, config: &SearchConfig) -> Result<Scalar, AdpError> {
        combine(self, other, BinOp::Add, config)
    }

    /// `self - other`, promoting derived phi operands with `config`.
    pub fn try_sub_with(&self, other: &Scalar, config: &SearchConfig) -> Result<Scalar, AdpError> {
        combine(self, other, BinOp::Sub, config)
    }

    /// `self * other`, promoting derived phi operands with `config`.
    pub fn try_mul_with(&self, other: &Scalar, config: &SearchConfig) -> Result<Scalar, AdpError> {
        combine(self, other, BinOp::Mul, config)
    }
}

macro_rules! impl_scalar_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait<&Scalar> for &Scalar {
            type Output = Result<Scalar, AdpError>;
            fn $method(self, rhs: &Scalar) -> Self::Output {
                combine(self, rhs, $op, &SearchConfig::default())
            }
        }

        impl std::ops::$trait<Scalar> for Scalar {
            type Output = Result<Scalar, AdpError>;
            fn $method(self, rhs: Scalar) -> Self::Output {
                combine(&self, &rhs, $op, &SearchConfig::default())
            }
        }

        impl std::ops::$trait<&Scalar> for Scalar {
            type Output = Result<Scalar, AdpError>;
            fn $method(self, rhs: &Scalar) -> Self::Output {
                combine(&self, rhs, $op, &SearchConfig::default())
            }
        }

        impl std::ops::$trait<Scalar> for &Scalar {
            type Output = Result<Scalar, AdpError>;
            fn $method(self, rhs: Scalar) -> Self::Output {
                combine(self, &rhs, $op, &SearchConfig::default())
            }
        }

        impl std::ops::$trait<f64> for &Scalar {
            type Output = Scalar;
            fn $method(self, rhs: f64) -> Scalar {
                with_constant(self, rhs, $op, false)
            }
        }

        impl std::ops::$trait<f64> for Scalar {
            type Output = Scalar;
            fn $method(self, rhs: f64) -> Scalar {
                with_constant(&self, rhs, $op, false)
            }
        }

        impl std::ops::$trait<&Scalar> for f64 {
            type Output = Scalar;
            fn $method(self, rhs: &Scalar) -> Scalar {
                with_constant(rhs, self, $op, true)
            }
        }

        impl std::ops::$trait<Scalar> for f64 {
            type Output = Scalar;
            fn $method(self, rhs: Scalar) -> Scalar {
                with_constant(&rhs, self, $op, true)
            }
        }
    };
}

impl_scalar_op!(Add, add, BinOp::Add);
impl_scalar_op!(Sub, sub, BinOp::Sub);
impl_scalar_op!(Mul, mul, BinOp::Mul);

impl std::ops::Neg for &Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        with_constant(self, -1.0, BinOp::Mul, true)
    }
}

impl std::ops::Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adp_core::Entity;

    fn phi(min: f64, value: f64, max: f64, entity: &Entity) -> Scalar {
        Scalar::phi(min, value, max, Some(entity.clone())).unwrap()
    }

    #[test]
    fn same_entity_stays_phi() {
        let e = Entity::named("ops-same");
        let a = phi(0.0, 1.0, 2.0, &e);
        let b = phi(0.0, 3.0, 4.0, &e);
        let s = (&a + &b).unwrap();
        assert!(matches!(s, Scalar::IntermediatePhi(_)));
        assert_eq!(s.entity(), Some(&e));
        assert_eq!(s.value().unwrap(), 4.0);
        assert_eq!(s.input_entities().unwrap(), vec![e]);
    }

    #[test]
    fn different_entities_promote_both() {
        let (ea, eb) = (Entity::named("ops-a"), Entity::named("ops-b"));
        let a = phi(0.0, 1.0, 2.0, &ea);
        let b = phi(0.0, 3.0, 4.0, &eb);
        let p = (&a * &b).unwrap();
        assert!(matches!(p, Scalar::IntermediateGamma(_)));
        assert_eq!(p.entity(), None);
        assert_eq!(p.value().unwrap(), 3.0);

        let mut entities = p.input_entities().unwrap();
        entities.sort();
        let mut expected = vec![ea, eb];
        expected.sort();
        assert_eq!(entities, expected);

        // The product is expressed over the promoted leaves, not the phi ones.
        let symbols = p.poly().free_symbols();
        assert!(symbols.contains(a.gamma().unwrap().ssid().unwrap()));
        assert!(!symbols.contains(a.ssid().unwrap()));
    }

    #[test]
    fn gamma_operand_promotes_phi_side() {
        let e = Entity::named("ops-g");
        let x = phi(0.0, 2.0, 3.0, &e);
        let g = Scalar::gamma_leaf(0.0, 1.0, 1.0, Some(e.clone())).unwrap();
        let s = (&x - &g).unwrap();
        assert!(matches!(s, Scalar::IntermediateGamma(_)));
        assert_eq!(s.value().unwrap(), 1.0);
    }

    #[test]
    fn constants_keep_side() {
        let e = Entity::named("ops-const");
        let x = phi(0.0, 5.0, 10.0, &e);

        let y = &x * 2.0;
        assert!(matches!(y, Scalar::IntermediatePhi(_)));
        assert_eq!(y.value().unwrap(), 10.0);

        let z = 1.0 - &x;
        assert_eq!(z.value().unwrap(), -4.0);
        assert_eq!(z.min_val().unwrap(), -9.0);
        assert_eq!(z.max_val().unwrap(), 1.0);

        let g = x.gamma().unwrap() + 3.0;
        assert!(matches!(g, Scalar::IntermediateGamma(_)));
        assert_eq!(g.value().unwrap(), 8.0);

        let n = -&x;
        assert_eq!(n.value().unwrap(), -5.0);
        assert_eq!(n.entity(), Some(&e));
    }

    #[test]
    fn cancelling_terms_are_tight() {
        let e = Entity::named("ops-cancel");
        let x = phi(0.0, 5.0, 10.0, &e);
        let y = phi(0.0, 1.0, 10.0, &e);
        let d = ((&x + &y).unwrap() - &x).unwrap();
        // x is still mentioned syntactically; the difference evaluates to y.
        assert_eq!(d.value().unwrap(), 1.0);
        assert_eq!(d.min_val().unwrap(), 0.0);
        assert_eq!(d.max_val().unwrap(), 10.0);
    }

    #[test]
    fn mixed_entity_ops_promote_with_given_config() {
        let x = phi(-100.0, 90.0, 100.0, &Entity::named("ops-capped-x"));
        let y = phi(0.0, 1.0, 2.0, &Entity::named("ops-capped-y"));
        let sq = ((&x * &x).unwrap() - 2.0 * &x).unwrap();
        let capped = SearchConfig {
            max_iterations: 1,
            grid_points_per_axis: 0,
            max_corner_dims: 0,
            random_starts: 0,
            tolerance: 1e-15,
            ..SearchConfig::default()
        };
        let err = sq.try_mul_with(&y, &capped).unwrap_err();
        assert!(matches!(err, AdpError::Search(adp_core::SearchError::NotConverged { .. })));
        assert!(sq.try_add_with(&y, &capped).is_err());
        let p = sq.try_mul(&y).unwrap();
        assert!(matches!(p, Scalar::IntermediateGamma(_)));
    }

    #[test]
    fn derived_phi_promotes_with_searched_bounds() {
        let e = Entity::named("ops-derived");
        let x = phi(-1.0, 0.5, 2.0, &e);
        let sq = (&x * &x).unwrap();
        let g = sq.gamma().unwrap();
        let b = g.bounds().unwrap();
        assert!(b.min_val.abs() < 1e-6);
        assert_eq!(b.value, 0.25);
        assert_eq!(b.max_val, 4.0);
        assert_eq!(g.entity(), Some(&e));
    }
}
