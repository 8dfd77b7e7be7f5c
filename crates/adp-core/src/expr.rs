//! # Symbolic Expressions
//!
//! A derived scalar carries an expression over the symbols of the leaves it
//! depends on. The tree is immutable and structurally shared through `Arc`,
//! so composing values never copies their operands.
//!
//! The smart constructors fold constants (`0 + x → x`, `1 · x → x`,
//! `0 · x → 0`), which keeps derivatives of linear terms exactly constant.
//! Full canonicalization is left to [`Polynomial`](crate::Polynomial).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::SearchError;
use crate::polynomial::Polynomial;

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// The string key identifying a leaf inside the expression and registry layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Wrap a symbol name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The symbol name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Expr
// ---------------------------------------------------------------------------

/// An expression tree over leaf symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A public constant.
    Const(f64),
    /// A leaf symbol.
    Sym(Symbol),
    /// Sum of two subexpressions.
    Add(Arc<Expr>, Arc<Expr>),
    /// Product of two subexpressions.
    Mul(Arc<Expr>, Arc<Expr>),
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    pub fn symbol(symbol: Symbol) -> Self {
        Expr::Sym(symbol)
    }

    /// The constant value, if this expression is a bare constant.
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// `self + other` with constant folding.
    pub fn add_expr(&self, other: &Expr) -> Expr {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a + b),
            (Expr::Const(a), e) | (e, Expr::Const(a)) if *a == 0.0 => e.clone(),
            (a, b) => Expr::Add(Arc::new(a.clone()), Arc::new(b.clone())),
        }
    }

    /// `self * other` with constant folding.
    pub fn mul_expr(&self, other: &Expr) -> Expr {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b),
            (Expr::Const(a), _) | (_, Expr::Const(a)) if *a == 0.0 => Expr::Const(0.0),
            (Expr::Const(a), e) | (e, Expr::Const(a)) if *a == 1.0 => e.clone(),
            (a, b) => Expr::Mul(Arc::new(a.clone()), Arc::new(b.clone())),
        }
    }

    /// `self - other`, expressed as `self + (-1) · other`.
    pub fn sub_expr(&self, other: &Expr) -> Expr {
        self.add_expr(&Expr::Const(-1.0).mul_expr(other))
    }

    /// The set of leaf symbols this expression depends on.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Const(_) => {}
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Add(a, b) | Expr::Mul(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Replace symbols by expressions. Symbols absent from `map` are kept.
    pub fn subs(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        match self {
            Expr::Const(_) => self.clone(),
            Expr::Sym(s) => map.get(s).cloned().unwrap_or_else(|| self.clone()),
            Expr::Add(a, b) => a.subs(map).add_expr(&b.subs(map)),
            Expr::Mul(a, b) => a.subs(map).mul_expr(&b.subs(map)),
        }
    }

    /// Evaluate numerically, looking up each symbol's value.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64, SearchError>
    where
        F: Fn(&Symbol) -> Option<f64>,
    {
        match self {
            Expr::Const(c) => Ok(*c),
            Expr::Sym(s) => lookup(s).ok_or_else(|| SearchError::UnknownSymbol(s.to_string())),
            Expr::Add(a, b) => Ok(a.evaluate(lookup)? + b.evaluate(lookup)?),
            Expr::Mul(a, b) => Ok(a.evaluate(lookup)? * b.evaluate(lookup)?),
        }
    }

    /// Partial derivative with respect to `symbol`.
    pub fn diff(&self, symbol: &Symbol) -> Expr {
        match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Sym(s) => Expr::Const(if s == symbol { 1.0 } else { 0.0 }),
            Expr::Add(a, b) => a.diff(symbol).add_expr(&b.diff(symbol)),
            Expr::Mul(a, b) => {
                let left = a.diff(symbol).mul_expr(b);
                let right = a.mul_expr(&b.diff(symbol));
                left.add_expr(&right)
            }
        }
    }

    /// Expand into the canonical sum-of-monomials form.
    pub fn expand(&self) -> Polynomial {
        match self {
            Expr::Const(c) => Polynomial::constant(*c),
            Expr::Sym(s) => Polynomial::variable(s.clone()),
            Expr::Add(a, b) => a.expand().add(&b.expand()),
            Expr::Mul(a, b) => a.expand().mul(&b.expand()),
        }
    }
}

impl From<f64> for Expr {
    fn from(c: f64) -> Self {
        Expr::Const(c)
    }
}

impl From<Symbol> for Expr {
    fn from(s: Symbol) -> Self {
        Expr::Sym(s)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Mul(a, b) => write!(f, "{a}*{b}"),
        }
    }
}

macro_rules! impl_expr_op {
    ($trait:ident, $method:ident, $inner:ident) => {
        impl std::ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                self.$inner(&rhs)
            }
        }

        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                self.$inner(rhs)
            }
        }

        impl std::ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                self.$inner(&Expr::Const(rhs))
            }
        }
    };
}

impl_expr_op!(Add, add, add_expr);
impl_expr_op!(Sub, sub, sub_expr);
impl_expr_op!(Mul, mul, mul_expr);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Const(-1.0).mul_expr(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Expr {
        Expr::symbol(Symbol::new(name))
    }

    fn values(pairs: &[(&str, f64)]) -> impl Fn(&Symbol) -> Option<f64> {
        let map: HashMap<Symbol, f64> = pairs.iter().map(|(k, v)| (Symbol::new(k), *v)).collect();
        move |s| map.get(s).copied()
    }

    #[test]
    fn constant_folding() {
        let x = sym("x");
        assert_eq!(x.clone() + 0.0, x);
        assert_eq!(x.clone() * 1.0, x);
        assert_eq!(x.clone() * 0.0, Expr::Const(0.0));
        assert_eq!(Expr::Const(2.0) * Expr::Const(3.0), Expr::Const(6.0));
    }

    #[test]
    fn free_symbols_deduplicate() {
        let e = sym("x") * sym("y") + sym("x");
        let syms: Vec<_> = e.free_symbols().into_iter().map(|s| s.to_string()).collect();
        assert_eq!(syms, vec!["x", "y"]);
        assert!(Expr::Const(4.0).free_symbols().is_empty());
    }

    #[test]
    fn evaluate_uses_lookup() {
        let e = sym("x") * sym("y") - sym("x") + 2.0;
        let v = e.evaluate(&values(&[("x", 3.0), ("y", 4.0)])).unwrap();
        assert_eq!(v, 3.0 * 4.0 - 3.0 + 2.0);
    }

    #[test]
    fn evaluate_unknown_symbol_fails() {
        let err = sym("ghost").evaluate(&values(&[])).unwrap_err();
        assert_eq!(err, SearchError::UnknownSymbol("ghost".into()));
    }

    #[test]
    fn derivative_of_linear_term_is_constant() {
        let e = sym("x") * 3.0 + sym("y");
        assert_eq!(e.diff(&Symbol::new("x")), Expr::Const(3.0));
        assert_eq!(e.diff(&Symbol::new("z")), Expr::Const(0.0));
    }

    #[test]
    fn product_rule() {
        let e = sym("x") * sym("x") * sym("y");
        let d = e.diff(&Symbol::new("x"));
        let v = d.evaluate(&values(&[("x", 2.0), ("y", 5.0)])).unwrap();
        assert_eq!(v, 2.0 * 2.0 * 5.0);
    }

    #[test]
    fn subs_replaces_symbols() {
        let e = sym("x") * sym("y");
        let mut map = HashMap::new();
        map.insert(Symbol::new("x"), sym("a") + sym("b"));
        let s = e.subs(&map);
        let v = s
            .evaluate(&values(&[("a", 1.0), ("b", 2.0), ("y", 10.0)]))
            .unwrap();
        assert_eq!(v, 30.0);
        assert!(!s.free_symbols().contains(&Symbol::new("x")));
    }

    #[test]
    fn negation_and_subtraction() {
        let e = -sym("x") - sym("y");
        let v = e.evaluate(&values(&[("x", 1.0), ("y", 2.0)])).unwrap();
        assert_eq!(v, -3.0);
    }
}
