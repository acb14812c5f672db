//! Immutable symbolic expressions and their partial derivatives.
//!
//! The arithmetic operators fold numeric constants and drop additive and
//! multiplicative identities as they build nodes, which keeps differentiated
//! trees close to what one would write by hand.

use crate::symbols::Symbol;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Symbol(Symbol),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Powi(Box<Expr>, i32),
    Neg(Box<Expr>),
    Exp(Box<Expr>),
}

impl Expr {
    pub fn zero() -> Self {
        Expr::Number(0.0)
    }

    pub fn one() -> Self {
        Expr::Number(1.0)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Number(v) if *v == 0.0)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn powi(self, n: i32) -> Self {
        match (self, n) {
            (_, 0) => Expr::one(),
            (base, 1) => base,
            (Expr::Number(v), n) => Expr::Number(v.powi(n)),
            (base, n) => Expr::Powi(Box::new(base), n),
        }
    }

    pub fn exp(self) -> Self {
        match self {
            Expr::Number(v) => Expr::Number(v.exp()),
            arg => Expr::Exp(Box::new(arg)),
        }
    }

    /// Logistic `scale / (1 + e^(-steepness * (self - center)))`.
    pub fn logistic(self, scale: f64, steepness: f64, center: f64) -> Self {
        scale / (1.0 + (-steepness * (self - center)).exp())
    }

    /// Sums the items, yielding zero for an empty iterator.
    pub fn sum<I: IntoIterator<Item = Expr>>(items: I) -> Self {
        items.into_iter().fold(Expr::zero(), |acc, e| acc + e)
    }

    pub fn depends_on(&self, wrt: &Symbol) -> bool {
        match self {
            Expr::Number(_) => false,
            Expr::Symbol(s) => s == wrt,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.depends_on(wrt) || b.depends_on(wrt)
            }
            Expr::Powi(a, _) | Expr::Neg(a) | Expr::Exp(a) => a.depends_on(wrt),
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<Symbol>) {
        match self {
            Expr::Number(_) => {}
            Expr::Symbol(s) => {
                out.insert(s.clone());
            }
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
            Expr::Powi(a, _) | Expr::Neg(a) | Expr::Exp(a) => a.collect_symbols(out),
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Expr::Number(_) | Expr::Symbol(_) => 1,
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                1 + a.node_count() + b.node_count()
            }
            Expr::Powi(a, _) | Expr::Neg(a) | Expr::Exp(a) => 1 + a.node_count(),
        }
    }

    /// Partial derivative with respect to `wrt`.
    pub fn diff(&self, wrt: &Symbol) -> Expr {
        if !self.depends_on(wrt) {
            return Expr::zero();
        }
        match self {
            Expr::Number(_) => Expr::zero(),
            Expr::Symbol(_) => Expr::one(),
            Expr::Add(a, b) => a.diff(wrt) + b.diff(wrt),
            Expr::Sub(a, b) => a.diff(wrt) - b.diff(wrt),
            Expr::Mul(a, b) => {
                a.diff(wrt) * b.as_ref().clone() + a.as_ref().clone() * b.diff(wrt)
            }
            Expr::Div(a, b) => {
                if !b.depends_on(wrt) {
                    a.diff(wrt) / b.as_ref().clone()
                } else {
                    let numerator =
                        a.diff(wrt) * b.as_ref().clone() - a.as_ref().clone() * b.diff(wrt);
                    numerator / b.as_ref().clone().powi(2)
                }
            }
            Expr::Powi(a, n) => f64::from(*n) * a.as_ref().clone().powi(n - 1) * a.diff(wrt),
            Expr::Neg(a) => -a.diff(wrt),
            Expr::Exp(a) => self.clone() * a.diff(wrt),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Symbol(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::Symbol(symbol.clone())
    }
}

impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Number(a), Expr::Number(b)) => Expr::Number(a + b),
            (Expr::Number(z), e) | (e, Expr::Number(z)) if z == 0.0 => e,
            (a, b) => Expr::Add(Box::new(a), Box::new(b)),
        }
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Number(a), Expr::Number(b)) => Expr::Number(a - b),
            (e, Expr::Number(z)) if z == 0.0 => e,
            (Expr::Number(z), e) if z == 0.0 => -e,
            (Expr::Symbol(a), Expr::Symbol(b)) if a == b => Expr::zero(),
            (a, b) => Expr::Sub(Box::new(a), Box::new(b)),
        }
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Number(a), Expr::Number(b)) => Expr::Number(a * b),
            (Expr::Number(z), _) | (_, Expr::Number(z)) if z == 0.0 => Expr::zero(),
            (Expr::Number(o), e) | (e, Expr::Number(o)) if o == 1.0 => e,
            (Expr::Number(m), e) | (e, Expr::Number(m)) if m == -1.0 => -e,
            (a, b) => Expr::Mul(Box::new(a), Box::new(b)),
        }
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        match (self, rhs) {
            (Expr::Number(a), Expr::Number(b)) => Expr::Number(a / b),
            (Expr::Number(z), _) if z == 0.0 => Expr::zero(),
            (e, Expr::Number(o)) if o == 1.0 => e,
            (a, b) => Expr::Div(Box::new(a), Box::new(b)),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Number(v) => Expr::Number(-v),
            Expr::Neg(inner) => *inner,
            e => Expr::Neg(Box::new(e)),
        }
    }
}

// Mixed arithmetic with plain numbers, e.g. `4.0 * x` or `x - 0.25`.
macro_rules! impl_number_ops {
    ($($trait:ident :: $method:ident),*) => {
        $(
            impl $trait<f64> for Expr {
                type Output = Expr;
                fn $method(self, rhs: f64) -> Expr {
                    $trait::$method(self, Expr::Number(rhs))
                }
            }

            impl $trait<Expr> for f64 {
                type Output = Expr;
                fn $method(self, rhs: Expr) -> Expr {
                    $trait::$method(Expr::Number(self), rhs)
                }
            }
        )*
    };
}

impl_number_ops!(Add::add, Sub::sub, Mul::mul, Div::div);

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{v}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a}*{b})"),
            Expr::Div(a, b) => write!(f, "({a}/{b})"),
            Expr::Powi(a, n) => write!(f, "{a}^{n}"),
            Expr::Neg(a) => write!(f, "-{a}"),
            Expr::Exp(a) => write!(f, "exp({a})"),
        }
    }
}
