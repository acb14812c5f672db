use crate::traits::{DynamicalSystem, Scalar};
use nalgebra::DMatrix;
use num_traits::{Num, One, Zero};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Dual number for forward-mode differentiation.
/// val: real part
/// eps: infinitesimal part
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    pub fn constant(val: f64) -> Self {
        Self::new(val, 0.0)
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / (rhs.val * rhs.val),
        )
    }
}

impl Rem for Dual {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // Only the real part is meaningful here.
        Self::constant(self.val % rhs.val)
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Num for Dual {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        Self::new(e, e * self.eps)
    }

    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        Self::new(
            self.val.powi(n),
            f64::from(n) * self.val.powi(n - 1) * self.eps,
        )
    }
}

/// Computes the Jacobian of `system` at `state` by seeding one dual direction
/// per column. Row `i`, column `j` holds d(out_i)/d(x_j).
pub fn numeric_jacobian<S>(system: &S, state: &[f64]) -> DMatrix<f64>
where
    S: DynamicalSystem<Dual>,
{
    let dim = system.dimension();
    let mut jacobian = DMatrix::zeros(dim, dim);
    let mut dual_state = vec![Dual::zero(); dim];
    let mut dual_out = vec![Dual::zero(); dim];
    let t_dual = Dual::zero();

    for j in 0..dim {
        for (i, slot) in dual_state.iter_mut().enumerate() {
            *slot = Dual::new(state[i], if i == j { 1.0 } else { 0.0 });
        }
        system.apply(t_dual, &dual_state, &mut dual_out);
        for (i, out) in dual_out.iter().enumerate() {
            jacobian[(i, j)] = out.eps;
        }
    }

    jacobian
}
