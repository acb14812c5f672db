use num_traits::Num;
use std::fmt::Debug;
use std::ops::Neg;

/// A trait for types that compiled expressions can be evaluated over.
/// Implemented for `f64` and for the forward-mode `Dual` number.
pub trait Scalar: Num + Neg<Output = Self> + Copy + Debug + 'static {
    fn from_f64(value: f64) -> Self;
    fn exp(self) -> Self;
    fn powi(self, n: i32) -> Self;
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn powi(self, n: i32) -> Self {
        f64::powi(self, n)
    }
}

/// Represents an autonomous or time-dependent vector field.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt into
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}
