//! The `epileptor_core` crate builds the Epileptor neural-mass model as symbolic
//! equations and compiles them into numeric functions.
//!
//! Key components:
//! - **Symbols**: `SymbolGenerator` and `VarMap`, the per-region and per-pair names every builder shares.
//! - **Equations**: one builder per state derivative, plus the inter-regional `coupling` term.
//! - **Dfun**: the assembled right-hand side for the 2-, 6- and 11-variable models.
//! - **Jacobian**: symbolic derivatives of the dfun with respect to the state, in the same order.
//! - **Equation Engine**: a bytecode VM that evaluates compiled expressions over `f64` or `Dual`.
//! - **Stability**: eigenvalue classification of an evaluated Jacobian.
pub mod autodiff;
pub mod config;
pub mod coupling;
pub mod dfun;
pub mod equation_engine;
pub mod equations;
pub mod error;
pub mod expr;
pub mod jacobian;
pub mod stability;
pub mod symbols;
pub mod targets;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::{ModelConfig, ModelVariant, PMode, RegionMask, ZMode};
pub use dfun::{build_dfun, BoundSystem, Dfun};
pub use equation_engine::{Bindings, CompiledFunction, Value};
pub use error::{Result, SymbolicError};
pub use jacobian::{build_jacobian, Jacobian};
pub use symbols::{sym_vars, Symbol, SymbolGenerator, VarMap};
pub use targets::{RealisticTargets, SlowParameterTargets};
