//! Symbolic Jacobian of the assembled dfun with respect to its state.

use crate::config::ModelConfig;
use crate::dfun::{build_dfun, parameter_slots, Dfun};
use crate::equation_engine::{Bindings, CompiledFunction, Value};
use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::symbols::Symbol;
use crate::targets::SlowParameterTargets;
use nalgebra::DMatrix;
use tracing::debug;

/// Row `i`, column `j` holds `d dfun_i / d state_j`, both in canonical state
/// order. The compiled form takes the same arguments as the dfun system.
#[derive(Debug, Clone)]
pub struct Jacobian {
    dfun: Dfun,
    columns: Vec<Symbol>,
    entries: Vec<Vec<Expr>>,
    function: CompiledFunction,
}

/// Differentiates every row by every column.
pub fn jacobian_of<'a>(rows: impl IntoIterator<Item = &'a Expr>, columns: &[Symbol]) -> Vec<Vec<Expr>> {
    rows.into_iter()
        .map(|row| columns.iter().map(|col| row.diff(col)).collect())
        .collect()
}

pub fn build_jacobian(config: &ModelConfig, targets: &dyn SlowParameterTargets) -> Result<Jacobian> {
    let dfun = build_dfun(config, targets)?;
    let columns = dfun.state_symbols()?;
    let entries = jacobian_of(dfun.exprs(), &columns);

    let flat: Vec<Expr> = entries.iter().flatten().cloned().collect();
    let function = CompiledFunction::compile(dfun.system().params().to_vec(), &flat)?;

    debug!(
        dim = columns.len(),
        nonzero = flat.iter().filter(|e| !e.is_zero()).count(),
        ops = function.op_count(),
        "assembled jacobian"
    );

    Ok(Jacobian {
        dfun,
        columns,
        entries,
        function,
    })
}

impl Jacobian {
    pub fn dfun(&self) -> &Dfun {
        &self.dfun
    }

    pub fn dim(&self) -> usize {
        self.columns.len()
    }

    /// State symbols, one per column.
    pub fn columns(&self) -> &[Symbol] {
        &self.columns
    }

    pub fn entries(&self) -> &[Vec<Expr>] {
        &self.entries
    }

    pub fn entry(&self, row: usize, col: usize) -> Option<&Expr> {
        self.entries.get(row).and_then(|r| r.get(col))
    }

    pub fn function(&self) -> &CompiledFunction {
        &self.function
    }

    /// Evaluates with positional arguments in the dfun system's order.
    pub fn evaluate(&self, args: &[Value]) -> Result<DMatrix<f64>> {
        let values = self.function.call(args)?;
        Ok(self.to_matrix(values))
    }

    pub fn evaluate_named(&self, bindings: &Bindings) -> Result<DMatrix<f64>> {
        let values = self.function.call_named(bindings)?;
        Ok(self.to_matrix(values))
    }

    /// Evaluates at a flat `state` with every other variable from `bindings`.
    pub fn evaluate_at(&self, state: &[f64], bindings: &Bindings) -> Result<DMatrix<f64>> {
        let dim = self.dim();
        if state.len() != dim {
            return Err(SymbolicError::ShapeMismatch {
                name: "state".to_string(),
                expected: format!("vector[{dim}]"),
                got: format!("vector[{}]", state.len()),
            });
        }
        let mut slots = parameter_slots(&self.function, self.dfun.state_names().len(), bindings)?;
        slots[..dim].copy_from_slice(state);

        let mut values = vec![0.0; dim * dim];
        self.function.eval_prepared(&slots, &mut values);
        Ok(self.to_matrix(values))
    }

    fn to_matrix(&self, row_major: Vec<f64>) -> DMatrix<f64> {
        let dim = self.dim();
        DMatrix::from_row_slice(dim, dim, &row_major)
    }
}
