use crate::equation_engine::{CompiledFunction, Parameter};
use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::symbols::{SymbolGenerator, SymbolGroup, VarMap};
use tracing::trace;

/// Difference coupling between regions.
#[derive(Debug, Clone)]
pub struct CouplingTerm {
    /// Arguments: `x1`, the strength vector, `w`.
    pub function: CompiledFunction,
    /// One expression per row of the requested subset.
    pub exprs: Vec<Expr>,
    pub vars: VarMap,
}

/// Builds `coupling[i] = K[i] * sum_j w[i][j] * (x1[j] - x1[i])` for `i` in
/// `ix` and `j` in `jx`; both default to every region.
///
/// `strength` names the per-region coupling strength vector (`"K"` normally).
/// An empty `ix` yields no rows; an empty `jx` yields a zero row per `i`.
pub fn eqtn_coupling(
    n_regions: usize,
    ix: Option<&[usize]>,
    jx: Option<&[usize]>,
    strength: &str,
) -> Result<CouplingTerm> {
    let all: Vec<usize> = (0..n_regions).collect();
    let ix = ix.unwrap_or(&all);
    let jx = jx.unwrap_or(&all);
    if let Some(&index) = ix.iter().chain(jx).find(|&&i| i >= n_regions) {
        return Err(SymbolicError::IndexOutOfRange { index, n_regions });
    }

    let generator = SymbolGenerator::new(n_regions);
    let ([x1, k], mut vars) = generator.vectors(["x1", strength]);
    let w = generator.matrix("w");

    let exprs: Vec<Expr> = ix
        .iter()
        .map(|&i| {
            let diffusion = Expr::sum(jx.iter().map(|&j| {
                Expr::from(&w[i][j]) * (Expr::from(&x1[j]) - Expr::from(&x1[i]))
            }));
            Expr::from(&k[i]) * diffusion
        })
        .collect();

    vars.insert("w", SymbolGroup::Matrix(w));
    let params = Parameter::list(&vars, &["x1", strength, "w"])?;
    let function = CompiledFunction::compile(params, &exprs)?;
    trace!(n_regions, rows = ix.len(), cols = jx.len(), "built coupling");

    Ok(CouplingTerm {
        function,
        exprs,
        vars,
    })
}
