//! Symbolic right-hand sides of the Epileptor state equations.
//!
//! Every builder is a pure function of the network size and its flags. It
//! returns the per-region expressions, a compiled function for them and the
//! variable map naming the function's arguments. Time derivatives carry the
//! fast time scale `tau1` as a prefactor.

use crate::config::{check_regions, PMode, RegionMask, ZMode};
use crate::coupling::eqtn_coupling;
use crate::equation_engine::{CompiledFunction, Parameter};
use crate::error::Result;
use crate::expr::Expr;
use crate::symbols::{Symbol, SymbolGenerator, VarMap};
use crate::targets::SlowParameterTargets;
use tracing::trace;

/// One derivative term (or derived quantity) over all regions.
#[derive(Debug, Clone)]
pub struct Equation {
    /// Name of the state variable this equation drives.
    pub name: String,
    pub exprs: Vec<Expr>,
    pub function: CompiledFunction,
}

/// The output of one builder.
#[derive(Debug, Clone)]
pub struct EquationSet {
    pub equations: Vec<Equation>,
    pub vars: VarMap,
}

impl EquationSet {
    pub fn functions(&self) -> Vec<&CompiledFunction> {
        self.equations.iter().map(|e| &e.function).collect()
    }

    pub fn exprs(&self) -> Vec<&[Expr]> {
        self.equations.iter().map(|e| e.exprs.as_slice()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Equation> {
        self.equations.iter().find(|e| e.name == name)
    }
}

/// Names of the quantities that drive the fast and permittivity subsystems.
///
/// The 11-variable model drives the fast subsystem from its slow `_var`
/// states instead of the constant parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivingNames {
    pub x0: &'static str,
    pub slope: &'static str,
    pub iext1: &'static str,
    pub iext2: &'static str,
    pub k: &'static str,
}

impl Default for DrivingNames {
    fn default() -> Self {
        Self {
            x0: "x0",
            slope: "slope",
            iext1: "Iext1",
            iext2: "Iext2",
            k: "K",
        }
    }
}

impl DrivingNames {
    pub fn slow_states() -> Self {
        Self {
            slope: "slope_var",
            iext1: "Iext1_var",
            iext2: "Iext2_var",
            ..Self::default()
        }
    }
}

fn at(symbols: &[Symbol], region: usize) -> Expr {
    Expr::from(&symbols[region])
}

fn equation(name: &str, vars: &VarMap, params: &[&str], exprs: Vec<Expr>) -> Result<Equation> {
    let function = CompiledFunction::compile(Parameter::list(vars, params)?, &exprs)?;
    trace!(equation = name, ops = function.op_count(), "compiled equation");
    Ok(Equation {
        name: name.to_string(),
        exprs,
        function,
    })
}

/// Fast state of the reduced 2-variable model.
///
/// `x1_neg` regions use `-a*x1^2 + b*x1`, the others
/// `slope - 5*x1 + 0.6*(z - 4)^2`, multiplied by `x1`.
pub fn eqtn_fx1_2d(n_regions: usize, x1_neg: &RegionMask) -> Result<EquationSet> {
    check_regions(n_regions)?;
    x1_neg.check("x1_neg", n_regions)?;

    let ([x1, z, yc, slope, iext1, a, b, tau1], vars) = SymbolGenerator::new(n_regions)
        .vectors(["x1", "z", "yc", "slope", "Iext1", "a", "b", "tau1"]);

    let exprs = (0..n_regions)
        .map(|i| {
            let x = at(&x1, i);
            let branch = if x1_neg.is_set(i) {
                -at(&a, i) * x.clone().powi(2) + at(&b, i) * x.clone()
            } else {
                at(&slope, i) - 5.0 * x.clone() + 0.6 * (at(&z, i) - 4.0).powi(2)
            };
            at(&tau1, i) * (at(&yc, i) - at(&z, i) + at(&iext1, i) + branch * x)
        })
        .collect();

    let fx1 = equation(
        "x1",
        &vars,
        &["x1", "z", "yc", "Iext1", "slope", "a", "b", "tau1"],
        exprs,
    )?;
    Ok(EquationSet {
        equations: vec![fx1],
        vars,
    })
}

/// Fast state of the 6- and 11-variable models, driven by `y1` and `x2`.
pub fn eqtn_fx1_6d(
    n_regions: usize,
    x1_neg: &RegionMask,
    drivers: &DrivingNames,
) -> Result<EquationSet> {
    check_regions(n_regions)?;
    x1_neg.check("x1_neg", n_regions)?;

    let ([x1, z, x2, y1, slope, iext1, a, b, tau1], vars) = SymbolGenerator::new(n_regions)
        .vectors(["x1", "z", "x2", "y1", drivers.slope, drivers.iext1, "a", "b", "tau1"]);

    let exprs = (0..n_regions)
        .map(|i| {
            let x = at(&x1, i);
            let branch = if x1_neg.is_set(i) {
                -at(&a, i) * x.clone().powi(2) + at(&b, i) * x.clone()
            } else {
                at(&slope, i) - at(&x2, i) + 0.6 * (at(&z, i) - 4.0).powi(2)
            };
            at(&tau1, i) * (at(&y1, i) - at(&z, i) + at(&iext1, i) + branch * x)
        })
        .collect();

    let fx1 = equation(
        "x1",
        &vars,
        &["x1", "z", "y1", "x2", drivers.iext1, drivers.slope, "a", "b", "tau1"],
        exprs,
    )?;
    Ok(EquationSet {
        equations: vec![fx1],
        vars,
    })
}

/// Second fast state: `tau1 * (yc - d*x1^2 - y1)`.
pub fn eqtn_fy1(n_regions: usize) -> Result<EquationSet> {
    check_regions(n_regions)?;

    let ([x1, y1, yc, d, tau1], vars) =
        SymbolGenerator::new(n_regions).vectors(["x1", "y1", "yc", "d", "tau1"]);

    let exprs = (0..n_regions)
        .map(|i| at(&tau1, i) * (at(&yc, i) - at(&d, i) * at(&x1, i).powi(2) - at(&y1, i)))
        .collect();

    let fy1 = equation("y1", &vars, &["x1", "y1", "yc", "d", "tau1"], exprs)?;
    Ok(EquationSet {
        equations: vec![fy1],
        vars,
    })
}

fn sigmoid_drive(x1: Expr) -> Expr {
    x1.logistic(3.0, 10.0, -0.5)
}

/// Permittivity. In `lin` mode
/// `tau1 * (4*(x1 - r*x0 + x0cr) - z - coupling) / tau0`; `sig` replaces the
/// linear `4*x1` by `3 / (1 + e^(-10*(x1 + 0.5)))` and drops the factor 4 on
/// the excitability terms.
pub fn eqtn_fz(n_regions: usize, zmode: ZMode, drivers: &DrivingNames) -> Result<EquationSet> {
    check_regions(n_regions)?;

    let ([x1, z, x0, x0cr, r, tau1, tau0], mut vars) = SymbolGenerator::new(n_regions)
        .vectors(["x1", "z", drivers.x0, "x0cr", "r", "tau1", "tau0"]);
    let coupling = eqtn_coupling(n_regions, None, None, drivers.k)?;
    vars.merge(coupling.vars)?;

    let exprs = coupling
        .exprs
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let excitability = at(&x0cr, i) - at(&r, i) * at(&x0, i);
            let drive = match zmode {
                ZMode::Lin => 4.0 * (at(&x1, i) + excitability),
                ZMode::Sig => sigmoid_drive(at(&x1, i)) + excitability,
            };
            at(&tau1, i) * (drive - at(&z, i) - c) / at(&tau0, i)
        })
        .collect();

    let fz = equation(
        "z",
        &vars,
        &["x1", "z", drivers.x0, "x0cr", "r", drivers.k, "w", "tau1", "tau0"],
        exprs,
    )?;
    Ok(EquationSet {
        equations: vec![fz],
        vars,
    })
}

/// Excitability `x0` that makes the permittivity equation vanish at the
/// given `(x1, z)`.
pub fn eqtn_x0(n_regions: usize, zmode: ZMode, drivers: &DrivingNames) -> Result<EquationSet> {
    check_regions(n_regions)?;

    let ([x1, z, x0cr, r], mut vars) =
        SymbolGenerator::new(n_regions).vectors(["x1", "z", "x0cr", "r"]);
    let coupling = eqtn_coupling(n_regions, None, None, drivers.k)?;
    vars.merge(coupling.vars)?;

    let exprs = coupling
        .exprs
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let x0 = match zmode {
                ZMode::Lin => at(&x1, i) + at(&x0cr, i) - (at(&z, i) + c) / 4.0,
                ZMode::Sig => sigmoid_drive(at(&x1, i)) + at(&x0cr, i) - at(&z, i) - c,
            };
            x0 / at(&r, i)
        })
        .collect();

    let x0 = equation(
        drivers.x0,
        &vars,
        &["x1", "z", "x0cr", "r", drivers.k, "w"],
        exprs,
    )?;
    Ok(EquationSet {
        equations: vec![x0],
        vars,
    })
}

/// Second population pair `(x2, y2)`.
///
/// `x2` follows a cubic oscillator fed by `g` and `z`; `y2` relaxes on the
/// `tau2` time scale toward 0 in `x2_neg` regions and toward
/// `s * (x2 + 0.25)` elsewhere.
pub fn eqtn_fpop2(
    n_regions: usize,
    x2_neg: &RegionMask,
    drivers: &DrivingNames,
) -> Result<EquationSet> {
    check_regions(n_regions)?;
    x2_neg.check("x2_neg", n_regions)?;

    let ([x2, y2, z, g, iext2, s, tau1, tau2], vars) = SymbolGenerator::new(n_regions)
        .vectors(["x2", "y2", "z", "g", drivers.iext2, "s", "tau1", "tau2"]);

    let fx2 = (0..n_regions)
        .map(|i| {
            let x = at(&x2, i);
            at(&tau1, i)
                * (-at(&y2, i) + x.clone() - x.powi(3) + at(&iext2, i) + 2.0 * at(&g, i)
                    - 0.3 * (at(&z, i) - 3.5))
        })
        .collect();

    let fy2 = (0..n_regions)
        .map(|i| {
            let ramp = if x2_neg.is_set(i) {
                Expr::zero()
            } else {
                at(&s, i) * (at(&x2, i) + 0.25)
            };
            at(&tau1, i) * (-at(&y2, i) + ramp) / at(&tau2, i)
        })
        .collect();

    let fx2 = equation(
        "x2",
        &vars,
        &["x2", "y2", "z", "g", drivers.iext2, "tau1"],
        fx2,
    )?;
    let fy2 = equation("y2", &vars, &["x2", "y2", "s", "tau1", "tau2"], fy2)?;
    Ok(EquationSet {
        equations: vec![fx2, fy2],
        vars,
    })
}

/// Gain: `-tau1 * gamma * (g - 0.1*x1)`.
pub fn eqtn_fg(n_regions: usize) -> Result<EquationSet> {
    check_regions(n_regions)?;

    let ([x1, g, gamma, tau1], vars) =
        SymbolGenerator::new(n_regions).vectors(["x1", "g", "gamma", "tau1"]);

    let exprs = (0..n_regions)
        .map(|i| -at(&tau1, i) * at(&gamma, i) * (at(&g, i) - 0.1 * at(&x1, i)))
        .collect();

    let fg = equation("g", &vars, &["x1", "g", "gamma", "tau1"], exprs)?;
    Ok(EquationSet {
        equations: vec![fg],
        vars,
    })
}

/// Slow parameter states of the 11-variable model, in the order
/// `x0_var, slope_var, Iext1_var, Iext2_var, K_var`. Each relaxes toward its
/// driving parameter (or the target returned by `targets` for slope and
/// Iext2) with time-scale multipliers 1, 10, 1/tau0, 5 and 1/tau0.
pub fn eqtn_fparam_vars(
    n_regions: usize,
    pmode: PMode,
    targets: &dyn SlowParameterTargets,
) -> Result<EquationSet> {
    check_regions(n_regions)?;

    let (
        [z, g, x0_var, slope_var, iext1_var, iext2_var, k_var, x0, slope, iext1, iext2, k, tau1, tau0],
        vars,
    ) = SymbolGenerator::new(n_regions).vectors([
        "z", "g", "x0_var", "slope_var", "Iext1_var", "Iext2_var", "K_var", "x0", "slope",
        "Iext1", "Iext2", "K", "tau1", "tau0",
    ]);

    let mut fx0 = Vec::with_capacity(n_regions);
    let mut fslope = Vec::with_capacity(n_regions);
    let mut fiext1 = Vec::with_capacity(n_regions);
    let mut fiext2 = Vec::with_capacity(n_regions);
    let mut fk = Vec::with_capacity(n_regions);

    for i in 0..n_regions {
        let t1 = at(&tau1, i);
        let (slope_eq, iext2_eq) =
            targets.targets(&at(&z, i), &at(&g, i), pmode, &at(&slope, i), &at(&iext2, i));

        fx0.push(t1.clone() * (-at(&x0_var, i) + at(&x0, i)));
        fslope.push(10.0 * t1.clone() * (-at(&slope_var, i) + slope_eq));
        fiext1.push(t1.clone() * (-at(&iext1_var, i) + at(&iext1, i)) / at(&tau0, i));
        fiext2.push(5.0 * t1.clone() * (-at(&iext2_var, i) + iext2_eq));
        fk.push(t1 * (-at(&k_var, i) + at(&k, i)) / at(&tau0, i));
    }

    let equations = vec![
        equation("x0_var", &vars, &["x0", "x0_var", "tau1"], fx0)?,
        equation(
            "slope_var",
            &vars,
            &["z", "g", "slope", "slope_var", "tau1"],
            fslope,
        )?,
        equation(
            "Iext1_var",
            &vars,
            &["Iext1", "Iext1_var", "tau1", "tau0"],
            fiext1,
        )?,
        equation(
            "Iext2_var",
            &vars,
            &["z", "g", "Iext2", "Iext2_var", "tau1"],
            fiext2,
        )?,
        equation("K_var", &vars, &["K", "K_var", "tau1", "tau0"], fk)?,
    ];
    Ok(EquationSet { equations, vars })
}
