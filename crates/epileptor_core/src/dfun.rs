//! Assembly of the full Epileptor right-hand side.
//!
//! The model variant fixes which equation builders run and in which order;
//! that order is the canonical state order shared by the dfun rows, the
//! Jacobian rows and columns, and the slot layout of the compiled system.

use crate::config::{ModelConfig, ModelVariant};
use crate::equation_engine::{Bindings, CompiledFunction, Parameter};
use crate::equations::{
    eqtn_fg, eqtn_fparam_vars, eqtn_fpop2, eqtn_fx1_2d, eqtn_fx1_6d, eqtn_fy1, eqtn_fz,
    DrivingNames, Equation, EquationSet,
};
use crate::error::{Result, SymbolicError};
use crate::expr::Expr;
use crate::symbols::{Symbol, VarMap};
use crate::targets::SlowParameterTargets;
use crate::traits::{DynamicalSystem, Scalar};
use tracing::debug;

/// The assembled system of state derivatives.
#[derive(Debug, Clone)]
pub struct Dfun {
    config: ModelConfig,
    equations: Vec<Equation>,
    vars: VarMap,
    system: CompiledFunction,
}

/// Builds the dfun for `config`. `targets` supplies the slope/Iext2
/// equilibria of the 11-variable model and is not consulted otherwise.
pub fn build_dfun(config: &ModelConfig, targets: &dyn SlowParameterTargets) -> Result<Dfun> {
    config.validate()?;
    let n = config.n_regions;

    let sets: Vec<EquationSet> = match config.model_vars {
        ModelVariant::TwoVariable => {
            let drivers = DrivingNames::default();
            vec![
                eqtn_fx1_2d(n, &config.x1_neg)?,
                eqtn_fz(n, config.zmode, &drivers)?,
            ]
        }
        ModelVariant::SixVariable => {
            let drivers = DrivingNames::default();
            vec![
                eqtn_fx1_6d(n, &config.x1_neg, &drivers)?,
                eqtn_fy1(n)?,
                eqtn_fz(n, config.zmode, &drivers)?,
                eqtn_fpop2(n, &config.x2_neg, &drivers)?,
                eqtn_fg(n)?,
            ]
        }
        ModelVariant::ElevenVariable => {
            let drivers = DrivingNames::slow_states();
            vec![
                eqtn_fx1_6d(n, &config.x1_neg, &drivers)?,
                eqtn_fy1(n)?,
                eqtn_fz(n, config.zmode, &drivers)?,
                eqtn_fpop2(n, &config.x2_neg, &drivers)?,
                eqtn_fg(n)?,
                eqtn_fparam_vars(n, config.pmode, targets)?,
            ]
        }
    };

    let mut equations = Vec::with_capacity(config.model_vars.state_count());
    let mut vars = VarMap::new();
    for set in sets {
        vars.merge(set.vars)?;
        equations.extend(set.equations);
    }
    debug_assert!(equations
        .iter()
        .map(|e| e.name.as_str())
        .eq(config.model_vars.state_names().iter().copied()));

    let params = system_parameters(&vars, config.model_vars.state_names())?;
    let flat: Vec<Expr> = equations
        .iter()
        .flat_map(|e| e.exprs.iter().cloned())
        .collect();
    let system = CompiledFunction::compile(params, &flat)?;

    debug!(
        n_regions = n,
        model_vars = config.model_vars.state_count(),
        variables = vars.len(),
        ops = system.op_count(),
        "assembled dfun"
    );

    Ok(Dfun {
        config: config.clone(),
        equations,
        vars,
        system,
    })
}

/// State groups in canonical order, then every other variable in name order.
fn system_parameters(vars: &VarMap, states: &[&str]) -> Result<Vec<Parameter>> {
    let mut params = Parameter::list(vars, states)?;
    params.extend(
        vars.iter()
            .filter(|(name, _)| !states.contains(name))
            .map(|(name, group)| Parameter::new(name, group.clone())),
    );
    Ok(params)
}

impl Dfun {
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    /// The whole system as one function over the state groups followed by
    /// the remaining variables.
    pub fn system(&self) -> &CompiledFunction {
        &self.system
    }

    pub fn state_names(&self) -> &'static [&'static str] {
        self.config.model_vars.state_names()
    }

    pub fn state_dim(&self) -> usize {
        self.config.state_dim()
    }

    /// Per-equation compiled functions in state order.
    pub fn functions(&self) -> Vec<&CompiledFunction> {
        self.equations.iter().map(|e| &e.function).collect()
    }

    /// Flattened expressions in state order.
    pub fn exprs(&self) -> Vec<&Expr> {
        self.equations.iter().flat_map(|e| e.exprs.iter()).collect()
    }

    /// The state symbols in canonical order; the Jacobian columns.
    pub fn state_symbols(&self) -> Result<Vec<Symbol>> {
        let mut symbols = Vec::with_capacity(self.state_dim());
        for &name in self.state_names() {
            let group = self
                .vars
                .vector(name)
                .ok_or_else(|| SymbolicError::UnboundVariable(name.to_string()))?;
            symbols.extend_from_slice(group);
        }
        Ok(symbols)
    }

    /// Evaluates every derivative with all variables taken from `bindings`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Vec<f64>> {
        self.system.call_named(bindings)
    }

    /// Flattens the state variables found in `bindings` into one vector.
    pub fn pack_state(&self, bindings: &Bindings) -> Result<Vec<f64>> {
        let mut slots = vec![0.0; self.system.slot_count()];
        for (index, param) in self.state_params().iter().enumerate() {
            let value = bindings
                .get(&param.name)
                .ok_or_else(|| SymbolicError::UnboundVariable(param.name.clone()))?;
            self.system.write_param(index, value, &mut slots)?;
        }
        slots.truncate(self.state_dim());
        Ok(slots)
    }

    /// Fixes every non-state variable, leaving a vector field over the state.
    pub fn bind(&self, bindings: &Bindings) -> Result<BoundSystem<'_>> {
        Ok(BoundSystem {
            function: &self.system,
            state_dim: self.state_dim(),
            template: parameter_slots(&self.system, self.state_names().len(), bindings)?,
        })
    }

    fn state_params(&self) -> &[Parameter] {
        &self.system.params()[..self.state_names().len()]
    }
}

/// Slot buffer with every parameter after the first `skip` written from
/// `bindings`; the skipped (state) slots are left at zero.
pub(crate) fn parameter_slots(
    function: &CompiledFunction,
    skip: usize,
    bindings: &Bindings,
) -> Result<Vec<f64>> {
    let mut slots = vec![0.0; function.slot_count()];
    for (index, param) in function.params().iter().enumerate().skip(skip) {
        let value = bindings
            .get(&param.name)
            .ok_or_else(|| SymbolicError::UnboundVariable(param.name.clone()))?;
        function.write_param(index, value, &mut slots)?;
    }
    Ok(slots)
}

/// A dfun with its parameters fixed, usable by any `DynamicalSystem` consumer.
pub struct BoundSystem<'a> {
    function: &'a CompiledFunction,
    state_dim: usize,
    template: Vec<f64>,
}

impl<T: Scalar> DynamicalSystem<T> for BoundSystem<'_> {
    fn dimension(&self) -> usize {
        self.state_dim
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let mut slots: Vec<T> = self.template.iter().map(|&v| T::from_f64(v)).collect();
        slots[..self.state_dim].copy_from_slice(&x[..self.state_dim]);
        self.function.eval_prepared(&slots, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PMode, RegionMask, ZMode};
    use crate::targets::RealisticTargets;
    use crate::test_support::sample_bindings;

    #[test]
    fn six_variable_state_order_and_length() {
        let dfun = build_dfun(&ModelConfig::new(3, ModelVariant::SixVariable), &RealisticTargets)
            .expect("6-variable dfun");
        let names: Vec<&str> = dfun.equations().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x1", "y1", "z", "x2", "y2", "g"]);
        assert!(dfun.equations().iter().all(|e| e.exprs.len() == 3));
        assert_eq!(dfun.exprs().len(), 18);
        assert_eq!(dfun.system().output_len(), 18);
        assert_eq!(dfun.functions().len(), 6);
    }

    #[test]
    fn two_variable_system_parameters_start_with_states() {
        let dfun = build_dfun(&ModelConfig::new(1, ModelVariant::TwoVariable), &RealisticTargets)
            .unwrap();
        let names = dfun.system().param_names();
        assert_eq!(
            names,
            vec![
                "x1", "z", "Iext1", "K", "a", "b", "r", "slope", "tau0", "tau1", "w", "x0",
                "x0cr", "yc"
            ]
        );
    }

    #[test]
    fn eleven_variable_model_drives_fast_states_from_slow_states() {
        let config = ModelConfig::new(2, ModelVariant::ElevenVariable)
            .with_pmode(PMode::Z)
            .with_x1_neg(false);
        let dfun = build_dfun(&config, &RealisticTargets).expect("11-variable dfun");
        assert_eq!(dfun.equations().len(), 11);
        assert_eq!(dfun.state_dim(), 22);

        let x1_row = &dfun.equations()[0].exprs[1];
        assert!(x1_row.depends_on(&Symbol::region("slope_var", 1)));
        assert!(x1_row.depends_on(&Symbol::region("Iext1_var", 1)));
        assert!(!x1_row.depends_on(&Symbol::region("slope", 1)));

        let x2_row = &dfun.equations()[3].exprs[0];
        assert!(x2_row.depends_on(&Symbol::region("Iext2_var", 0)));
    }

    #[test]
    fn unsupported_variant_is_rejected() {
        let err = ModelConfig::try_new(4, 3).expect_err("3 variables");
        assert_eq!(err, SymbolicError::UnsupportedModelVariant(3));
    }

    #[test]
    fn invalid_region_count_fails_before_building() {
        let err = build_dfun(&ModelConfig::new(0, ModelVariant::SixVariable), &RealisticTargets)
            .expect_err("no regions");
        assert_eq!(err, SymbolicError::InvalidRegionCount(0));
    }

    #[test]
    fn system_matches_per_equation_functions() {
        let config = ModelConfig::new(2, ModelVariant::SixVariable)
            .with_zmode(ZMode::Sig)
            .with_x1_neg(vec![true, false]);
        let dfun = build_dfun(&config, &RealisticTargets).unwrap();
        let bindings = sample_bindings(dfun.vars());
        let whole = dfun.evaluate(&bindings).unwrap();
        let pieces: Vec<f64> = dfun
            .functions()
            .iter()
            .flat_map(|f| f.call_named(&bindings).unwrap())
            .collect();
        assert_eq!(whole, pieces);
    }

    #[test]
    fn bound_system_applies_state_vector() {
        let config = ModelConfig::new(2, ModelVariant::SixVariable).with_x2_neg(RegionMask::Uniform(false));
        let dfun = build_dfun(&config, &RealisticTargets).unwrap();
        let bindings = sample_bindings(dfun.vars());
        let bound = dfun.bind(&bindings).unwrap();
        let state = dfun.pack_state(&bindings).unwrap();
        assert_eq!(state.len(), 12);

        let mut out = vec![0.0; 12];
        DynamicalSystem::<f64>::apply(&bound, 0.0, &state, &mut out);
        assert_eq!(out, dfun.evaluate(&bindings).unwrap());
        assert_eq!(DynamicalSystem::<f64>::dimension(&bound), 12);
    }

    #[test]
    fn binding_reports_missing_parameters() {
        let dfun = build_dfun(&ModelConfig::new(1, ModelVariant::TwoVariable), &RealisticTargets)
            .unwrap();
        let mut bindings = sample_bindings(dfun.vars());
        bindings.remove("tau0");
        let err = dfun.bind(&bindings).err().expect("tau0 missing");
        assert_eq!(err, SymbolicError::UnboundVariable("tau0".to_string()));
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let config = ModelConfig::new(3, ModelVariant::ElevenVariable).with_pmode(PMode::ZG);
        let first = build_dfun(&config, &RealisticTargets).unwrap();
        let second = build_dfun(&config, &RealisticTargets).unwrap();
        assert_eq!(first.system(), second.system());
        let bindings = sample_bindings(first.vars());
        let a = first.evaluate(&bindings).unwrap();
        let b = second.evaluate(&bindings).unwrap();
        assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}
