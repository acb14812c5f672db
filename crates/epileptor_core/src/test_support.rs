use crate::equation_engine::{Bindings, Value};
use crate::symbols::{Shape, VarMap};
use nalgebra::DMatrix;

/// Base value of a variable near a typical interictal operating point.
fn base_value(name: &str) -> f64 {
    match name {
        "x1" => -1.4,
        "y1" => -8.5,
        "z" => 3.6,
        "x2" => -0.9,
        "y2" => 0.05,
        "g" => -0.1,
        "x0_var" | "x0" => -2.2,
        "slope_var" | "slope" => 0.2,
        "Iext1_var" | "Iext1" => 3.1,
        "Iext2_var" | "Iext2" => 0.45,
        "K_var" | "K" => 0.8,
        "a" => 1.0,
        "b" => 3.0,
        "d" => 5.0,
        "yc" => 1.0,
        "x0cr" => 2.46,
        "r" => 0.4,
        "s" => 6.0,
        "gamma" => 0.01,
        "tau1" => 1.0,
        "tau0" => 30.0,
        "tau2" => 10.0,
        _ => 0.5,
    }
}

/// Binds every variable in `vars` with region-dependent values, so that a
/// wrong column or row index shows up as a numeric difference.
pub(crate) fn sample_bindings(vars: &VarMap) -> Bindings {
    vars.iter()
        .map(|(name, group)| {
            let base = base_value(name);
            let value = match group.shape() {
                Shape::Scalar => Value::Scalar(base),
                Shape::Vector(n) => {
                    Value::from((0..n).map(|i| base + 0.07 * i as f64).collect::<Vec<_>>())
                }
                Shape::Matrix(rows, cols) => Value::Matrix(DMatrix::from_fn(rows, cols, |i, j| {
                    if i == j {
                        0.0
                    } else {
                        0.1 + 0.05 * (i + 2 * j) as f64
                    }
                })),
            };
            (name.to_string(), value)
        })
        .collect()
}
