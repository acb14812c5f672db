//! Equilibrium targets for the slowly varying slope and Iext2 states.
//!
//! The 11-variable model relaxes `slope_var` and `Iext2_var` toward targets
//! that may depend on the permittivity `z` and the gain `g`. The assembler
//! receives the provider as a collaborator so alternative model definitions
//! can be injected.

use crate::config::PMode;
use crate::expr::Expr;

pub trait SlowParameterTargets {
    /// Returns `(slope_eq, Iext2_eq)` for one region.
    fn targets(&self, z: &Expr, g: &Expr, pmode: PMode, slope: &Expr, iext2: &Expr) -> (Expr, Expr);
}

/// Targets of the realistic Epileptor: in `const` mode the parameters are
/// their own targets; otherwise both are scaled down by a logistic drive of
/// `g`, `z` or their product, which is close to zero at rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealisticTargets;

impl RealisticTargets {
    fn drive(z: &Expr, g: &Expr, pmode: PMode) -> Option<Expr> {
        match pmode {
            PMode::Const => None,
            PMode::G => Some(g.clone().logistic(1.0, 10.0, 0.5)),
            // z falls toward seizure onset.
            PMode::Z => Some(z.clone().logistic(1.0, -10.0, 3.0)),
            PMode::ZG => Some((z.clone() * g.clone()).logistic(1.0, 10.0, 0.5)),
        }
    }
}

impl SlowParameterTargets for RealisticTargets {
    fn targets(&self, z: &Expr, g: &Expr, pmode: PMode, slope: &Expr, iext2: &Expr) -> (Expr, Expr) {
        match Self::drive(z, g, pmode) {
            None => (slope.clone(), iext2.clone()),
            Some(xp) => {
                let keep = 1.0 - xp;
                (keep.clone() * slope.clone(), keep * iext2.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::Symbol;

    fn inputs() -> (Expr, Expr, Expr, Expr) {
        (
            Expr::from(Symbol::region("z", 0)),
            Expr::from(Symbol::region("g", 0)),
            Expr::from(Symbol::region("slope", 0)),
            Expr::from(Symbol::region("Iext2", 0)),
        )
    }

    #[test]
    fn const_mode_returns_parameters_unchanged() {
        let (z, g, slope, iext2) = inputs();
        let (s, i) = RealisticTargets.targets(&z, &g, PMode::Const, &slope, &iext2);
        assert_eq!(s, slope);
        assert_eq!(i, iext2);
    }

    #[test]
    fn driven_modes_depend_on_their_driver() {
        let (z, g, slope, iext2) = inputs();
        let zs = Symbol::region("z", 0);
        let gs = Symbol::region("g", 0);

        let (s, _) = RealisticTargets.targets(&z, &g, PMode::G, &slope, &iext2);
        assert!(s.depends_on(&gs) && !s.depends_on(&zs));

        let (_, i) = RealisticTargets.targets(&z, &g, PMode::Z, &slope, &iext2);
        assert!(i.depends_on(&zs) && !i.depends_on(&gs));

        let (s, i) = RealisticTargets.targets(&z, &g, PMode::ZG, &slope, &iext2);
        assert!(s.depends_on(&zs) && s.depends_on(&gs));
        assert!(i.depends_on(&Symbol::region("Iext2", 0)));
    }
}
