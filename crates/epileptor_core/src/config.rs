//! Model configuration: network size, model variant and branch selectors.

use crate::error::{Result, SymbolicError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Algebraic form of the permittivity (z) equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ZMode {
    /// Linear in x1.
    #[default]
    Lin,
    /// Logistic in x1, centered at x1 = -0.5.
    Sig,
}

impl FromStr for ZMode {
    type Err = SymbolicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lin" => Ok(ZMode::Lin),
            "sig" => Ok(ZMode::Sig),
            other => Err(SymbolicError::InvalidMode {
                kind: "zmode",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ZMode {
    type Error = SymbolicError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ZMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ZMode::Lin => "lin",
            ZMode::Sig => "sig",
        })
    }
}

/// Driver of the slope/Iext2 equilibria in the 11-variable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum PMode {
    #[default]
    #[serde(rename = "const")]
    Const,
    #[serde(rename = "g")]
    G,
    #[serde(rename = "z")]
    Z,
    #[serde(rename = "z*g")]
    ZG,
}

impl FromStr for PMode {
    type Err = SymbolicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "const" => Ok(PMode::Const),
            "g" => Ok(PMode::G),
            "z" => Ok(PMode::Z),
            "z*g" => Ok(PMode::ZG),
            other => Err(SymbolicError::InvalidMode {
                kind: "pmode",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PMode {
    type Error = SymbolicError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for PMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PMode::Const => "const",
            PMode::G => "g",
            PMode::Z => "z",
            PMode::ZG => "z*g",
        })
    }
}

const STATES_2D: &[&str] = &["x1", "z"];
const STATES_6D: &[&str] = &["x1", "y1", "z", "x2", "y2", "g"];
const STATES_11D: &[&str] = &[
    "x1", "y1", "z", "x2", "y2", "g", "x0_var", "slope_var", "Iext1_var", "Iext2_var", "K_var",
];

/// Number of state variables per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum ModelVariant {
    /// Reduced (x1, z) model.
    TwoVariable,
    #[default]
    SixVariable,
    /// Six-variable model plus slowly varying parameter states.
    ElevenVariable,
}

impl ModelVariant {
    /// Canonical state order: the order of the assembled dfun rows and of the
    /// Jacobian columns.
    pub fn state_names(self) -> &'static [&'static str] {
        match self {
            ModelVariant::TwoVariable => STATES_2D,
            ModelVariant::SixVariable => STATES_6D,
            ModelVariant::ElevenVariable => STATES_11D,
        }
    }

    pub fn state_count(self) -> usize {
        self.state_names().len()
    }
}

impl TryFrom<usize> for ModelVariant {
    type Error = SymbolicError;

    fn try_from(model_vars: usize) -> Result<Self> {
        match model_vars {
            2 => Ok(ModelVariant::TwoVariable),
            6 => Ok(ModelVariant::SixVariable),
            11 => Ok(ModelVariant::ElevenVariable),
            other => Err(SymbolicError::UnsupportedModelVariant(other)),
        }
    }
}

impl From<ModelVariant> for usize {
    fn from(variant: ModelVariant) -> Self {
        variant.state_count()
    }
}

/// Branch selector for a piecewise equation, either uniform over the network
/// or given per region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionMask {
    Uniform(bool),
    PerRegion(Vec<bool>),
}

impl Default for RegionMask {
    fn default() -> Self {
        RegionMask::Uniform(true)
    }
}

impl From<bool> for RegionMask {
    fn from(value: bool) -> Self {
        RegionMask::Uniform(value)
    }
}

impl From<Vec<bool>> for RegionMask {
    fn from(values: Vec<bool>) -> Self {
        RegionMask::PerRegion(values)
    }
}

impl RegionMask {
    pub fn is_set(&self, region: usize) -> bool {
        match self {
            RegionMask::Uniform(value) => *value,
            RegionMask::PerRegion(values) => values.get(region).copied().unwrap_or(false),
        }
    }

    pub fn check(&self, flag: &'static str, n_regions: usize) -> Result<()> {
        match self {
            RegionMask::PerRegion(values) if values.len() != n_regions => {
                Err(SymbolicError::RegionMaskLength {
                    flag,
                    expected: n_regions,
                    got: values.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_regions: usize,
    pub model_vars: ModelVariant,
    pub zmode: ZMode,
    /// Selects the quadratic fast-state branch where set.
    pub x1_neg: RegionMask,
    /// Silences the y2 ramp where set.
    pub x2_neg: RegionMask,
    pub pmode: PMode,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_regions: 1,
            model_vars: ModelVariant::default(),
            zmode: ZMode::default(),
            x1_neg: RegionMask::default(),
            x2_neg: RegionMask::default(),
            pmode: PMode::default(),
        }
    }
}

impl ModelConfig {
    pub fn new(n_regions: usize, model_vars: ModelVariant) -> Self {
        Self {
            n_regions,
            model_vars,
            ..Self::default()
        }
    }

    /// Like [`ModelConfig::new`] with the variant given as a state count.
    pub fn try_new(n_regions: usize, model_vars: usize) -> Result<Self> {
        Ok(Self::new(n_regions, ModelVariant::try_from(model_vars)?))
    }

    pub fn with_zmode(mut self, zmode: ZMode) -> Self {
        self.zmode = zmode;
        self
    }

    pub fn with_pmode(mut self, pmode: PMode) -> Self {
        self.pmode = pmode;
        self
    }

    pub fn with_x1_neg(mut self, mask: impl Into<RegionMask>) -> Self {
        self.x1_neg = mask.into();
        self
    }

    pub fn with_x2_neg(mut self, mask: impl Into<RegionMask>) -> Self {
        self.x2_neg = mask.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_regions(self.n_regions)?;
        self.x1_neg.check("x1_neg", self.n_regions)?;
        self.x2_neg.check("x2_neg", self.n_regions)
    }

    /// Parses and validates a JSON configuration. Missing fields take their
    /// defaults. Unknown modes and variants are reported as [`SymbolicError`].
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(json).context("Failed to parse model configuration.")?;
        if let Some(mode) = raw.get("zmode").and_then(serde_json::Value::as_str) {
            mode.parse::<ZMode>()?;
        }
        if let Some(mode) = raw.get("pmode").and_then(serde_json::Value::as_str) {
            mode.parse::<PMode>()?;
        }
        if let Some(vars) = raw.get("model_vars").and_then(serde_json::Value::as_u64) {
            ModelVariant::try_from(usize::try_from(vars).unwrap_or(usize::MAX))?;
        }

        let config: ModelConfig =
            serde_json::from_value(raw).context("Failed to parse model configuration.")?;
        config.validate()?;
        Ok(config)
    }

    pub fn state_dim(&self) -> usize {
        self.n_regions * self.model_vars.state_count()
    }
}

pub(crate) fn check_regions(n_regions: usize) -> Result<()> {
    if n_regions == 0 {
        return Err(SymbolicError::InvalidRegionCount(n_regions));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_from_strings() {
        assert_eq!("sig".parse::<ZMode>().unwrap(), ZMode::Sig);
        assert_eq!("z*g".parse::<PMode>().unwrap(), PMode::ZG);
        let err = "cubic".parse::<ZMode>().expect_err("unknown zmode");
        assert_eq!(
            err,
            SymbolicError::InvalidMode {
                kind: "zmode",
                value: "cubic".to_string()
            }
        );
        assert!(matches!(
            "linear".parse::<PMode>(),
            Err(SymbolicError::InvalidMode { kind: "pmode", .. })
        ));
    }

    #[test]
    fn model_variant_accepts_only_known_sizes() {
        assert_eq!(ModelVariant::try_from(11).unwrap(), ModelVariant::ElevenVariable);
        assert_eq!(
            ModelVariant::try_from(3),
            Err(SymbolicError::UnsupportedModelVariant(3))
        );
        assert_eq!(ModelVariant::SixVariable.state_names(), STATES_6D);
    }

    #[test]
    fn json_config_uses_defaults_and_masks() {
        let config = ModelConfig::from_json(
            r#"{"n_regions": 3, "model_vars": 2, "zmode": "sig", "x1_neg": [true, false, true]}"#,
        )
        .expect("valid config");
        assert_eq!(config.model_vars, ModelVariant::TwoVariable);
        assert_eq!(config.zmode, ZMode::Sig);
        assert!(!config.x1_neg.is_set(1));
        assert!(config.x2_neg.is_set(2));
        assert_eq!(config.pmode, PMode::Const);
        assert_eq!(config.state_dim(), 6);
    }

    #[test]
    fn json_config_rejects_bad_values() {
        assert!(ModelConfig::from_json(r#"{"model_vars": 3}"#).is_err());
        assert!(ModelConfig::from_json(r#"{"zmode": "cubic"}"#).is_err());
        let err = ModelConfig::from_json(r#"{"n_regions": 2, "x2_neg": [true]}"#)
            .expect_err("mask too short");
        assert!(err.to_string().contains("x2_neg"), "unexpected error: {err}");
    }

    #[test]
    fn json_mode_errors_are_typed() {
        let err = ModelConfig::from_json(r#"{"zmode": "cubic"}"#).expect_err("bad zmode");
        assert_eq!(
            err.downcast_ref::<SymbolicError>(),
            Some(&SymbolicError::InvalidMode {
                kind: "zmode",
                value: "cubic".to_string()
            })
        );

        let err = ModelConfig::from_json(r#"{"pmode": "x"}"#).expect_err("bad pmode");
        assert!(matches!(
            err.downcast_ref::<SymbolicError>(),
            Some(SymbolicError::InvalidMode { kind: "pmode", .. })
        ));

        let err = ModelConfig::from_json(r#"{"model_vars": 3}"#).expect_err("3 variables");
        assert_eq!(
            err.downcast_ref::<SymbolicError>(),
            Some(&SymbolicError::UnsupportedModelVariant(3))
        );
    }

    #[test]
    fn modes_deserialize_through_from_str() {
        assert_eq!(serde_json::from_str::<PMode>(r#""z*g""#).unwrap(), PMode::ZG);
        let err = serde_json::from_str::<ZMode>(r#""cubic""#).expect_err("unknown zmode");
        assert!(err.to_string().contains("Unknown zmode 'cubic'"), "{err}");
    }

    #[test]
    fn zero_regions_is_invalid() {
        let err = ModelConfig::new(0, ModelVariant::TwoVariable)
            .validate()
            .expect_err("empty network");
        assert_eq!(err, SymbolicError::InvalidRegionCount(0));
    }

    #[test]
    fn config_serializes_model_vars_as_number() {
        let json = serde_json::to_string(&ModelConfig::new(2, ModelVariant::ElevenVariable))
            .expect("serializable");
        assert!(json.contains("\"model_vars\":11"), "{json}");
        assert!(json.contains("\"pmode\":\"const\""), "{json}");
    }
}
