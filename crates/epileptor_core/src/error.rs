use thiserror::Error;

/// Errors raised while building symbolic Epileptor systems or binding numeric
/// arrays to the functions compiled from them.
///
/// Every variant is produced synchronously, before any compiled function is
/// handed back, so a build either succeeds completely or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolicError {
    #[error("Symbol dimensionality must be 0, 1 or 2, got {0}.")]
    InvalidDimension(u8),

    #[error("Unknown {kind} '{value}'.")]
    InvalidMode { kind: &'static str, value: String },

    #[error("Model variant must have 2, 6 or 11 state variables per region, got {0}.")]
    UnsupportedModelVariant(usize),

    #[error("Variable '{name}' is redefined: {existing} vs {incoming}.")]
    VariableMapCollision {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("Number of regions must be positive, got {0}.")]
    InvalidRegionCount(usize),

    #[error("{flag} mask has {got} entries for {expected} regions.")]
    RegionMaskLength {
        flag: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Region index {index} is out of range for {n_regions} regions.")]
    IndexOutOfRange { index: usize, n_regions: usize },

    #[error("Expected {expected} arguments, got {got}.")]
    ArgumentCount { expected: usize, got: usize },

    #[error("Argument '{name}' expects {expected}, got {got}.")]
    ShapeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    #[error("No value bound for variable '{0}'.")]
    UnboundVariable(String),
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
