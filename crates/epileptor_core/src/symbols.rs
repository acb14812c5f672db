//! Symbol generation and the variable map.
//!
//! Every per-region quantity of the Epileptor network is represented by one
//! [`Symbol`] per region (a *Symbol Vector*), pairwise quantities such as the
//! connectivity weights by an `N x N` *Symbol Matrix*. The [`VarMap`] ties a
//! base name (`"x1"`, `"w"`, ...) to its symbols and is the only contract used
//! to bind numeric arrays to compiled function arguments.

use crate::error::{Result, SymbolicError};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

pub const DEFAULT_SEPARATOR: &str = "_";

/// Names that several equation groups legitimately declare. Merging two maps
/// that both define one of these is accepted as long as the definitions are
/// identical; any other repeated name is reported as a collision.
pub const SHARED_NAMES: &[&str] = &[
    // state variables referenced across equations
    "x1", "y1", "z", "x2", "y2", "g",
    "x0_var", "slope_var", "Iext1_var", "Iext2_var", "K_var",
    // time scales
    "tau1", "tau0",
    // parameters that drive more than one equation
    "x0", "slope", "Iext1", "Iext2", "K", "w",
    // shared by fz/x0 and by fx1/fy1
    "x0cr", "r", "yc",
];

/// Position of a symbol within its generated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolIndex {
    Global,
    Region(usize),
    Pair(usize, usize),
}

/// An atomic algebraic unknown identified by `(base, index)`.
///
/// The rendered name depends on the separator used at generation time but does
/// not take part in equality, hashing or ordering.
#[derive(Debug, Clone)]
pub struct Symbol {
    base: Arc<str>,
    index: SymbolIndex,
    name: Arc<str>,
}

impl Symbol {
    pub fn scalar(base: &str) -> Self {
        Self::with_separator(base, SymbolIndex::Global, DEFAULT_SEPARATOR)
    }

    pub fn region(base: &str, region: usize) -> Self {
        Self::with_separator(base, SymbolIndex::Region(region), DEFAULT_SEPARATOR)
    }

    pub fn pair(base: &str, from: usize, to: usize) -> Self {
        Self::with_separator(base, SymbolIndex::Pair(from, to), DEFAULT_SEPARATOR)
    }

    pub fn with_separator(base: &str, index: SymbolIndex, separator: &str) -> Self {
        let name = match index {
            SymbolIndex::Global => base.to_string(),
            SymbolIndex::Region(i) => format!("{base}{separator}{i}"),
            SymbolIndex::Pair(i, j) => format!("{base}{separator}{i}{separator}{j}"),
        };
        Self {
            base: Arc::from(base),
            index,
            name: Arc::from(name),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn index(&self) -> SymbolIndex {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.base == other.base
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base
            .cmp(&other.base)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Shape of a generated symbol group, also used to describe numeric arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Vector(usize),
    Matrix(usize, usize),
}

impl Shape {
    pub fn len(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
            Shape::Matrix(rows, cols) => rows * cols,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Vector(n) => write!(f, "vector[{n}]"),
            Shape::Matrix(rows, cols) => write!(f, "matrix[{rows}x{cols}]"),
        }
    }
}

/// The symbols generated for one base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolGroup {
    Scalar(Symbol),
    Vector(Vec<Symbol>),
    /// Indexed `[from][to]`.
    Matrix(Vec<Vec<Symbol>>),
}

impl SymbolGroup {
    pub fn shape(&self) -> Shape {
        match self {
            SymbolGroup::Scalar(_) => Shape::Scalar,
            SymbolGroup::Vector(v) => Shape::Vector(v.len()),
            SymbolGroup::Matrix(rows) => {
                Shape::Matrix(rows.len(), rows.first().map_or(0, Vec::len))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shape().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Symbols in slot order: region ascending, matrices row-major.
    pub fn symbols(&self) -> Vec<&Symbol> {
        match self {
            SymbolGroup::Scalar(s) => vec![s],
            SymbolGroup::Vector(v) => v.iter().collect(),
            SymbolGroup::Matrix(rows) => rows.iter().flatten().collect(),
        }
    }

    pub fn as_vector(&self) -> Option<&[Symbol]> {
        match self {
            SymbolGroup::Vector(v) => Some(v),
            _ => None,
        }
    }
}

/// Mapping from base name to its generated symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarMap {
    entries: BTreeMap<String, SymbolGroup>,
}

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts without any collision check, returning the shadowed group.
    pub fn insert(&mut self, name: impl Into<String>, group: SymbolGroup) -> Option<SymbolGroup> {
        self.entries.insert(name.into(), group)
    }

    pub fn get(&self, name: &str) -> Option<&SymbolGroup> {
        self.entries.get(name)
    }

    pub fn vector(&self, name: &str) -> Option<&[Symbol]> {
        self.get(name).and_then(SymbolGroup::as_vector)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolGroup)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Merges `other` into `self`.
    ///
    /// A name present in both maps is accepted only if it is listed in
    /// [`SHARED_NAMES`] and both definitions are identical. On a collision
    /// `self` is left unchanged.
    pub fn merge(&mut self, other: VarMap) -> Result<()> {
        for (name, incoming) in &other.entries {
            if let Some(existing) = self.entries.get(name) {
                let shared = SHARED_NAMES.contains(&name.as_str());
                if !shared || existing != incoming {
                    return Err(SymbolicError::VariableMapCollision {
                        name: name.clone(),
                        existing: existing.shape().to_string(),
                        incoming: incoming.shape().to_string(),
                    });
                }
            }
        }
        for (name, incoming) in other.entries {
            self.entries.entry(name).or_insert(incoming);
        }
        Ok(())
    }
}

/// Deterministic generator of per-region symbols.
#[derive(Debug, Clone)]
pub struct SymbolGenerator {
    n_regions: usize,
    separator: String,
}

impl SymbolGenerator {
    pub fn new(n_regions: usize) -> Self {
        Self {
            n_regions,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn n_regions(&self) -> usize {
        self.n_regions
    }

    pub fn scalar(&self, base: &str) -> Symbol {
        Symbol::with_separator(base, SymbolIndex::Global, &self.separator)
    }

    pub fn vector(&self, base: &str) -> Vec<Symbol> {
        (0..self.n_regions)
            .map(|i| Symbol::with_separator(base, SymbolIndex::Region(i), &self.separator))
            .collect()
    }

    pub fn matrix(&self, base: &str) -> Vec<Vec<Symbol>> {
        (0..self.n_regions)
            .map(|i| {
                (0..self.n_regions)
                    .map(|j| Symbol::with_separator(base, SymbolIndex::Pair(i, j), &self.separator))
                    .collect()
            })
            .collect()
    }

    /// Generates one group per name. `dims` is 0 for a region-independent
    /// scalar, 1 for a per-region vector and 2 for a per-region-pair matrix.
    pub fn generate(&self, names: &[&str], dims: u8) -> Result<(Vec<SymbolGroup>, VarMap)> {
        let build: fn(&Self, &str) -> SymbolGroup = match dims {
            0 => |g, name| SymbolGroup::Scalar(g.scalar(name)),
            1 => |g, name| SymbolGroup::Vector(g.vector(name)),
            2 => |g, name| SymbolGroup::Matrix(g.matrix(name)),
            other => return Err(SymbolicError::InvalidDimension(other)),
        };

        let mut groups = Vec::with_capacity(names.len());
        let mut vars = VarMap::new();
        for &name in names {
            let group = build(self, name);
            if vars.insert(name, group.clone()).is_some() {
                return Err(SymbolicError::VariableMapCollision {
                    name: name.to_string(),
                    existing: group.shape().to_string(),
                    incoming: group.shape().to_string(),
                });
            }
            groups.push(group);
        }
        trace!(n_regions = self.n_regions, dims, count = groups.len(), "generated symbols");
        Ok((groups, vars))
    }

    /// Per-region vectors for a fixed list of names, destructurable in place.
    pub fn vectors<const K: usize>(&self, names: [&str; K]) -> ([Vec<Symbol>; K], VarMap) {
        let symbols = names.map(|name| self.vector(name));
        let mut vars = VarMap::new();
        for (name, group) in names.iter().zip(symbols.iter()) {
            vars.insert(*name, SymbolGroup::Vector(group.clone()));
        }
        (symbols, vars)
    }
}

/// Shorthand for [`SymbolGenerator::generate`] with the default separator.
pub fn sym_vars(n_regions: usize, names: &[&str], dims: u8) -> Result<(Vec<SymbolGroup>, VarMap)> {
    SymbolGenerator::new(n_regions).generate(names, dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn vector_names_follow_region_index() {
        let (groups, vars) = sym_vars(3, &["x1"], 1).expect("vector generation");
        let names: Vec<&str> = groups[0].symbols().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["x1_0", "x1_1", "x1_2"]);
        assert_eq!(vars.get("x1"), Some(&groups[0]));
    }

    #[test]
    fn matrix_names_are_from_then_to() {
        let (groups, _) = sym_vars(2, &["w"], 2).expect("matrix generation");
        let names: Vec<&str> = groups[0].symbols().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["w_0_0", "w_0_1", "w_1_0", "w_1_1"]);
        assert_eq!(groups[0].shape(), Shape::Matrix(2, 2));
    }

    #[test]
    fn scalar_ignores_region_count() {
        let (groups, _) = sym_vars(5, &["tau0"], 0).expect("scalar generation");
        assert_eq!(groups[0], SymbolGroup::Scalar(Symbol::scalar("tau0")));
    }

    #[test]
    fn unknown_dimension_is_rejected() {
        let err = sym_vars(2, &["x1"], 3).expect_err("dims=3 must fail");
        assert_eq!(err, SymbolicError::InvalidDimension(3));
    }

    #[test]
    fn repeated_name_in_one_call_collides() {
        let err = sym_vars(2, &["x1", "x1"], 1).expect_err("duplicate names must fail");
        assert!(matches!(err, SymbolicError::VariableMapCollision { .. }));
    }

    #[test]
    fn separator_changes_names_but_not_identity() {
        let dotted = SymbolGenerator::new(2).with_separator(".").vector("z");
        assert_eq!(dotted[1].name(), "z.1");
        assert_eq!(dotted[1], Symbol::region("z", 1));
    }

    #[test]
    fn merge_accepts_identical_shared_names() {
        let (_, mut a) = sym_vars(2, &["x1", "tau1", "a"], 1).unwrap();
        let (_, b) = sym_vars(2, &["x1", "tau1", "d"], 1).unwrap();
        a.merge(b).expect("shared names merge");
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["a", "d", "tau1", "x1"]);
    }

    #[test]
    fn merge_rejects_unlisted_duplicates() {
        let (_, mut a) = sym_vars(2, &["gamma"], 1).unwrap();
        let (_, b) = sym_vars(2, &["gamma"], 1).unwrap();
        let err = a.merge(b).expect_err("gamma is not shared");
        assert!(matches!(err, SymbolicError::VariableMapCollision { ref name, .. } if name == "gamma"));
    }

    #[test]
    fn failed_merge_leaves_map_untouched() {
        let (_, mut a) = sym_vars(2, &["gamma"], 1).unwrap();
        let (_, b) = sym_vars(2, &["d", "gamma"], 1).unwrap();
        assert!(a.merge(b).is_err());
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["gamma"]);
    }

    #[test]
    fn merge_rejects_arity_change() {
        let (_, mut a) = sym_vars(2, &["K"], 1).unwrap();
        let (_, b) = sym_vars(2, &["K"], 0).unwrap();
        let err = a.merge(b).expect_err("vector vs scalar K");
        assert_eq!(
            err,
            SymbolicError::VariableMapCollision {
                name: "K".to_string(),
                existing: "vector[2]".to_string(),
                incoming: "scalar".to_string(),
            }
        );
    }

    proptest! {
        #[test]
        fn generated_names_are_unique(n in 1usize..12) {
            let (groups, _) = sym_vars(n, &["x1", "z"], 1).unwrap();
            let (matrix, _) = sym_vars(n, &["w"], 2).unwrap();
            let mut seen = HashSet::new();
            for group in groups.iter().chain(matrix.iter()) {
                for symbol in group.symbols() {
                    prop_assert!(seen.insert(symbol.name().to_string()));
                }
            }
            prop_assert_eq!(seen.len(), 2 * n + n * n);
        }

        #[test]
        fn generation_is_deterministic(n in 0usize..8) {
            let first = sym_vars(n, &["y1", "w"], 1).unwrap();
            let second = sym_vars(n, &["y1", "w"], 1).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
