//! Sparse tensor encodings and their canonical form.
//!
//! Two encodings are the same when their level types, resolved dimension
//! ordering and bit widths agree. Source spelling does not matter: spacing,
//! line breaks, dimension names in the affine map and the radix of the bit
//! widths all disappear in the [`CanonicalKey`].

use std::fmt;

/// Storage kind of one tensor level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LevelType {
    Dense,
    Compressed,
    Singleton,
}

impl LevelType {
    /// Look up a level type by its attribute spelling, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dense" => Some(LevelType::Dense),
            "compressed" => Some(LevelType::Compressed),
            "singleton" => Some(LevelType::Singleton),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LevelType::Dense => "dense",
            LevelType::Compressed => "compressed",
            LevelType::Singleton => "singleton",
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dimension permutation: `perm[i]` is the source dimension stored at
/// level `i`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimOrdering {
    perm: Vec<usize>,
}

impl DimOrdering {
    pub fn identity(rank: usize) -> Self {
        Self {
            perm: (0..rank).collect(),
        }
    }

    /// Build an ordering from a permutation, rejecting anything that is not
    /// a bijection over `0..perm.len()`.
    pub fn from_permutation(perm: Vec<usize>) -> Option<Self> {
        let mut seen = vec![false; perm.len()];
        for &p in &perm {
            if p >= perm.len() || seen[p] {
                return None;
            }
            seen[p] = true;
        }
        Some(Self { perm })
    }

    /// Resolve `affine_map<(dims) -> (results)>` where every result is a bare
    /// dimension name.
    pub fn from_affine_map(dims: &[&str], results: &[&str]) -> Option<Self> {
        if dims.len() != results.len() {
            return None;
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return None;
            }
        }
        let perm = results
            .iter()
            .map(|r| dims.iter().position(|d| d == r))
            .collect::<Option<Vec<_>>>()?;
        Self::from_permutation(perm)
    }

    pub fn rank(&self) -> usize {
        self.perm.len()
    }

    pub fn is_identity(&self) -> bool {
        self.perm.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// True for the rank-2 transpose `(d0, d1) -> (d1, d0)`.
    pub fn is_transpose(&self) -> bool {
        self.perm == [1, 0]
    }
}

/// Renders as an affine map over `d0..dn`.
impl fmt::Display for DimOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("affine_map<(")?;
        for i in 0..self.rank() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{i}")?;
        }
        f.write_str(") -> (")?;
        for (i, p) in self.perm.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{p}")?;
        }
        f.write_str(")>")
    }
}

/// One parsed `#sparse_tensor.encoding<{...}>` literal.
///
/// `dim_ordering` keeps track of whether the source spelled an ordering at
/// all; alias naming depends on it even though equality does not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingLiteral {
    pub level_types: Vec<LevelType>,
    pub dim_ordering: Option<DimOrdering>,
    pub pointer_bit_width: u32,
    pub index_bit_width: u32,
}

impl EncodingLiteral {
    pub fn rank(&self) -> usize {
        self.level_types.len()
    }

    /// The ordering in effect, with an absent ordering meaning identity.
    pub fn ordering(&self) -> DimOrdering {
        self.dim_ordering
            .clone()
            .unwrap_or_else(|| DimOrdering::identity(self.rank()))
    }

    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey {
            level_types: self.level_types.clone(),
            ordering: self.ordering().perm,
            pointer_bit_width: self.pointer_bit_width,
            index_bit_width: self.index_bit_width,
        }
    }
}

/// Single-line attribute syntax, as `mlir-opt` prints it inline.
impl fmt::Display for EncodingLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#sparse_tensor.encoding<{ dimLevelType = [ ")?;
        for (i, level) in self.level_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "\"{level}\"")?;
        }
        f.write_str(" ]")?;
        if let Some(ordering) = &self.dim_ordering {
            write!(f, ", dimOrdering = {ordering}")?;
        }
        write!(
            f,
            ", pointerBitWidth = {}, indexBitWidth = {} }}>",
            self.pointer_bit_width, self.index_bit_width
        )
    }
}

/// Whitespace-independent identity of an encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    level_types: Vec<LevelType>,
    ordering: Vec<usize>,
    pointer_bit_width: u32,
    index_bit_width: u32,
}

/// `dense,compressed;(1,0);64;64`
impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.level_types.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{level}")?;
        }
        f.write_str(";(")?;
        for (i, p) in self.ordering.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ");{};{}", self.pointer_bit_width, self.index_bit_width)
    }
}
