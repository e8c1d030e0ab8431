//! Alias naming for sparse tensor encodings.
//!
//! Names are derived from structure: `SparseVec`, `CSR`, `CSX`, `CSC`, or a
//! numbered `SparseTensor` fallback, followed by the bit widths. A name is
//! never handed out twice in one run and never shadows an identifier the
//! input already uses.

use std::collections::HashSet;

use tersify_ir::{EncodingLiteral, LevelType};

/// Structural shape of an encoding, as far as naming cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// One compressed level.
    SparseVector,
    /// Dense then compressed, explicit identity ordering.
    RowMajor,
    /// Dense then compressed, no ordering given.
    Unordered,
    /// Dense then compressed, dimensions swapped.
    ColumnMajor,
    /// Anything else.
    Other,
}

impl Shape {
    pub fn of(literal: &EncodingLiteral) -> Self {
        match literal.level_types.as_slice() {
            [LevelType::Compressed] => Shape::SparseVector,
            [LevelType::Dense, LevelType::Compressed] => match &literal.dim_ordering {
                None => Shape::Unordered,
                Some(ordering) if ordering.is_identity() => Shape::RowMajor,
                Some(ordering) if ordering.is_transpose() => Shape::ColumnMajor,
                Some(_) => Shape::Other,
            },
            _ => Shape::Other,
        }
    }
}

/// Hands out alias names for one run.
#[derive(Debug, Default)]
pub struct AliasNamer {
    taken: HashSet<String>,
    /// Next disambiguator for the `SparseTensor` fallback.
    next_generic: usize,
}

impl AliasNamer {
    /// Create a namer that will never produce any of `reserved`.
    pub fn new(reserved: impl IntoIterator<Item = String>) -> Self {
        Self {
            taken: reserved.into_iter().collect(),
            next_generic: 0,
        }
    }

    /// Pick a fresh name for `literal`, the first-seen spelling of its
    /// encoding.
    pub fn name(&mut self, literal: &EncodingLiteral) -> String {
        let widths = (literal.pointer_bit_width, literal.index_bit_width);
        let candidate = match Shape::of(literal) {
            Shape::SparseVector => format!("SparseVec{}", width_suffix(widths)),
            Shape::RowMajor => format!("CSR{}", width_suffix(widths)),
            Shape::Unordered => format!("CSX{}", width_suffix(widths)),
            Shape::ColumnMajor => format!("CSC{}", width_suffix(widths)),
            Shape::Other => {
                let n = self.next_generic;
                self.next_generic += 1;
                format!("SparseTensor{n}{}", width_suffix(widths))
            }
        };
        self.claim(candidate)
    }

    fn claim(&mut self, candidate: String) -> String {
        let mut name = candidate.clone();
        let mut suffix = 0;
        while self.taken.contains(&name) {
            suffix += 1;
            name = format!("{candidate}_{suffix}");
        }
        self.taken.insert(name.clone());
        name
    }
}

/// `64` when both widths agree, `_p64_i32` otherwise.
fn width_suffix((pointer, index): (u32, u32)) -> String {
    if pointer == index {
        pointer.to_string()
    } else {
        format!("_p{pointer}_i{index}")
    }
}
