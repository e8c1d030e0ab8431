//! Text-level support for sparse tensor encodings in MLIR modules.
//!
//! This crate never builds an IR. It scans module text for
//! `#sparse_tensor.encoding<{...}>` literals, parses each one into an
//! [`EncodingLiteral`], and offers a structural syntax check that stands in
//! for a real MLIR verifier.
//!
//! ```text
//!   module text ──► scan_module ──► ScannedModule { occurrences, declarations, identifiers }
//!                                         │
//!                                         └─► EncodingLiteral::canonical_key ──► CanonicalKey
//! ```

pub mod encoding;
pub mod parser;
pub mod validation;

pub use encoding::{CanonicalKey, DimOrdering, EncodingLiteral, LevelType};
pub use parser::{
    AliasDeclaration, Occurrence, ParseError, ScannedModule, parse_encoding_literal, scan_module,
};
pub use validation::{StructuralChecker, SyntaxError};

/// A byte range in module text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
