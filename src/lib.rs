//! Hoist sparse tensor encodings in MLIR modules into attribute aliases.
//!
//! ```text
//!   text ──► SyntaxChecker ──► scan_module ──► RewritePlan::build ──► RewritePlan::apply
//!                                                   │
//!                                                   └─► AliasNamer (first sight of a key)
//! ```

pub mod checker;
pub mod cli;
pub mod diagnostics;
pub mod errors;
pub mod namer;
pub mod pipeline;
pub mod rewrite;

pub use checker::{ExternalChecker, SyntaxChecker};
pub use errors::{TersifyError, TersifyErrorKind, TersifyResult};
pub use namer::AliasNamer;
pub use pipeline::{Tersifier, tersify};
pub use rewrite::{AliasBinding, AliasOrder, BindingOrigin, Replacement, RewritePlan};
