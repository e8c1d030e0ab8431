//! Raw (unvalidated) parse structures and winnow combinators for encoding
//! literals.
//!
//! This is the "stage 1" parser: text → `Raw*` values. Key checking,
//! level-type lookup and ordering resolution happen in [`super`].

use winnow::ascii;
use winnow::combinator::{alt, delimited, preceded, separated};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

// ============================================================================
// Error type
// ============================================================================

/// Parse error for encoding literals and module scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// Raw structures
// ============================================================================

/// The attribute keyword that opens an encoding literal.
pub(crate) const ENCODING_KEYWORD: &str = "#sparse_tensor.encoding";

/// Alias name of the encoding attribute keyword, as seen by [`alias_ref`].
pub(crate) const ENCODING_ATTR_NAME: &str = "sparse_tensor.encoding";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawAffineMap<'a> {
    pub dims: Vec<&'a str>,
    pub results: Vec<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValue<'a> {
    Strings(Vec<String>),
    AffineMap(RawAffineMap<'a>),
    AliasRef(&'a str),
    Int(u64),
}

impl RawValue<'_> {
    pub fn describe(&self) -> &'static str {
        match self {
            RawValue::Strings(_) => "a list of strings",
            RawValue::AffineMap(_) => "an affine map",
            RawValue::AliasRef(_) => "an alias reference",
            RawValue::Int(_) => "an integer",
        }
    }
}

// ============================================================================
// Winnow parsers
// ============================================================================

/// Skip whitespace.
pub(crate) fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// Parse an identifier: [a-zA-Z_][a-zA-Z0-9_]*
pub(crate) fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Parse an alias identifier: [a-zA-Z_][a-zA-Z0-9_$.]*
pub(crate) fn alias_ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }),
    )
        .take()
        .parse_next(input)
}

/// Parse an attribute alias reference: #name
pub(crate) fn alias_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded('#', alias_ident).parse_next(input)
}

/// Parse an unsigned integer literal, decimal or `0x` hexadecimal.
pub(crate) fn integer_lit(input: &mut &str) -> ModalResult<u64> {
    alt((
        preceded(alt(("0x", "0X")), ascii::hex_uint::<_, u64, _>),
        ascii::dec_uint::<_, u64, _>,
    ))
    .parse_next(input)
}

/// Parse a string literal: "content"
pub(crate) fn string_lit(input: &mut &str) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut result = String::new();
    loop {
        let c = any.parse_next(input)?;
        match c {
            '"' => break,
            '\\' => {
                let escaped = any.parse_next(input)?;
                match escaped {
                    '"' => result.push('"'),
                    '\\' => result.push('\\'),
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    _ => {
                        result.push('\\');
                        result.push(escaped);
                    }
                }
            }
            _ => result.push(c),
        }
    }
    Ok(result)
}

/// Parse a non-empty string list: [ "dense", "compressed" ]
pub(crate) fn string_list(input: &mut &str) -> ModalResult<Vec<String>> {
    delimited(
        ('[', ws),
        separated(1.., (ws, string_lit, ws).map(|(_, s, _)| s), ','),
        (ws, ']'),
    )
    .parse_next(input)
}

/// Parse a dimension list: (d0, d1)
fn dim_list<'a>(input: &mut &'a str) -> ModalResult<Vec<&'a str>> {
    delimited(
        ('(', ws),
        separated(0.., (ws, ident, ws).map(|(_, d, _)| d), ','),
        (ws, ')'),
    )
    .parse_next(input)
}

/// Parse a permutation-shaped affine map: affine_map<(d0, d1) -> (d1, d0)>
///
/// Only bare dimension results are accepted; symbols and compound
/// expressions do not describe a dimension ordering.
pub(crate) fn affine_map<'a>(input: &mut &'a str) -> ModalResult<RawAffineMap<'a>> {
    let dims = preceded(("affine_map", ws, '<', ws), dim_list).parse_next(input)?;
    let results = preceded((ws, "->", ws), dim_list).parse_next(input)?;
    (ws, '>').void().parse_next(input)?;
    Ok(RawAffineMap { dims, results })
}

/// Parse an encoding parameter value.
pub(crate) fn raw_value<'a>(input: &mut &'a str) -> ModalResult<RawValue<'a>> {
    alt((
        string_list.map(RawValue::Strings),
        affine_map.map(RawValue::AffineMap),
        alias_ref.map(RawValue::AliasRef),
        integer_lit.map(RawValue::Int),
    ))
    .parse_next(input)
}

/// Parse the head of a top-level alias definition: `#name =`
///
/// `==` is not a definition, so the `=` must not be followed by another one.
pub(crate) fn alias_definition_head<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    let name = alias_ref.parse_next(input)?;
    (ws, '=').void().parse_next(input)?;
    if input.starts_with('=') {
        return Err(winnow::error::ErrMode::Backtrack(
            winnow::error::ContextError::new(),
        ));
    }
    ws.parse_next(input)?;
    Ok(name)
}

// ============================================================================
// Tests (pure combinator tests)
// ============================================================================
