//! Encoding literal parser and module scanner.
//!
//! # Two-stage parsing
//!
//! 1. **Raw parse**: winnow combinators in [`raw`] turn the literal text into
//!    `(key, RawValue)` entries.
//! 2. **Build**: entries are checked (required, duplicate and unknown keys,
//!    level type names, ordering shape) and turned into an
//!    [`EncodingLiteral`].
//!
//! [`scan_module`] runs the parser over every literal in a module while
//! treating the surrounding text as opaque bytes.

pub(crate) mod raw;

use std::collections::{BTreeSet, HashMap};

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;

pub use raw::ParseError;
use raw::*;

use crate::encoding::{DimOrdering, EncodingLiteral, LevelType};
use crate::Span;

/// Permutation maps declared at the top level as `#name = affine_map<...>`.
pub(crate) type MapAliases = HashMap<String, DimOrdering>;

// ============================================================================
// Literal builder (Raw -> EncodingLiteral)
// ============================================================================

#[derive(Default)]
struct LiteralBuilder<'a> {
    level_types: Option<(usize, Vec<String>)>,
    dim_ordering: Option<(usize, RawValue<'a>)>,
    pointer_bit_width: Option<(usize, u64)>,
    index_bit_width: Option<(usize, u64)>,
}

impl<'a> LiteralBuilder<'a> {
    fn insert(
        &mut self,
        key: &str,
        key_offset: usize,
        value_offset: usize,
        value: RawValue<'a>,
    ) -> Result<(), ParseError> {
        let already_set = match key {
            "dimLevelType" => match value {
                RawValue::Strings(levels) => self
                    .level_types
                    .replace((value_offset, levels))
                    .is_some(),
                other => return Err(wrong_value(key, "a list of level types", &other, value_offset)),
            },
            "dimOrdering" => match value {
                RawValue::AffineMap(_) | RawValue::AliasRef(_) => {
                    self.dim_ordering.replace((value_offset, value)).is_some()
                }
                other => return Err(wrong_value(key, "an affine map", &other, value_offset)),
            },
            "pointerBitWidth" | "indexBitWidth" => {
                let RawValue::Int(width) = value else {
                    return Err(wrong_value(key, "an integer", &value, value_offset));
                };
                let slot = if key == "pointerBitWidth" {
                    &mut self.pointer_bit_width
                } else {
                    &mut self.index_bit_width
                };
                slot.replace((value_offset, width)).is_some()
            }
            _ => {
                return Err(ParseError::new(
                    format!("unknown sparse tensor encoding parameter `{key}`"),
                    key_offset,
                ));
            }
        };
        if already_set {
            return Err(ParseError::new(
                format!("duplicate sparse tensor encoding parameter `{key}`"),
                key_offset,
            ));
        }
        Ok(())
    }

    fn build(self, start: usize, maps: &MapAliases) -> Result<EncodingLiteral, ParseError> {
        let missing =
            |key: &str| ParseError::new(format!("missing required parameter `{key}`"), start);

        let (levels_offset, names) = self.level_types.ok_or_else(|| missing("dimLevelType"))?;
        let level_types = names
            .iter()
            .map(|name| {
                LevelType::from_name(name).ok_or_else(|| {
                    ParseError::new(format!("unknown level type \"{name}\""), levels_offset)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dim_ordering = match self.dim_ordering {
            None => None,
            Some((offset, value)) => {
                let ordering = resolve_ordering(&value, offset, maps)?;
                if ordering.rank() != level_types.len() {
                    return Err(ParseError::new(
                        format!(
                            "dimOrdering has {} dimensions but dimLevelType has {} levels",
                            ordering.rank(),
                            level_types.len()
                        ),
                        offset,
                    ));
                }
                Some(ordering)
            }
        };

        let (pointer_offset, pointer) = self
            .pointer_bit_width
            .ok_or_else(|| missing("pointerBitWidth"))?;
        let (index_offset, index) = self
            .index_bit_width
            .ok_or_else(|| missing("indexBitWidth"))?;

        Ok(EncodingLiteral {
            level_types,
            dim_ordering,
            pointer_bit_width: bit_width(pointer, pointer_offset)?,
            index_bit_width: bit_width(index, index_offset)?,
        })
    }
}

fn wrong_value(key: &str, expected: &str, got: &RawValue<'_>, offset: usize) -> ParseError {
    ParseError::new(
        format!("`{key}` expects {expected}, got {}", got.describe()),
        offset,
    )
}

fn bit_width(value: u64, offset: usize) -> Result<u32, ParseError> {
    u32::try_from(value)
        .map_err(|_| ParseError::new(format!("bit width {value} is out of range"), offset))
}

fn resolve_ordering(
    value: &RawValue<'_>,
    offset: usize,
    maps: &MapAliases,
) -> Result<DimOrdering, ParseError> {
    match value {
        RawValue::AffineMap(map) => DimOrdering::from_affine_map(&map.dims, &map.results)
            .ok_or_else(|| {
                ParseError::new("dimOrdering must be a permutation of its dimensions", offset)
            }),
        RawValue::AliasRef(name) => maps.get(*name).cloned().ok_or_else(|| {
            ParseError::new(
                format!("dimOrdering refers to `#{name}`, which is not a permutation map declared earlier"),
                offset,
            )
        }),
        other => Err(wrong_value("dimOrdering", "an affine map", other, offset)),
    }
}

// ============================================================================
// Literal parser
// ============================================================================

/// Run `parser` at the current position, reporting failure as `what` at the
/// offset where the attempt started.
fn expect<'a, O>(
    input: &mut &'a str,
    src: &str,
    mut parser: impl Parser<&'a str, O, ErrMode<ContextError>>,
    what: impl FnOnce() -> String,
) -> Result<O, ParseError> {
    let offset = src.len() - input.len();
    parser
        .parse_next(input)
        .map_err(|_| ParseError::new(what(), offset))
}

/// Parse the literal starting at byte `start` of `src`, returning it with the
/// offset one past its closing `>`.
pub(crate) fn parse_literal_at(
    src: &str,
    start: usize,
    maps: &MapAliases,
) -> Result<(EncodingLiteral, usize), ParseError> {
    let mut input = &src[start..];
    expect(&mut input, src, ENCODING_KEYWORD, || {
        format!("expected `{ENCODING_KEYWORD}`")
    })?;
    expect(&mut input, src, (ws, '<', ws, '{').void(), || {
        format!("expected `<{{` after `{ENCODING_KEYWORD}`")
    })?;

    let mut builder = LiteralBuilder::default();
    loop {
        expect(&mut input, src, ws, String::new)?;
        let key_offset = src.len() - input.len();
        let key = expect(&mut input, src, ident, || {
            "expected a sparse tensor encoding parameter name".to_owned()
        })?;
        expect(&mut input, src, (ws, '=', ws).void(), || {
            format!("expected `=` after `{key}`")
        })?;
        let value_offset = src.len() - input.len();
        let value = expect(&mut input, src, raw_value, || {
            format!("malformed value for `{key}`")
        })?;
        builder.insert(key, key_offset, value_offset, value)?;

        expect(&mut input, src, ws, String::new)?;
        if input.starts_with(',') {
            input = &input[1..];
        } else {
            break;
        }
    }
    expect(&mut input, src, ('}', ws, '>').void(), || {
        "unbalanced encoding literal: expected `}>`".to_owned()
    })?;

    let end = src.len() - input.len();
    let literal = builder.build(start, maps)?;
    Ok((literal, end))
}

/// Parse a standalone encoding literal, allowing surrounding whitespace.
pub fn parse_encoding_literal(text: &str) -> Result<EncodingLiteral, ParseError> {
    let start = text.len() - text.trim_start().len();
    let (literal, end) = parse_literal_at(text, start, &MapAliases::new())?;
    if !text[end..].trim().is_empty() {
        return Err(ParseError::new("trailing input after encoding literal", end));
    }
    Ok(literal)
}

// ============================================================================
// Module scanner
// ============================================================================

/// One encoding literal found in the module body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occurrence {
    pub span: Span,
    pub literal: EncodingLiteral,
}

/// A top-level `#name = value` definition already present in the input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasDeclaration {
    pub name: String,
    /// The parsed value, when it is a sparse tensor encoding.
    pub encoding: Option<EncodingLiteral>,
}

/// Everything the rewrite needs to know about a module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScannedModule {
    /// Encoding literals outside alias definitions, in source order.
    pub occurrences: Vec<Occurrence>,
    pub declarations: Vec<AliasDeclaration>,
    /// Every `#name` defined or referenced in the module.
    pub identifiers: BTreeSet<String>,
}

struct Scanner<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    /// Nesting of `()`, `[]` and `{}`.
    depth: usize,
    /// Only whitespace seen since the last newline.
    at_line_start: bool,
    maps: MapAliases,
    module: ScannedModule,
}

impl<'src> Scanner<'src> {
    fn new(src: &'src str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth: 0,
            at_line_start: true,
            maps: MapAliases::new(),
            module: ScannedModule::default(),
        }
    }

    fn run(mut self) -> Result<ScannedModule, ParseError> {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\n' => {
                    self.at_line_start = true;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => self.skip_line_comment(),
                b'"' => {
                    self.skip_string()?;
                    self.at_line_start = false;
                }
                b'#' => {
                    self.hash()?;
                    self.at_line_start = false;
                }
                c => {
                    match c {
                        b'(' | b'[' | b'{' => self.depth += 1,
                        b')' | b']' | b'}' => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.at_line_start = false;
                    self.pos += 1;
                }
            }
        }
        Ok(self.module)
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_string(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(ParseError::new("unterminated string literal", start))
    }

    /// Handle a `#`: an alias definition, an encoding literal or a reference.
    fn hash(&mut self) -> Result<(), ParseError> {
        let src = self.src;
        let start = self.pos;
        let rest = &src[start..];

        if self.at_line_start && self.depth == 0 {
            let mut input = rest;
            if let Ok(name) = alias_definition_head.parse_next(&mut input) {
                let value_start = src.len() - input.len();
                return self.definition(name, value_start);
            }
        }

        let mut input = rest;
        match alias_ref.parse_next(&mut input) {
            Ok(ENCODING_ATTR_NAME) => {
                let (literal, end) = parse_literal_at(src, start, &self.maps)?;
                self.module.occurrences.push(Occurrence {
                    span: Span::new(start, end),
                    literal,
                });
                self.pos = end;
            }
            Ok(name) => {
                self.module.identifiers.insert(name.to_owned());
                self.pos = src.len() - input.len();
            }
            Err(_) => self.pos += 1,
        }
        Ok(())
    }

    /// Record a top-level alias definition. Encoding values are parsed and
    /// skipped; any other value is scanned like ordinary text.
    fn definition(&mut self, name: &str, value_start: usize) -> Result<(), ParseError> {
        let src = self.src;
        self.module.identifiers.insert(name.to_owned());
        let value = &src[value_start..];

        let encoding = if value.starts_with(ENCODING_KEYWORD) {
            let (literal, end) = parse_literal_at(src, value_start, &self.maps)?;
            self.pos = end;
            Some(literal)
        } else {
            let mut input = value;
            if let Ok(map) = affine_map.parse_next(&mut input) {
                if let Some(ordering) = DimOrdering::from_affine_map(&map.dims, &map.results) {
                    self.maps.insert(name.to_owned(), ordering);
                }
            }
            self.pos = value_start;
            None
        };

        self.module.declarations.push(AliasDeclaration {
            name: name.to_owned(),
            encoding,
        });
        Ok(())
    }
}

/// Scan a module for sparse tensor encoding literals.
///
/// Comments and string literals are skipped. Literals on the right-hand side
/// of top-level alias definitions are recorded as declarations, never as
/// occurrences, so already-terse modules scan to no occurrences.
pub fn scan_module(src: &str) -> Result<ScannedModule, ParseError> {
    Scanner::new(src).run()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CSC: &str = r#"#sparse_tensor.encoding<{ dimLevelType = [ "dense", "compressed" ], dimOrdering = affine_map<(d0, d1) -> (d1, d0)>, pointerBitWidth = 64, indexBitWidth = 64 }>"#;

    #[test]
    fn test_parse_literal() {
        let literal = parse_encoding_literal(CSC).expect("should parse");
        assert_eq!(literal.level_types, vec![LevelType::Dense, LevelType::Compressed]);
        assert!(literal.ordering().is_transpose());
        assert_eq!(literal.pointer_bit_width, 64);
        assert_eq!(literal.index_bit_width, 64);
    }

    #[test]
    fn test_parse_literal_across_lines_in_any_order() {
        let text = concat!(
            "#sparse_tensor.encoding<{\n",
            "    indexBitWidth = 0x40,\n",
            "    dimLevelType = [ \"Dense\",\n",
            "                     \"compressed\" ],\n",
            "    pointerBitWidth = 64\n",
            "}>",
        );
        let literal = parse_encoding_literal(text).expect("should parse");
        assert_eq!(literal.dim_ordering, None);
        assert_eq!(
            literal.canonical_key(),
            parse_encoding_literal(CSC.replace("(d1, d0)", "(d0, d1)").as_str())
                .unwrap()
                .canonical_key()
        );
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = parse_encoding_literal(
            r#"#sparse_tensor.encoding<{ dimLevelType = [ "compressed" ], pointerBitWidth = 64 }>"#,
        )
        .unwrap_err();
        assert_eq!(err.message, "missing required parameter `indexBitWidth`");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = parse_encoding_literal(
            r#"#sparse_tensor.encoding<{ dimLevelType = [ "compressed" ], pointerBitWidth = 64, pointerBitWidth = 32, indexBitWidth = 64 }>"#,
        )
        .unwrap_err();
        assert!(err.message.contains("duplicate"), "{err}");
    }

    #[test]
    fn test_unknown_parameter_and_level_type() {
        let err = parse_encoding_literal(
            r#"#sparse_tensor.encoding<{ dimLevelType = [ "compressed" ], fooBitWidth = 1, pointerBitWidth = 64, indexBitWidth = 64 }>"#,
        )
        .unwrap_err();
        assert!(err.message.contains("`fooBitWidth`"), "{err}");

        let err = parse_encoding_literal(
            r#"#sparse_tensor.encoding<{ dimLevelType = [ "hashed" ], pointerBitWidth = 64, indexBitWidth = 64 }>"#,
        )
        .unwrap_err();
        assert_eq!(err.message, "unknown level type \"hashed\"");
    }

    #[test]
    fn test_unbalanced_literal() {
        let text = r#"#sparse_tensor.encoding<{ dimLevelType = [ "compressed" ], pointerBitWidth = 64, indexBitWidth = 64 >"#;
        let err = parse_encoding_literal(text).unwrap_err();
        assert!(err.message.starts_with("unbalanced"), "{err}");
        assert_eq!(err.offset, text.len() - 1);
    }

    #[test]
    fn test_ordering_rank_mismatch() {
        let err = parse_encoding_literal(
            r#"#sparse_tensor.encoding<{ dimLevelType = [ "compressed" ], dimOrdering = affine_map<(d0, d1) -> (d1, d0)>, pointerBitWidth = 64, indexBitWidth = 64 }>"#,
        )
        .unwrap_err();
        assert!(err.message.contains("2 dimensions"), "{err}");
    }

    #[test]
    fn test_scan_finds_every_occurrence_in_order() {
        let src = format!(
            "module {{\n  func @f(%a: tensor<2x3xf64, {CSC}>) -> tensor<2x3xf64, {CSC}> {{\n    return %a : tensor<2x3xf64, {CSC}>\n  }}\n}}\n"
        );
        let scanned = scan_module(&src).expect("should scan");
        assert_eq!(scanned.occurrences.len(), 3);
        for occurrence in &scanned.occurrences {
            assert_eq!(&src[occurrence.span.start..occurrence.span.end], CSC);
        }
        assert!(scanned.declarations.is_empty());
    }

    #[test]
    fn test_scan_skips_comments_and_strings() {
        let src = format!(
            "// {CSC}\nmodule {{\n  %0 = test.op {{note = \"{}\"}} : i1\n}}\n",
            CSC.replace('"', "\\\"")
        );
        let scanned = scan_module(&src).expect("should scan");
        assert!(scanned.occurrences.is_empty());
    }

    #[test]
    fn test_scan_treats_definitions_as_terse() {
        let src = concat!(
            "#CSX64 = #sparse_tensor.encoding<{ \n",
            "    dimLevelType = [ \"dense\", \"compressed\" ], \n",
            "    pointerBitWidth = 64, \n",
            "    indexBitWidth = 64 \n",
            "}>\n",
            "\n",
            "module {\n",
            "  func @f(%a: tensor<2x3xf64, #CSX64>) -> tensor<2x3xf64, #CSX64> {\n",
            "    return %a : tensor<2x3xf64, #CSX64>\n",
            "  }\n",
            "}\n",
        );
        let scanned = scan_module(src).expect("should scan");
        assert!(scanned.occurrences.is_empty());
        assert_eq!(scanned.declarations.len(), 1);
        assert_eq!(scanned.declarations[0].name, "CSX64");
        assert!(scanned.declarations[0].encoding.is_some());
        assert!(scanned.identifiers.contains("CSX64"));
    }

    #[test]
    fn test_scan_resolves_ordering_through_map_alias() {
        let src = concat!(
            "#map = affine_map<(d0, d1) -> (d1, d0)>\n",
            "module {\n",
            "  func @f(%a: tensor<?x?xf64, #sparse_tensor.encoding<{ dimLevelType = [ \"dense\", \"compressed\" ], dimOrdering = #map, pointerBitWidth = 64, indexBitWidth = 64 }>>) {\n",
            "    return\n",
            "  }\n",
            "}\n",
        );
        let scanned = scan_module(src).expect("should scan");
        assert_eq!(scanned.occurrences.len(), 1);
        assert!(scanned.occurrences[0].literal.ordering().is_transpose());
        assert!(scanned.identifiers.contains("map"));
    }

    #[test]
    fn test_scan_reports_unknown_map_alias() {
        let src = "module {\n  func @f(%a: tensor<?x?xf64, #sparse_tensor.encoding<{ dimLevelType = [ \"dense\", \"compressed\" ], dimOrdering = #nope, pointerBitWidth = 64, indexBitWidth = 64 }>>)\n}\n";
        let err = scan_module(src).unwrap_err();
        assert!(err.message.contains("`#nope`"), "{err}");
    }

    #[test]
    fn test_nested_hash_is_a_reference_not_a_definition() {
        let src = "module {\n#x = 1\n}\n";
        let scanned = scan_module(src).expect("should scan");
        assert!(scanned.declarations.is_empty());
        assert!(scanned.identifiers.contains("x"));
    }

    // ========================================================================
    // Property-based tests (proptest)
    // ========================================================================

    mod proptest_fuzz {
        use super::{CSC, parse_encoding_literal, scan_module};
        use proptest::prelude::*;

        /// Valid module texts used as seed corpus for mutation.
        fn seed_corpus() -> Vec<String> {
            vec![
                format!(
                    "module {{\n  func @f(%a: tensor<2x3xf64, {CSC}>) -> tensor<2x3xf64, {CSC}> {{\n    return %a : tensor<2x3xf64, {CSC}>\n  }}\n}}\n"
                ),
                format!("#CSC64 = {CSC}\n\nmodule {{\n  // {CSC}\n}}\n"),
            ]
        }

        /// Strategy: pick a seed and apply a random mutation.
        fn mutated_module() -> impl Strategy<Value = String> {
            let seeds = seed_corpus();
            let n = seeds.len();
            (0..n, 0..1000usize, 0..4u8, proptest::num::u8::ANY).prop_map(
                move |(seed_idx, pos_raw, mutation_kind, random_byte)| {
                    let mut bytes = seeds[seed_idx].as_bytes().to_vec();
                    let pos = pos_raw % bytes.len();
                    match mutation_kind {
                        0 => bytes[pos] = random_byte,
                        1 => {
                            bytes.remove(pos);
                        }
                        2 => bytes.insert(pos, random_byte),
                        _ => {
                            let end = (pos + 8).min(bytes.len());
                            bytes.drain(pos..end);
                        }
                    }
                    String::from_utf8(bytes).unwrap_or_default()
                },
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(2000))]

            /// The scanner must never panic on mutated input.
            #[test]
            fn scanner_never_panics(input in mutated_module()) {
                let _ = scan_module(&input);
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            /// Completely random strings must not panic the scanner.
            #[test]
            fn scanner_handles_random_strings(input in "\\PC{0,200}") {
                let _ = scan_module(&input);
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            /// Whitespace inside a literal never changes its key.
            #[test]
            fn whitespace_does_not_change_the_key(spaces in proptest::collection::vec("[ \n\t]{0,3}", 16)) {
                let tokens = [
                    "#sparse_tensor.encoding", "<", "{", "dimLevelType", "=", "[", "\"dense\"", ",",
                    "\"compressed\"", "]", ",", "pointerBitWidth", "=", "32", ",", "indexBitWidth",
                    "=", "16", "}", ">",
                ];
                let mut text = String::new();
                for (i, token) in tokens.iter().enumerate() {
                    text.push_str(token);
                    text.push_str(&spaces[i % spaces.len()]);
                }
                let spaced = parse_encoding_literal(&text).expect("should parse");
                let compact = parse_encoding_literal(&tokens.concat()).expect("should parse");
                prop_assert_eq!(spaced.canonical_key(), compact.canonical_key());
            }
        }
    }
}
