//! Structural well-formedness check for MLIR module text.
//!
//! This is not a verifier. It accepts text whose delimiters balance, whose
//! strings terminate, and whose top level consists only of alias definitions
//! and known top-level operations. Anything it accepts is safe for the
//! rewrite to treat as opaque bytes around the encoding literals.

use std::fmt;

/// Operations allowed at the top level of a module file.
const TOP_LEVEL_OPS: &[&str] = &[
    "module",
    "builtin.module",
    "func",
    "func.func",
    "builtin.func",
    "llvm.func",
];

/// Input rejected as ill-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// The built-in checker used when no external tool is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralChecker;

impl StructuralChecker {
    pub fn check(&self, text: &str) -> Result<(), SyntaxError> {
        Checker::new(text).module()
    }
}

struct Checker<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    /// Open delimiters and their offsets.
    stack: Vec<(u8, usize)>,
}

impl<'src> Checker<'src> {
    fn new(src: &'src str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            stack: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else if c == b'/' && self.peek_at(1) == Some(b'/') {
                while self.peek().is_some_and(|c| c != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn word(&mut self) -> &'src str {
        let src = self.src;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'.'))
        {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    /// The current character, for messages.
    fn current_char(&self) -> char {
        self.src[self.pos..].chars().next().unwrap_or(' ')
    }

    fn module(mut self) -> Result<(), SyntaxError> {
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            let start = self.pos;
            match c {
                b'#' | b'!' => {
                    self.pos += 1;
                    if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == b'_') {
                        return Err(SyntaxError::new("expected an alias name", self.pos));
                    }
                    let name = self.word();
                    self.skip_trivia();
                    if self.peek() != Some(b'=') {
                        return Err(SyntaxError::new(
                            format!("expected `=` after alias `{}{name}`", c as char),
                            self.pos,
                        ));
                    }
                    self.pos += 1;
                    self.skip_trivia();
                    if self.peek().is_none() {
                        return Err(SyntaxError::new("missing alias value", self.pos));
                    }
                    self.item()?;
                }
                b'"' => {
                    self.string()?;
                    self.item()?;
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    let name = self.word();
                    if !TOP_LEVEL_OPS.contains(&name) {
                        return Err(SyntaxError::new(
                            format!("unknown top-level operation `{name}`"),
                            start,
                        ));
                    }
                    self.item()?;
                }
                _ => {
                    return Err(SyntaxError::new(
                        format!("unexpected `{}` at top level", self.current_char()),
                        start,
                    ));
                }
            }
        }
    }

    /// Consume the rest of a top-level item: everything up to a newline with
    /// no delimiter open, continuing when the next line opens a region.
    fn item(&mut self) -> Result<(), SyntaxError> {
        while let Some(c) = self.peek() {
            match c {
                b'\n' if self.stack.is_empty() => {
                    self.skip_trivia();
                    if self.peek() != Some(b'{') {
                        return Ok(());
                    }
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                b'"' => self.string()?,
                b'-' if self.peek_at(1) == Some(b'>') => self.pos += 2,
                b'<' | b'>' if self.peek_at(1) == Some(b'=') => self.pos += 2,
                b'(' | b'[' | b'{' | b'<' => {
                    self.stack.push((c, self.pos));
                    self.pos += 1;
                }
                b')' | b']' | b'}' | b'>' => {
                    self.close(c)?;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        match self.stack.last() {
            Some(&(open, offset)) => Err(SyntaxError::new(
                format!("unclosed `{}`", open as char),
                offset,
            )),
            None => Ok(()),
        }
    }

    fn close(&mut self, close: u8) -> Result<(), SyntaxError> {
        let expected = match close {
            b')' => b'(',
            b']' => b'[',
            b'}' => b'{',
            _ => b'<',
        };
        match self.stack.pop() {
            Some((open, _)) if open == expected => Ok(()),
            Some((open, offset)) => Err(SyntaxError::new(
                format!(
                    "mismatched `{}`: `{}` opened at offset {offset} is still open",
                    close as char, open as char
                ),
                self.pos,
            )),
            None => Err(SyntaxError::new(
                format!("unmatched `{}`", close as char),
                self.pos,
            )),
        }
    }

    fn string(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(SyntaxError::new("unterminated string literal", start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> Result<(), SyntaxError> {
        StructuralChecker.check(text)
    }

    #[test]
    fn test_accepts_module_with_encodings() {
        let text = concat!(
            "\n",
            "module  {\n",
            "  func @test_func(%arg0: tensor<2x3xf64, #sparse_tensor.encoding<{ dimLevelType = [ \"dense\", \"compressed\" ], dimOrdering = affine_map<(d0, d1) -> (d1, d0)>, pointerBitWidth = 64, indexBitWidth = 64 }>>) -> index {\n",
            "    %0 = graphblas.vector_argminmax %arg0 {minmax = \"min\"} : tensor<3xi64>\n",
            "    return %0 : index\n",
            "  }\n",
            "}\n",
        );
        assert_eq!(check(text), Ok(()));
    }

    #[test]
    fn test_accepts_alias_definitions_spanning_lines() {
        let text = concat!(
            "#CSR64 = #sparse_tensor.encoding<{ \n",
            "    dimLevelType = [ \"dense\", \"compressed\" ], \n",
            "    pointerBitWidth = 64, \n",
            "    indexBitWidth = 64 \n",
            "}>\n",
            "\n",
            "!T = tensor<?xf64>\n",
            "// trailing comment\n",
            "module {\n",
            "}\n",
        );
        assert_eq!(check(text), Ok(()));
    }

    #[test]
    fn test_accepts_empty_input() {
        assert_eq!(check(""), Ok(()));
        assert_eq!(check("  \n// only a comment\n"), Ok(()));
    }

    #[test]
    fn test_accepts_region_on_next_line() {
        assert_eq!(check("module\n{\n}\n"), Ok(()));
    }

    #[test]
    fn test_rejects_unknown_top_level_word() {
        let err = check("asdf").unwrap_err();
        assert_eq!(err.message, "unknown top-level operation `asdf`");
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_rejects_unbalanced_braces() {
        let err = check("module {\n  func @f() {\n}\n").unwrap_err();
        assert_eq!(err.message, "unclosed `{`");
        assert_eq!(err.offset, 7);

        let err = check("module {\n}\n}\n").unwrap_err();
        assert_eq!(err.message, "unexpected `}` at top level");
        assert_eq!(err.offset, 11);

        let err = check("module {\n}}\n").unwrap_err();
        assert_eq!(err.message, "unmatched `}`");
    }

    #[test]
    fn test_rejects_mismatched_delimiters() {
        let err = check("module {\n  func @f(%a: tensor<4xf64) {\n  }\n}\n").unwrap_err();
        assert!(err.message.starts_with("mismatched `)`"), "{err}");
    }

    #[test]
    fn test_rejects_unterminated_string() {
        let err = check("module {\n  %0 = test.op {s = \"oops} : i1\n}\n").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_rejects_malformed_alias() {
        assert!(check("#A 1\n").is_err());
        assert!(check("# = 1\n").is_err());
        assert!(check("#A =").is_err());
    }

    #[test]
    fn test_arrows_and_comparisons_are_not_delimiters() {
        assert_eq!(
            check("#set = affine_set<(d0) : (d0 >= 0, d0 <= 4)>\nfunc @f() -> (i1)\n"),
            Ok(())
        );
    }
}
