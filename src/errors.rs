//! Error types for the tersify pipeline

use derive_more::Display;
use tersify_ir::{ParseError, SyntaxError};

pub type TersifyResult<T> = Result<T, TersifyError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct TersifyError {
    kind: Box<TersifyErrorKind>,
}

impl<E> From<E> for TersifyError
where
    TersifyErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        TersifyError {
            kind: Box::new(TersifyErrorKind::from(error)),
        }
    }
}

impl TersifyError {
    pub(crate) fn checker_failed(program: impl std::fmt::Display, source: std::io::Error) -> Self {
        TersifyErrorKind::Checker {
            program: program.to_string(),
            source,
        }
        .into()
    }

    pub fn kind(&self) -> &TersifyErrorKind {
        &self.kind
    }

    /// Byte offset into the input that the error points at, if any.
    pub fn offset(&self) -> Option<usize> {
        match &*self.kind {
            TersifyErrorKind::Syntax(e) => Some(e.offset),
            TersifyErrorKind::Encoding(e) => Some(e.offset),
            TersifyErrorKind::Checker { .. } => None,
        }
    }
}

#[derive(Display, Debug)]
pub enum TersifyErrorKind {
    #[display("{_0}")]
    Syntax(SyntaxError),

    #[display("malformed sparse tensor encoding: {_0}")]
    Encoding(ParseError),

    #[display("failed to run syntax checker `{program}`: {source}")]
    Checker {
        program: String,
        source: std::io::Error,
    },
}

impl From<SyntaxError> for TersifyErrorKind {
    fn from(error: SyntaxError) -> Self {
        TersifyErrorKind::Syntax(error)
    }
}

impl From<ParseError> for TersifyErrorKind {
    fn from(error: ParseError) -> Self {
        TersifyErrorKind::Encoding(error)
    }
}

impl std::error::Error for TersifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &*self.kind {
            TersifyErrorKind::Syntax(e) => Some(e),
            TersifyErrorKind::Encoding(e) => Some(e),
            TersifyErrorKind::Checker { source, .. } => Some(source),
        }
    }
}
