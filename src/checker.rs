//! Syntax checkers run before any rewriting.

use std::io::Write;
use std::process::{Command, Stdio};

use tersify_ir::{StructuralChecker, SyntaxError};
use tracing::debug;

use crate::errors::{TersifyError, TersifyResult};

/// Decides whether module text is well-formed enough to rewrite.
pub trait SyntaxChecker {
    fn check(&self, text: &str) -> TersifyResult<()>;
}

impl SyntaxChecker for StructuralChecker {
    fn check(&self, text: &str) -> TersifyResult<()> {
        Ok(StructuralChecker::check(self, text)?)
    }
}

/// Pipes the module to an external program, e.g. `mlir-opt`, and accepts it
/// when the program exits successfully.
#[derive(Clone, Debug)]
pub struct ExternalChecker {
    program: String,
    args: Vec<String>,
}

impl ExternalChecker {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl SyntaxChecker for ExternalChecker {
    fn check(&self, text: &str) -> TersifyResult<()> {
        debug!(program = %self.program, args = ?self.args, "running external syntax checker");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TersifyError::checker_failed(&self.program, e))?;

        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                // The checker may exit before reading everything.
                scope.spawn(move || {
                    let _ = stdin.write_all(text.as_bytes());
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| TersifyError::checker_failed(&self.program, e))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("`{}` rejected the input ({})", self.program, output.status),
            detail => format!("`{}` rejected the input: {detail}", self.program),
        };
        Err(SyntaxError { message, offset: 0 }.into())
    }
}
