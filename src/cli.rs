//! Command-line interface for `tersify_mlir`.

use std::path::PathBuf;

use clap::Parser;

use crate::checker::ExternalChecker;
use crate::pipeline::Tersifier;
use crate::rewrite::AliasOrder;

#[derive(Parser, Debug)]
#[command(name = "tersify_mlir")]
#[command(
    about = "Hoist sparse tensor encodings in an MLIR module into attribute aliases",
    long_about = None
)]
pub struct Cli {
    /// Module to read; standard input when absent or `-`
    pub input: Option<PathBuf>,

    /// Emit new alias declarations sorted by name instead of by first use
    #[arg(long)]
    pub sort_aliases: bool,

    /// Validate input with this program (e.g. `mlir-opt`) instead of the
    /// built-in structural check
    #[arg(long, value_name = "PROGRAM")]
    pub checker: Option<String>,

    /// Argument passed to the checker program; may be repeated
    #[arg(long = "checker-arg", value_name = "ARG", requires = "checker", allow_hyphen_values = true)]
    pub checker_args: Vec<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Input path, or `None` for standard input.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|path| path.as_os_str() != "-")
    }

    pub fn alias_order(&self) -> AliasOrder {
        if self.sort_aliases {
            AliasOrder::Alphabetical
        } else {
            AliasOrder::FirstOccurrence
        }
    }

    pub fn tersifier(&self) -> Tersifier {
        let tersifier = Tersifier::new().with_alias_order(self.alias_order());
        match &self.checker {
            Some(program) => tersifier.with_checker(ExternalChecker::new(
                program.clone(),
                self.checker_args.iter().cloned(),
            )),
            None => tersifier,
        }
    }

    /// Default log filter for the verbosity count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
