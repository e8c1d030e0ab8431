//! `tersify_mlir` entry point.

use std::io::{IsTerminal, Read, Write};

use clap::Parser;
use tersify::cli::Cli;
use tersify::diagnostics::render_error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (source_name, bytes) = match cli.input_path() {
        Some(path) => (path.display().to_string(), std::fs::read(path)),
        None => {
            let mut buf = Vec::new();
            let read = std::io::stdin().read_to_end(&mut buf).map(|_| buf);
            ("<stdin>".to_owned(), read)
        }
    };
    let input = match bytes {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            eprintln!("Error reading {source_name}: {e}");
            std::process::exit(1);
        }
    };

    match cli.tersifier().run(&input) {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(output.as_bytes()).and_then(|_| stdout.flush()) {
                eprintln!("Error writing output: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            let color = std::io::stderr().is_terminal();
            eprint!("{}", render_error(&e, &input, &source_name, color));
            std::process::exit(1);
        }
    }
}
