//! Run a line-oriented child over base64-encoded documents.
//!
//! Each input line is one base64-encoded document; the child sees the
//! decoded lines and its output is re-encoded document by document. The
//! exit code mirrors the child's.

use std::io::{self, BufReader};
use std::process::ExitCode;

use clap::Parser;

use docalign_cli::b64;
use docalign_cli::subprocess::Subprocess;

#[derive(Parser)]
#[command(
    name = "b64filter",
    about = "Feed base64-encoded documents line by line through a child command"
)]
struct Args {
    /// Child command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    let child = match Subprocess::spawn(&args.command[0], &args.command[1..]) {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    match b64::run(BufReader::new(io::stdin()), io::stdout(), child) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
