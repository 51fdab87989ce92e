//! Wrap overlong lines at friendly delimiters around a child command.
//!
//! The child only ever sees lines of roughly the requested width; the
//! removed delimiter runs are re-attached to its output so the final
//! result reads exactly like the input. The exit code mirrors the child's.

use std::io::{self, BufReader};
use std::process::ExitCode;

use clap::Parser;

use docalign_cli::fold;
use docalign_cli::subprocess::Subprocess;
use docalign_core::config;

#[derive(Parser)]
#[command(
    name = "foldfilter",
    about = "Wrap long lines at preferred delimiters before a child command sees them"
)]
struct Args {
    /// Column width in bytes
    #[arg(short = 'w', long = "width", value_name = "WIDTH", default_value_t = config::DEFAULT_FOLD_WIDTH)]
    width: usize,

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

    if args.width == 0 {
        eprintln!("Error: width must be at least 1");
        return ExitCode::from(1);
    }

    let child = match Subprocess::spawn(&args.command[0], &args.command[1..]) {
        Ok(child) => child,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    match fold::run(BufReader::new(io::stdin()), io::stdout(), child, args.width) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
