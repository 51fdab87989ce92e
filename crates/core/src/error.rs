//! Error type shared by the alignment pipeline and the filter tools.
//!
//! One enum covers the whole taxonomy: I/O, malformed input (base64 /
//! UTF-8), and child-process protocol violations. Errors propagate out of
//! worker threads to the orchestrator, which shuts the queues down and
//! returns the first one.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in the alignment core and the filters.
#[derive(Debug)]
pub enum Error {
    /// Plain I/O failure (read/write on an already-open stream).
    Io(io::Error),
    /// An input file could not be opened.
    OpenInput { path: PathBuf, source: io::Error },
    /// A line was not valid base64. `line` is 1-based.
    Base64 {
        line: usize,
        source: base64::DecodeError,
    },
    /// The fold filter saw a line that is not valid UTF-8; carries the
    /// offending line, lossily decoded.
    InvalidUtf8 { line: String },
    /// An input file produced a different number of lines on the second
    /// pass than on the first.
    InputChanged { line: usize, expected: usize },
    /// The child closed stdout before delivering the expected lines.
    ChildTruncated,
    /// The child produced output while no record descriptor was pending.
    ChildSpuriousOutput,
    /// The child command could not be started.
    Spawn { program: String, source: io::Error },
    /// A worker thread panicked.
    WorkerPanic,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::OpenInput { path, source } => {
                write!(f, "cannot open input file '{}': {}", path.display(), source)
            }
            Error::Base64 { line, source } => {
                write!(f, "line {} is not valid base64: {}", line, source)
            }
            Error::InvalidUtf8 { line } => {
                write!(f, "input line is not valid UTF-8: {:?}", line)
            }
            Error::InputChanged { line, expected } => write!(
                f,
                "input file changed between passes: saw line {} but first pass counted {}",
                line, expected
            ),
            Error::ChildTruncated => {
                write!(f, "sub-process stopped producing while expecting more lines")
            }
            Error::ChildSpuriousOutput => write!(
                f,
                "sub-process is producing more output than it was given input"
            ),
            Error::Spawn { program, source } => {
                write!(f, "cannot start '{}': {}", program, source)
            }
            Error::WorkerPanic => write!(f, "worker thread panicked"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::OpenInput { source, .. } => Some(source),
            Error::Base64 { source, .. } => Some(source),
            Error::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
