//! Child process with piped stdin/stdout and reliable teardown.
//!
//! The parent keeps the write end to the child's stdin and the read end of
//! its stdout as owned handles that close on drop; [`Subprocess::wait`]
//! consumes the handle, so the state machine is enforced by the type
//! system: spawned → (streams taken) → waited. On Linux the child asks the
//! kernel to SIGTERM it if the parent dies first, so a crashed filter never
//! leaves orphans behind.

use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use docalign_core::{Error, Result};

/// Exit code reported when the child did not terminate normally (it was
/// killed by a signal).
pub const SIGNALED_EXIT_CODE: i32 = 256;

/// A running child with its pipe ends.
#[derive(Debug)]
pub struct Subprocess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
}

impl Subprocess {
    /// Spawn `program` with `args`, stdin and stdout piped.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::piped()).stdout(Stdio::piped());

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::process::CommandExt as _;
            // Terminate if the parent stops.
            unsafe {
                command.pre_exec(|| {
                    if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        Ok(Subprocess {
            child,
            stdin,
            stdout,
        })
    }

    /// The write end of the child's stdin. Dropping it closes the pipe,
    /// which is how the feeder signals end of input.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// The read end of the child's stdout.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Reap the child and return its exit code, or
    /// [`SIGNALED_EXIT_CODE`] for non-normal termination. Terminal.
    pub fn wait(mut self) -> Result<i32> {
        // Close our end of stdin if the caller never took it, or the child
        // would wait on input forever.
        self.stdin.take();
        let status = self.child.wait()?;
        Ok(status.code().unwrap_or(SIGNALED_EXIT_CODE))
    }
}
