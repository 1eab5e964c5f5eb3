//! External command execution.
//!
//! Both the pnpm global-root lookup and the node-backed module loader shell
//! out to other programs. They do so through [`CommandExecutor`] so unit
//! tests can supply canned output instead of spawning processes.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Trait for executing system commands.
/// This allows us to mock `std::process::Command` in tests.
pub trait CommandExecutor: Send + Sync + std::fmt::Debug {
    /// Executes a system command with the given arguments.
    ///
    /// # Arguments
    ///
    /// * `program` - The path to the executable.
    /// * `args` - A list of arguments to pass to the executable.
    /// * `stdin` - Bytes written to the child's standard input, if any. When
    ///   `None` the child's stdin is closed.
    ///
    /// # Returns
    ///
    /// The output of the command (stdout/stderr/exit code).
    fn execute(
        &self,
        program: &Path,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<std::process::Output>;
}

/// Default implementation of [`CommandExecutor`] using `std::process::Command`.
#[derive(Debug, Default)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn execute(
        &self,
        program: &Path,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<std::process::Output> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let Some(input) = stdin else {
            return command
                .stdin(Stdio::null())
                .output()
                .map_err(|e| anyhow!("Failed to execute {}: {}", program.display(), e));
        };

        let mut child = command
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to execute {}: {}", program.display(), e))?;

        // Dropping the handle closes the pipe so the child sees EOF.
        if let Some(mut pipe) = child.stdin.take() {
            match pipe.write_all(input) {
                Ok(()) => {}
                // The child stopped reading; its exit status and stderr tell why.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    drop(pipe);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e).with_context(|| {
                        format!("Failed to write stdin of {}", program.display())
                    });
                }
            }
        }

        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", program.display()))
    }
}

/// A mocked executor for testing that doesn't actually run system commands.
///
/// This struct is used to simulate command execution in tests, allowing inspection
/// of command arguments and returning pre-defined output.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    /// The string to return as standard output.
    pub stdout: String,
    /// The string to return as standard error.
    pub stderr: String,
    /// The exit code to simulate (0 for success).
    pub status_code: i32,
    /// Shared record of every invocation: program arguments and stdin text.
    pub calls: std::sync::Arc<std::sync::Mutex<Vec<(Vec<String>, Option<String>)>>>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn replying(stdout: &str, status_code: i32) -> Self {
        Self {
            stdout: stdout.to_string(),
            status_code,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(
        &self,
        _program: &Path,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<std::process::Output> {
        self.calls.lock().unwrap().push((
            args.iter().map(|a| a.to_string()).collect(),
            stdin.map(|s| String::from_utf8_lossy(s).into_owned()),
        ));

        #[cfg(unix)]
        let status = {
            use std::os::unix::process::ExitStatusExt;
            std::process::ExitStatus::from_raw(self.status_code << 8)
        };
        #[cfg(windows)]
        let status = {
            use std::os::windows::process::ExitStatusExt;
            std::process::ExitStatus::from_raw(self.status_code as u32)
        };

        Ok(std::process::Output {
            status,
            stdout: self.stdout.as_bytes().to_vec(),
            stderr: self.stderr.as_bytes().to_vec(),
        })
    }
}
