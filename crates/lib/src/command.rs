//! Running external command lines.
//!
//! The engine itself never runs commands; the service and package helpers in
//! [`crate::service`] reach the host only through a [`CommandRunner`].

use std::io;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

/// Runs a command line synchronously and reports its exit status.
pub trait CommandRunner {
  fn run(&self, command_line: &str) -> io::Result<i32>;
}

/// Runs command lines through `/bin/sh -c`, inheriting the environment.
#[derive(Debug, Clone)]
pub struct ShellRunner {
  shell: PathBuf,
}

impl ShellRunner {
  pub fn new(shell: impl Into<PathBuf>) -> Self {
    Self { shell: shell.into() }
  }
}

impl Default for ShellRunner {
  fn default() -> Self {
    Self::new("/bin/sh")
  }
}

impl CommandRunner for ShellRunner {
  fn run(&self, command_line: &str) -> io::Result<i32> {
    debug!(shell = %self.shell.display(), cmd = %command_line, "spawning process");
    let status = Command::new(&self.shell).arg("-c").arg(command_line).status()?;
    // Killed by a signal: report it the way a shell would.
    Ok(status.code().unwrap_or_else(|| {
      use std::os::unix::process::ExitStatusExt;
      128 + status.signal().unwrap_or(0)
    }))
  }
}
