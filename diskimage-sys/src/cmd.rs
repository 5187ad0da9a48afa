// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! Every tool invocation in the installer goes through a [`CommandRunner`], so
//! the partitioning state machine can be exercised against scripted tool
//! output in tests.

use std::process::Command;

use tracing::{debug, trace};

use crate::error::{Result, SysError};

/// Captured result of one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Rendered command line, for diagnostics
    pub command: String,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}{}", self.stdout, self.stderr)
        }
    }

    /// Turn a non-zero exit into [`SysError::CommandFailed`] carrying the output.
    pub fn check(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(SysError::CommandFailed {
            output: self.combined(),
            command: self.command,
            code: self.code,
        })
    }
}

pub fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion and capture its output.
    ///
    /// Only a failure to start the process is an error; the exit status is
    /// reported in the returned [`CommandOutput`].
    fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run `program` and fail on a non-zero exit status.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.output(program, args)?.check()
    }
}

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let command = render(program, args);
        debug!("running {}", command);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SysError::Spawn {
                command: command.clone(),
                source,
            })?;

        let result = CommandOutput {
            command,
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        trace!(
            "{} exited with {:?}: {}",
            result.command,
            result.code,
            result.combined()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            command: "sgdisk -v /dev/sda".to_string(),
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn formats_command_context() {
        let rendered = render("parted", &["-s", "--", "/dev/sda", "print"]);
        assert_eq!(rendered, "parted -s -- /dev/sda print");
        assert_eq!(render("sync", &[]), "sync");
    }

    #[test]
    fn failure_carries_combined_output() {
        let error = output(Some(2), "partial\n", "boom\n").check().unwrap_err();
        match error {
            SysError::CommandFailed {
                command,
                code,
                output,
            } => {
                assert_eq!(command, "sgdisk -v /dev/sda");
                assert_eq!(code, Some(2));
                assert_eq!(output, "partial\nboom\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn signal_termination_is_a_failure() {
        let error = output(None, "", "").check().unwrap_err();
        assert!(error.to_string().contains("terminated by signal"));
    }

    #[test]
    fn system_runner_reports_missing_binary_as_spawn_error() {
        let error = SystemRunner
            .output("diskimage-definitely-not-a-binary", &[])
            .unwrap_err();
        assert!(matches!(error, SysError::Spawn { .. }));
    }
}
