// SPDX-License-Identifier: GPL-3.0-only

//! Scripted command runner for tests
//!
//! Responses are keyed by the full rendered command line, or by the bare
//! program name for commands whose arguments are not known up front (such as
//! generated temporary paths). When several responses are queued for the same
//! key they are consumed in order and the last one repeats. Commands without a
//! script succeed with no output.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Mutex, MutexGuard};

use crate::cmd::{CommandOutput, CommandRunner, render};
use crate::error::{Result, SysError};

#[derive(Debug, Clone)]
enum Scripted {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    NotFound,
}

#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, command: &str, scripted: Scripted) -> &Self {
        lock(&self.scripts)
            .entry(command.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    /// Succeed with `stdout`.
    pub fn respond(&self, command: &str, stdout: &str) -> &Self {
        self.exit(command, 0, stdout, "")
    }

    /// Exit with `code`, writing `stderr`.
    pub fn fail(&self, command: &str, code: i32, stderr: &str) -> &Self {
        self.exit(command, code, "", stderr)
    }

    pub fn exit(&self, command: &str, code: i32, stdout: &str, stderr: &str) -> &Self {
        self.push(
            command,
            Scripted::Exit {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        )
    }

    /// Behave as if the binary is not installed.
    pub fn missing(&self, command: &str) -> &Self {
        self.push(command, Scripted::NotFound)
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, command: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == command).count()
    }

    pub fn called(&self, command: &str) -> bool {
        self.count(command) > 0
    }

    /// Whether any command line starting with `prefix` was run
    pub fn called_prefix(&self, prefix: &str) -> bool {
        lock(&self.calls).iter().any(|call| call.starts_with(prefix))
    }

    fn next(&self, command: &str) -> Option<Scripted> {
        let mut scripts = lock(&self.scripts);
        let queue = scripts.get_mut(command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn output(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let command = render(program, args);
        lock(&self.calls).push(command.clone());

        match self.next(&command).or_else(|| self.next(program)) {
            None => Ok(CommandOutput {
                command,
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }),
            Some(Scripted::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(CommandOutput {
                command,
                code: Some(code),
                stdout,
                stderr,
            }),
            Some(Scripted::NotFound) => Err(SysError::Spawn {
                command,
                source: io::Error::from(io::ErrorKind::NotFound),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_queue_then_repeats_last() {
        let runner = ScriptedRunner::new();
        runner
            .fail("partprobe /dev/sda", 1, "busy")
            .respond("partprobe /dev/sda", "");

        assert!(runner.run("partprobe", &["/dev/sda"]).is_err());
        assert!(runner.run("partprobe", &["/dev/sda"]).is_ok());
        assert!(runner.run("partprobe", &["/dev/sda"]).is_ok());
        assert_eq!(runner.count("partprobe /dev/sda"), 3);
    }

    #[test]
    fn program_name_matches_any_arguments() {
        let runner = ScriptedRunner::new();
        runner
            .fail("mkisofs", 255, "no space")
            .respond("mkisofs -R /tmp/a", "exact");

        assert_eq!(runner.run("mkisofs", &["-R", "/tmp/a"]).unwrap().stdout, "exact");
        assert!(runner.run("mkisofs", &["-R", "/tmp/b"]).is_err());
    }

    #[test]
    fn unscripted_commands_succeed_silently() {
        let runner = ScriptedRunner::new();
        let output = runner.run("sync", &[]).unwrap();
        assert!(output.stdout.is_empty());
        assert_eq!(runner.calls(), vec!["sync".to_string()]);
    }
}
