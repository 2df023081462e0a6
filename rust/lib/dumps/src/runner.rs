//! External command execution.
//!
//! Every tool the dump workflow drives (docker-compose, pg_dump, aws, gpg,
//! lpass) goes through [`CommandRunner`]. Production code uses
//! [`ShellRunner`]; tests use [`ScriptedRunner`] to replay canned output and
//! inspect what would have been executed.

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use crate::error::DumpError;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    /// Data written to the child's stdin, then closed.
    pub stdin: Option<String>,
    /// Let the child write straight to the terminal instead of capturing.
    pub visible: bool,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            visible: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    pub fn visible(mut self) -> Self {
        self.visible = true;
        self
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a successful command. `stdout` is empty for
/// [`Cmd::visible`] commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub stdout: String,
}

/// Runs external commands. A non-zero exit status is an error.
pub trait CommandRunner {
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DumpError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DumpError> {
        (**self).run(cmd)
    }
}

/// Runs commands on the host through `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DumpError> {
        debug!("running: {}", cmd);

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        command.stdin(if cmd.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        if cmd.visible {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let spawn_err = |e: std::io::Error| DumpError::Spawn {
            program: cmd.program.clone(),
            message: e.to_string(),
        };
        let mut child = command.spawn().map_err(spawn_err)?;

        // The child must still be reaped when it closes stdin early, and its
        // stderr beats the broken pipe as an error.
        let write_result = match (&cmd.stdin, child.stdin.take()) {
            (Some(data), Some(mut pipe)) => pipe.write_all(data.as_bytes()),
            _ => Ok(()),
        };

        let output = child.wait_with_output().map_err(spawn_err)?;
        if !output.status.success() {
            return Err(DumpError::Command {
                command: cmd.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        write_result?;

        Ok(CmdOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

// ── ScriptedRunner ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Outcome {
    Success(String),
    Failure(String),
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    outcome: Outcome,
    remaining: Option<usize>,
}

/// A runner that never touches the host. Used for testing.
///
/// Responses are matched by substring against the rendered command line, in
/// the order they were registered. A rule with a count is consumed after
/// that many matches. Commands without a matching rule succeed with empty
/// output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    effects: Vec<(String, Effect)>,
    calls: Mutex<Vec<Cmd>>,
}

type Effect = Box<dyn Fn(&Cmd) + Send + Sync>;

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer commands containing `pattern` with `stdout`.
    pub fn ok(self, pattern: &str, stdout: &str) -> Self {
        self.push(pattern, Outcome::Success(stdout.to_string()), None)
    }

    /// Always fail commands containing `pattern`.
    pub fn fail(self, pattern: &str, stderr: &str) -> Self {
        self.push(pattern, Outcome::Failure(stderr.to_string()), None)
    }

    /// Fail the next `times` commands containing `pattern`.
    pub fn fail_times(self, pattern: &str, times: usize, stderr: &str) -> Self {
        self.push(pattern, Outcome::Failure(stderr.to_string()), Some(times))
    }

    /// Run `effect` for every command containing `pattern`, before its
    /// response is returned. Lets tests create the files a tool would write.
    pub fn effect(mut self, pattern: &str, effect: impl Fn(&Cmd) + Send + Sync + 'static) -> Self {
        self.effects.push((pattern.to_string(), Box::new(effect)));
        self
    }

    fn push(self, pattern: &str, outcome: Outcome, remaining: Option<usize>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.to_string(),
                outcome,
                remaining,
            });
        }
        self
    }

    /// Every command executed so far, rendered as command lines.
    pub fn calls(&self) -> Vec<String> {
        self.commands().iter().map(Cmd::to_string).collect()
    }

    /// Every command executed so far.
    pub fn commands(&self) -> Vec<Cmd> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of executed commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &Cmd) -> Result<CmdOutput, DumpError> {
        let line = cmd.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }
        for (pattern, effect) in &self.effects {
            if line.contains(pattern.as_str()) {
                effect(cmd);
            }
        }

        let outcome = {
            let mut rules = self
                .rules
                .lock()
                .map_err(|e| DumpError::Io(e.to_string()))?;
            rules
                .iter_mut()
                .find(|r| line.contains(&r.pattern) && r.remaining != Some(0))
                .map(|r| {
                    if let Some(n) = r.remaining.as_mut() {
                        *n -= 1;
                    }
                    r.outcome.clone()
                })
        };

        match outcome {
            Some(Outcome::Failure(stderr)) => Err(DumpError::Command {
                command: line,
                status: 1,
                stderr,
            }),
            Some(Outcome::Success(stdout)) => Ok(CmdOutput { stdout }),
            None => Ok(CmdOutput::default()),
        }
    }
}
