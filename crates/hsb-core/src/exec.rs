//! External command execution.
//!
//! Everything that shells out (git, the `mv` fallback) goes through
//! [`CommandRunner`] so tests can record invocations instead of running them.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::HsbError;

/// A command to run: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// `git <args...>`
    pub fn git<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(Self::new("git"), |spec, a| spec.arg(a))
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering used when echoing commands.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with no captured text.
    pub fn ok() -> Self {
        Self {
            status: Some(0),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Abstraction over running external commands.
pub trait CommandRunner {
    /// Run `spec` to completion. An `Err` means the command could not be
    /// started; a non-zero exit is reported through [`CommandOutput::status`].
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HsbError>;

    /// Run `spec` and turn a non-zero exit into [`HsbError::CommandFailed`].
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, HsbError> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(HsbError::CommandFailed {
                command: spec.to_string(),
                status: output.status,
                stderr: output.stderr,
            })
        }
    }
}

/// Runs commands on the host with `std::process::Command`.
///
/// The command line and every line the command prints are echoed at info
/// level as they arrive; both streams are also captured for the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HsbError> {
        tracing::info!("$ {spec}");

        let spawn_error = |source| HsbError::Spawn {
            command: spec.to_string(),
            source,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        let mut child = cmd.spawn().map_err(spawn_error)?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        let (stdout, stderr) = thread::scope(|s| {
            let err = s.spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || echo_lines(stderr))
            });
            let out = echo_lines(stdout);
            (out, err.join().unwrap_or_default())
        });

        let status = child.wait().map_err(spawn_error)?;
        Ok(CommandOutput {
            status: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Echo each line of `pipe` and return everything that was read.
fn echo_lines(pipe: Option<impl Read>) -> String {
    let Some(pipe) = pipe else {
        return String::new();
    };

    let mut reader = BufReader::new(pipe);
    let mut captured = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                tracing::info!("{}", line.trim_end_matches(['\r', '\n']));
                captured.push_str(&line);
            }
        }
    }
    captured
}
