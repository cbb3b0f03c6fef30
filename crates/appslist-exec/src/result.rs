//! Command description and result types

use std::fmt;
use std::time::Duration;

/// Placeholder printed instead of secret arguments
const REDACTED: &str = "********";

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status code (0 for success, -1 if killed by a signal)
    pub status: i32,
    /// stdout output, empty when discarded
    pub stdout: String,
    /// stderr output, empty when discarded
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Clone, PartialEq, Eq)]
enum Arg {
    Plain(String),
    Secret(String),
}

impl Arg {
    fn value(&self) -> &str {
        match self {
            Arg::Plain(v) | Arg::Secret(v) => v,
        }
    }
}

/// A program invocation: program name plus argument vector
///
/// Arguments are passed straight to the process without a shell. Arguments
/// added with [`CommandSpec::secret_arg`] are masked in `Display` and `Debug`
/// output so credentials never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<Arg>,
    capture_output: bool,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture_output: true,
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Plain(arg.into()));
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|a| Arg::Plain(a.into())));
        self
    }

    /// Append an argument that must never be printed
    #[must_use]
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Arg::Secret(arg.into()));
        self
    }

    /// Send stdout and stderr to the null device; only the exit status is kept
    #[must_use]
    pub fn discard_output(mut self) -> Self {
        self.capture_output = false;
        self
    }

    /// Whether stdout and stderr are collected
    #[must_use]
    pub fn captures_output(&self) -> bool {
        self.capture_output
    }

    /// Program to launch
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw argument values, secrets included
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(Arg::value)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            match arg {
                Arg::Plain(v) => write!(f, " {v}")?,
                Arg::Secret(_) => write!(f, " {REDACTED}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandSpec")
            .field(&self.to_string())
            .finish()
    }
}
