// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! External process execution.
//!
//! Every external tool is reached through the [`CommandRunner`] trait so the
//! pipeline stages can be driven by a scripted runner in tests. Commands are
//! always an explicit program plus argument vector; nothing is passed through
//! a host shell.
//!
//! There is no retry anywhere in this module. A failed invocation surfaces
//! immediately with its command line, exit code and standard error.
//!
//! A timeout kills the child process only. Anything the child started
//! elsewhere, such as a container in the runtime daemon, keeps running; see
//! [`crate::container::ContainerRuntime::execute`].

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::errors::AppError;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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
}

impl fmt::Display for Invocation {
    /// Renders a copy-pasteable command line for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_arg(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_arg(arg))?;
        }
        Ok(())
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Runs `invocation` to completion and captures its output.
    ///
    /// A non-zero exit is *not* an error at this level; see [`run_checked`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ExecError`] if the process cannot be spawned and
    /// [`AppError::TimeoutError`] if it exceeds the runner's time limit.
    fn run(
        &self,
        invocation: &Invocation,
    ) -> impl Future<Output = Result<ProcessOutput, AppError>> + Send;
}

/// Runs commands on the host with [`tokio::process::Command`].
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kills any invocation that runs longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    #[tracing::instrument(skip(self), fields(command = %invocation))]
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, AppError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let pending = command.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| AppError::TimeoutError(invocation.to_string(), limit))?,
            None => pending.await,
        };
        let output =
            result.map_err(|err| AppError::ExecError(invocation.to_string(), err.to_string()))?;

        let output = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        tracing::trace!("[packager] exit code: {:?}", output.exit_code);
        tracing::trace!("[packager] stdout: {}", output.stdout);
        tracing::trace!("[packager] stderr: {}", output.stderr);

        Ok(output)
    }
}

/// Runs `invocation` and returns its stdout, failing on a non-zero exit.
///
/// # Errors
///
/// Returns [`AppError::RunError`] with the command line, exit code and
/// captured stderr when the process exits unsuccessfully, plus anything
/// [`CommandRunner::run`] returns.
pub async fn run_checked<R: CommandRunner>(
    runner: &R,
    invocation: &Invocation,
) -> Result<String, AppError> {
    tracing::debug!("[packager] running: {}", invocation);

    let output = runner.run(invocation).await?;

    if !output.success() {
        return Err(AppError::RunError {
            command: invocation.to_string(),
            code: output.exit_code,
            stderr: output.stderr,
        });
    }

    Ok(output.stdout)
}
