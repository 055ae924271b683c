// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invocations of external tools: `git`, `patch`, `ccm`, `go`.

use crate::errors::CommandError;
use camino::{Utf8Path, Utf8PathBuf};
use std::{borrow::Cow, fmt, process::ExitStatus};
use tracing::{debug, trace};

/// An external command line.
#[derive(Clone, Debug)]
pub struct ExternalCommand<'a> {
    program: Cow<'a, str>,
    args: Vec<Cow<'a, str>>,
    cwd: Option<Utf8PathBuf>,
    envs: Vec<(Cow<'a, str>, Cow<'a, str>)>,
}

impl<'a> ExternalCommand<'a> {
    /// Creates a command that runs `program` with no arguments.
    pub fn new(program: impl Into<Cow<'a, str>>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Appends an argument.
    pub fn arg(&mut self, arg: impl Into<Cow<'a, str>>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Cow<'a, str>>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds an environment variable on top of the inherited environment.
    pub fn env(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        value: impl Into<Cow<'a, str>>,
    ) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The program being run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    pub fn get_args(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|arg| &**arg)
    }

    /// The working directory, if set.
    pub fn get_current_dir(&self) -> Option<&Utf8Path> {
        self.cwd.as_deref()
    }

    /// Converts the command to a [`duct::Expression`].
    pub fn to_expression(&self) -> duct::Expression {
        let mut expression = duct::cmd(self.program.as_ref(), self.get_args());
        if let Some(cwd) = &self.cwd {
            expression = expression.dir(cwd.as_std_path());
        }
        for (key, value) in &self.envs {
            expression = expression.env(key.as_ref(), value.as_ref());
        }
        expression
    }

    /// Runs the command, capturing both output streams, and returns standard output.
    pub fn read(&self) -> Result<String, CommandError> {
        let output = self.output()?;
        Ok(output.stdout)
    }

    /// Runs the command, capturing both output streams.
    ///
    /// A non-zero exit status is an error.
    pub fn output(&self) -> Result<CommandOutput, CommandError> {
        let output = self.output_unchecked()?;
        if output.status.success() {
            Ok(output)
        } else {
            debug!("`{self}` failed with {}", output.status);
            trace!("stdout:\n{}", output.stdout);
            Err(CommandError::Failed {
                command: self.to_string(),
                status: output.status,
                stderr: output.stderr,
            })
        }
    }

    /// Runs the command, capturing both output streams, whatever its exit status.
    pub fn output_unchecked(&self) -> Result<CommandOutput, CommandError> {
        debug!("executing `{self}`");
        let output = self
            .to_expression()
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| CommandError::Exec {
                command: self.to_string(),
                error,
            })?;
        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl fmt::Display for ExternalCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(&self.args);
        for (i, word) in words.enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if needs_quoting(word) {
                f.write_str(&shell_words::quote(word))?;
            } else {
                f.write_str(word)?;
            }
        }
        Ok(())
    }
}

// Words made only of these characters are pasted into a shell unchanged.
fn needs_quoting(word: &str) -> bool {
    word.is_empty()
        || !word.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@' | '%')
        })
}

/// The captured result of an [`ExternalCommand`].
#[derive(Clone, Debug)]
pub struct CommandOutput {
    /// The exit status.
    pub status: ExitStatus,

    /// Standard output, lossily decoded.
    pub stdout: String,

    /// Standard error, lossily decoded.
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_words() {
        let mut command = ExternalCommand::new("go");
        command
            .args(["test", "-v"])
            .arg(r#"-tags="integration""#)
            .arg("./...");
        assert_eq!(
            command.to_string(),
            r#"go test -v '-tags="integration"' ./..."#
        );
        assert_eq!(command.program(), "go");
        assert_eq!(command.get_args().count(), 4);
    }

    #[test]
    fn display_leaves_plain_flags_unquoted() {
        let mut command = ExternalCommand::new("go");
        command
            .args(["test", "-timeout=10m", "-cluster=127.0.1.1"])
            .arg("-run=Test Foo")
            .arg("");
        assert_eq!(
            command.to_string(),
            "go test -timeout=10m -cluster=127.0.1.1 '-run=Test Foo' ''"
        );
    }

    #[cfg(unix)]
    #[test]
    fn read_captures_stdout() {
        let dir = camino_tempfile::tempdir().unwrap();
        let mut command = ExternalCommand::new("sh");
        command
            .args(["-c", "pwd; echo \"$MATRIX_TEST_VAR\""])
            .current_dir(dir.path())
            .env("MATRIX_TEST_VAR", "hello");
        let stdout = command.read().unwrap();
        let mut lines = stdout.lines();
        let cwd = lines.next().unwrap();
        assert!(
            cwd.ends_with(dir.path().file_name().unwrap()),
            "unexpected cwd {cwd}"
        );
        assert_eq!(lines.next(), Some("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn failure_carries_stderr() {
        let mut command = ExternalCommand::new("sh");
        command.args(["-c", "echo oops >&2; exit 3"]);
        let error = command.output().unwrap_err();
        match &error {
            CommandError::Failed { stderr, status, .. } => {
                assert_eq!(stderr, "oops\n");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.to_string().ends_with(":\noops"), "{error}");

        let output = command.output_unchecked().unwrap();
        assert!(!output.status.success());
    }

    #[test]
    fn spawn_failure() {
        let command = ExternalCommand::new("driver-matrix-no-such-program");
        let error = command.read().unwrap_err();
        assert!(
            matches!(error, CommandError::Exec { .. }),
            "unexpected error: {error:?}"
        );
    }
}
