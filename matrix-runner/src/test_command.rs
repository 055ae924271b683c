// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the driver's test suite for one test profile.

use crate::{command::ExternalCommand, config::TestProfile, errors::CommandError};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

/// Everything a test command needs for one profile of one matrix cell.
#[derive(Clone, Debug)]
pub struct TestInvocation<'a> {
    /// The root of the driver's source tree. Tests run from here.
    pub driver_root: &'a Utf8Path,

    /// The profile being run.
    pub profile: &'a TestProfile,

    /// Arguments pointing the suite at the cluster, as returned by
    /// [`Cluster::start`](crate::cluster::Cluster::start).
    pub connection_args: &'a str,

    /// The wire protocol version under test.
    pub protocol: u8,

    /// The CQL version passed to the driver.
    pub cql_version: &'a str,

    /// Arguments appended after everything else.
    pub extra_args: &'a [String],

    /// The database version the cluster runs.
    pub db_version: &'a str,

    /// Where the JUnit part file for this invocation must be written.
    pub output: &'a Utf8Path,
}

impl TestInvocation<'_> {
    /// The arguments passed to `go test`.
    pub fn go_test_args(&self) -> Vec<String> {
        let mut args = vec!["test".to_owned(), "-v".to_owned()];
        args.extend(self.profile.args().iter().cloned());
        args.extend(self.connection_args.split_whitespace().map(str::to_owned));
        args.push(format!("-proto={}", self.protocol));
        args.push(format!("-gocql.cversion={}", self.cql_version));
        args.extend(self.extra_args.iter().cloned());
        args.push("./...".to_owned());
        args
    }

    /// Environment variables set on top of the inherited environment.
    pub fn env(&self) -> [(&'static str, String); 2] {
        [
            ("PROTOCOL_VERSION", self.protocol.to_string()),
            ("SCYLLA_VERSION", self.db_version.to_owned()),
        ]
    }
}

/// Runs a test profile and leaves a JUnit part file behind.
pub trait TestCommandRunner {
    /// Runs the invocation.
    ///
    /// Failing tests are not an error. An error means the command could not be run at all.
    fn run(&self, invocation: &TestInvocation<'_>) -> Result<(), CommandError>;
}

/// Runs `go test`, converting its output to JUnit with `go-junit-report`.
#[derive(Clone, Debug)]
pub struct GoTestRunner {
    go_path: Utf8PathBuf,
    junit_report_path: Utf8PathBuf,
}

impl GoTestRunner {
    /// Creates a runner that finds `go` and `go-junit-report` on `PATH`.
    pub fn new() -> Self {
        Self {
            go_path: Utf8PathBuf::from("go"),
            junit_report_path: Utf8PathBuf::from("go-junit-report"),
        }
    }

    fn commands<'a>(
        &'a self,
        invocation: &'a TestInvocation<'_>,
    ) -> (ExternalCommand<'a>, ExternalCommand<'a>) {
        let mut go = ExternalCommand::new(self.go_path.as_str());
        go.args(invocation.go_test_args());

        let mut junit = ExternalCommand::new(self.junit_report_path.as_str());
        junit.args(["-iocopy", "-out", invocation.output.as_str()]);

        for command in [&mut go, &mut junit] {
            command.current_dir(invocation.driver_root.to_owned());
            for (key, value) in invocation.env() {
                command.env(key, value);
            }
        }
        (go, junit)
    }
}

impl Default for GoTestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCommandRunner for GoTestRunner {
    fn run(&self, invocation: &TestInvocation<'_>) -> Result<(), CommandError> {
        let (go, junit) = self.commands(invocation);
        let command = format!("{go} 2>&1 | {junit}");
        info!("running `{command}`");

        let output = go
            .to_expression()
            .stderr_to_stdout()
            .pipe(junit.to_expression())
            .unchecked()
            .run()
            .map_err(|error| CommandError::Exec {
                command: command.clone(),
                error,
            })?;
        if !output.status.success() {
            warn!(
                "test profile `{}` exited with {}",
                invocation.profile.name(),
                output.status
            );
        }
        Ok(())
    }
}
