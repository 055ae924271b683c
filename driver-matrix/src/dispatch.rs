// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line parsing and command routing.

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter, StdoutStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use matrix_metadata::{MatrixExitCode, MatrixReportSerializable};
use matrix_runner::{
    cluster::CcmProvisioner,
    config::MatrixConfig,
    matrix::run_matrix,
    policy::IgnorePolicy,
    reconcile::{AnalyzedReport, Category, JunitReconciler, RunLabel},
    run::CellContext,
    source::{GitSourceTree, SourceTree},
    test_command::GoTestRunner,
    versions::{DriverType, select_latest_tags},
};
use owo_colors::OwoColorize;
use std::io::Write;
use tracing::{debug, info};

/// The file name of the aggregate report, relative to the xunit directory.
pub const REPORT_FILE_NAME: &str = "matrix-report.json";

/// Runs a database driver's integration tests across driver and protocol versions.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct DriverMatrixApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl DriverMatrixApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Run(opts) => opts.exec(),
            Command::Analyze(opts) => opts.exec(output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check out each driver version, run its tests against each protocol and analyze the reports
    Run(Box<RunOpts>),

    /// Merge and analyze existing report parts without running anything
    ///
    /// Part files are the files next to `--xunit-file` named `<xunit-file>_part_<N>`. The
    /// consolidated report is written over `--xunit-file`.
    Analyze(AnalyzeOpts),
}

/// Which driver versions to test.
#[derive(Clone, Debug, Eq, PartialEq)]
enum VersionsArg {
    /// The newest release of each of the latest N minor versions.
    Latest(usize),

    /// These tags, in order.
    Tags(Vec<String>),
}

fn parse_versions(input: &str) -> std::result::Result<VersionsArg, String> {
    let input = input.trim();
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse()
            .map(VersionsArg::Latest)
            .map_err(|error| format!("invalid version count `{input}`: {error}"));
    }

    let tags: Vec<_> = input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect();
    if tags.is_empty() {
        return Err("expected a number of versions or a comma-separated list of tags".to_owned());
    }
    Ok(VersionsArg::Tags(tags))
}

#[derive(Debug, Args)]
struct RunOpts {
    /// Path to the driver's git checkout
    #[arg(value_name = "DRIVER_GIT")]
    driver_git: Utf8PathBuf,

    /// Driver versions: a number N for the latest N releases, or a comma-separated list of tags
    #[arg(long, value_name = "N|TAGS", default_value = "2", value_parser = parse_versions)]
    versions: VersionsArg,

    /// Test profiles to run for each cell, in order
    #[arg(
        long,
        value_name = "PROFILES",
        value_delimiter = ',',
        default_value = "integration"
    )]
    tests: Vec<String>,

    /// Protocol versions to test each driver version with
    #[arg(
        long,
        value_name = "VERSIONS",
        value_delimiter = ',',
        default_value = "3,4",
        value_parser = clap::value_parser!(u8).range(1..)
    )]
    protocols: Vec<u8>,

    /// Database version clusters are created with
    #[arg(long, alias = "scylla-version", env = "SCYLLA_VERSION")]
    db_version: String,

    /// Directory holding per-version patches and ignore policies
    #[arg(long, value_name = "DIR", default_value = "versions")]
    versions_dir: Utf8PathBuf,

    /// Directory reports are written to
    #[arg(long, value_name = "DIR", default_value = "xunit")]
    xunit_dir: Utf8PathBuf,

    /// Config file [default: <DRIVER_GIT>/.config/driver-matrix.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Recipients of the matrix report; when set, the aggregate report is written for the mailer
    #[arg(long, value_name = "ADDR", num_args = 1.., value_delimiter = ',')]
    recipients: Vec<String>,

    /// Where to write the aggregate report [default: <XUNIT_DIR>/matrix-report.json]
    #[arg(long, value_name = "PATH")]
    report_file: Option<Utf8PathBuf>,
}

impl RunOpts {
    fn exec(self) -> Result<i32> {
        let config = MatrixConfig::from_sources(&self.driver_git, self.config_file.as_deref())?;
        // Unknown profiles are configuration errors, reported before anything is checked out.
        for name in &self.tests {
            config.test_profile(name)?;
        }

        let source_tree = GitSourceTree::new(self.driver_git.clone());
        let driver_remote = source_tree.origin_remote()?;
        let driver_type = DriverType::from_remote(&driver_remote);
        debug!("driver remote `{driver_remote}` is a {driver_type} driver");

        let versions = match &self.versions {
            VersionsArg::Latest(count) => {
                let tags = source_tree.tags_newest_first()?;
                select_latest_tags(&tags, *count)?
            }
            VersionsArg::Tags(tags) => tags.clone(),
        };
        info!(
            "testing driver versions [{}] with protocols [{}]",
            versions.join(", "),
            self.protocols.iter().join(", "),
        );

        let provisioner = CcmProvisioner::new();
        let test_runner = GoTestRunner::new();
        let ctx = CellContext {
            config: &config,
            source_tree: &source_tree,
            provisioner: &provisioner,
            test_runner: &test_runner,
            driver_type,
            versions_dir: &self.versions_dir,
            xunit_dir: &self.xunit_dir,
            db_version: &self.db_version,
            test_profiles: &self.tests,
        };
        let outcome = run_matrix(ctx, &versions, &self.protocols);

        if !self.recipients.is_empty() {
            let report = outcome.to_report(&self.db_version, Some(driver_remote));
            let report_file = self
                .report_file
                .unwrap_or_else(|| self.xunit_dir.join(REPORT_FILE_NAME));
            write_matrix_report(&report, &report_file)?;
            info!(
                "wrote matrix report for {} to `{report_file}`",
                self.recipients.join(", ")
            );
        }

        if outcome.is_success() {
            Ok(MatrixExitCode::OK)
        } else {
            let failed = outcome.cells().iter().filter(|cell| cell.is_failed()).count();
            Err(ExpectedError::MatrixFailed {
                failed,
                total: outcome.cells().len(),
            })
        }
    }
}

fn write_matrix_report(report: &MatrixReportSerializable, path: &Utf8Path) -> Result<()> {
    let json = report
        .to_json_pretty()
        .map_err(|err| ExpectedError::ReportSerialize { err })?;
    let write_error = |err| ExpectedError::ReportWrite {
        path: path.to_owned(),
        err,
    };

    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    atomicwrites::AtomicFile::new(path, atomicwrites::AllowOverwrite)
        .write(|file| file.write_all(json.as_bytes()))
        .map_err(|err| match err {
            atomicwrites::Error::Internal(err) | atomicwrites::Error::User(err) => write_error(err),
        })
}

#[derive(Debug, Args)]
struct AnalyzeOpts {
    /// The consolidated report path; part files are found next to it
    #[arg(long, value_name = "PATH")]
    xunit_file: Utf8PathBuf,

    /// Ignore policy file (TOML) to classify failures with
    #[arg(long, value_name = "PATH")]
    ignore_file: Option<Utf8PathBuf>,

    /// Protocol version the reports were produced with
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u8).range(1..)
    )]
    protocol: u8,

    /// Driver version the reports were produced with
    #[arg(long, value_name = "VERSION")]
    driver_version: String,

    /// Which driver the reports were produced with: scylla, upstream
    #[arg(long, value_name = "TYPE", default_value = "scylla")]
    driver_type: DriverType,

    /// The testsuite every part must contain [default: from the built-in config]
    #[arg(long, value_name = "NAME")]
    suite_name: Option<String>,
}

impl AnalyzeOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let suite_name = match self.suite_name {
            Some(suite_name) => suite_name,
            None => MatrixConfig::default_config()?.suite_name().to_owned(),
        };
        let policy = match &self.ignore_file {
            Some(path) => IgnorePolicy::from_path(path, self.protocol)?,
            None => IgnorePolicy::empty(),
        };
        let label = RunLabel::new(self.driver_type, self.driver_version, self.protocol);

        let analyzed =
            JunitReconciler::new(&self.xunit_file, &suite_name, &policy).reconcile(&label)?;

        let mut writer = output_writer.stdout_writer();
        write_analysis(&analyzed, &label, &output.stdout_styles(), &mut writer)
            .and_then(|()| writer.flush())
            .map_err(|err| ExpectedError::WriteError { err })?;

        if analyzed.is_failed() {
            Err(ExpectedError::AnalysisFailed {
                tests: analyzed.summary().tests(),
            })
        } else {
            Ok(MatrixExitCode::OK)
        }
    }
}

fn write_analysis(
    analyzed: &AnalyzedReport,
    label: &RunLabel,
    styles: &StdoutStyles,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    let verdict = if analyzed.is_failed() {
        "FAILED".style(styles.fail)
    } else {
        "PASSED".style(styles.pass)
    };
    writeln!(writer, "{label}: {verdict}")?;

    for (key, count) in analyzed.summary().iter() {
        writeln!(writer, "  {}: {count}", key.style(styles.key))?;
    }

    for category in Category::ALL {
        if category.is_accounted() && category != Category::XPassed {
            continue;
        }
        let names: Vec<_> = analyzed.detail().names(category).collect();
        if names.is_empty() {
            continue;
        }
        writeln!(writer, "{}:", category.style(styles.key))?;
        for name in names {
            writeln!(writer, "  {name}")?;
        }
    }

    Ok(())
}
