// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use matrix_metadata::MatrixExitCode;
use matrix_runner::errors::{
    ConfigParseError, IgnorePolicyError, ReportProcessError, SourceTreeError, TagSelectionError,
    TestProfileNotFound,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that ends a driver-matrix invocation, with a known exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test profile not found")]
    TestProfileNotFound {
        #[from]
        err: TestProfileNotFound,
    },
    #[error("source tree error")]
    SourceTree {
        #[from]
        err: SourceTreeError,
    },
    #[error("tag selection error")]
    TagSelection {
        #[from]
        err: TagSelectionError,
    },
    #[error("ignore policy error")]
    IgnorePolicy {
        #[from]
        err: IgnorePolicyError,
    },
    #[error("report processing error")]
    ReportProcess {
        #[from]
        err: ReportProcessError,
    },
    #[error("{failed} of {total} matrix cells failed")]
    MatrixFailed { failed: usize, total: usize },
    #[error("analysis verdict is failed")]
    AnalysisFailed { tests: usize },
    #[error("failed to serialize matrix report")]
    ReportSerialize {
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to write matrix report to `{path}`")]
    ReportWrite {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error writing output")]
    WriteError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. }
            | Self::TestProfileNotFound { .. }
            | Self::SourceTree { .. }
            | Self::TagSelection { .. }
            | Self::IgnorePolicy { .. } => MatrixExitCode::SETUP_ERROR,
            Self::MatrixFailed { .. } | Self::AnalysisFailed { .. } => MatrixExitCode::CELL_FAILED,
            Self::ReportProcess { .. } => MatrixExitCode::REPORT_PROCESSING_FAILED,
            Self::ReportSerialize { .. } | Self::ReportWrite { .. } | Self::WriteError { .. } => {
                MatrixExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse matrix config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::TestProfileNotFound { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::SourceTree { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TagSelection { err } => {
                tracing::error!("{err}");
                None
            }
            Self::IgnorePolicy { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::ReportProcess { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::MatrixFailed { failed, total } => {
                tracing::error!(
                    "{} of {total} matrix cells failed",
                    failed.style(styles.bold)
                );
                None
            }
            Self::AnalysisFailed { tests } => {
                if *tests == 0 {
                    tracing::error!("no tests were found in the report parts");
                } else {
                    tracing::error!("report has failing tests");
                }
                None
            }
            Self::ReportSerialize { err } => {
                tracing::error!("failed to serialize matrix report");
                Some(err as &dyn Error)
            }
            Self::ReportWrite { path, err } => {
                tracing::error!(
                    "failed to write matrix report to `{}`",
                    path.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::WriteError { err } => {
                tracing::error!("failed to write to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
