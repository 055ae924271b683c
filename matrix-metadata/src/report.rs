// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category counts for one analyzed matrix cell.
///
/// Field order is the order in which counts are written to reports and logs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct SummarySerializable {
    /// The total number of test cases.
    pub tests: usize,

    /// Test cases that errored and are not suppressed.
    pub errors: usize,

    /// Test cases that failed and are not suppressed.
    pub failures: usize,

    /// Test cases that were skipped by the test runner.
    pub skipped: usize,

    /// Test cases that passed unexpectedly.
    pub xpassed: usize,

    /// Test cases that failed as expected.
    pub xfailed: usize,

    /// Test cases that passed.
    pub passed: usize,

    /// Test cases whose failures are suppressed by the ignore list.
    pub ignored_in_analysis: usize,

    /// Test cases whose failures are suppressed by the flaky list.
    pub flaky: usize,
}

impl fmt::Display for SummarySerializable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tests: {}, errors: {}, failures: {}, skipped: {}, xpassed: {}, xfailed: {}, \
             passed: {}, ignored_in_analysis: {}, flaky: {}",
            self.tests,
            self.errors,
            self.failures,
            self.skipped,
            self.xpassed,
            self.xfailed,
            self.passed,
            self.ignored_in_analysis,
            self.flaky,
        )
    }
}

/// The outcome of one matrix cell.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CellResultSerializable {
    /// The cell ran to completion and its report was analyzed.
    Summary {
        /// The analyzed counts.
        summary: SummarySerializable,

        /// Whether the analysis verdict was a failure.
        failed: bool,
    },

    /// The cell could not run to completion.
    Exception {
        /// The top-level error message.
        message: String,

        /// The chain of underlying causes, outermost first.
        causes: Vec<String>,
    },
}

impl CellResultSerializable {
    /// Returns true if this cell failed or errored out.
    pub fn is_failed(&self) -> bool {
        match self {
            Self::Summary { failed, .. } => *failed,
            Self::Exception { .. } => true,
        }
    }
}

/// One (driver version, protocol version) combination and its outcome.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct MatrixCellSerializable {
    /// The driver version (a tag name) that was tested.
    pub driver_version: String,

    /// The wire protocol version that was tested.
    pub protocol: u8,

    /// The outcome.
    pub result: CellResultSerializable,
}

/// The overall status of a matrix run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatrixStatus {
    /// Every cell passed.
    Success,

    /// At least one cell failed or errored out.
    Failed,
}

impl fmt::Display for MatrixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// The aggregate report of a matrix run, consumed by mail senders.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct MatrixReportSerializable {
    /// The database version the clusters were provisioned with.
    pub db_version: String,

    /// The origin remote of the driver repository, if known.
    pub driver_remote: Option<String>,

    /// The overall status.
    pub status: MatrixStatus,

    /// Every cell in the order it was run.
    pub cells: Vec<MatrixCellSerializable>,
}

impl MatrixReportSerializable {
    /// Serializes this report as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reads a report from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
