// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use matrix_junit::{NonSuccessKind, TestCaseStatus};
use std::fmt;

/// The failure message that marks a test expected to fail which passed instead.
pub const UNEXPECTED_SUCCESS_MESSAGE: &str = "Unexpected success";

/// The outcome of a single test case, as recorded by the test runner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum RawOutcome {
    /// No diagnostic child.
    Passed,

    /// A `failure` child.
    Failed,

    /// An `error` child.
    Errored,

    /// A `skipped` child.
    Skipped,

    /// A `failure` child whose message is exactly [`UNEXPECTED_SUCCESS_MESSAGE`].
    UnexpectedSuccess,
}

impl RawOutcome {
    /// Derives the outcome from a parsed test case status.
    pub fn from_status(status: &TestCaseStatus) -> Self {
        match status {
            TestCaseStatus::Success => Self::Passed,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                message,
                ..
            } if message.as_deref() == Some(UNEXPECTED_SUCCESS_MESSAGE) => Self::UnexpectedSuccess,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                ..
            } => Self::Failed,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Error,
                ..
            } => Self::Errored,
            TestCaseStatus::Skipped { .. } => Self::Skipped,
        }
    }

    /// Returns true if the test case carries a `failure` or `error` diagnostic.
    ///
    /// An unexpected success is recorded as a failure, so it counts here too.
    pub fn is_failing(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Errored | Self::UnexpectedSuccess
        )
    }

    /// Returns a short name for this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Skipped => "skipped",
            Self::UnexpectedSuccess => "unexpected-success",
        }
    }
}

impl fmt::Display for RawOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
