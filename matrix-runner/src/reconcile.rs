// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciling JUnit part files into one analyzed report.
//!
//! A single run of the driver's test suite is split across several sub-runs, one per test
//! profile. Each sub-run leaves a part file next to the final report path. Reconciling:
//!
//! 1. merges the parts into one testsuite (see [`SuiteMerger`]),
//! 2. classifies every test case against an [`IgnorePolicy`] (see [`classify`]),
//! 3. computes the summary and verdict (see [`AnalyzedReport`]), and
//! 4. writes the consolidated report over the final report path.

mod analysis;
mod classify;
mod merge;
mod outcome;
mod write;

pub use analysis::*;
pub use classify::*;
pub use merge::*;
pub use outcome::*;
pub use write::*;

use crate::{errors::ReportProcessError, policy::IgnorePolicy};
use camino::Utf8Path;
use tracing::debug;

/// Reconciles the part files of one report.
#[derive(Clone, Copy, Debug)]
pub struct JunitReconciler<'a> {
    xunit_file: &'a Utf8Path,
    suite_name: &'a str,
    policy: &'a IgnorePolicy,
}

impl<'a> JunitReconciler<'a> {
    /// Creates a reconciler for the parts of `xunit_file`.
    ///
    /// Every part must contain a testsuite named `suite_name`.
    pub fn new(xunit_file: &'a Utf8Path, suite_name: &'a str, policy: &'a IgnorePolicy) -> Self {
        Self {
            xunit_file,
            suite_name,
            policy,
        }
    }

    /// Merges and analyzes the parts without writing anything.
    pub fn analyze(&self) -> Result<AnalyzedReport, ReportProcessError> {
        let parts = discover_parts(self.xunit_file)?;
        debug!(
            "found {} report parts for `{}`",
            parts.len(),
            self.xunit_file
        );
        let suite = merge_part_files(&parts, self.suite_name)?;
        Ok(AnalyzedReport::new(suite, self.policy))
    }

    /// Merges and analyzes the parts, then writes the consolidated report.
    pub fn reconcile(&self, label: &RunLabel) -> Result<AnalyzedReport, ReportProcessError> {
        let analyzed = self.analyze()?;
        write_consolidated_report(&analyzed, label, self.xunit_file)?;
        debug!("wrote consolidated report to `{}`", self.xunit_file);
        Ok(analyzed)
    }
}
