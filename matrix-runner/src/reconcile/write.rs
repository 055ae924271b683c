// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AnalyzedReport, Category};
use crate::{errors::ReportProcessError, versions::DriverType};
use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::Utf8Path;
use matrix_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{fmt, io::Write};

/// The `type` attribute written on diagnostics rewritten to `skipped`.
pub const SUPPRESSED_TYPE: &str = "xunit.fail";

/// Returns the message explaining why a test was moved into a category, if it was.
pub fn reclassification_message(category: Category) -> Option<&'static str> {
    match category {
        Category::XPassed => Some(
            "This test marked as 'xpassed' because it contains '@unittest.expectedFailure' mark - \
             Please remove this mark from the test",
        ),
        Category::XFailed => Some(
            "This test marked as 'xfailed' because it contains '@unittest.expectedFailure' mark - \
             Please remove this mark from the test",
        ),
        Category::IgnoredInAnalysis => Some(
            "This test marked as 'skipped' because it appears in the ignore file as 'ignore' test",
        ),
        Category::Flaky => Some(
            "This test marked as 'skipped' because it appears in the ignore file as 'flaky' test",
        ),
        Category::Errors | Category::Failures | Category::Skipped | Category::Passed => None,
    }
}

/// Identifies one run, so that several runs can share a CI view.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunLabel {
    /// Which driver was tested.
    pub driver_type: DriverType,

    /// The driver version (tag) that was tested.
    pub driver_version: String,

    /// The protocol version that was tested.
    pub protocol: u8,
}

impl RunLabel {
    /// Creates a new label.
    pub fn new(driver_type: DriverType, driver_version: impl Into<String>, protocol: u8) -> Self {
        Self {
            driver_type,
            driver_version: driver_version.into(),
            protocol,
        }
    }

    /// Returns the classname of a test case under this label.
    pub fn relabel(&self, classname: Option<&str>) -> String {
        format!("{self}_{}", classname.unwrap_or_default())
    }
}

impl fmt::Display for RunLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_version_{}_v{}",
            self.driver_type, self.driver_version, self.protocol
        )
    }
}

/// Builds the consolidated report for an analyzed suite.
///
/// Test cases are relabeled, and the diagnostics of reclassified cases are rewritten to
/// explain their category. The suite carries the summary counts as attributes.
pub fn consolidated_report(analyzed: &AnalyzedReport, label: &RunLabel) -> Report {
    let merged = analyzed.suite();
    let mut suite = TestSuite::new(merged.name.clone());
    suite.time = merged.time;
    suite.timestamp = merged.timestamp.clone();
    for (key, count) in analyzed.summary().iter() {
        suite.extra.insert(key.to_owned(), count.to_string());
    }

    suite.add_testcases(
        analyzed
            .classified_cases()
            .map(|(case, category)| rewrite_case(case, category, label)),
    );

    let mut report = Report::new();
    report.add_testsuite(suite);
    report
}

fn rewrite_case(case: &TestCase, category: Category, label: &RunLabel) -> TestCase {
    let mut case = case.clone();
    case.classname = Some(label.relabel(case.classname.as_deref()));
    case.status = match category {
        // Passing cases keep whatever they recorded.
        Category::Passed | Category::XPassed => case.status,
        Category::Errors | Category::Failures | Category::Skipped => case.status,
        Category::XFailed => {
            let mut status = TestCaseStatus::non_success(NonSuccessKind::Failure);
            copy_body(&case.status, &mut status, category, case.status.ty());
            status
        }
        Category::IgnoredInAnalysis | Category::Flaky => {
            let mut status = TestCaseStatus::skipped();
            copy_body(&case.status, &mut status, category, Some(SUPPRESSED_TYPE));
            status
        }
    };
    case
}

fn copy_body(
    from: &TestCaseStatus,
    to: &mut TestCaseStatus,
    category: Category,
    ty: Option<&str>,
) {
    if let Some(message) = reclassification_message(category) {
        to.set_message(message);
    }
    if let Some(ty) = ty {
        to.set_type(ty);
    }
    if let Some(description) = from.description() {
        to.set_description(description);
    }
}

/// Writes the consolidated report to `path`, replacing any existing file.
pub fn write_consolidated_report(
    analyzed: &AnalyzedReport,
    label: &RunLabel,
    path: &Utf8Path,
) -> Result<(), ReportProcessError> {
    let contents = consolidated_report(analyzed, label)
        .to_string()
        .map_err(|error| ReportProcessError::Serialize {
            path: path.to_owned(),
            error,
        })?;

    AtomicFile::new(path, AllowOverwrite)
        .write(|file| file.write_all(contents.as_bytes()))
        .map_err(|error| ReportProcessError::Write {
            path: path.to_owned(),
            error: match error {
                atomicwrites::Error::Internal(error) | atomicwrites::Error::User(error) => error,
            },
        })
}
