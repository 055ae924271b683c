// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::RawOutcome;
use crate::errors::ReportProcessError;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, map::Entry};
use matrix_junit::{Report, TestCase, TestSuite};
use std::{fs, io, time::Duration};
use swrite::{SWrite, swrite};
use tracing::debug;

/// The infix between a report file name and a part index.
pub const PART_INFIX: &str = "_part_";

/// Returns the path that part `index` of a report is written to.
pub fn part_path(xunit_file: &Utf8Path, index: usize) -> Utf8PathBuf {
    let mut path = xunit_file.as_str().to_owned();
    swrite!(path, "{PART_INFIX}{index}");
    Utf8PathBuf::from(path)
}

/// Lists the part files next to `xunit_file`, sorted by file name.
///
/// A missing directory has no parts.
pub fn discover_parts(xunit_file: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ReportProcessError> {
    let dir = match xunit_file.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let Some(file_name) = xunit_file.file_name() else {
        return Ok(Vec::new());
    };
    let prefix = format!("{file_name}{PART_INFIX}");

    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => {
            return Err(ReportProcessError::ListParts {
                dir: dir.to_owned(),
                error,
            });
        }
    };

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| ReportProcessError::ListParts {
            dir: dir.to_owned(),
            error,
        })?;
        if entry.file_name().starts_with(&prefix) {
            parts.push(entry.into_path());
        }
    }
    parts.sort_unstable_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(parts)
}

/// Reads each part file and merges its `suite_name` testsuite into one.
pub fn merge_part_files(
    parts: &[Utf8PathBuf],
    suite_name: &str,
) -> Result<TestSuite, ReportProcessError> {
    let mut merger = SuiteMerger::new(suite_name);
    for path in parts {
        let mut report =
            Report::from_path(path).map_err(|error| ReportProcessError::PartParse {
                path: path.clone(),
                error,
            })?;
        let suite =
            report
                .take_testsuite(suite_name)
                .ok_or_else(|| ReportProcessError::SuiteNotFound {
                    path: path.clone(),
                    suite_name: suite_name.to_owned(),
                })?;
        debug!(
            "merging {} test cases from `{path}`",
            suite.testcases.len()
        );
        merger.add_suite(suite);
    }
    Ok(merger.finish())
}

/// Merges testsuites from several sub-runs, in the order they ran.
///
/// A later entry for a test name replaces the recorded one only when neither of them is a
/// failure or error. A recorded failure is therefore never replaced by a later pass, and a
/// recorded pass is never downgraded by a later failure.
#[derive(Debug)]
pub struct SuiteMerger {
    name: String,
    time: Duration,
    timestamp: Option<String>,
    testcases: IndexMap<String, TestCase>,
}

impl SuiteMerger {
    /// Creates a merger producing a suite with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: Duration::ZERO,
            timestamp: None,
            testcases: IndexMap::new(),
        }
    }

    /// Adds the next sub-run's suite.
    pub fn add_suite(&mut self, suite: TestSuite) {
        self.time += suite.time.unwrap_or_default();
        // The last part processed sets the timestamp, even if it has none.
        self.timestamp = suite.timestamp;

        for testcase in suite.testcases {
            match self.testcases.entry(testcase.name.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(testcase);
                }
                Entry::Occupied(entry) => {
                    let recorded = RawOutcome::from_status(&entry.get().status);
                    let later = RawOutcome::from_status(&testcase.status);
                    if recorded.is_failing() || later.is_failing() {
                        debug!(
                            "{}: keeping recorded {recorded}, dropping later {later}",
                            entry.key()
                        );
                    } else {
                        debug!(
                            "{}: replacing recorded {recorded} with later {later}",
                            entry.key()
                        );
                        *entry.into_mut() = testcase;
                    }
                }
            }
        }
    }

    /// Returns the merged suite.
    pub fn finish(self) -> TestSuite {
        let mut suite = TestSuite::new(self.name);
        suite.set_time(self.time);
        suite.timestamp = self.timestamp;
        suite.add_testcases(self.testcases.into_values());
        suite
    }
}

/// Removes stale output for a report: the file itself and all of its parts.
pub fn remove_report_files(xunit_file: &Utf8Path) -> Result<(), ReportProcessError> {
    let parts = discover_parts(xunit_file)?;
    for path in std::iter::once(xunit_file).chain(parts.iter().map(|p| p.as_path())) {
        match fs::remove_file(path) {
            Ok(()) => debug!("removed stale report `{path}`"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(ReportProcessError::Write {
                    path: path.to_owned(),
                    error,
                });
            }
        }
    }
    Ok(())
}
