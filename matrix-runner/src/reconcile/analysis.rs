// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Category, RawOutcome, RuleInput, classify};
use crate::policy::IgnorePolicy;
use matrix_junit::{TestCase, TestSuite};
use matrix_metadata::SummarySerializable;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Category counts for one analyzed report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    tests: usize,
    counts: [usize; Category::ALL.len()],
}

impl Summary {
    fn from_categories(categories: &[Category]) -> Self {
        let mut summary = Self::default();
        for &category in categories {
            summary.tests += 1;
            summary.counts[Self::slot(category)] += 1;
        }
        summary
    }

    fn slot(category: Category) -> usize {
        category as usize
    }

    /// The total number of test cases.
    pub fn tests(&self) -> usize {
        self.tests
    }

    /// The number of test cases in a category.
    pub fn count(&self, category: Category) -> usize {
        self.counts[Self::slot(category)]
    }

    /// Returns `(key, count)` pairs in reporting order, starting with `tests`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        std::iter::once(("tests", self.tests)).chain(
            Category::ALL
                .iter()
                .map(|&category| (category.as_str(), self.count(category))),
        )
    }

    /// Returns true unless every test case is in a non-failing category.
    ///
    /// A report with no test cases is failed.
    pub fn is_failed(&self) -> bool {
        let accounted: usize = Category::ALL
            .iter()
            .filter(|category| category.is_accounted())
            .map(|&category| self.count(category))
            .sum();
        !(self.tests > 0 && self.tests == accounted)
    }

    /// Converts this summary into its serializable form.
    pub fn to_serializable(&self) -> SummarySerializable {
        SummarySerializable {
            tests: self.tests,
            errors: self.count(Category::Errors),
            failures: self.count(Category::Failures),
            skipped: self.count(Category::Skipped),
            xpassed: self.count(Category::XPassed),
            xfailed: self.count(Category::XFailed),
            passed: self.count(Category::Passed),
            ignored_in_analysis: self.count(Category::IgnoredInAnalysis),
            flaky: self.count(Category::Flaky),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_serializable(), f)
    }
}

/// The test names in each category.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SummaryDetail {
    names: BTreeMap<Category, BTreeSet<String>>,
}

impl SummaryDetail {
    /// Returns the test names in a category.
    pub fn names(&self, category: Category) -> impl Iterator<Item = &str> + '_ {
        self.names
            .get(&category)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    /// Returns true if the named test is in the category.
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.names
            .get(&category)
            .is_some_and(|names| names.contains(name))
    }

    /// Returns the category of a test, if it is known.
    pub fn category_of(&self, name: &str) -> Option<Category> {
        self.names
            .iter()
            .find(|(_, names)| names.contains(name))
            .map(|(&category, _)| category)
    }
}

/// A testsuite together with its classification.
///
/// Every aggregate is computed once, when the report is constructed.
#[derive(Clone, Debug)]
pub struct AnalyzedReport {
    suite: TestSuite,
    categories: Vec<Category>,
    summary: Summary,
    detail: SummaryDetail,
}

impl AnalyzedReport {
    /// Classifies every test case in the suite against the policy.
    pub fn new(suite: TestSuite, policy: &IgnorePolicy) -> Self {
        let categories: Vec<_> = suite
            .testcases
            .iter()
            .map(|case| {
                let outcome = RawOutcome::from_status(&case.status);
                classify(&RuleInput::new(&case.name, outcome, policy))
            })
            .collect();

        let mut detail = SummaryDetail::default();
        for (case, &category) in suite.testcases.iter().zip(&categories) {
            detail
                .names
                .entry(category)
                .or_default()
                .insert(case.name.clone());
        }

        let summary = Summary::from_categories(&categories);
        Self {
            suite,
            categories,
            summary,
            detail,
        }
    }

    /// Returns the analyzed suite.
    pub fn suite(&self) -> &TestSuite {
        &self.suite
    }

    /// Returns the category counts.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Returns the test names in each category.
    pub fn detail(&self) -> &SummaryDetail {
        &self.detail
    }

    /// Returns true if this report should fail the run.
    pub fn is_failed(&self) -> bool {
        self.summary.is_failed()
    }

    /// Iterates over the test cases with their categories, in suite order.
    pub fn classified_cases(&self) -> impl Iterator<Item = (&TestCase, Category)> + '_ {
        self.suite
            .testcases
            .iter()
            .zip(self.categories.iter().copied())
    }
}
