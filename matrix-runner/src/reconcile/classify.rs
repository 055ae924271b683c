// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ordered rule table that assigns each test case its final category.

use super::RawOutcome;
use crate::policy::IgnorePolicy;
use std::fmt;

/// The final classification of a test case.
///
/// Variants are declared in the order summary counts are reported.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum Category {
    /// The test errored and is not suppressed.
    Errors,

    /// The test failed and is not suppressed.
    Failures,

    /// The test was skipped by the test runner.
    Skipped,

    /// The test passed although it was expected to fail or was suppressed.
    XPassed,

    /// The test failed as expected.
    ///
    /// No rule assigns this category; the slot is kept so reports keep their shape.
    XFailed,

    /// The test passed.
    Passed,

    /// The test's failure is suppressed by the ignore list.
    IgnoredInAnalysis,

    /// The test's failure is suppressed by the flaky list.
    Flaky,
}

impl Category {
    /// All categories, in reporting order.
    pub const ALL: [Category; 8] = [
        Category::Errors,
        Category::Failures,
        Category::Skipped,
        Category::XPassed,
        Category::XFailed,
        Category::Passed,
        Category::IgnoredInAnalysis,
        Category::Flaky,
    ];

    /// Returns the name used for this category in summaries and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Errors => "errors",
            Category::Failures => "failures",
            Category::Skipped => "skipped",
            Category::XPassed => "xpassed",
            Category::XFailed => "xfailed",
            Category::Passed => "passed",
            Category::IgnoredInAnalysis => "ignored_in_analysis",
            Category::Flaky => "flaky",
        }
    }

    /// Returns true if test cases in this category count towards a successful verdict.
    pub fn is_accounted(self) -> bool {
        !matches!(self, Category::Errors | Category::Failures)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the rule table looks at for one test case.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub struct RuleInput {
    /// The outcome recorded by the test runner.
    pub outcome: RawOutcome,

    /// Whether the test is on the ignore list.
    pub ignored: bool,

    /// Whether the test is on the flaky list.
    pub flaky: bool,
}

impl RuleInput {
    /// Looks up the test's policy membership.
    pub fn new(name: &str, outcome: RawOutcome, policy: &IgnorePolicy) -> Self {
        Self {
            outcome,
            ignored: policy.contains_ignore(name),
            flaky: policy.contains_flaky(name),
        }
    }
}

/// A single row of the classification table.
#[derive(Debug)]
pub struct ClassificationRule {
    /// A short description of the row.
    pub name: &'static str,

    /// The category assigned when the row matches.
    pub category: Category,

    matches: fn(&RuleInput) -> bool,
}

impl ClassificationRule {
    /// Returns true if this rule applies to the input.
    pub fn matches(&self, input: &RuleInput) -> bool {
        (self.matches)(input)
    }
}

/// The classification rules, evaluated top to bottom. The first match wins.
///
/// The ignore list is checked before the flaky list, so a test on both is ignored.
pub static CLASSIFICATION_RULES: [ClassificationRule; 9] = [
    ClassificationRule {
        name: "ignored unexpected success",
        category: Category::IgnoredInAnalysis,
        matches: |input| input.outcome == RawOutcome::UnexpectedSuccess && input.ignored,
    },
    ClassificationRule {
        name: "unexpected success",
        category: Category::XPassed,
        matches: |input| input.outcome == RawOutcome::UnexpectedSuccess,
    },
    ClassificationRule {
        name: "ignored",
        category: Category::IgnoredInAnalysis,
        matches: |input| input.ignored && input.outcome != RawOutcome::Passed,
    },
    ClassificationRule {
        name: "flaky",
        category: Category::Flaky,
        matches: |input| input.flaky && input.outcome != RawOutcome::Passed,
    },
    ClassificationRule {
        name: "errored",
        category: Category::Errors,
        matches: |input| input.outcome == RawOutcome::Errored,
    },
    ClassificationRule {
        name: "failed",
        category: Category::Failures,
        matches: |input| input.outcome == RawOutcome::Failed,
    },
    ClassificationRule {
        name: "suppressed but passed",
        category: Category::XPassed,
        matches: |input| input.outcome == RawOutcome::Passed && (input.ignored || input.flaky),
    },
    ClassificationRule {
        name: "passed",
        category: Category::Passed,
        matches: |input| input.outcome == RawOutcome::Passed,
    },
    ClassificationRule {
        name: "skipped",
        category: Category::Skipped,
        matches: |input| input.outcome == RawOutcome::Skipped,
    },
];

/// Returns the first rule that matches the input.
pub fn matching_rule(input: &RuleInput) -> &'static ClassificationRule {
    match CLASSIFICATION_RULES.iter().find(|rule| rule.matches(input)) {
        Some(rule) => rule,
        None => unreachable!("the last rules cover every outcome: {input:?}"),
    }
}

/// Assigns the final category for one test case.
pub fn classify(input: &RuleInput) -> Category {
    matching_rule(input).category
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::proptest;

    fn rule_input(outcome: RawOutcome, ignored: bool, flaky: bool) -> RuleInput {
        RuleInput {
            outcome,
            ignored,
            flaky,
        }
    }

    #[test_case(RawOutcome::UnexpectedSuccess, true, false, Category::IgnoredInAnalysis ; "ignored unexpected success")]
    #[test_case(RawOutcome::UnexpectedSuccess, true, true, Category::IgnoredInAnalysis ; "ignored and flaky unexpected success")]
    #[test_case(RawOutcome::UnexpectedSuccess, false, false, Category::XPassed ; "unexpected success")]
    #[test_case(RawOutcome::UnexpectedSuccess, false, true, Category::XPassed ; "flaky unexpected success")]
    #[test_case(RawOutcome::Failed, true, false, Category::IgnoredInAnalysis ; "ignored failure")]
    #[test_case(RawOutcome::Errored, true, false, Category::IgnoredInAnalysis ; "ignored error")]
    #[test_case(RawOutcome::Skipped, true, false, Category::IgnoredInAnalysis ; "ignored skip")]
    #[test_case(RawOutcome::Failed, true, true, Category::IgnoredInAnalysis ; "ignore wins over flaky")]
    #[test_case(RawOutcome::Failed, false, true, Category::Flaky ; "flaky failure")]
    #[test_case(RawOutcome::Errored, false, true, Category::Flaky ; "flaky error")]
    #[test_case(RawOutcome::Skipped, false, true, Category::Flaky ; "flaky skip")]
    #[test_case(RawOutcome::Errored, false, false, Category::Errors ; "error")]
    #[test_case(RawOutcome::Failed, false, false, Category::Failures ; "failure")]
    #[test_case(RawOutcome::Passed, true, false, Category::XPassed ; "ignored but passed")]
    #[test_case(RawOutcome::Passed, false, true, Category::XPassed ; "flaky but passed")]
    #[test_case(RawOutcome::Passed, false, false, Category::Passed ; "passed")]
    #[test_case(RawOutcome::Skipped, false, false, Category::Skipped ; "skipped")]
    fn classify_table(outcome: RawOutcome, ignored: bool, flaky: bool, expected: Category) {
        assert_eq!(classify(&rule_input(outcome, ignored, flaky)), expected);
    }

    #[test]
    fn precedence_is_reported_by_rule_name() {
        assert_eq!(
            matching_rule(&rule_input(RawOutcome::Failed, true, true)).name,
            "ignored"
        );
        assert_eq!(
            matching_rule(&rule_input(RawOutcome::UnexpectedSuccess, true, false)).name,
            "ignored unexpected success"
        );
        assert_eq!(
            matching_rule(&rule_input(RawOutcome::Skipped, false, false)).name,
            "skipped"
        );
    }

    #[proptest(cases = 64)]
    fn classify_never_assigns_xfailed(input: RuleInput) {
        assert_ne!(classify(&input), Category::XFailed);
    }

    #[proptest(cases = 64)]
    fn unsuppressed_cases_keep_their_outcome(outcome: RawOutcome) {
        let category = classify(&rule_input(outcome, false, false));
        let expected = match outcome {
            RawOutcome::Passed => Category::Passed,
            RawOutcome::Failed => Category::Failures,
            RawOutcome::Errored => Category::Errors,
            RawOutcome::Skipped => Category::Skipped,
            RawOutcome::UnexpectedSuccess => Category::XPassed,
        };
        assert_eq!(category, expected);
    }

    #[proptest(cases = 64)]
    fn suppressed_cases_are_never_failing(input: RuleInput) {
        if input.ignored || input.flaky {
            assert!(classify(&input).is_accounted());
        }
    }
}
