// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{Fake, Fakes, SUITE_NAME, Workspace, part_xml};
use matrix_junit::{NonSuccessKind, Report, TestCaseStatus};
use matrix_runner::{
    errors::{CellRunError, ClusterError, ReportProcessError, SourceTreeError},
    reconcile::Category,
    run::CellRun,
};
use pretty_assertions::assert_eq;
use std::fs;

fn profiles(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

#[test]
fn sub_runs_are_merged_without_downgrading() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.test_runner.parts.insert(
        "integration".to_owned(),
        part_xml(&[("TestA", Fake::Pass), ("TestB", Fake::Fail)]),
    );
    fakes.test_runner.parts.insert(
        "ccm".to_owned(),
        part_xml(&[("TestA", Fake::Fail), ("TestB", Fake::Pass)]),
    );
    let test_profiles = profiles(&["integration", "ccm"]);

    let cell = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4);
    let analyzed = cell.run().expect("cell ran");

    assert_eq!(analyzed.summary().tests(), 2);
    assert_eq!(analyzed.summary().count(Category::Passed), 1);
    assert_eq!(analyzed.summary().count(Category::Failures), 1);
    assert!(analyzed.is_failed());
    assert!(analyzed.detail().contains(Category::Passed, "TestA"));
    assert!(analyzed.detail().contains(Category::Failures, "TestB"));

    assert_eq!(
        fakes.events(),
        vec![
            "checkout v1.0.0",
            "create 127.0.10. 2024.1.3",
            "start",
            "run integration -cluster=127.0.10.1 -clusterSize=1 -rf=1",
            "remove",
            "create 127.0.10. 2024.1.3",
            "start",
            "run ccm -cluster=127.0.10.1 -clusterSize=1 -rf=1",
            "remove",
        ]
    );
    assert_eq!(ws.lock_files(), 0, "address prefixes are released");

    let xunit_file = cell.xunit_file();
    assert_eq!(
        xunit_file,
        ws.xunit_dir.join("v1.0.0/xunit.scylla.v4.v1.0.0.xml")
    );
    let report = Report::from_path(&xunit_file).expect("consolidated report parses");
    let suite = report
        .find_testsuite(SUITE_NAME)
        .expect("suite is present");
    // Standard counters are recomputed by readers; the analysis counts are kept.
    assert_eq!(suite.extra.get("passed").map(String::as_str), Some("1"));
    assert_eq!(suite.extra.get("xfailed").map(String::as_str), Some("0"));
    let classnames: Vec<_> = suite
        .testcases
        .iter()
        .map(|case| case.classname.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(
        classnames,
        vec![
            "scylla_version_v1.0.0_v4_gocql",
            "scylla_version_v1.0.0_v4_gocql"
        ]
    );
    assert_eq!(suite.testcases[1].status.tag(), Some(NonSuccessKind::Failure.tag()));
}

#[test]
fn ignore_policy_and_patches_apply() {
    let ws = Workspace::new();
    let folder = ws.add_version_folder("1.0.0");
    fs::write(
        folder.join("ignore.toml"),
        indoc::indoc! {r#"
            [tests]
            ignore = ["TestA"]

            [v4_tests]
            ignore = ["TestB"]
            flaky = ["TestC"]
        "#},
    )
    .unwrap();
    fs::write(folder.join("patch_01_timeouts"), "").unwrap();
    fs::write(folder.join("patch_00_build"), "").unwrap();

    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.test_runner.parts.insert(
        "integration".to_owned(),
        part_xml(&[
            ("TestA", Fake::Fail),
            ("TestB", Fake::Fail),
            ("TestC", Fake::Pass),
            ("TestD", Fake::UnexpectedSuccess),
        ]),
    );
    let test_profiles = profiles(&["integration"]);

    // v1.0.3 has no folder of its own and uses 1.0.0.
    let cell = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.3", 4);
    let analyzed = cell.run().expect("cell ran");

    let summary = analyzed.summary();
    assert_eq!(summary.count(Category::Failures), 1, "TestA is only ignored for v3");
    assert_eq!(summary.count(Category::IgnoredInAnalysis), 1);
    assert_eq!(summary.count(Category::XPassed), 2, "TestC and TestD");
    assert!(analyzed.is_failed());

    assert_eq!(
        &fakes.events()[..3],
        ["checkout v1.0.3", "patch patch_00_build", "patch patch_01_timeouts"]
    );

    let report = Report::from_path(&cell.xunit_file()).unwrap();
    let suite = report.find_testsuite(SUITE_NAME).unwrap();
    let ignored = suite
        .testcases
        .iter()
        .find(|case| case.name == "TestB")
        .unwrap();
    assert!(matches!(ignored.status, TestCaseStatus::Skipped { .. }));
    assert_eq!(ignored.status.ty(), Some("xunit.fail"));
}

#[test]
fn no_parts_means_setup_failure() {
    let ws = Workspace::new();
    ws.add_version_folder("master");
    let config = ws.config();
    let fakes = Fakes::new(&ws.driver_root);
    let test_profiles = profiles(&["integration"]);

    let cell = CellRun::new(
        fakes.context(&config, &ws, &test_profiles),
        "feature-branch",
        3,
    );
    let analyzed = cell.run().expect("cell ran");
    assert_eq!(analyzed.summary().tests(), 0);
    assert!(analyzed.is_failed());
}

#[test]
fn stale_reports_are_removed() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let fakes = Fakes::new(&ws.driver_root);
    let test_profiles = profiles(&["integration"]);
    let cell = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4);

    let xunit_file = cell.xunit_file();
    fs::create_dir_all(xunit_file.parent().unwrap()).unwrap();
    fs::write(
        format!("{xunit_file}_part_7"),
        part_xml(&[("TestStale", Fake::Pass)]),
    )
    .unwrap();

    let analyzed = cell.run().expect("cell ran");
    assert_eq!(analyzed.summary().tests(), 0, "stale part was not merged");
}

#[test]
fn malformed_part_is_a_report_error() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.test_runner.parts.insert(
        "integration".to_owned(),
        part_xml(&[("TestA", Fake::Pass)]),
    );
    let xml = part_xml(&[("TestB", Fake::Fail)]);
    let end = xml.find("</testsuite>").expect("suite is closed");
    fakes
        .test_runner
        .parts
        .insert("ccm".to_owned(), xml[..end].to_owned());
    let test_profiles = profiles(&["integration", "ccm"]);

    let cell = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4);
    let error = cell.run().unwrap_err();
    match &error {
        CellRunError::Report(ReportProcessError::PartParse { path, .. }) => {
            assert_eq!(path.as_str(), format!("{}_part_1", cell.xunit_file()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!cell.xunit_file().exists(), "no consolidated report");
}

#[test]
fn part_without_the_suite_is_a_report_error() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.test_runner.parts.insert(
        "integration".to_owned(),
        part_xml(&[("TestA", Fake::Pass)]).replace(SUITE_NAME, "github.com/scylladb/other"),
    );
    let test_profiles = profiles(&["integration"]);

    let cell = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4);
    let error = cell.run().unwrap_err();
    match &error {
        CellRunError::Report(ReportProcessError::SuiteNotFound { suite_name, .. }) => {
            assert_eq!(suite_name, SUITE_NAME);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!cell.xunit_file().exists(), "no consolidated report");
}

#[test]
fn unknown_profile_fails_before_checkout() {
    let ws = Workspace::new();
    let config = ws.config();
    let fakes = Fakes::new(&ws.driver_root);
    let test_profiles = profiles(&["integration", "unit"]);

    let error = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4)
        .run()
        .unwrap_err();
    assert!(
        matches!(error, CellRunError::TestProfile(_)),
        "unexpected error: {error:?}"
    );
    assert!(fakes.events().is_empty());
}

#[test]
fn checkout_failure_ends_the_cell() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.source_tree.bad_tags.push("v1.0.0".to_owned());
    let test_profiles = profiles(&["integration"]);

    let error = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4)
        .run()
        .unwrap_err();
    assert!(
        matches!(
            error,
            CellRunError::SourceTree(SourceTreeError::Checkout { .. })
        ),
        "unexpected error: {error:?}"
    );
    assert_eq!(fakes.events(), vec!["checkout v1.0.0"]);
}

#[test]
fn cluster_is_removed_when_start_fails() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.provisioner.fail_start = true;
    let test_profiles = profiles(&["integration"]);

    let error = CellRun::new(fakes.context(&config, &ws, &test_profiles), "v1.0.0", 4)
        .run()
        .unwrap_err();
    assert!(
        matches!(error, CellRunError::Cluster(ClusterError::NoLiveNodes)),
        "unexpected error: {error:?}"
    );
    assert_eq!(
        fakes.events(),
        vec![
            "checkout v1.0.0",
            "create 127.0.10. 2024.1.3",
            "start",
            "remove"
        ]
    );
    assert_eq!(ws.lock_files(), 0);
}
