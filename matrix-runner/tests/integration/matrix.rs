// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::{Fake, Fakes, Workspace, part_xml};
use matrix_metadata::{CellResultSerializable, MatrixStatus};
use matrix_runner::{
    matrix::run_matrix,
    source::SourceTree,
    versions::{DriverType, select_latest_tags},
};
use pretty_assertions::assert_eq;

#[test]
fn failing_cells_do_not_stop_the_matrix() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes.source_tree.bad_tags.push("v1.0.0".to_owned());
    fakes.test_runner.parts.insert(
        "integration".to_owned(),
        part_xml(&[("TestA", Fake::Pass), ("TestB", Fake::Pass)]),
    );
    let test_profiles = vec!["integration".to_owned()];

    let tags = fakes.source_tree.tags_newest_first().unwrap();
    let versions = select_latest_tags(&tags, 2).unwrap();
    assert_eq!(versions, vec!["v1.1.0", "v1.0.0"]);

    let outcome = run_matrix(
        fakes.context(&config, &ws, &test_profiles),
        &versions,
        &[3, 4],
    );
    assert!(!outcome.is_success());

    let cells: Vec<_> = outcome
        .cells()
        .iter()
        .map(|cell| (cell.driver_version.as_str(), cell.protocol, cell.is_failed()))
        .collect();
    assert_eq!(
        cells,
        vec![
            ("v1.1.0", 3, false),
            ("v1.1.0", 4, false),
            ("v1.0.0", 3, true),
            ("v1.0.0", 4, true),
        ]
    );

    let remote = fakes.source_tree.origin_remote().unwrap();
    assert_eq!(DriverType::from_remote(&remote), DriverType::Scylla);
    let report = outcome.to_report("2024.1.3", Some(remote));
    assert_eq!(report.status, MatrixStatus::Failed);
    assert_eq!(
        report.cells[3].result,
        CellResultSerializable::Exception {
            message: "failed to check out tag `v1.0.0`".to_owned(),
            causes: vec![
                "failed to execute `git checkout tags/v1.0.0`".to_owned(),
                "unknown revision".to_owned(),
            ],
        }
    );
    match &report.cells[0].result {
        CellResultSerializable::Summary { summary, failed } => {
            assert_eq!((summary.tests, summary.passed), (2, 2));
            assert!(!failed);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn every_passing_cell_is_success() {
    let ws = Workspace::new();
    ws.add_version_folder("1.0.0");
    let config = ws.config();
    let mut fakes = Fakes::new(&ws.driver_root);
    fakes
        .test_runner
        .parts
        .insert("ccm".to_owned(), part_xml(&[("TestCCM", Fake::Pass)]));
    let test_profiles = vec!["ccm".to_owned()];

    let outcome = run_matrix(
        fakes.context(&config, &ws, &test_profiles),
        &["v1.0.0".to_owned()],
        &[4],
    );
    assert!(outcome.is_success());
    assert_eq!(
        outcome.to_report("2024.1.3", None).status,
        MatrixStatus::Success
    );
}
