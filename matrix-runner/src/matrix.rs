// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running every cell of a driver version × protocol version matrix.

use crate::{
    errors::{CellRunError, DisplayErrorChain, error_causes},
    reconcile::{Category, Summary},
    run::{CellContext, CellRun},
};
use matrix_metadata::{
    CellResultSerializable, MatrixCellSerializable, MatrixReportSerializable, MatrixStatus,
};
use tracing::{error, info, warn};

/// The outcome of one matrix cell.
#[derive(Debug)]
pub struct CellOutcome {
    /// The driver version (tag) that was tested.
    pub driver_version: String,

    /// The protocol version that was tested.
    pub protocol: u8,

    /// The analyzed summary, or the error that ended the cell.
    pub result: Result<Summary, CellRunError>,
}

impl CellOutcome {
    /// Returns true if the cell errored out or its analysis verdict is a failure.
    pub fn is_failed(&self) -> bool {
        match &self.result {
            Ok(summary) => summary.is_failed(),
            Err(_) => true,
        }
    }

    /// Converts this outcome into its serializable form.
    pub fn to_serializable(&self) -> MatrixCellSerializable {
        let result = match &self.result {
            Ok(summary) => CellResultSerializable::Summary {
                summary: summary.to_serializable(),
                failed: summary.is_failed(),
            },
            Err(error) => CellResultSerializable::Exception {
                message: error.to_string(),
                causes: error_causes(error),
            },
        };
        MatrixCellSerializable {
            driver_version: self.driver_version.clone(),
            protocol: self.protocol,
            result,
        }
    }
}

/// The outcomes of every cell, in the order they ran.
#[derive(Debug, Default)]
pub struct MatrixOutcome {
    cells: Vec<CellOutcome>,
}

impl MatrixOutcome {
    /// Records a cell.
    pub fn push(&mut self, cell: CellOutcome) {
        self.cells.push(cell);
    }

    /// The cells, in the order they ran.
    pub fn cells(&self) -> &[CellOutcome] {
        &self.cells
    }

    /// Returns true if every cell passed.
    pub fn is_success(&self) -> bool {
        !self.cells.iter().any(CellOutcome::is_failed)
    }

    /// Builds the aggregate report consumed by mail senders.
    pub fn to_report(
        &self,
        db_version: impl Into<String>,
        driver_remote: Option<String>,
    ) -> MatrixReportSerializable {
        MatrixReportSerializable {
            db_version: db_version.into(),
            driver_remote,
            status: if self.is_success() {
                MatrixStatus::Success
            } else {
                MatrixStatus::Failed
            },
            cells: self.cells.iter().map(CellOutcome::to_serializable).collect(),
        }
    }
}

/// Runs every (driver version, protocol version) cell.
///
/// A cell that errors out is recorded and the remaining cells still run.
pub fn run_matrix(ctx: CellContext<'_>, versions: &[String], protocols: &[u8]) -> MatrixOutcome {
    let mut outcome = MatrixOutcome::default();
    for driver_version in versions {
        for &protocol in protocols {
            info!("testing driver version {driver_version} with protocol v{protocol}");
            let result = CellRun::new(ctx, driver_version, protocol)
                .run()
                .map(|analyzed| *analyzed.summary());
            let cell = CellOutcome {
                driver_version: driver_version.clone(),
                protocol,
                result,
            };
            log_cell(&cell);
            outcome.push(cell);
        }
    }
    outcome
}

fn log_cell(cell: &CellOutcome) {
    let CellOutcome {
        driver_version,
        protocol,
        result,
    } = cell;
    match result {
        Ok(summary) => {
            let counts = summary
                .iter()
                .map(|(key, count)| format!("{key}: {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            info!("driver version {driver_version}, protocol v{protocol}: {counts}");
            if summary.count(Category::XPassed) > 0 {
                warn!(
                    "driver version {driver_version}, protocol v{protocol}: {} test(s) passed \
                     unexpectedly, review their ignore entries",
                    summary.count(Category::XPassed)
                );
            }
            if summary.is_failed() {
                if summary.tests() == 0 {
                    error!(
                        "driver version {driver_version}, protocol v{protocol}: setup failed, \
                         no tests ran"
                    );
                } else {
                    error!("driver version {driver_version}, protocol v{protocol}: failed tests");
                }
            }
        }
        Err(err) => {
            error!(
                "driver version {driver_version}, protocol v{protocol}: {}",
                DisplayErrorChain::new(err)
            );
        }
    }
}
