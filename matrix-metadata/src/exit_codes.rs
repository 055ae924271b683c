// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `driver-matrix` failures.
///
/// `driver-matrix` runs may fail for a variety of reasons. This structure documents the exit
/// codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum MatrixExitCode {}

impl MatrixExitCode {
    /// Every matrix cell ran and passed its analysis.
    pub const OK: i32 = 0;

    /// One or more matrix cells failed their analysis or errored out during setup.
    pub const CELL_FAILED: i32 = 100;

    /// Post-processing an existing report failed (for `driver-matrix analyze`).
    pub const REPORT_PROCESSING_FAILED: i32 = 107;

    /// Writing data to stdout, stderr or an output file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a `driver-matrix` invocation: bad arguments, a
    /// missing database version, or a malformed configuration or ignore file.
    pub const SETUP_ERROR: i32 = 96;
}
