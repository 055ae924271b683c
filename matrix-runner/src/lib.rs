// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [driver-matrix](https://crates.io/crates/driver-matrix), which runs a
//! database driver's integration tests across a matrix of driver versions and protocol versions.
//!
//! The flow for one matrix cell (see [`run::CellRun`]):
//!
//! 1. the driver source tree is checked out at a tag and patched ([`source`]),
//! 2. each test profile runs against a fresh cluster ([`cluster`], [`address`],
//!    [`test_command`]) and leaves a JUnit part file behind,
//! 3. the part files are merged, classified against the version's ignore policy ([`policy`])
//!    and written back as one consolidated report ([`reconcile`]).
//!
//! [`matrix::run_matrix`] drives every cell and collects their outcomes.

pub mod address;
pub mod cluster;
pub mod command;
pub mod config;
pub mod errors;
pub mod matrix;
pub mod policy;
pub mod reconcile;
pub mod run;
pub mod source;
pub mod test_command;
pub mod versions;
