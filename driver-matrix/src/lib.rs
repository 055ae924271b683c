// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a database driver's integration tests across a matrix of driver versions and protocol
//! versions, and reconciles the resulting JUnit reports.
//!
//! `driver-matrix run` checks out each driver version, runs each configured test profile against
//! a fresh cluster and analyzes the merged reports. `driver-matrix analyze` reconciles report
//! parts that already exist on disk.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
