// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable output of `driver-matrix`.
//!
//! The types here are shared between the matrix runner, which produces them, and consumers
//! such as mail senders or CI dashboards, which read the JSON aggregate report.

mod exit_codes;
mod report;

pub use exit_codes::*;
pub use report::*;
