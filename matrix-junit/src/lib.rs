// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read and write JUnit reports in Rust.
//!
//! The reader accepts the shape emitted by common report generators (`go-junit-report`,
//! pytest, nextest): a `<testsuites>` root (or a bare `<testsuite>`) holding test suites, each
//! holding test cases with at most one diagnostic child (`failure`, `error` or `skipped`).
//!
//! The serializer writes a pretty-printed document with two-space indentation.

#![warn(missing_docs)]

mod errors;
mod parse;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
