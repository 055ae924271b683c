// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs matrix cells end to end against fake collaborators.

mod cell_run;
mod fixtures;
mod matrix;
