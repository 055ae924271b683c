// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ignore and flaky lists for a driver version.
//!
//! Each version folder may carry an `ignore.toml` with one section per protocol version:
//!
//! ```toml
//! [tests]           # protocol 3
//! ignore = ["TestA"]
//!
//! [v4_tests]        # protocol 4
//! ignore = ["TestA"]
//! flaky = ["TestB"]
//! ```

use crate::errors::IgnorePolicyError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
};
use tracing::{info, warn};

/// The name of the policy file within a version folder.
pub const IGNORE_FILE_NAME: &str = "ignore.toml";

/// The YAML policy file used by older version folders. It is no longer read.
pub const LEGACY_IGNORE_FILE_NAME: &str = "ignore.yaml";

/// Test names whose failures are suppressed during analysis.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IgnorePolicy {
    ignore: BTreeSet<String>,
    flaky: BTreeSet<String>,
}

impl IgnorePolicy {
    /// Creates a policy from explicit lists.
    pub fn new(
        ignore: impl IntoIterator<Item = impl Into<String>>,
        flaky: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            ignore: ignore.into_iter().map(Into::into).collect(),
            flaky: flaky.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates an empty policy.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the section of the policy file that applies to a protocol version.
    pub fn section_name(protocol: u8) -> String {
        if protocol == 3 {
            "tests".to_owned()
        } else {
            format!("v{protocol}_tests")
        }
    }

    /// Loads the policy from `ignore.toml` in a version folder.
    pub fn from_version_folder(
        version_folder: &Utf8Path,
        protocol: u8,
    ) -> Result<Self, IgnorePolicyError> {
        Self::from_path(&version_folder.join(IGNORE_FILE_NAME), protocol)
    }

    /// Loads the policy from a file. A missing file is an empty policy.
    pub fn from_path(path: &Utf8Path, protocol: u8) -> Result<Self, IgnorePolicyError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                if let Some(legacy) = legacy_policy_file(path) {
                    warn!(
                        "found `{legacy}` but policies are now read from `{path}`: \
                         convert it to TOML, all failures will be reported until then"
                    );
                } else {
                    info!("no ignore policy at `{path}`, all failures will be reported");
                }
                return Ok(Self::empty());
            }
            Err(error) => {
                return Err(IgnorePolicyError::Read {
                    path: path.to_owned(),
                    error,
                });
            }
        };
        Self::from_toml_str(&contents, protocol).map_err(|error| IgnorePolicyError::Parse {
            path: path.to_owned(),
            error,
        })
    }

    /// Parses the policy for a protocol version out of a TOML document.
    pub fn from_toml_str(contents: &str, protocol: u8) -> Result<Self, toml::de::Error> {
        let mut sections: BTreeMap<String, IgnoreSectionDeserialize> = toml::from_str(contents)?;
        let section_name = Self::section_name(protocol);
        let Some(section) = sections.remove(&section_name) else {
            info!("ignore policy has no `{section_name}` section, all failures will be reported");
            return Ok(Self::empty());
        };
        if section.ignore.is_empty() {
            info!("ignore policy section `{section_name}` ignores no tests");
        }
        Ok(Self::new(section.ignore, section.flaky))
    }

    /// Returns true if the test is on the ignore list.
    pub fn contains_ignore(&self, name: &str) -> bool {
        self.ignore.contains(name)
    }

    /// Returns true if the test is on the flaky list.
    pub fn contains_flaky(&self, name: &str) -> bool {
        self.flaky.contains(name)
    }

    /// Returns the ignore list.
    pub fn ignore(&self) -> &BTreeSet<String> {
        &self.ignore
    }

    /// Returns the flaky list.
    pub fn flaky(&self) -> &BTreeSet<String> {
        &self.flaky
    }
}

#[derive(Debug, Default, Deserialize)]
struct IgnoreSectionDeserialize {
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    flaky: Vec<String>,
}

/// Returns the `ignore.yaml` next to a missing policy file, if one exists.
fn legacy_policy_file(path: &Utf8Path) -> Option<Utf8PathBuf> {
    let legacy = path.with_file_name(LEGACY_IGNORE_FILE_NAME);
    legacy.is_file().then_some(legacy)
}
