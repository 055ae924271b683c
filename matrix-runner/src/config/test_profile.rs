// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::split_args;
use crate::errors::ConfigParseErrorKind;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One invocation of the driver's test suite against a fresh cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestProfile {
    name: String,
    tags: Vec<String>,
    args: Vec<String>,
    cluster_config: BTreeMap<String, String>,
}

impl TestProfile {
    /// Creates a profile directly, for callers that don't read it from a config.
    pub fn new(
        name: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            args: args.into_iter().map(Into::into).collect(),
            cluster_config: BTreeMap::new(),
        }
    }

    pub(super) fn resolve(
        name: &str,
        profile: TestProfileDeserialize,
    ) -> Result<Self, ConfigParseErrorKind> {
        let args = split_args(&format!("test-profiles.{name}.args"), &profile.args)?;
        Ok(Self {
            name: name.to_owned(),
            tags: profile.tags,
            args,
            cluster_config: profile.cluster_config,
        })
    }

    /// The name of this profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The build tags this profile selects.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Arguments passed to the test command, before any cluster arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Database configuration applied to the cluster before it starts.
    pub fn cluster_config(&self) -> &BTreeMap<String, String> {
        &self.cluster_config
    }

    /// Adds a database configuration entry.
    pub fn with_cluster_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.cluster_config.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(super) struct TestProfileDeserialize {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    args: String,
    #[serde(default)]
    cluster_config: BTreeMap<String, String>,
}
