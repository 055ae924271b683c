// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for matrix runs.
//!
//! The built-in defaults in `default-config.toml` are layered with an optional repository
//! config, `.config/driver-matrix.toml` in the driver checkout, or a file given explicitly.

mod test_profile;

pub use test_profile::*;

use crate::errors::{ConfigParseError, ConfigParseErrorKind, TestProfileNotFound};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::RangeInclusive,
};
use tracing::warn;

/// Configuration for a matrix run.
#[derive(Clone, Debug)]
pub struct MatrixConfig {
    suite_name: String,
    cql_version: String,
    extra_args: Vec<String>,
    nodes: u8,
    lock_dir: Utf8PathBuf,
    prefix_range: RangeInclusive<u8>,
    check_whitelist: Vec<Utf8PathBuf>,
    test_profiles: BTreeMap<String, TestProfile>,
}

impl MatrixConfig {
    /// The default location of the config within the driver checkout.
    pub const CONFIG_PATH: &'static str = ".config/driver-matrix.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the lock directory created under the system temporary directory.
    pub const DEFAULT_LOCK_DIR_NAME: &'static str = "driver-matrix-locks";

    /// Reads the config from the given file, or if not specified from `.config/driver-matrix.toml`
    /// in the driver checkout.
    ///
    /// If no file is specified and the checkout has no config, uses the default config.
    pub fn from_sources(
        driver_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = driver_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        for path in &ignored {
            warn!("ignoring unknown configuration key `{path}` in `{config_file}`");
        }

        Self::resolve(deserialized).map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default config.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        let (deserialized, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .map_err(|kind| ConfigParseError::new("<default config>", kind))?;
        Self::resolve(deserialized).map_err(|kind| ConfigParseError::new("<default config>", kind))
    }

    /// The testsuite every report part must contain.
    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// The CQL version passed to the test suite.
    pub fn cql_version(&self) -> &str {
        &self.cql_version
    }

    /// Extra arguments passed to every test invocation.
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// The number of nodes in each test cluster.
    pub fn nodes(&self) -> u8 {
        self.nodes
    }

    /// The directory holding address prefix locks.
    pub fn lock_dir(&self) -> &Utf8Path {
        &self.lock_dir
    }

    /// Candidate values of N for the `127.0.N.` address prefix.
    pub fn prefix_range(&self) -> RangeInclusive<u8> {
        self.prefix_range.clone()
    }

    /// Paths that may be deleted when a patch does not apply cleanly because of them.
    pub fn check_whitelist(&self) -> &[Utf8PathBuf] {
        &self.check_whitelist
    }

    /// Returns the names of all defined test profiles, sorted.
    pub fn test_profile_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.test_profiles.keys().map(String::as_str)
    }

    /// Returns the test profile with the given name.
    pub fn test_profile(&self, name: &str) -> Result<&TestProfile, TestProfileNotFound> {
        self.test_profiles
            .get(name)
            .ok_or_else(|| TestProfileNotFound::new(name, self.test_profiles.keys()))
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(MatrixConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: MatrixConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // The key is reported by serde_path_to_error, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }

    fn resolve(config: MatrixConfigDeserialize) -> Result<Self, ConfigParseErrorKind> {
        let MatrixConfigDeserialize {
            junit,
            runner,
            cluster,
            patches,
            test_profiles,
        } = config;

        let [start, end] = cluster.prefix_range;
        if start == 0 || start > end || end > 254 {
            return Err(ConfigParseErrorKind::InvalidPrefixRange { start, end });
        }

        let lock_dir = match cluster.lock_dir {
            Some(lock_dir) => lock_dir,
            None => Utf8PathBuf::try_from(std::env::temp_dir())
                .map_err(|error| ConfigParseErrorKind::NonUtf8TempDir {
                    path: error.into_path_buf(),
                })?
                .join(Self::DEFAULT_LOCK_DIR_NAME),
        };

        let extra_args = split_args("runner.extra-args", &runner.extra_args)?;
        let test_profiles = test_profiles
            .into_iter()
            .map(|(name, profile)| {
                let profile = TestProfile::resolve(&name, profile)?;
                Ok((name, profile))
            })
            .collect::<Result<_, ConfigParseErrorKind>>()?;

        Ok(Self {
            suite_name: junit.suite_name,
            cql_version: runner.cql_version,
            extra_args,
            nodes: cluster.nodes,
            lock_dir,
            prefix_range: start..=end,
            check_whitelist: patches.check_whitelist,
            test_profiles,
        })
    }
}

pub(crate) fn split_args(key: &str, value: &str) -> Result<Vec<String>, ConfigParseErrorKind> {
    shell_words::split(value).map_err(|error| ConfigParseErrorKind::InvalidArgs {
        key: key.to_owned(),
        value: value.to_owned(),
        error,
    })
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MatrixConfigDeserialize {
    junit: JunitConfigDeserialize,
    runner: RunnerConfigDeserialize,
    cluster: ClusterConfigDeserialize,
    patches: PatchesConfigDeserialize,
    #[serde(default)]
    test_profiles: BTreeMap<String, TestProfileDeserialize>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct JunitConfigDeserialize {
    suite_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunnerConfigDeserialize {
    cql_version: String,
    extra_args: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterConfigDeserialize {
    nodes: u8,
    #[serde(default)]
    lock_dir: Option<Utf8PathBuf>,
    prefix_range: [u8; 2],
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PatchesConfigDeserialize {
    #[serde(default)]
    check_whitelist: Vec<Utf8PathBuf>,
}
