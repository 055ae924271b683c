// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the matrix runner.

use camino::Utf8PathBuf;
use config::ConfigError;
use matrix_junit::{ParseError, SerializeError};
use std::{error::Error, fmt, io, ops::RangeInclusive, process::ExitStatus};
use thiserror::Error;

/// Displays an error along with its chain of sources.
///
/// Each cause is written on its own line, indented under the top-level message.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for cause in error_causes(&self.error) {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }
}

/// Returns the display strings of every source of this error, outermost first.
pub fn error_causes(error: &dyn Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut next = error.source();
    while let Some(err) = next {
        causes.push(err.to_string());
        next = err.source();
    }
    causes
}

/// An error that occurred while reading the matrix configuration.
#[derive(Debug, Error)]
#[error("failed to parse matrix config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file this error is for.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be combined.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The combined config could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A command-line fragment in the config could not be split into arguments.
    #[error("invalid arguments at `{key}`: `{value}`")]
    InvalidArgs {
        /// The config key the arguments were read from.
        key: String,

        /// The unparsed value.
        value: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// No lock directory is configured and the system temporary directory is not UTF-8.
    #[error("system temporary directory `{}` is not valid UTF-8; set `cluster.lock-dir`", .path.display())]
    NonUtf8TempDir {
        /// The temporary directory.
        path: std::path::PathBuf,
    },

    /// The address prefix range is empty or out of bounds.
    #[error("invalid address prefix range {start}..={end} (expected 1 <= start <= end <= 254)")]
    InvalidPrefixRange {
        /// The start of the range.
        start: u8,

        /// The end of the range.
        end: u8,
    },
}

/// A test profile was requested but is not defined.
#[derive(Clone, Debug, Error)]
#[error("test profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct TestProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl TestProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurred while loading an ignore policy file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IgnorePolicyError {
    /// The policy file exists but could not be read.
    #[error("failed to read ignore policy at `{path}`")]
    Read {
        /// The policy file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The policy file is not valid.
    #[error("failed to parse ignore policy at `{path}`")]
    Parse {
        /// The policy file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },
}

/// An error that occurred while resolving the version folder for a driver version.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VersionFolderError {
    /// The versions directory could not be listed.
    #[error("failed to read versions directory `{dir}`")]
    ReadDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// No defined version folder is at or below the requested release.
    #[error("no version folder in `{dir}` matches driver version `{version}`")]
    NoMatch {
        /// The directory.
        dir: Utf8PathBuf,

        /// The requested driver version.
        version: String,
    },
}

/// Fewer release tags were found than requested.
#[derive(Clone, Debug, Error)]
#[error("requested the latest {requested} driver tags, but only found {}: [{}]", .found.len(), .found.join(", "))]
pub struct TagSelectionError {
    requested: usize,
    found: Vec<String>,
}

impl TagSelectionError {
    pub(crate) fn new(requested: usize, found: Vec<String>) -> Self {
        Self { requested, found }
    }
}

/// An error that occurred while acquiring an address prefix.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AddressPrefixError {
    /// The lock directory could not be created.
    #[error("failed to create address lock directory `{lock_dir}`")]
    LockDirCreate {
        /// The lock directory.
        lock_dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A lock file could not be created for a reason other than it already existing.
    #[error("failed to create address lock `{path}`")]
    LockCreate {
        /// The lock file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Every prefix in the range is already held.
    #[error("all address prefixes 127.0.{}-{} are in use (locks in `{lock_dir}`)", .range.start(), .range.end())]
    Exhausted {
        /// The lock directory.
        lock_dir: Utf8PathBuf,

        /// The candidate range.
        range: RangeInclusive<u8>,
    },
}

/// An external command could not be run or exited unsuccessfully.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The command could not be spawned.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The command exited with a failure status.
    #[error("`{command}` failed with {status}{}", display_stderr(.stderr))]
    Failed {
        /// The command line.
        command: String,

        /// The exit status.
        status: ExitStatus,

        /// Captured standard error.
        stderr: String,
    },
}

fn display_stderr(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

/// An error that occurred while provisioning or tearing down a cluster.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClusterError {
    /// The cluster directory could not be created.
    #[error("failed to create cluster directory `{dir}`")]
    CreateDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A cluster management command failed.
    #[error("cluster {operation} failed")]
    Command {
        /// The operation, e.g. `create` or `start`.
        operation: &'static str,

        /// The underlying error.
        #[source]
        error: CommandError,
    },

    /// The cluster started, but no node reported itself as up.
    #[error("cluster started but no live nodes were found")]
    NoLiveNodes,
}

/// An error that occurred while manipulating the driver source tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceTreeError {
    /// Discarding local changes or fetching failed.
    #[error("failed to reset the driver source tree")]
    Reset(#[source] CommandError),

    /// Listing the tags or the origin remote failed.
    #[error("failed to query the driver repository")]
    Query(#[source] CommandError),

    /// Checking out a tag failed.
    #[error("failed to check out tag `{tag}`")]
    Checkout {
        /// The tag.
        tag: String,

        /// The underlying error.
        #[source]
        error: CommandError,
    },

    /// The patch directory could not be listed.
    #[error("failed to list patches in `{dir}`")]
    ListPatches {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A patch did not apply and the failure was not whitelisted.
    #[error("failed to apply patch `{patch}`")]
    Patch {
        /// The patch file.
        patch: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: CommandError,
    },

    /// A whitelisted path could not be removed ahead of a patch.
    #[error("failed to remove `{path}` before applying patch `{patch}`")]
    RemoveWhitelisted {
        /// The patch file.
        patch: Utf8PathBuf,

        /// The path being removed.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while reconciling JUnit part files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportProcessError {
    /// The directory holding the part files could not be listed.
    #[error("failed to list report parts in `{dir}`")]
    ListParts {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A part file is not a valid report.
    #[error("failed to read report part `{path}`")]
    PartParse {
        /// The part file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: ParseError,
    },

    /// A part file does not contain the expected testsuite.
    #[error("report part `{path}` has no testsuite named `{suite_name}`")]
    SuiteNotFound {
        /// The part file.
        path: Utf8PathBuf,

        /// The expected testsuite name.
        suite_name: String,
    },

    /// The consolidated report could not be serialized.
    #[error("failed to serialize consolidated report for `{path}`")]
    Serialize {
        /// The output file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: SerializeError,
    },

    /// The consolidated report could not be written.
    #[error("failed to write consolidated report to `{path}`")]
    Write {
        /// The output file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that ended a single matrix cell.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CellRunError {
    /// The report directory for this cell could not be prepared.
    #[error("failed to prepare report directory `{dir}`")]
    ReportDir {
        /// The directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The version folder could not be resolved.
    #[error(transparent)]
    VersionFolder(#[from] VersionFolderError),

    /// The ignore policy could not be loaded.
    #[error(transparent)]
    IgnorePolicy(#[from] IgnorePolicyError),

    /// A requested test profile is not defined.
    #[error(transparent)]
    TestProfile(#[from] TestProfileNotFound),

    /// Checkout or patching failed.
    #[error(transparent)]
    SourceTree(#[from] SourceTreeError),

    /// No address prefix could be acquired.
    #[error(transparent)]
    AddressPrefix(#[from] AddressPrefixError),

    /// The cluster could not be provisioned.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// The part files could not be reconciled.
    #[error(transparent)]
    Report(#[from] ReportProcessError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Middle);

    #[derive(Debug, Error)]
    #[error("middle")]
    struct Middle(#[source] io::Error);

    #[test]
    fn display_error_chain() {
        let error = Outer(Middle(io::Error::other("inner")));
        assert_eq!(error_causes(&error), vec!["middle", "inner"]);
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            "outer\n  caused by: middle\n  caused by: inner"
        );
    }

    #[test]
    fn command_failed_includes_trimmed_stderr() {
        let error = CommandError::Exec {
            command: "git status".to_owned(),
            error: io::Error::other("not found"),
        };
        assert_eq!(error.to_string(), "failed to execute `git status`");
        assert_eq!(display_stderr("  \n"), "");
        assert_eq!(display_stderr("fatal: bad\n"), ":\nfatal: bad");
    }
}
