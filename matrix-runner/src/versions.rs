// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Driver variants, per-version folders and tag selection.

use crate::errors::{TagSelectionError, VersionFolderError};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use semver::Version;
use std::{collections::HashSet, fmt, str::FromStr};
use tracing::{debug, info};

/// The folder used when a driver version has no folder of its own.
pub const FALLBACK_FOLDER: &str = "master";

/// Which driver is under test.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DriverType {
    /// The ScyllaDB fork of the driver.
    Scylla,

    /// The upstream driver.
    Upstream,
}

impl DriverType {
    /// All driver types.
    pub const ALL: [DriverType; 2] = [DriverType::Scylla, DriverType::Upstream];

    /// Infers the driver type from the URL of its origin remote.
    pub fn from_remote(url: &str) -> Self {
        if url.contains("scylladb") {
            DriverType::Scylla
        } else {
            DriverType::Upstream
        }
    }

    /// Returns the name of this driver type.
    pub fn as_str(self) -> &'static str {
        match self {
            DriverType::Scylla => "scylla",
            DriverType::Upstream => "upstream",
        }
    }
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unknown driver type name.
#[derive(Clone, Debug, thiserror::Error)]
#[error("unrecognized driver type `{input}` (known values: scylla, upstream)")]
pub struct DriverTypeParseError {
    input: String,
}

impl FromStr for DriverType {
    type Err = DriverTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DriverType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| DriverTypeParseError {
                input: s.to_owned(),
            })
    }
}

// Only plain X.Y.Z releases take part in folder ordering.
fn parse_release(name: &str) -> Option<Version> {
    let version = Version::parse(name.strip_prefix('v').unwrap_or(name)).ok()?;
    (version.pre.is_empty() && version.build.is_empty()).then_some(version)
}

/// Resolves the folder holding patches and the ignore policy for a driver version.
///
/// For a release version, this is the folder for the highest release at or below it. Any
/// other version uses the folder with exactly its name, falling back to `master`.
pub fn resolve_version_folder(
    versions_dir: &Utf8Path,
    driver_type: DriverType,
    driver_version: &str,
) -> Result<Utf8PathBuf, VersionFolderError> {
    let dir = versions_dir.join(driver_type.as_str());

    let Some(target) = parse_release(driver_version) else {
        let named = dir.join(driver_version);
        let folder = if named.is_dir() {
            named
        } else {
            dir.join(FALLBACK_FOLDER)
        };
        info!("using version folder `{folder}` for driver version `{driver_version}`");
        return Ok(folder);
    };

    let entries = dir
        .read_dir_utf8()
        .map_err(|error| VersionFolderError::ReadDir {
            dir: dir.clone(),
            error,
        })?;
    let mut best: Option<(Version, Utf8PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|error| VersionFolderError::ReadDir {
            dir: dir.clone(),
            error,
        })?;
        let Some(version) = parse_release(entry.file_name()) else {
            continue;
        };
        if version > target || !entry.path().is_dir() {
            continue;
        }
        if best.as_ref().is_none_or(|(best, _)| version > *best) {
            best = Some((version, entry.into_path()));
        }
    }

    match best {
        Some((_, folder)) => {
            info!("using version folder `{folder}` for driver version `{driver_version}`");
            Ok(folder)
        }
        None => Err(VersionFolderError::NoMatch {
            dir,
            version: driver_version.to_owned(),
        }),
    }
}

/// Selects the newest `count` release tags, one per minor version.
///
/// `tags` must be ordered newest first. Tags that do not start with `v` or have no `.` are
/// skipped, as are pre-release tags other than `-scylla` ones.
pub fn select_latest_tags<I, S>(tags: I, count: usize) -> Result<Vec<String>, TagSelectionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut selected = Vec::with_capacity(count);
    let mut seen_minors = HashSet::new();
    if count == 0 {
        return Ok(selected);
    }

    for tag in tags {
        let tag = tag.as_ref();
        if !tag.starts_with('v') || !tag.contains('.') {
            continue;
        }
        if tag.contains('-') && !tag.ends_with("-scylla") {
            debug!("skipping pre-release tag `{tag}`");
            continue;
        }

        let minor = tag.splitn(3, '.').take(2).join(".");
        if seen_minors.insert(minor) {
            selected.push(tag.to_owned());
            if selected.len() == count {
                return Ok(selected);
            }
        }
    }

    Err(TagSelectionError::new(count, selected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use std::fs;
    use test_case::test_case;

    #[test_case("https://github.com/scylladb/gocql.git", DriverType::Scylla ; "scylla https")]
    #[test_case("git@github.com:scylladb/gocql.git", DriverType::Scylla ; "scylla ssh")]
    #[test_case("https://github.com/gocql/gocql", DriverType::Upstream ; "upstream")]
    fn driver_type_from_remote(url: &str, expected: DriverType) {
        assert_eq!(DriverType::from_remote(url), expected);
    }

    #[test]
    fn driver_type_from_str() {
        assert_eq!("scylla".parse::<DriverType>().unwrap(), DriverType::Scylla);
        assert_eq!("upstream".parse::<DriverType>().unwrap(), DriverType::Upstream);
        assert!("Scylla".parse::<DriverType>().is_err());
    }

    fn versions_dir(folders: &[&str]) -> camino_tempfile::Utf8TempDir {
        let dir = tempdir().unwrap();
        for folder in folders {
            fs::create_dir_all(dir.path().join("scylla").join(folder)).unwrap();
        }
        fs::write(dir.path().join("scylla/9.9.9"), "not a folder").unwrap();
        dir
    }

    #[test_case("v1.14.0", "1.14.0" ; "exact release")]
    #[test_case("1.14.0", "1.14.0" ; "without prefix")]
    #[test_case("v1.13.5", "1.12.0" ; "highest below")]
    #[test_case("v2.0.0", "1.14.0" ; "newer than every folder")]
    #[test_case("v10.0.0", "1.14.0" ; "files are not folders")]
    #[test_case("feature-x", "feature-x" ; "named folder")]
    #[test_case("v1.14.0-scylla", "master" ; "pre-release falls back")]
    #[test_case("unknown", "master" ; "unknown name falls back")]
    fn resolve_folder(version: &str, expected: &str) {
        let dir = versions_dir(&["1.0.0", "1.12.0", "1.14.0", "feature-x", "master"]);
        let folder = resolve_version_folder(dir.path(), DriverType::Scylla, version).unwrap();
        assert_eq!(folder, dir.path().join("scylla").join(expected));
    }

    #[test]
    fn resolve_folder_below_every_release() {
        let dir = versions_dir(&["1.12.0"]);
        let error = resolve_version_folder(dir.path(), DriverType::Scylla, "v1.0.0").unwrap_err();
        assert!(
            matches!(error, VersionFolderError::NoMatch { .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn resolve_folder_missing_directory() {
        let dir = tempdir().unwrap();
        let error = resolve_version_folder(dir.path(), DriverType::Upstream, "v1.0.0").unwrap_err();
        assert!(
            matches!(error, VersionFolderError::ReadDir { .. }),
            "unexpected error: {error:?}"
        );
    }

    static TAGS: &[&str] = &[
        "v1.15.1",
        "v1.15.0",
        "v1.15.0-rc1",
        "v1.14.3-scylla",
        "v1.14.2",
        "release-1",
        "v2",
        "v1.13.0",
    ];

    #[test_case(1, &["v1.15.1"] ; "one")]
    #[test_case(2, &["v1.15.1", "v1.14.3-scylla"] ; "dedupes minor versions")]
    #[test_case(3, &["v1.15.1", "v1.14.3-scylla", "v1.13.0"] ; "skips malformed tags")]
    #[test_case(0, &[] ; "zero")]
    fn latest_tags(count: usize, expected: &[&str]) {
        assert_eq!(select_latest_tags(TAGS, count).unwrap(), expected);
    }

    #[test]
    fn latest_tags_not_enough() {
        let error = select_latest_tags(TAGS, 4).unwrap_err();
        assert_eq!(
            error.to_string(),
            "requested the latest 4 driver tags, but only found 3: [v1.15.1, v1.14.3-scylla, v1.13.0]"
        );
    }
}
