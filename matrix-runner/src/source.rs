// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The driver's source tree: tags, checkouts and compatibility patches.

use crate::{
    command::ExternalCommand,
    errors::{CommandError, SourceTreeError},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fs, io};
use tracing::{debug, info, warn};

/// Patch files in a version folder are the files whose names start with this.
pub const PATCH_FILE_PREFIX: &str = "patch";

/// A checked-out driver repository.
pub trait SourceTree {
    /// The root of the working tree.
    fn root(&self) -> &Utf8Path;

    /// The URL of the `origin` remote.
    fn origin_remote(&self) -> Result<String, SourceTreeError>;

    /// Discards local changes, fetches, and lists every tag, newest first.
    fn tags_newest_first(&self) -> Result<Vec<String>, SourceTreeError>;

    /// Discards local changes and checks out `tag`.
    fn checkout_tag(&self, tag: &str) -> Result<(), SourceTreeError>;

    /// Applies one patch file.
    ///
    /// If the patch does not apply cleanly only because of a path in `whitelist`, that path is
    /// deleted first.
    fn apply_patch(&self, patch: &Utf8Path, whitelist: &[Utf8PathBuf])
    -> Result<(), SourceTreeError>;
}

/// Lists the patch files in a version folder, in the order they are applied.
///
/// A missing folder has no patches.
pub fn patch_files(folder: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SourceTreeError> {
    let entries = match folder.read_dir_utf8() {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => {
            return Err(SourceTreeError::ListPatches {
                dir: folder.to_owned(),
                error,
            });
        }
    };

    let mut patches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| SourceTreeError::ListPatches {
            dir: folder.to_owned(),
            error,
        })?;
        if entry.file_name().starts_with(PATCH_FILE_PREFIX) && entry.path().is_file() {
            patches.push(entry.into_path());
        }
    }
    patches.sort_unstable();
    Ok(patches)
}

/// Checks out `tag` and applies every patch in `version_folder`.
pub fn prepare_source_tree(
    tree: &dyn SourceTree,
    tag: &str,
    version_folder: &Utf8Path,
    whitelist: &[Utf8PathBuf],
) -> Result<(), SourceTreeError> {
    tree.checkout_tag(tag)?;
    for patch in patch_files(version_folder)? {
        tree.apply_patch(&patch, whitelist)?;
    }
    Ok(())
}

/// A driver repository manipulated with `git` and `patch`.
#[derive(Clone, Debug)]
pub struct GitSourceTree {
    root: Utf8PathBuf,
}

impl GitSourceTree {
    /// Opens the repository at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn command<'a>(
        &self,
        program: &'a str,
        args: impl IntoIterator<Item = &'a str>,
    ) -> ExternalCommand<'a> {
        let mut command = ExternalCommand::new(program);
        command.args(args).current_dir(self.root.clone());
        command
    }

    fn git<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> ExternalCommand<'a> {
        self.command("git", args)
    }
}

impl SourceTree for GitSourceTree {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn origin_remote(&self) -> Result<String, SourceTreeError> {
        let url = self
            .git(["config", "--get", "remote.origin.url"])
            .read()
            .map_err(SourceTreeError::Query)?;
        Ok(url.trim().to_owned())
    }

    fn tags_newest_first(&self) -> Result<Vec<String>, SourceTreeError> {
        self.git(["checkout", "."])
            .read()
            .map_err(SourceTreeError::Reset)?;
        self.git(["fetch", "-p", "--all"])
            .read()
            .map_err(SourceTreeError::Reset)?;
        let tags = self
            .git(["tag", "--sort=-creatordate"])
            .read()
            .map_err(SourceTreeError::Query)?;
        Ok(tags
            .lines()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .collect())
    }

    fn checkout_tag(&self, tag: &str) -> Result<(), SourceTreeError> {
        self.git(["checkout", "."])
            .read()
            .map_err(SourceTreeError::Reset)?;
        info!("checking out tag `{tag}`");
        let refname = format!("tags/{tag}");
        self.git(["checkout", refname.as_str()])
            .read()
            .map_err(|error| SourceTreeError::Checkout {
                tag: tag.to_owned(),
                error,
            })?;
        Ok(())
    }

    fn apply_patch(
        &self,
        patch: &Utf8Path,
        whitelist: &[Utf8PathBuf],
    ) -> Result<(), SourceTreeError> {
        let patch_error = |error: CommandError| SourceTreeError::Patch {
            patch: patch.to_owned(),
            error,
        };

        let stat = self
            .git(["apply", "--stat", patch.as_str()])
            .read()
            .map_err(patch_error)?;
        info!("patch statistics for `{patch}`:\n{}", stat.trim_end());

        if let Err(error) = self.git(["apply", "--check", patch.as_str()]).output() {
            let stderr = match &error {
                CommandError::Failed { stderr, .. } => stderr.as_str(),
                _ => "",
            };
            let Some(path) = whitelist.iter().find(|path| stderr.contains(path.as_str())) else {
                return Err(patch_error(error));
            };
            warn!("patch `{patch}` conflicts with whitelisted `{path}`, removing it");
            remove_path(&self.root.join(path)).map_err(|error| {
                SourceTreeError::RemoveWhitelisted {
                    patch: patch.to_owned(),
                    path: path.clone(),
                    error,
                }
            })?;
        }

        info!("applying patch `{patch}`");
        self.command("patch", ["-p1", "-i", patch.as_str()])
            .read()
            .map_err(patch_error)?;
        debug!("applied patch `{patch}`");
        Ok(())
    }
}

fn remove_path(path: &Utf8Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    #[test]
    fn lists_patches_in_order() {
        let dir = tempdir().unwrap();
        for name in ["patch_2", "ignore.toml", "patch_1", "README"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("patches")).unwrap();

        let patches = patch_files(dir.path()).unwrap();
        assert_eq!(
            patches,
            vec![dir.path().join("patch_1"), dir.path().join("patch_2")]
        );
        assert!(patch_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn remove_path_handles_files_dirs_and_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("conftest.py");
        let subdir = dir.path().join("tests");
        fs::write(&file, "").unwrap();
        fs::create_dir_all(subdir.join("integration")).unwrap();

        remove_path(&file).unwrap();
        remove_path(&subdir).unwrap();
        remove_path(&file).unwrap();
        assert!(!file.exists());
        assert!(!subdir.exists());
    }

    #[derive(Debug, Default)]
    struct FakeTree {
        root: Utf8PathBuf,
        calls: RefCell<Vec<String>>,
        fail_checkout: bool,
    }

    impl SourceTree for FakeTree {
        fn root(&self) -> &Utf8Path {
            &self.root
        }

        fn origin_remote(&self) -> Result<String, SourceTreeError> {
            Ok("https://github.com/gocql/gocql".to_owned())
        }

        fn tags_newest_first(&self) -> Result<Vec<String>, SourceTreeError> {
            Ok(vec![])
        }

        fn checkout_tag(&self, tag: &str) -> Result<(), SourceTreeError> {
            self.calls.borrow_mut().push(format!("checkout {tag}"));
            if self.fail_checkout {
                return Err(SourceTreeError::Checkout {
                    tag: tag.to_owned(),
                    error: CommandError::Exec {
                        command: "git checkout".to_owned(),
                        error: io::Error::other("no git"),
                    },
                });
            }
            Ok(())
        }

        fn apply_patch(
            &self,
            patch: &Utf8Path,
            _whitelist: &[Utf8PathBuf],
        ) -> Result<(), SourceTreeError> {
            self.calls
                .borrow_mut()
                .push(format!("apply {}", patch.file_name().unwrap()));
            Ok(())
        }
    }

    #[test]
    fn prepare_checks_out_then_patches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("patch_b"), "").unwrap();
        fs::write(dir.path().join("patch_a"), "").unwrap();

        let tree = FakeTree::default();
        prepare_source_tree(&tree, "v1.0.0", dir.path(), &[]).unwrap();
        assert_eq!(
            *tree.calls.borrow(),
            vec!["checkout v1.0.0", "apply patch_a", "apply patch_b"]
        );
    }

    #[test]
    fn checkout_failure_skips_patches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("patch_a"), "").unwrap();

        let tree = FakeTree {
            fail_checkout: true,
            ..Default::default()
        };
        let error = prepare_source_tree(&tree, "v1.0.0", dir.path(), &[]).unwrap_err();
        assert_eq!(error.to_string(), "failed to check out tag `v1.0.0`");
        assert_eq!(*tree.calls.borrow(), vec!["checkout v1.0.0"]);
    }
}
