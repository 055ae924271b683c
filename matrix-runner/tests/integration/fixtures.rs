// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake collaborators and on-disk fixtures for running matrix cells without external tools.

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::{Utf8TempDir, tempdir};
use indoc::formatdoc;
use matrix_runner::{
    cluster::{Cluster, ClusterProvisioner, ClusterSpec, connection_args},
    config::MatrixConfig,
    errors::{ClusterError, CommandError, SourceTreeError},
    run::CellContext,
    source::SourceTree,
    test_command::{TestCommandRunner, TestInvocation},
    versions::DriverType,
};
use std::{cell::RefCell, collections::BTreeMap, fs, io, rc::Rc};
use swrite::{SWrite, swriteln};

pub(crate) const SUITE_NAME: &str = "github.com/gocql/gocql";

/// A shared, ordered log of what the fakes were asked to do.
pub(crate) type Events = Rc<RefCell<Vec<String>>>;

/// The outcome of one test case in a fake part file.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fake {
    Pass,
    Fail,
    UnexpectedSuccess,
}

pub(crate) fn part_xml(cases: &[(&str, Fake)]) -> String {
    let mut body = String::new();
    for (name, outcome) in cases {
        let child = match outcome {
            Fake::Pass => String::new(),
            Fake::Fail => {
                r#"<failure message="Failed" type="">    main_test.go:10: boom</failure>"#.to_owned()
            }
            Fake::UnexpectedSuccess => r#"<failure message="Unexpected success"></failure>"#.to_owned(),
        };
        swriteln!(
            body,
            r#"    <testcase classname="gocql" name="{name}" time="0.010">{child}</testcase>"#
        );
    }
    formatdoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <testsuites>
          <testsuite name="{SUITE_NAME}" tests="{}" failures="0" errors="0" time="1.500" timestamp="2024-05-01T10:00:00Z">
            <properties>
              <property name="go.version" value="go1.22.2"></property>
            </properties>
        {body}  </testsuite>
        </testsuites>
        "#,
        cases.len(),
    }
}

/// A driver checkout with a config file, a versions directory and an xunit directory.
pub(crate) struct Workspace {
    // Held for its Drop.
    _dir: Utf8TempDir,
    pub(crate) driver_root: Utf8PathBuf,
    pub(crate) versions_dir: Utf8PathBuf,
    pub(crate) xunit_dir: Utf8PathBuf,
    pub(crate) lock_dir: Utf8PathBuf,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        let dir = tempdir().expect("created temp dir");
        let root = dir.path();
        let driver_root = root.join("gocql");
        let versions_dir = root.join("versions");
        let lock_dir = root.join("locks");
        fs::create_dir_all(driver_root.join(".config")).expect("created driver root");
        fs::create_dir_all(&versions_dir).expect("created versions dir");
        fs::write(
            driver_root.join(MatrixConfig::CONFIG_PATH),
            formatdoc! {r#"
                [cluster]
                lock-dir = "{lock_dir}"
                prefix-range = [10, 12]
            "#},
        )
        .expect("wrote config");

        Self {
            driver_root,
            versions_dir,
            xunit_dir: root.join("xunit"),
            lock_dir,
            _dir: dir,
        }
    }

    pub(crate) fn config(&self) -> MatrixConfig {
        MatrixConfig::from_sources(&self.driver_root, None).expect("config is valid")
    }

    pub(crate) fn add_version_folder(&self, version: &str) -> Utf8PathBuf {
        let folder = self.versions_dir.join("scylla").join(version);
        fs::create_dir_all(&folder).expect("created version folder");
        folder
    }

    pub(crate) fn lock_files(&self) -> usize {
        match fs::read_dir(&self.lock_dir) {
            Ok(entries) => entries.count(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => 0,
            Err(error) => panic!("failed to read lock dir: {error}"),
        }
    }
}

pub(crate) struct Fakes {
    pub(crate) events: Events,
    pub(crate) source_tree: FakeSourceTree,
    pub(crate) provisioner: FakeProvisioner,
    pub(crate) test_runner: FakeTestRunner,
}

impl Fakes {
    pub(crate) fn new(driver_root: &Utf8Path) -> Self {
        let events = Events::default();
        Self {
            source_tree: FakeSourceTree {
                root: driver_root.to_owned(),
                events: events.clone(),
                bad_tags: Vec::new(),
            },
            provisioner: FakeProvisioner {
                events: events.clone(),
                fail_start: false,
            },
            test_runner: FakeTestRunner {
                events: events.clone(),
                parts: BTreeMap::new(),
            },
            events,
        }
    }

    pub(crate) fn context<'a>(
        &'a self,
        config: &'a MatrixConfig,
        ws: &'a Workspace,
        test_profiles: &'a [String],
    ) -> CellContext<'a> {
        CellContext {
            config,
            source_tree: &self.source_tree,
            provisioner: &self.provisioner,
            test_runner: &self.test_runner,
            driver_type: DriverType::Scylla,
            versions_dir: &ws.versions_dir,
            xunit_dir: &ws.xunit_dir,
            db_version: "2024.1.3",
            test_profiles,
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

pub(crate) struct FakeSourceTree {
    root: Utf8PathBuf,
    events: Events,
    pub(crate) bad_tags: Vec<String>,
}

impl SourceTree for FakeSourceTree {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn origin_remote(&self) -> Result<String, SourceTreeError> {
        Ok("https://github.com/scylladb/gocql.git".to_owned())
    }

    fn tags_newest_first(&self) -> Result<Vec<String>, SourceTreeError> {
        Ok(vec!["v1.1.0".to_owned(), "v1.0.0".to_owned()])
    }

    fn checkout_tag(&self, tag: &str) -> Result<(), SourceTreeError> {
        self.events.borrow_mut().push(format!("checkout {tag}"));
        if self.bad_tags.iter().any(|bad| bad == tag) {
            return Err(SourceTreeError::Checkout {
                tag: tag.to_owned(),
                error: CommandError::Exec {
                    command: format!("git checkout tags/{tag}"),
                    error: io::Error::other("unknown revision"),
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
        self.events
            .borrow_mut()
            .push(format!("patch {}", patch.file_name().unwrap_or_default()));
        Ok(())
    }
}

pub(crate) struct FakeProvisioner {
    events: Events,
    pub(crate) fail_start: bool,
}

impl ClusterProvisioner for FakeProvisioner {
    fn create(&self, spec: &ClusterSpec<'_>) -> Result<Box<dyn Cluster>, ClusterError> {
        self.events
            .borrow_mut()
            .push(format!("create {} {}", spec.address_prefix, spec.db_version));
        Ok(Box::new(FakeCluster {
            events: self.events.clone(),
            prefix: spec.address_prefix.to_owned(),
            nodes: spec.nodes,
            fail_start: self.fail_start,
            addresses: Vec::new(),
        }))
    }
}

#[derive(Debug)]
struct FakeCluster {
    events: Events,
    prefix: String,
    nodes: u8,
    fail_start: bool,
    addresses: Vec<String>,
}

impl Cluster for FakeCluster {
    fn start(&mut self) -> Result<String, ClusterError> {
        self.events.borrow_mut().push("start".to_owned());
        if self.fail_start {
            return Err(ClusterError::NoLiveNodes);
        }
        self.addresses = (1..=self.nodes)
            .map(|n| format!("{}{n}", self.prefix))
            .collect();
        Ok(connection_args(&self.addresses))
    }

    fn node_addresses(&self) -> &[String] {
        &self.addresses
    }

    fn remove(&mut self) -> Result<(), ClusterError> {
        self.events.borrow_mut().push("remove".to_owned());
        Ok(())
    }
}

/// Writes a canned part file for each invocation, keyed by profile name.
pub(crate) struct FakeTestRunner {
    events: Events,
    pub(crate) parts: BTreeMap<String, String>,
}

impl TestCommandRunner for FakeTestRunner {
    fn run(&self, invocation: &TestInvocation<'_>) -> Result<(), CommandError> {
        self.events.borrow_mut().push(format!(
            "run {} {}",
            invocation.profile.name(),
            invocation.connection_args
        ));
        if let Some(xml) = self.parts.get(invocation.profile.name()) {
            fs::write(invocation.output, xml).expect("wrote part file");
        }
        Ok(())
    }
}
