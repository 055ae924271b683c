// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running one matrix cell: one driver version against one protocol version.

use crate::{
    address::AddressPrefixLock,
    cluster::{ClusterGuard, ClusterProvisioner, ClusterSpec},
    config::{MatrixConfig, TestProfile},
    errors::{CellRunError, DisplayErrorChain},
    policy::IgnorePolicy,
    reconcile::{AnalyzedReport, JunitReconciler, RunLabel, part_path, remove_report_files},
    source::{SourceTree, prepare_source_tree},
    test_command::{TestCommandRunner, TestInvocation},
    versions::{DriverType, resolve_version_folder},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::{info, warn};

/// The directory, relative to the driver's source tree, that cluster state is kept in.
pub const CLUSTER_DIR_NAME: &str = "ccm";

/// Settings and collaborators shared by every cell of a matrix.
#[derive(Clone, Copy)]
pub struct CellContext<'a> {
    /// The matrix configuration.
    pub config: &'a MatrixConfig,

    /// The driver's source tree.
    pub source_tree: &'a dyn SourceTree,

    /// Creates a cluster for each test profile.
    pub provisioner: &'a dyn ClusterProvisioner,

    /// Runs each test profile.
    pub test_runner: &'a dyn TestCommandRunner,

    /// Which driver is under test.
    pub driver_type: DriverType,

    /// The directory holding `<driver-type>/<version>` folders.
    pub versions_dir: &'a Utf8Path,

    /// Reports are written under `<xunit_dir>/<driver-version>/`.
    pub xunit_dir: &'a Utf8Path,

    /// The database version clusters are created with.
    pub db_version: &'a str,

    /// The names of the test profiles to run, in order.
    pub test_profiles: &'a [String],
}

impl CellContext<'_> {
    /// Looks up every requested test profile.
    pub fn resolve_profiles(&self) -> Result<Vec<&TestProfile>, CellRunError> {
        self.test_profiles
            .iter()
            .map(|name| self.config.test_profile(name).map_err(CellRunError::from))
            .collect()
    }
}

/// The path of the consolidated report for a cell.
pub fn xunit_file_path(
    xunit_dir: &Utf8Path,
    driver_type: DriverType,
    driver_version: &str,
    protocol: u8,
) -> Utf8PathBuf {
    xunit_dir
        .join(driver_version)
        .join(format!("xunit.{driver_type}.v{protocol}.{driver_version}.xml"))
}

/// One (driver version, protocol version) cell.
pub struct CellRun<'a> {
    ctx: CellContext<'a>,
    driver_version: &'a str,
    protocol: u8,
}

impl<'a> CellRun<'a> {
    /// Creates a cell.
    pub fn new(ctx: CellContext<'a>, driver_version: &'a str, protocol: u8) -> Self {
        Self {
            ctx,
            driver_version,
            protocol,
        }
    }

    /// The path the consolidated report is written to.
    pub fn xunit_file(&self) -> Utf8PathBuf {
        xunit_file_path(
            self.ctx.xunit_dir,
            self.ctx.driver_type,
            self.driver_version,
            self.protocol,
        )
    }

    /// Prepares the source tree, runs every test profile and reconciles the reports.
    pub fn run(&self) -> Result<AnalyzedReport, CellRunError> {
        let ctx = &self.ctx;
        let profiles = ctx.resolve_profiles()?;
        let xunit_file = self.prepare_report_dir()?;

        let version_folder =
            resolve_version_folder(ctx.versions_dir, ctx.driver_type, self.driver_version)?;
        let policy = IgnorePolicy::from_version_folder(&version_folder, self.protocol)?;

        prepare_source_tree(
            ctx.source_tree,
            self.driver_version,
            &version_folder,
            ctx.config.check_whitelist(),
        )?;

        let cluster_dir = ctx.source_tree.root().join(CLUSTER_DIR_NAME);
        for (idx, profile) in profiles.into_iter().enumerate() {
            self.run_profile(idx, profile, &cluster_dir, &xunit_file)?;
        }

        let label = RunLabel::new(ctx.driver_type, self.driver_version, self.protocol);
        let analyzed =
            JunitReconciler::new(&xunit_file, ctx.config.suite_name(), &policy).reconcile(&label)?;
        Ok(analyzed)
    }

    fn prepare_report_dir(&self) -> Result<Utf8PathBuf, CellRunError> {
        let xunit_file = self.xunit_file();
        if let Some(dir) = xunit_file.parent() {
            fs::create_dir_all(dir).map_err(|error| CellRunError::ReportDir {
                dir: dir.to_owned(),
                error,
            })?;
        }
        remove_report_files(&xunit_file)?;
        Ok(xunit_file)
    }

    fn run_profile(
        &self,
        idx: usize,
        profile: &TestProfile,
        cluster_dir: &Utf8Path,
        xunit_file: &Utf8Path,
    ) -> Result<(), CellRunError> {
        let ctx = &self.ctx;
        let config = ctx.config;

        // Dropped in reverse order: the cluster is removed before its addresses are released.
        let lock = AddressPrefixLock::acquire(config.lock_dir(), config.prefix_range())?;
        let spec = ClusterSpec {
            dir: cluster_dir,
            db_version: ctx.db_version,
            nodes: config.nodes(),
            address_prefix: lock.prefix(),
            config: profile.cluster_config(),
        };
        let mut cluster = ClusterGuard::new(ctx.provisioner.create(&spec)?);
        let connection_args = cluster.start()?;

        info!(
            "running test profile `{}` for {} with protocol v{}",
            profile.name(),
            self.driver_version,
            self.protocol
        );
        let output = part_path(xunit_file, idx);
        let invocation = TestInvocation {
            driver_root: ctx.source_tree.root(),
            profile,
            connection_args: &connection_args,
            protocol: self.protocol,
            cql_version: config.cql_version(),
            extra_args: config.extra_args(),
            db_version: ctx.db_version,
            output: &output,
        };
        if let Err(error) = ctx.test_runner.run(&invocation) {
            warn!(
                "test profile `{}` did not run: {}",
                profile.name(),
                DisplayErrorChain::new(&error)
            );
        }
        Ok(())
    }
}
