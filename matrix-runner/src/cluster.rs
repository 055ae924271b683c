// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral database clusters that test profiles run against.
//!
//! The matrix only needs a narrow contract from a cluster: create it, start it to obtain the
//! arguments that point the test suite at it, and remove it afterwards. [`CcmProvisioner`]
//! fulfills that contract with the `ccm` command-line tool; tests substitute their own
//! provisioner.

use crate::{command::ExternalCommand, errors::ClusterError};
use camino::{Utf8Path, Utf8PathBuf};
use std::{collections::BTreeMap, fmt, fs};
use tracing::{info, warn};

/// The name every cluster is created under.
pub const CLUSTER_NAME: &str = "test";

/// Everything needed to create one cluster.
#[derive(Clone, Debug)]
pub struct ClusterSpec<'a> {
    /// The directory cluster state is kept in.
    pub dir: &'a Utf8Path,

    /// The database version to install.
    pub db_version: &'a str,

    /// The number of nodes.
    pub nodes: u8,

    /// The `127.0.N.` prefix node addresses are allocated from.
    pub address_prefix: &'a str,

    /// Database configuration overrides.
    pub config: &'a BTreeMap<String, String>,
}

/// Creates clusters.
pub trait ClusterProvisioner {
    /// Creates, but does not start, a cluster.
    fn create(&self, spec: &ClusterSpec<'_>) -> Result<Box<dyn Cluster>, ClusterError>;
}

/// A created cluster.
pub trait Cluster: fmt::Debug {
    /// Starts the cluster and waits for it to accept connections.
    ///
    /// Returns the arguments that point the test suite at the cluster.
    fn start(&mut self) -> Result<String, ClusterError>;

    /// The addresses of nodes that were live at the last check.
    fn node_addresses(&self) -> &[String];

    /// Stops the cluster and deletes its state.
    fn remove(&mut self) -> Result<(), ClusterError>;
}

/// Formats the test suite arguments for a cluster with the given live nodes.
pub fn connection_args(addresses: &[String]) -> String {
    let n = addresses.len();
    format!(
        "-cluster={} -clusterSize={n} -rf={n}",
        addresses.join(",")
    )
}

/// Removes a cluster when dropped.
#[derive(Debug)]
pub struct ClusterGuard {
    cluster: Box<dyn Cluster>,
}

impl ClusterGuard {
    /// Takes ownership of a cluster.
    pub fn new(cluster: Box<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Starts the guarded cluster.
    pub fn start(&mut self) -> Result<String, ClusterError> {
        self.cluster.start()
    }

    /// The guarded cluster.
    pub fn cluster(&self) -> &dyn Cluster {
        &*self.cluster
    }
}

impl Drop for ClusterGuard {
    fn drop(&mut self) {
        if let Err(error) = self.cluster.remove() {
            warn!(
                "failed to remove cluster: {}",
                crate::errors::DisplayErrorChain::new(&error)
            );
        }
    }
}

/// Provisions clusters with `ccm`.
#[derive(Clone, Debug)]
pub struct CcmProvisioner {
    ccm_path: Utf8PathBuf,
}

impl CcmProvisioner {
    /// Creates a provisioner that runs `ccm` from `PATH`.
    pub fn new() -> Self {
        Self {
            ccm_path: Utf8PathBuf::from("ccm"),
        }
    }

    /// Creates a provisioner that runs the given `ccm` executable.
    pub fn with_ccm_path(ccm_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            ccm_path: ccm_path.into(),
        }
    }
}

impl Default for CcmProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterProvisioner for CcmProvisioner {
    fn create(&self, spec: &ClusterSpec<'_>) -> Result<Box<dyn Cluster>, ClusterError> {
        fs::create_dir_all(spec.dir).map_err(|error| ClusterError::CreateDir {
            dir: spec.dir.to_owned(),
            error,
        })?;

        let mut cluster = CcmCluster {
            ccm_path: self.ccm_path.clone(),
            config_dir: spec.dir.to_owned(),
            address_prefix: spec.address_prefix.to_owned(),
            live_addresses: Vec::new(),
            created: false,
        };

        let nodes = spec.nodes.to_string();
        cluster
            .ccm(["create", CLUSTER_NAME, "--scylla", "-v", spec.db_version, "-n"])
            .args([nodes.as_str(), "-i", spec.address_prefix])
            .run_as("create")?;
        info!(
            "created cluster with {} node(s) of version {} in `{}`",
            spec.nodes, spec.db_version, spec.dir
        );
        cluster.created = true;

        if !spec.config.is_empty() {
            let mut updateconf = cluster.ccm(["updateconf"]);
            updateconf.args(spec.config.iter().map(|(k, v)| format!("{k}:{v}")));
            updateconf.run_as("updateconf")?;
        }

        Ok(Box::new(cluster))
    }
}

#[derive(Debug)]
struct CcmCluster {
    ccm_path: Utf8PathBuf,
    config_dir: Utf8PathBuf,
    address_prefix: String,
    live_addresses: Vec<String>,
    created: bool,
}

impl CcmCluster {
    fn ccm<'a>(&'a self, args: impl IntoIterator<Item = &'a str>) -> CcmCommand<'a> {
        let mut command = ExternalCommand::new(self.ccm_path.as_str());
        command
            .args(args)
            .args(["--config-dir", self.config_dir.as_str()]);
        CcmCommand { command }
    }
}

struct CcmCommand<'a> {
    command: ExternalCommand<'a>,
}

impl<'a> CcmCommand<'a> {
    fn args<I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<std::borrow::Cow<'a, str>>,
    {
        self.command.args(args);
        self
    }

    fn run_as(&self, operation: &'static str) -> Result<String, ClusterError> {
        self.command
            .read()
            .map_err(|error| ClusterError::Command { operation, error })
    }
}

impl Cluster for CcmCluster {
    fn start(&mut self) -> Result<String, ClusterError> {
        info!("starting test cluster");
        self.ccm(["start", "--wait-for-binary-proto"])
            .run_as("start")?;
        let status = self.ccm(["status"]).run_as("status")?;
        let addresses = live_node_addresses(&status, &self.address_prefix);
        if addresses.is_empty() {
            return Err(ClusterError::NoLiveNodes);
        }
        info!("test cluster started: {}", addresses.join(", "));
        self.live_addresses = addresses;
        Ok(connection_args(&self.live_addresses))
    }

    fn node_addresses(&self) -> &[String] {
        &self.live_addresses
    }

    fn remove(&mut self) -> Result<(), ClusterError> {
        if !self.created {
            return Ok(());
        }
        info!("removing test cluster");
        self.ccm(["remove"]).run_as("remove")?;
        self.created = false;
        self.live_addresses.clear();
        info!("test cluster removed");
        Ok(())
    }
}

/// Parses `ccm status` output into the addresses of live nodes.
///
/// `ccm` numbers nodes from 1 and gives node N the address `<prefix>N`.
fn live_node_addresses(status: &str, address_prefix: &str) -> Vec<String> {
    status
        .lines()
        .filter_map(|line| {
            let (node, state) = line.trim().split_once(':')?;
            let index: u8 = node.strip_prefix("node")?.parse().ok()?;
            (state.trim() == "UP").then(|| format!("{address_prefix}{index}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_status() {
        let status = indoc! {"
            Cluster: 'test'
            ---------------
            node1: UP
            node3: DOWN
            node2: UP
        "};
        assert_eq!(
            live_node_addresses(status, "127.0.4."),
            vec!["127.0.4.1".to_owned(), "127.0.4.2".to_owned()]
        );
        assert!(live_node_addresses("", "127.0.4.").is_empty());
    }

    #[test]
    fn format_connection_args() {
        assert_eq!(
            connection_args(&["127.0.1.1".to_owned(), "127.0.1.2".to_owned()]),
            "-cluster=127.0.1.1,127.0.1.2 -clusterSize=2 -rf=2"
        );
    }

    #[derive(Debug, Default)]
    struct RecordingCluster {
        removed: std::rc::Rc<std::cell::Cell<bool>>,
    }

    impl Cluster for RecordingCluster {
        fn start(&mut self) -> Result<String, ClusterError> {
            Ok(connection_args(&["127.0.1.1".to_owned()]))
        }

        fn node_addresses(&self) -> &[String] {
            &[]
        }

        fn remove(&mut self) -> Result<(), ClusterError> {
            self.removed.set(true);
            Ok(())
        }
    }

    #[test]
    fn guard_removes_on_drop() {
        let cluster = RecordingCluster::default();
        let removed = cluster.removed.clone();
        let mut guard = ClusterGuard::new(Box::new(cluster));
        assert_eq!(
            guard.start().unwrap(),
            "-cluster=127.0.1.1 -clusterSize=1 -rf=1"
        );
        assert!(!removed.get());
        drop(guard);
        assert!(removed.get());
    }
}
