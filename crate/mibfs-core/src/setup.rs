//! Brings the parts of the app up in the right order.

use crate::config::{Config, EntryConfig};
use crate::fs::fuse::{self, FuseHandle};
use crate::fs::node::ScalarNode;
use crate::fs::tree::MibTree;
use anyhow::Context as _;
use mibfs_snmp::{SnmpBackend, UdpBackend};
use std::sync::Arc;
use std::time::Duration;

/// Connects the backend and the tree to the configuration.
pub struct SetupHelper {
    pub tree: Arc<MibTree>,
    allow_other: bool,
}

impl SetupHelper {
    /// Connect to the configured agent and build the tree.
    ///
    /// Connected nodes fetch their initial content here. An agent
    /// that does not answer is not a setup failure; the affected
    /// nodes start out empty and report the problem on open.
    pub async fn setup(config: Config) -> anyhow::Result<SetupHelper> {
        let agent = &config.agent;
        let timeout = agent
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(mibfs_snmp::DEFAULT_TIMEOUT);
        let retries = agent.retries.unwrap_or(mibfs_snmp::DEFAULT_RETRIES);
        let backend =
            UdpBackend::connect_with(agent.address.as_str(), &agent.community, timeout, retries)
                .await
                .with_context(|| format!("agent {}", agent.address))?;

        let tree = build_tree(Arc::new(backend), &config.entries).await?;
        log::info!(
            "Serving {} entries from agent {}",
            config.entries.len(),
            agent.address
        );

        Ok(SetupHelper {
            tree: Arc::new(tree),
            allow_other: config.mount.allow_other,
        })
    }

    /// Mount the tree at the given mountpoint.
    ///
    /// The returned handle must be kept for the filesystem to stay
    /// mounted. Call join() on it to unmount.
    pub fn export_fuse(&self, mountpoint: &std::path::Path) -> anyhow::Result<FuseHandle> {
        check_mountpoint(mountpoint)?;
        let handle = fuse::export(Arc::clone(&self.tree), mountpoint, self.allow_other)?;
        log::info!("FUSE filesystem mounted on {mountpoint:?}");

        Ok(handle)
    }
}

/// Build the exported tree from config entries, against the given
/// backend.
pub async fn build_tree(
    backend: Arc<dyn SnmpBackend>,
    entries: &[EntryConfig],
) -> anyhow::Result<MibTree> {
    let mut builder = MibTree::builder();
    for entry in entries {
        let node = match &entry.content {
            Some(content) => {
                ScalarNode::with_content(entry.oid.clone(), content.as_bytes().to_vec())
            }
            None => ScalarNode::connected(entry.oid.clone(), Arc::clone(&backend)).await,
        };
        builder
            .add(&entry.path, Arc::new(node))
            .with_context(|| format!("placing {} at {}", entry.oid, entry.path))?;
    }

    Ok(builder.build())
}

/// Check that the mountpoint is a directory we can use.
fn check_mountpoint(path: &std::path::Path) -> anyhow::Result<()> {
    let m = path
        .metadata()
        .with_context(|| format!("mountpoint {path:?}"))?;
    if !m.is_dir() {
        anyhow::bail!("mountpoint {path:?} must be a directory");
    }
    let mut entries = std::fs::read_dir(path).with_context(|| format!("mountpoint {path:?}"))?;
    if entries.next().is_some() {
        log::warn!("mountpoint {path:?} is not empty; its content will be shadowed");
    }

    Ok(())
}
