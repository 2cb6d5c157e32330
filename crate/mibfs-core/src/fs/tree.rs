use crate::fs::error::FsError;
use crate::fs::node::ScalarNode;
use mibfs_types::{Path, UnixTime};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Index of a node in the tree, as reported to the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inode(pub u64);

impl Inode {
    /// The root directory.
    pub const ROOT: Inode = Inode(1);

    pub fn as_u64(self) -> u64 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Display for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of the exported tree.
pub enum Node {
    Dir(DirNode),
    Scalar(Arc<ScalarNode>),
}

/// An intermediate directory, created to hold the entries nested
/// under it.
pub struct DirNode {
    entries: BTreeMap<String, Inode>,
    mtime: UnixTime,
}

impl DirNode {
    fn new(mtime: UnixTime) -> DirNode {
        DirNode {
            entries: BTreeMap::new(),
            mtime,
        }
    }

    /// When the tree was built. Directories never change afterwards.
    pub fn mtime(&self) -> UnixTime {
        self.mtime
    }

    /// Entries of this directory, sorted by name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, Inode)> {
        self.entries.iter().map(|(name, ino)| (name.as_str(), *ino))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error reported while building a [MibTree].
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("duplicate entry at {0}")]
    Duplicate(Path),

    #[error("{0} holds a value; it cannot also be a directory")]
    NotADirectory(String),
}

/// The tree of exported entries.
///
/// Built once at startup from the configuration and fixed
/// afterwards; inodes remain valid for the lifetime of the mount.
pub struct MibTree {
    nodes: Vec<Node>,
}

impl MibTree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::new()
    }

    /// Get the node at `ino`.
    pub fn node(&self, ino: Inode) -> Result<&Node, FsError> {
        ino.0
            .checked_sub(1)
            .and_then(|index| self.nodes.get(index as usize))
            .ok_or(FsError::NotFound)
    }

    /// Look up `name` inside the directory at `parent`.
    pub fn lookup(&self, parent: Inode, name: &str) -> Result<(Inode, &Node), FsError> {
        let dir = self.dir(parent)?;
        let ino = dir.entries.get(name).copied().ok_or(FsError::NotFound)?;

        Ok((ino, self.node(ino)?))
    }

    /// Get the value node at `ino`.
    pub fn scalar(&self, ino: Inode) -> Result<&Arc<ScalarNode>, FsError> {
        match self.node(ino)? {
            Node::Scalar(node) => Ok(node),
            Node::Dir(_) => Err(FsError::IsADirectory),
        }
    }

    /// Get the directory at `ino`.
    pub fn dir(&self, ino: Inode) -> Result<&DirNode, FsError> {
        match self.node(ino)? {
            Node::Dir(dir) => Ok(dir),
            Node::Scalar(_) => Err(FsError::NotADirectory),
        }
    }
}

/// Builds a [MibTree].
///
/// Entries are placed by path and intermediate directories are
/// created as needed. A name holds either a directory or a value,
/// never both, and values cannot be nested under values.
pub struct TreeBuilder {
    nodes: Vec<Node>,
    mtime: UnixTime,
}

impl TreeBuilder {
    fn new() -> TreeBuilder {
        let mtime = UnixTime::now();

        TreeBuilder {
            nodes: vec![Node::Dir(DirNode::new(mtime))],
            mtime,
        }
    }

    /// Place a node at `path`.
    pub fn add(&mut self, path: &Path, node: Arc<ScalarNode>) -> Result<(), TreeError> {
        let parent = self.mkdirs(path.parent().as_ref())?;
        if self.dir_mut(parent).entries.contains_key(path.name()) {
            return Err(TreeError::Duplicate(path.clone()));
        }
        let ino = self.push(Node::Scalar(node));
        self.dir_mut(parent)
            .entries
            .insert(path.name().to_string(), ino);

        Ok(())
    }

    /// Finish building.
    pub fn build(self) -> MibTree {
        MibTree { nodes: self.nodes }
    }

    fn mkdirs(&mut self, path: Option<&Path>) -> Result<Inode, TreeError> {
        let mut dir = Inode::ROOT;
        if let Some(path) = path {
            for component in path.components() {
                dir = self.subdir(dir, component)?;
            }
        }

        Ok(dir)
    }

    fn subdir(&mut self, parent: Inode, name: &str) -> Result<Inode, TreeError> {
        if let Some(child) = self.dir_mut(parent).entries.get(name).copied() {
            return match &self.nodes[child.index()] {
                Node::Dir(_) => Ok(child),
                Node::Scalar(_) => Err(TreeError::NotADirectory(name.to_string())),
            };
        }
        let mtime = self.mtime;
        let child = self.push(Node::Dir(DirNode::new(mtime)));
        self.dir_mut(parent).entries.insert(name.to_string(), child);

        Ok(child)
    }

    fn push(&mut self, node: Node) -> Inode {
        self.nodes.push(node);

        Inode(self.nodes.len() as u64)
    }

    fn dir_mut(&mut self, ino: Inode) -> &mut DirNode {
        match &mut self.nodes[ino.index()] {
            Node::Dir(dir) => dir,
            // mkdirs only ever hands out directory inodes
            Node::Scalar(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mibfs_types::Oid;

    fn node(name: &str) -> anyhow::Result<Arc<ScalarNode>> {
        Ok(Arc::new(ScalarNode::with_content(
            Oid::parse("1.3.6.1.2.1.1.5.0")?,
            name.as_bytes().to_vec(),
        )))
    }

    #[test]
    fn add_creates_intermediate_dirs() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;
        let tree = builder.build();

        let (system, _) = tree.lookup(Inode::ROOT, "system")?;
        assert!(matches!(tree.node(system)?, Node::Dir(_)));

        let (sys_name, _) = tree.lookup(system, "sysName")?;
        assert!(matches!(tree.node(sys_name)?, Node::Scalar(_)));
        assert!(tree.scalar(sys_name).is_ok());

        Ok(())
    }

    #[test]
    fn intermediate_dirs_are_shared() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;
        builder.add(&Path::parse("system/sysDescr")?, node("b")?)?;
        let tree = builder.build();

        let root = tree.dir(Inode::ROOT)?;
        assert_eq!(1, root.len());

        let (system, _) = tree.lookup(Inode::ROOT, "system")?;
        let entries: Vec<String> = tree
            .dir(system)?
            .entries()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(vec!["sysDescr".to_string(), "sysName".to_string()], entries);

        Ok(())
    }

    #[test]
    fn duplicate_path_rejected() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;

        assert!(matches!(
            builder.add(&Path::parse("system/sysName")?, node("b")?),
            Err(TreeError::Duplicate(_))
        ));

        Ok(())
    }

    #[test]
    fn dir_name_cannot_become_a_value() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;

        assert!(matches!(
            builder.add(&Path::parse("system")?, node("b")?),
            Err(TreeError::Duplicate(_))
        ));

        Ok(())
    }

    #[test]
    fn value_name_cannot_become_a_dir() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system")?, node("a")?)?;

        assert!(matches!(
            builder.add(&Path::parse("system/sysName")?, node("b")?),
            Err(TreeError::NotADirectory(_))
        ));

        Ok(())
    }

    #[test]
    fn unknown_inodes_not_found() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;
        let tree = builder.build();

        assert!(matches!(tree.node(Inode(0)), Err(FsError::NotFound)));
        assert!(matches!(tree.node(Inode(999)), Err(FsError::NotFound)));
        assert!(matches!(
            tree.lookup(Inode::ROOT, "missing"),
            Err(FsError::NotFound)
        ));

        Ok(())
    }

    #[test]
    fn type_mismatches_reported() -> anyhow::Result<()> {
        let mut builder = MibTree::builder();
        builder.add(&Path::parse("system/sysName")?, node("a")?)?;
        let tree = builder.build();

        let (system, _) = tree.lookup(Inode::ROOT, "system")?;
        let (sys_name, _) = tree.lookup(system, "sysName")?;

        assert!(matches!(tree.scalar(system), Err(FsError::IsADirectory)));
        assert!(matches!(tree.dir(sys_name), Err(FsError::NotADirectory)));
        assert!(matches!(
            tree.lookup(sys_name, "anything"),
            Err(FsError::NotADirectory)
        ));

        Ok(())
    }

    #[test]
    fn root_is_always_inode_one() -> anyhow::Result<()> {
        let tree = MibTree::builder().build();

        assert!(tree.dir(Inode::ROOT)?.is_empty());
        assert_eq!(1, Inode::ROOT.as_u64());

        Ok(())
    }
}
