use super::error::FuseError;
use crate::fs::error::FsError;
use crate::fs::node::{BLOCK_SIZE, NodeAttrs, OpenMode, ScalarNode};
use crate::fs::tree::{DirNode, Inode, MibTree, Node};
use fuser::{FileType, TimeOrNow};
use mibfs_types::UnixTime;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// One entry of a directory listing, ready to be fed to fuser.
pub(crate) struct DirEntry {
    pub(crate) ino: Inode,

    /// Offset at which the listing resumes after this entry.
    pub(crate) offset: i64,

    pub(crate) kind: FileType,
    pub(crate) name: String,
}

/// Serves FUSE operations from the tree.
///
/// Everything here is async; the fuser-facing side lives in the
/// parent module.
pub(crate) struct InnerMibFs {
    tree: Arc<MibTree>,
}

impl InnerMibFs {
    pub(crate) fn new(tree: Arc<MibTree>) -> InnerMibFs {
        InnerMibFs { tree }
    }

    pub(crate) async fn lookup(
        &self,
        parent: Inode,
        name: &OsStr,
    ) -> Result<fuser::FileAttr, FuseError> {
        let name = name.to_str().ok_or(FuseError::Utf8)?;
        let (ino, node) = self.tree.lookup(parent, name)?;

        Ok(self.attr(ino, node).await)
    }

    pub(crate) async fn getattr(&self, ino: Inode) -> Result<fuser::FileAttr, FuseError> {
        let node = self.tree.node(ino)?;

        Ok(self.attr(ino, node).await)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn setattr(
        &self,
        ino: Inode,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> Result<fuser::FileAttr, FuseError> {
        if let Some(size) = size {
            self.tree.scalar(ino)?.truncate(size)?;
        }
        if mode.is_some() || uid.is_some() || gid.is_some() {
            // Nothing on this filesystem can be chmod'ed or chown'ed.
            return Err(FsError::ReadOnly.into());
        }
        if (atime.is_some() || mtime.is_some())
            && let Node::Scalar(scalar) = self.tree.node(ino)?
        {
            // Accepted, then discarded; directory times are pinned to
            // build time, so there is nothing to do for them either.
            scalar.set_times(atime.map(to_unix_time), mtime.map(to_unix_time));
        }

        self.getattr(ino).await
    }

    pub(crate) async fn open(&self, ino: Inode, flags: i32) -> Result<(u64, u32), FuseError> {
        let scalar = self.tree.scalar(ino)?;
        scalar.open(OpenMode::from_flags(flags)).await?;

        // No per-handle state; every operation resolves the inode.
        Ok((0, 0))
    }

    pub(crate) async fn read(
        &self,
        ino: Inode,
        offset: i64,
        size: u32,
    ) -> Result<Vec<u8>, FuseError> {
        let scalar = self.tree.scalar(ino)?;

        Ok(scalar.read(offset.max(0) as u64, size).await)
    }

    pub(crate) async fn write(
        &self,
        ino: Inode,
        offset: i64,
        data: Vec<u8>,
    ) -> Result<u32, FuseError> {
        let scalar = self.tree.scalar(ino)?;

        Ok(scalar.write(offset.max(0) as u64, &data)?)
    }

    pub(crate) async fn release(&self, ino: Inode) -> Result<(), FuseError> {
        if let Node::Scalar(scalar) = self.tree.node(ino)? {
            scalar.release();
        }

        Ok(())
    }

    pub(crate) fn opendir(&self, ino: Inode) -> Result<(), FuseError> {
        self.tree.dir(ino)?;

        Ok(())
    }

    /// Collect the directory entries at `ino`, starting at `offset`.
    ///
    /// The offset is the one fuser reported for the last entry of the
    /// previous batch, or 0 for a fresh listing.
    pub(crate) fn readdir_entries(
        &self,
        ino: Inode,
        offset: i64,
    ) -> Result<Vec<DirEntry>, FuseError> {
        let dir = self.tree.dir(ino)?;
        let mut entries = Vec::new();
        for (index, (name, child)) in dir.entries().enumerate().skip(offset.max(0) as usize) {
            let kind = match self.tree.node(child)? {
                Node::Dir(_) => FileType::Directory,
                Node::Scalar(_) => FileType::RegularFile,
            };
            entries.push(DirEntry {
                ino: child,
                offset: (index + 1) as i64,
                kind,
                name: name.to_string(),
            });
        }

        Ok(entries)
    }

    async fn attr(&self, ino: Inode, node: &Node) -> fuser::FileAttr {
        match node {
            Node::Dir(dir) => build_dir_attr(ino, dir),
            Node::Scalar(scalar) => build_file_attr(ino, &scalar.metadata().await),
        }
    }
}

fn build_file_attr(ino: Inode, attrs: &NodeAttrs) -> fuser::FileAttr {
    fuser::FileAttr {
        ino: ino.as_u64(),
        size: attrs.size,
        blocks: attrs.blocks,
        atime: attrs.accessed.as_system_time(),
        mtime: attrs.modified.as_system_time(),
        ctime: attrs.created.as_system_time(),
        crtime: attrs.created.as_system_time(),
        kind: FileType::RegularFile,
        perm: NodeAttrs::MODE,
        nlink: 1,
        uid: NodeAttrs::UID,
        gid: NodeAttrs::GID,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0, // used by macOS only
    }
}

fn build_dir_attr(ino: Inode, dir: &DirNode) -> fuser::FileAttr {
    let mtime = dir.mtime().as_system_time();

    fuser::FileAttr {
        ino: ino.as_u64(),
        size: BLOCK_SIZE,
        blocks: 1,
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind: FileType::Directory,
        perm: 0o555,
        nlink: 1,
        uid: NodeAttrs::UID,
        gid: NodeAttrs::GID,
        rdev: 0,
        blksize: BLOCK_SIZE as u32,
        flags: 0, // used by macOS only
    }
}

fn to_unix_time(time: TimeOrNow) -> UnixTime {
    match time {
        TimeOrNow::SpecificTime(time) => time
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .into(),
        TimeOrNow::Now => UnixTime::now(),
    }
}
