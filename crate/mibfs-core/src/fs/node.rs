use crate::fs::error::FsError;
use mibfs_snmp::SnmpBackend;
use mibfs_types::{Oid, UnixTime};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Block size reported to the kernel, in bytes.
pub const BLOCK_SIZE: u64 = 512;

/// Snapshot of the filesystem metadata of a value file.
///
/// A refresh installs a whole new snapshot together with the new
/// content, so the fields are always consistent with each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAttrs {
    /// Content size, in bytes.
    pub size: u64,

    /// Number of [BLOCK_SIZE] blocks needed to hold the content,
    /// rounded up.
    pub blocks: u64,

    /// Time of the first content assignment, kept by later snapshots.
    pub created: UnixTime,

    /// Time of the most recent content assignment.
    pub modified: UnixTime,

    /// Time of the most recent content assignment; reads are not
    /// tracked.
    pub accessed: UnixTime,
}

impl NodeAttrs {
    /// Permission bits of every value file (read-only for everyone).
    pub const MODE: u16 = 0o444;

    /// Files and directories all belong to root.
    pub const UID: u32 = 0;
    pub const GID: u32 = 0;

    fn with_size(len: usize, created: UnixTime, now: UnixTime) -> NodeAttrs {
        let size = len as u64;

        NodeAttrs {
            size,
            blocks: size.div_ceil(BLOCK_SIZE),
            created,
            modified: now,
            accessed: now,
        }
    }
}

/// Access mode requested by an open call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    /// Extract the access mode from POSIX open flags.
    pub fn from_flags(flags: i32) -> OpenMode {
        match flags & (libc::O_RDONLY | libc::O_WRONLY | libc::O_RDWR) {
            libc::O_WRONLY => OpenMode::Write,
            libc::O_RDWR => OpenMode::ReadWrite,
            _ => OpenMode::Read,
        }
    }

    pub fn allows_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// A leaf file serving one management value.
///
/// The content is the textual form of the value as fetched by the
/// most recent successful refresh. Content and metadata form a single
/// unit of state, read and replaced together under the node lock, so
/// readers never observe a half-updated node.
pub struct ScalarNode {
    oid: Oid,
    backend: Option<Arc<dyn SnmpBackend>>,
    state: Mutex<NodeState>,
}

struct NodeState {
    content: Vec<u8>,
    attrs: NodeAttrs,

    /// Whether content was ever assigned. The first assignment
    /// stamps [NodeAttrs::created]; later ones keep it.
    assigned: bool,
}

impl ScalarNode {
    /// Create a node holding fixed content, with no backend.
    ///
    /// The content never changes and refreshes are no-ops.
    pub fn with_content(oid: Oid, content: impl Into<Vec<u8>>) -> ScalarNode {
        let content = content.into();
        let now = UnixTime::now();

        ScalarNode {
            oid,
            backend: None,
            state: Mutex::new(NodeState {
                attrs: NodeAttrs::with_size(content.len(), now, now),
                content,
                assigned: true,
            }),
        }
    }

    /// Create a node bound to a backend and fetch its initial content.
    ///
    /// An unreachable agent is not an error at this point; the node
    /// starts out empty and the failure is logged. Unreachability
    /// surfaces later, on open, which refreshes again.
    pub async fn connected(oid: Oid, backend: Arc<dyn SnmpBackend>) -> ScalarNode {
        let now = UnixTime::now();
        let node = ScalarNode {
            oid,
            backend: Some(backend),
            state: Mutex::new(NodeState {
                content: Vec::new(),
                attrs: NodeAttrs::with_size(0, now, now),
                assigned: false,
            }),
        };
        if let Err(err) = node.refresh().await {
            log::warn!("{}: initial fetch failed: {err}", node.oid);
        }

        node
    }

    /// The address this node serves.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Handle an open call from the kernel.
    ///
    /// Opening for writing fails with [FsError::ReadOnly] without
    /// contacting the backend. Opening for reading refreshes the
    /// content first; a failed refresh fails the open and leaves the
    /// previous content in place.
    pub async fn open(&self, mode: OpenMode) -> Result<(), FsError> {
        if mode.allows_write() {
            return Err(FsError::ReadOnly);
        }

        self.refresh().await
    }

    /// Fetch the current value from the backend and install it as
    /// content.
    ///
    /// On a node without a backend, this is a no-op. Concurrent
    /// refreshes serialize on the node lock; each one round-trips to
    /// the agent.
    pub async fn refresh(&self) -> Result<(), FsError> {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return Ok(()),
        };

        // The lock is held across the fetch, so readers never see
        // content and metadata from two different refreshes.
        let mut state = self.state.lock().await;
        let varbind = backend.get(&self.oid).await?;
        if varbind.value.is_exception() {
            return Err(FsError::Exception {
                oid: self.oid.clone(),
                value: varbind.value,
            });
        }
        let content = varbind.value.to_string().into_bytes();
        let now = UnixTime::now().max(state.attrs.modified);
        let created = if state.assigned {
            state.attrs.created
        } else {
            now
        };
        state.attrs = NodeAttrs::with_size(content.len(), created, now);
        state.content = content;
        state.assigned = true;

        Ok(())
    }

    /// Read up to `size` bytes of content, starting at `offset`.
    ///
    /// Reading at or past the end of the content returns no bytes;
    /// it is not an error.
    pub async fn read(&self, offset: u64, size: u32) -> Vec<u8> {
        let state = self.state.lock().await;
        let len = state.content.len() as u64;
        if offset >= len {
            return Vec::new();
        }
        let end = len.min(offset.saturating_add(size as u64));

        state.content[offset as usize..end as usize].to_vec()
    }

    /// Writes are rejected; content only changes through refreshes.
    pub fn write(&self, _offset: u64, _data: &[u8]) -> Result<u32, FsError> {
        Err(FsError::ReadOnly)
    }

    /// Truncation is rejected, like any other modification.
    pub fn truncate(&self, _size: u64) -> Result<(), FsError> {
        Err(FsError::ReadOnly)
    }

    /// Closing a handle involves no backend traffic and cannot fail.
    pub fn release(&self) {}

    /// Timestamp updates from the kernel are accepted and discarded.
    ///
    /// Timestamps only move when a refresh installs content.
    pub fn set_times(&self, _atime: Option<UnixTime>, _mtime: Option<UnixTime>) {}

    /// Snapshot of the current metadata.
    pub async fn metadata(&self) -> NodeAttrs {
        self.state.lock().await.attrs.clone()
    }
}
