//! Page store: node record I/O against the backing file.
//!
//! Node `id` lives at byte offset `HEADER_SIZE + id * NODE_SIZE`. Every call
//! is a synchronous seek plus a whole-record read or write; there is no cache
//! and nothing is flushed unless `sync` is called explicitly.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::btree::Node;
use crate::storage::page::{NODE_SIZE_U64, NULL_INDEX, NodeId, Page};
use crate::storage::superblock::{HEADER_SIZE, HEADER_SIZE_U64, Superblock};

/// A handle on the tree's backing file.
pub struct PageStore {
    file: File,
    path: PathBuf,
    superblock: Superblock,
}

impl PageStore {
    /// Open the backing file, creating it with an empty header if missing.
    pub fn open(path: &Path) -> Result<Self, FileError> {
        if path.exists() {
            Self::open_existing(path)
        } else {
            Self::create(path)
        }
    }

    fn create(path: &Path) -> Result<Self, FileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(FileError::Io)?;

        let mut store = Self {
            file,
            path: path.to_path_buf(),
            superblock: Superblock::new(),
        };
        store.write_superblock()?;

        tracing::info!("Created tree file {}", path.display());
        Ok(store)
    }

    fn open_existing(path: &Path) -> Result<Self, FileError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(FileError::Io)?;

        let mut buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut buf).map_err(FileError::Io)?;
        let superblock = Superblock::from_bytes(&buf);

        tracing::info!(
            "Opened tree file {}: root={}, allocated nodes={}",
            path.display(),
            superblock.root_index,
            superblock.next_free_index
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            superblock,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reference to the in-memory copy of the header.
    #[must_use]
    pub const fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// Current root, or `None` for an empty tree.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.superblock.root()
    }

    /// Replace the root and persist the header.
    pub fn set_root(&mut self, root: Option<NodeId>) -> Result<(), FileError> {
        self.superblock.root_index = root.unwrap_or(NULL_INDEX);
        self.write_superblock()
    }

    /// Number of node slots handed out so far, reachable or not.
    #[must_use]
    pub const fn node_count(&self) -> NodeId {
        self.superblock.next_free_index
    }

    /// Hand out the next node slot.
    ///
    /// The counter is persisted first, then an empty leaf record is written at
    /// the new slot so the file always covers every allocated id.
    pub fn allocate(&mut self) -> Result<NodeId, FileError> {
        let id = self.superblock.next_free_index;
        self.superblock.next_free_index += 1;
        self.write_superblock()?;

        self.write_node(&Node::leaf(id))?;
        Ok(id)
    }

    /// Read the node stored at `id`.
    pub fn read_node(&mut self, id: NodeId) -> Result<Node, FileError> {
        let offset = self.offset_of(id)?;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(FileError::Io)?;

        let mut page = Page::new();
        self.file
            .read_exact(page.as_bytes_mut())
            .map_err(FileError::Io)?;

        Ok(Node::from_page(&page))
    }

    /// Overwrite the record at the node's own slot.
    pub fn write_node(&mut self, node: &Node) -> Result<(), FileError> {
        let offset = self.offset_of(node.self_index)?;

        let mut page = Page::new();
        node.write_to_page(&mut page);

        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(FileError::Io)?;
        self.file
            .write_all(page.as_bytes())
            .map_err(FileError::Io)?;

        Ok(())
    }

    /// Write the header to offset 0.
    fn write_superblock(&mut self) -> Result<(), FileError> {
        self.file.seek(SeekFrom::Start(0)).map_err(FileError::Io)?;
        self.file
            .write_all(&self.superblock.to_bytes())
            .map_err(FileError::Io)?;
        Ok(())
    }

    /// Sync all pending writes to disk.
    pub fn sync(&self) -> Result<(), FileError> {
        self.file.sync_all().map_err(FileError::Io)
    }

    #[allow(clippy::cast_sign_loss)] // id checked non-negative
    fn offset_of(&self, id: NodeId) -> Result<u64, FileError> {
        if id == NULL_INDEX {
            return Err(FileError::NullNode);
        }
        if id < 0 || id >= self.superblock.next_free_index {
            return Err(FileError::NodeOutOfBounds {
                id,
                allocated: self.superblock.next_free_index,
            });
        }
        Ok(HEADER_SIZE_U64 + id as u64 * NODE_SIZE_U64)
    }
}

/// Errors that can occur during file operations.
#[derive(Debug)]
pub enum FileError {
    /// I/O error.
    Io(std::io::Error),
    /// The null sentinel was used as a node id.
    NullNode,
    /// Node id was never allocated.
    NodeOutOfBounds { id: NodeId, allocated: NodeId },
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::NullNode => write!(f, "null node id"),
            Self::NodeOutOfBounds { id, allocated } => {
                write!(f, "node {id} out of bounds (allocated nodes: {allocated})")
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::NullNode | Self::NodeOutOfBounds { .. } => None,
        }
    }
}
