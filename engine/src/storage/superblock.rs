//! File header ("superblock") and its serialization.
//!
//! The header occupies the first `HEADER_SIZE` bytes of the file, directly
//! followed by the node records. It has no magic number and no checksum: the
//! file is trusted as-is.

use crate::storage::page::{NULL_INDEX, NodeId};

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Header size as u64 for offset calculations.
pub const HEADER_SIZE_U64: u64 = HEADER_SIZE as u64;

/// Header field offsets.
mod offsets {
    pub const ROOT_INDEX: usize = 0;
    pub const NEXT_FREE_INDEX: usize = 8;
}

/// Process-wide tree metadata persisted at offset 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Root node, or `NULL_INDEX` when the tree is empty.
    pub root_index: NodeId,
    /// Next slot to hand out. Only ever grows; slots are never reused.
    pub next_free_index: NodeId,
}

impl Superblock {
    /// Header of a freshly created, empty file.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root_index: NULL_INDEX,
            next_free_index: 0,
        }
    }

    /// Root node, if the tree is not empty.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        if self.root_index == NULL_INDEX {
            None
        } else {
            Some(self.root_index)
        }
    }

    /// Serialize the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[offsets::ROOT_INDEX..offsets::ROOT_INDEX + 8]
            .copy_from_slice(&self.root_index.to_le_bytes());
        buf[offsets::NEXT_FREE_INDEX..offsets::NEXT_FREE_INDEX + 8]
            .copy_from_slice(&self.next_free_index.to_le_bytes());
        buf
    }

    /// Deserialize a header. Contents are not validated.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut root = [0u8; 8];
        root.copy_from_slice(&bytes[offsets::ROOT_INDEX..offsets::ROOT_INDEX + 8]);
        let mut next = [0u8; 8];
        next.copy_from_slice(&bytes[offsets::NEXT_FREE_INDEX..offsets::NEXT_FREE_INDEX + 8]);

        Self {
            root_index: i64::from_le_bytes(root),
            next_free_index: i64::from_le_bytes(next),
        }
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}
