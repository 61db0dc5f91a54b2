//! Single-file B-tree storage engine.
//!
//! # File Format
//!
//! - Offset 0: 16-byte header (root node id, next free node id)
//! - Offset `16 + id * NODE_SIZE`: node record `id`
//!
//! Node records are packed and little-endian. Allocation is append-only:
//! node ids are never reused, so nodes detached by deletions remain in the
//! file.

pub mod btree;
mod file;
mod page;
mod superblock;

pub use file::{FileError, PageStore};
pub use page::{
    DEGREE, MAX_CHILDREN, MAX_KEYS, MAX_VALUE_LEN, MIN_KEYS, NODE_SIZE, NULL_INDEX, NodeId,
    VALUE_SIZE,
};
pub use superblock::{HEADER_SIZE, Superblock};
