//! B-tree implementation for the storage engine.
//!
//! A disk-resident B-tree of minimum degree 100 keyed by `i64`, storing
//! 39-byte text values. Nodes are read from and written to the page store on
//! every visit; nothing is kept in memory between operations.
//!
//! # Usage
//!
//! ```no_run
//! use engine::storage::btree::{BTree, UpsertOutcome};
//!
//! let tree = BTree::open(std::path::Path::new("btree.bin"))?;
//! assert_eq!(tree.upsert(7, "seven")?, UpsertOutcome::Added);
//!
//! let result = tree.get_with_stats(7)?;
//! assert!(result.found);
//! assert_eq!(result.value, "seven");
//! # Ok::<(), engine::storage::btree::BTreeError>(())
//! ```

mod node;
mod tree;

pub use node::{Node, Payload, Record};
pub use tree::{BTree, BTreeError, KeyPath, NOT_FOUND, RemoveOutcome, SearchResult, UpsertOutcome};
