//! Disk-resident B-tree over the page store.
//!
//! Classic CLRS B-tree of minimum degree `DEGREE`:
//! - insertion splits full nodes on the way down, so every node entered by
//!   the recursive insert has room for one more record;
//! - deletion makes sure every node it descends into holds at least `DEGREE`
//!   records, borrowing from a sibling or merging with one when it does not.
//!
//! No node is cached. Each step reads the node it works on, and every node it
//! modifies is written back before the step returns. Nodes detached by a merge
//! or by root collapse are abandoned on disk; slots are never reused.
//!
//! All public operations hold one exclusive lock on the page store for their
//! whole duration.

use std::path::Path;
use std::sync::Mutex;

use crate::storage::btree::node::{Node, Payload, Record};
use crate::storage::file::{FileError, PageStore};
use crate::storage::page::{DEGREE, NodeId};

/// Value reported by `get_with_stats` for an absent key.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The key was not present and has been inserted.
    Added,
    /// The key was present and its value has been overwritten.
    Updated,
}

impl UpsertOutcome {
    /// Status message shown to users.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Added => "Added new key",
            Self::Updated => "Updated existing key",
        }
    }
}

/// Result of a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The tree had no root; nothing was touched.
    TreeEmpty,
    /// The key was found and deleted.
    Removed,
    /// The key was not in the tree. Rebalancing on the way down may still
    /// have restructured nodes.
    NotFound,
}

impl RemoveOutcome {
    /// Status message shown to users.
    ///
    /// `Removed` and `NotFound` share the same text; match on the variant to
    /// tell them apart.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TreeEmpty => "Tree is empty",
            Self::Removed | Self::NotFound => "Deletion attempted",
        }
    }
}

/// Outcome of an instrumented point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Stored value, or `NOT_FOUND`.
    pub value: String,
    pub found: bool,
    /// Key comparisons performed across all visited nodes.
    pub comparisons: u64,
}

/// Nodes visited while looking up a key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPath {
    /// Visited node ids from the root down to the node holding the key, or to
    /// the last leaf visited when the key is absent.
    pub nodes: Vec<NodeId>,
    pub found: bool,
    pub comparisons: u64,
}

/// A B-tree backed by a single file.
pub struct BTree {
    store: Mutex<PageStore>,
}

impl BTree {
    /// Open the tree stored at `path`, creating an empty file if needed.
    pub fn open(path: &Path) -> Result<Self, BTreeError> {
        let store = PageStore::open(path)?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }

    /// Run `op` with exclusive access to the page store.
    ///
    /// The guard is released before returning, whatever `op` returned.
    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut Ops<'_>) -> Result<T, BTreeError>,
    ) -> Result<T, BTreeError> {
        let mut guard = self.store.lock().map_err(|_| BTreeError::LockPoisoned)?;
        let result = op(&mut Ops { store: &mut *guard });
        drop(guard);
        result
    }

    /// Insert `key`, or overwrite its value if it is already present.
    ///
    /// Values longer than 39 bytes are silently truncated.
    pub fn upsert(&self, key: i64, value: &str) -> Result<UpsertOutcome, BTreeError> {
        let payload = Payload::new(value);
        self.with_store(|ops| {
            if ops.update_in_place(key, payload)? {
                return Ok(UpsertOutcome::Updated);
            }
            ops.insert(Record {
                key,
                value: payload,
            })?;
            Ok(UpsertOutcome::Added)
        })
    }

    /// Delete `key` if present.
    pub fn remove(&self, key: i64) -> Result<RemoveOutcome, BTreeError> {
        self.with_store(|ops| {
            let Some(root_id) = ops.store.root() else {
                return Ok(RemoveOutcome::TreeEmpty);
            };

            let root = ops.store.read_node(root_id)?;
            let removed = ops.remove_from(root, key)?;
            ops.shrink_root(root_id)?;

            Ok(if removed {
                RemoveOutcome::Removed
            } else {
                RemoveOutcome::NotFound
            })
        })
    }

    /// Look up `key`, counting key comparisons along the way.
    pub fn get_with_stats(&self, key: i64) -> Result<SearchResult, BTreeError> {
        self.with_store(|ops| {
            let (path, record) = ops.descend(key)?;
            Ok(SearchResult {
                value: record.map_or_else(|| NOT_FOUND.to_string(), |r| r.value.as_string()),
                found: record.is_some(),
                comparisons: path.comparisons,
            })
        })
    }

    /// Record the nodes visited while looking up `key`.
    pub fn get_path_to_key(&self, key: i64) -> Result<KeyPath, BTreeError> {
        self.with_store(|ops| ops.descend(key).map(|(path, _)| path))
    }

    /// Current root, or `None` when the tree is empty.
    pub fn root_index(&self) -> Result<Option<NodeId>, BTreeError> {
        self.with_store(|ops| Ok(ops.store.root()))
    }

    /// Read a node for display. Returns `None` for `NULL_INDEX`.
    ///
    /// This takes the same lock as the mutating operations, so the returned
    /// node reflects a state between operations.
    pub fn read_node_for_vis(&self, id: NodeId) -> Result<Option<Node>, BTreeError> {
        self.with_store(|ops| match ops.store.read_node(id) {
            Ok(node) => Ok(Some(node)),
            Err(FileError::NullNode) => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    /// Number of node slots allocated in the file, including abandoned ones.
    pub fn node_count(&self) -> Result<NodeId, BTreeError> {
        self.with_store(|ops| Ok(ops.store.node_count()))
    }

    /// Flush the backing file. The engine never does this on its own.
    pub fn sync(&self) -> Result<(), BTreeError> {
        self.with_store(|ops| Ok(ops.store.sync()?))
    }
}

/// Tree algorithms, run while the lock is held.
struct Ops<'a> {
    store: &'a mut PageStore,
}

impl Ops<'_> {
    /// Root-to-leaf descent that stops at the first exact match.
    fn descend(&mut self, key: i64) -> Result<(KeyPath, Option<Record>), BTreeError> {
        let mut path = KeyPath::default();
        let mut current = self.store.root();

        while let Some(id) = current {
            path.nodes.push(id);
            let node = self.store.read_node(id)?;
            let idx = node.lower_bound(key, &mut path.comparisons);

            if node.holds_at(idx, key) {
                path.found = true;
                return Ok((path, Some(node.records[idx])));
            }
            if node.is_leaf {
                break;
            }
            current = Some(child_at(&node, idx)?);
        }

        Ok((path, None))
    }

    /// Overwrite the value of `key` if it exists. Returns whether it did.
    fn update_in_place(&mut self, key: i64, value: Payload) -> Result<bool, BTreeError> {
        let mut current = self.store.root();

        while let Some(id) = current {
            let mut node = self.store.read_node(id)?;
            let idx = node.find_key_index(key);

            if node.holds_at(idx, key) {
                node.records[idx].value = value;
                self.store.write_node(&node)?;
                return Ok(true);
            }
            if node.is_leaf {
                break;
            }
            current = Some(child_at(&node, idx)?);
        }

        Ok(false)
    }

    /// Insert a record whose key is known to be absent.
    fn insert(&mut self, record: Record) -> Result<(), BTreeError> {
        let Some(root_id) = self.store.root() else {
            let id = self.store.allocate()?;
            let mut root = Node::leaf(id);
            root.records.push(record);
            self.store.write_node(&root)?;
            self.store.set_root(Some(id))?;
            return Ok(());
        };

        let root = self.store.read_node(root_id)?;
        if !root.is_full() {
            return self.insert_non_full(root, record);
        }

        // Grow the tree: a new root adopts the full one, which is then split
        // before anything is inserted.
        let new_root_id = self.store.allocate()?;
        let mut new_root = Node::internal(new_root_id);
        new_root.children.push(root_id);
        self.store.write_node(&new_root)?;
        self.store.set_root(Some(new_root_id))?;
        tracing::debug!("Root {root_id} full, new root {new_root_id}");

        self.split_child(&mut new_root, 0)?;
        self.insert_non_full(new_root, record)
    }

    /// Split the full child at `children[idx]` of `parent` around its median.
    ///
    /// The upper half moves to a freshly allocated sibling and the median
    /// moves up into `parent`. Writes the child, the sibling and `parent`.
    fn split_child(&mut self, parent: &mut Node, idx: usize) -> Result<(), BTreeError> {
        let mut left = self.store.read_node(child_at(parent, idx)?)?;
        let right_id = self.store.allocate()?;

        let mut right = if left.is_leaf {
            Node::leaf(right_id)
        } else {
            Node::internal(right_id)
        };
        right.records = left.records.split_off(DEGREE);
        let median = left
            .records
            .pop()
            .ok_or_else(|| BTreeError::Corruption(format!("split of short node {}", left.self_index)))?;
        if !left.is_leaf {
            right.children = left.children.split_off(DEGREE);
        }

        parent.records.insert(idx, median);
        parent.children.insert(idx + 1, right_id);

        self.store.write_node(&left)?;
        self.store.write_node(&right)?;
        self.store.write_node(parent)?;
        Ok(())
    }

    /// Insert into the subtree rooted at `node`, which is not full.
    fn insert_non_full(&mut self, mut node: Node, record: Record) -> Result<(), BTreeError> {
        let mut idx = node.find_key_index(record.key);

        if node.is_leaf {
            node.records.insert(idx, record);
            self.store.write_node(&node)?;
            return Ok(());
        }

        let mut child = self.store.read_node(child_at(&node, idx)?)?;
        if child.is_full() {
            self.split_child(&mut node, idx)?;
            if record.key > node.records[idx].key {
                idx += 1;
            }
            child = self.store.read_node(child_at(&node, idx)?)?;
        }
        self.insert_non_full(child, record)
    }

    /// Delete `key` from the subtree rooted at `node`.
    ///
    /// Unless `node` is the root, the caller guarantees it holds at least
    /// `DEGREE` records. Returns whether the key was found.
    fn remove_from(&mut self, mut node: Node, key: i64) -> Result<bool, BTreeError> {
        let mut idx = node.find_key_index(key);

        if node.holds_at(idx, key) {
            if node.is_leaf {
                node.records.remove(idx);
                self.store.write_node(&node)?;
            } else {
                self.remove_from_internal(node, idx)?;
            }
            return Ok(true);
        }

        if node.is_leaf {
            return Ok(false);
        }

        let was_last = idx == node.num_keys();
        let mut child = self.store.read_node(child_at(&node, idx)?)?;
        if !child.can_lend() {
            self.fill(&mut node, idx)?;
            // Merging the last child into its left sibling shifts it down.
            if was_last && idx > node.num_keys() {
                idx -= 1;
            }
            child = self.store.read_node(child_at(&node, idx)?)?;
        }
        self.remove_from(child, key)
    }

    /// Delete `records[idx]` of an internal node.
    fn remove_from_internal(&mut self, mut node: Node, idx: usize) -> Result<(), BTreeError> {
        let key = node.records[idx].key;

        let left = self.store.read_node(child_at(&node, idx)?)?;
        if left.can_lend() {
            let predecessor = self.rightmost_record(left.self_index)?;
            node.records[idx] = predecessor;
            self.store.write_node(&node)?;
            self.remove_from(left, predecessor.key)?;
            return Ok(());
        }

        let right = self.store.read_node(child_at(&node, idx + 1)?)?;
        if right.can_lend() {
            let successor = self.leftmost_record(right.self_index)?;
            node.records[idx] = successor;
            self.store.write_node(&node)?;
            self.remove_from(right, successor.key)?;
            return Ok(());
        }

        self.merge(&mut node, idx)?;
        let merged = self.store.read_node(child_at(&node, idx)?)?;
        self.remove_from(merged, key)?;
        Ok(())
    }

    /// Largest record of the subtree rooted at `id`.
    fn rightmost_record(&mut self, id: NodeId) -> Result<Record, BTreeError> {
        let mut node = self.store.read_node(id)?;
        while !node.is_leaf {
            let last = child_at(&node, node.num_keys())?;
            node = self.store.read_node(last)?;
        }
        node.records
            .last()
            .copied()
            .ok_or_else(|| BTreeError::Corruption(format!("empty leaf {}", node.self_index)))
    }

    /// Smallest record of the subtree rooted at `id`.
    fn leftmost_record(&mut self, id: NodeId) -> Result<Record, BTreeError> {
        let mut node = self.store.read_node(id)?;
        while !node.is_leaf {
            let first = child_at(&node, 0)?;
            node = self.store.read_node(first)?;
        }
        node.records
            .first()
            .copied()
            .ok_or_else(|| BTreeError::Corruption(format!("empty leaf {}", node.self_index)))
    }

    /// Bring `children[idx]` of `node` up to at least `DEGREE` records.
    fn fill(&mut self, node: &mut Node, idx: usize) -> Result<(), BTreeError> {
        let has_prev = idx > 0;
        let has_next = idx < node.num_keys();

        if has_prev {
            let prev = self.store.read_node(child_at(node, idx - 1)?)?;
            if prev.can_lend() {
                return self.borrow_from_prev(node, idx, prev);
            }
        }
        if has_next {
            let next = self.store.read_node(child_at(node, idx + 1)?)?;
            if next.can_lend() {
                return self.borrow_from_next(node, idx, next);
            }
        }

        if has_next {
            self.merge(node, idx)
        } else {
            self.merge(node, idx - 1)
        }
    }

    /// Rotate the last record of the left sibling through the separator into
    /// `children[idx]`.
    fn borrow_from_prev(
        &mut self,
        node: &mut Node,
        idx: usize,
        mut sibling: Node,
    ) -> Result<(), BTreeError> {
        let mut child = self.store.read_node(child_at(node, idx)?)?;

        let lent = sibling.records.pop().ok_or_else(|| {
            BTreeError::Corruption(format!("empty sibling {}", sibling.self_index))
        })?;
        child.records.insert(0, node.records[idx - 1]);
        if !child.is_leaf {
            let moved = sibling.children.pop().ok_or_else(|| {
                BTreeError::Corruption(format!("childless sibling {}", sibling.self_index))
            })?;
            child.children.insert(0, moved);
        }
        node.records[idx - 1] = lent;

        self.store.write_node(node)?;
        self.store.write_node(&child)?;
        self.store.write_node(&sibling)?;
        Ok(())
    }

    /// Rotate the first record of the right sibling through the separator into
    /// `children[idx]`.
    fn borrow_from_next(
        &mut self,
        node: &mut Node,
        idx: usize,
        mut sibling: Node,
    ) -> Result<(), BTreeError> {
        let mut child = self.store.read_node(child_at(node, idx)?)?;

        child.records.push(node.records[idx]);
        if !child.is_leaf {
            child.children.push(sibling.children.remove(0));
        }
        node.records[idx] = sibling.records.remove(0);

        self.store.write_node(node)?;
        self.store.write_node(&child)?;
        self.store.write_node(&sibling)?;
        Ok(())
    }

    /// Merge `children[idx + 1]` and the separator `records[idx]` into
    /// `children[idx]`. The right sibling is abandoned on disk.
    fn merge(&mut self, node: &mut Node, idx: usize) -> Result<(), BTreeError> {
        let mut child = self.store.read_node(child_at(node, idx)?)?;
        let sibling = self.store.read_node(child_at(node, idx + 1)?)?;

        child.records.push(node.records.remove(idx));
        child.records.extend(sibling.records);
        if !child.is_leaf {
            child.children.extend(sibling.children);
        }
        node.children.remove(idx + 1);

        self.store.write_node(&child)?;
        self.store.write_node(node)?;
        Ok(())
    }

    /// Drop an emptied root, lowering the tree by one level.
    fn shrink_root(&mut self, root_id: NodeId) -> Result<(), BTreeError> {
        let root = self.store.read_node(root_id)?;
        if root.num_keys() > 0 {
            return Ok(());
        }

        let new_root = if root.is_leaf {
            None
        } else {
            Some(child_at(&root, 0)?)
        };
        self.store.set_root(new_root)?;
        tracing::debug!("Root {root_id} emptied, new root {new_root:?}");
        Ok(())
    }
}

/// `node.children[idx]`, or a corruption error if the slot is missing.
fn child_at(node: &Node, idx: usize) -> Result<NodeId, BTreeError> {
    node.children.get(idx).copied().ok_or_else(|| {
        BTreeError::Corruption(format!(
            "node {} has no child at slot {idx}",
            node.self_index
        ))
    })
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// File I/O error.
    File(FileError),
    /// Another thread panicked while holding the tree lock.
    LockPoisoned,
    /// The file holds a structure the algorithms cannot walk.
    Corruption(String),
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(e) => write!(f, "file error: {e}"),
            Self::LockPoisoned => write!(f, "tree lock poisoned"),
            Self::Corruption(msg) => write!(f, "corruption: {msg}"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(e) => Some(e),
            Self::LockPoisoned | Self::Corruption(_) => None,
        }
    }
}

impl From<FileError> for BTreeError {
    fn from(e: FileError) -> Self {
        Self::File(e)
    }
}
