//! Structural invariant checking.
//!
//! Walks the whole tree through `read_node_for_vis`, the same read path an
//! external renderer uses, and verifies:
//! - every node's `self_index` matches the slot it was read from;
//! - key counts: root `0..=MAX_KEYS`, others `MIN_KEYS..=MAX_KEYS`;
//! - an internal node with `k` keys has `k + 1` children;
//! - keys ascend strictly within each node and fall inside the range implied
//!   by the separators above them;
//! - all leaves sit at the same depth.

use crate::storage::btree::{BTree, Node};
use crate::storage::{MAX_KEYS, MIN_KEYS, NodeId};

/// Summary of a tree that passed all checks.
#[derive(Debug, Default)]
pub struct TreeShape {
    /// Number of levels; 0 for an empty tree.
    pub height: usize,
    /// All keys in in-order traversal order.
    pub keys: Vec<i64>,
    /// Nodes reachable from the root.
    pub reachable_nodes: usize,
}

/// A broken invariant, with the node where it was found.
#[derive(Debug)]
pub struct InvariantViolation {
    pub node: NodeId,
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node {}: {}", self.node, self.message)
    }
}

/// Verify the structural invariants of `tree`.
pub fn check_invariants(tree: &BTree) -> Result<TreeShape, InvariantViolation> {
    let mut shape = TreeShape::default();
    let Some(root) = tree.root_index().map_err(|e| InvariantViolation {
        node: -1,
        message: format!("cannot read root: {e}"),
    })?
    else {
        return Ok(shape);
    };

    let mut leaf_depth = None;
    walk(tree, root, true, 1, (None, None), &mut leaf_depth, &mut shape)?;
    shape.height = leaf_depth.unwrap_or(0);
    Ok(shape)
}

fn walk(
    tree: &BTree,
    id: NodeId,
    is_root: bool,
    depth: usize,
    bounds: (Option<i64>, Option<i64>),
    leaf_depth: &mut Option<usize>,
    shape: &mut TreeShape,
) -> Result<(), InvariantViolation> {
    let violation = |message: String| InvariantViolation { node: id, message };

    let node: Node = tree
        .read_node_for_vis(id)
        .map_err(|e| violation(format!("cannot read: {e}")))?
        .ok_or_else(|| violation("null child".to_string()))?;
    shape.reachable_nodes += 1;

    if node.self_index != id {
        return Err(violation(format!("self_index is {}", node.self_index)));
    }

    let count = node.num_keys();
    let min = if is_root { 0 } else { MIN_KEYS };
    if count < min || count > MAX_KEYS {
        return Err(violation(format!("{count} keys, allowed {min}..={MAX_KEYS}")));
    }
    if is_root && count == 0 {
        return Err(violation("empty root left in place".to_string()));
    }

    for pair in node.records.windows(2) {
        if pair[0].key >= pair[1].key {
            return Err(violation(format!(
                "keys out of order: {} then {}",
                pair[0].key, pair[1].key
            )));
        }
    }
    let (low, high) = bounds;
    if let (Some(low), Some(first)) = (low, node.records.first()) {
        if first.key <= low {
            return Err(violation(format!("key {} not above {low}", first.key)));
        }
    }
    if let (Some(high), Some(last)) = (high, node.records.last()) {
        if last.key >= high {
            return Err(violation(format!("key {} not below {high}", last.key)));
        }
    }

    if node.is_leaf {
        if !node.children.is_empty() {
            return Err(violation("leaf with children".to_string()));
        }
        match *leaf_depth {
            None => *leaf_depth = Some(depth),
            Some(expected) if expected != depth => {
                return Err(violation(format!("leaf at depth {depth}, expected {expected}")));
            }
            Some(_) => {}
        }
        shape.keys.extend(node.records.iter().map(|r| r.key));
        return Ok(());
    }

    if node.children.len() != count + 1 {
        return Err(violation(format!(
            "{count} keys but {} children",
            node.children.len()
        )));
    }

    for (i, &child) in node.children.iter().enumerate() {
        let child_low = if i == 0 { low } else { Some(node.records[i - 1].key) };
        let child_high = node.records.get(i).map_or(high, |r| Some(r.key));
        walk(
            tree,
            child,
            false,
            depth + 1,
            (child_low, child_high),
            leaf_depth,
            shape,
        )?;
        if let Some(record) = node.records.get(i) {
            shape.keys.push(record.key);
        }
    }

    Ok(())
}
