//! B-tree node types and serialization.
//!
//! A node is stored as one packed record (see `storage::page` for the layout).
//! In memory only the occupied slots are kept: `records.len()` is `num_keys`
//! and an internal node carries exactly `records.len() + 1` children.

use crate::storage::page::{
    DEGREE, MAX_CHILDREN, MAX_KEYS, MAX_VALUE_LEN, NULL_INDEX, NodeId, Page, RECORD_SIZE,
    VALUE_SIZE,
};

/// Record layout offsets within a node record.
mod offsets {
    use crate::storage::page::{MAX_KEYS, RECORD_SIZE};

    pub const SELF_INDEX: usize = 0;
    pub const IS_LEAF: usize = 8;
    pub const NUM_KEYS: usize = 9;
    pub const RECORDS: usize = 13;
    pub const CHILDREN: usize = RECORDS + MAX_KEYS * RECORD_SIZE;
}

/// A fixed-width, null-padded value.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload([u8; VALUE_SIZE]);

impl Payload {
    /// Build a payload from text, truncating to `MAX_VALUE_LEN` bytes.
    ///
    /// Truncation backs off to a character boundary so the stored bytes stay
    /// valid UTF-8.
    #[must_use]
    pub fn new(value: &str) -> Self {
        let mut len = value.len().min(MAX_VALUE_LEN);
        while !value.is_char_boundary(len) {
            len -= 1;
        }
        let mut data = [0u8; VALUE_SIZE];
        data[..len].copy_from_slice(&value.as_bytes()[..len]);
        Self(data)
    }

    /// Text up to the first null byte.
    #[must_use]
    pub fn as_string(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(MAX_VALUE_LEN);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self([0u8; VALUE_SIZE])
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_string())
    }
}

/// A key/value pair stored in a node slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub key: i64,
    pub value: Payload,
}

impl Record {
    #[must_use]
    pub fn new(key: i64, value: &str) -> Self {
        Self {
            key,
            value: Payload::new(value),
        }
    }
}

/// A B-tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Allocation slot of this node; stable for its lifetime.
    pub self_index: NodeId,
    pub is_leaf: bool,
    /// Records in strictly ascending key order.
    pub records: Vec<Record>,
    /// Child identifiers; empty for leaves.
    pub children: Vec<NodeId>,
}

impl Node {
    /// Create an empty leaf for the given slot.
    #[must_use]
    pub fn leaf(self_index: NodeId) -> Self {
        Self {
            self_index,
            is_leaf: true,
            records: Vec::with_capacity(MAX_KEYS),
            children: Vec::new(),
        }
    }

    /// Create an empty internal node for the given slot.
    #[must_use]
    pub fn internal(self_index: NodeId) -> Self {
        Self {
            self_index,
            is_leaf: false,
            records: Vec::with_capacity(MAX_KEYS),
            children: Vec::with_capacity(MAX_CHILDREN),
        }
    }

    /// Number of occupied record slots.
    #[must_use]
    pub const fn num_keys(&self) -> usize {
        self.records.len()
    }

    /// Check if the node cannot take another record.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.records.len() >= MAX_KEYS
    }

    /// Check if the node can give a record away and stay above the minimum.
    #[must_use]
    pub const fn can_lend(&self) -> bool {
        self.records.len() >= DEGREE
    }

    /// Lower-bound search: first slot whose key is `>= key`.
    ///
    /// Every key comparison made increments `comparisons`.
    pub fn lower_bound(&self, key: i64, comparisons: &mut u64) -> usize {
        self.records.partition_point(|record| {
            *comparisons += 1;
            record.key < key
        })
    }

    /// Lower-bound search without instrumentation.
    #[must_use]
    pub fn find_key_index(&self, key: i64) -> usize {
        self.records.partition_point(|record| record.key < key)
    }

    /// Check whether slot `idx` holds exactly `key`.
    #[must_use]
    pub fn holds_at(&self, idx: usize, key: i64) -> bool {
        self.records.get(idx).is_some_and(|record| record.key == key)
    }

    /// Read a node from a record buffer.
    ///
    /// The record is trusted: `num_keys` outside `0..=MAX_KEYS` is clamped and
    /// a non-zero `is_leaf` byte means leaf.
    #[must_use]
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )] // clamped to 0..=MAX_KEYS first
    pub fn from_page(page: &Page) -> Self {
        let self_index = page.read_i64(offsets::SELF_INDEX);
        let is_leaf = page.read_u8(offsets::IS_LEAF) != 0;
        let num_keys = page.read_i32(offsets::NUM_KEYS).clamp(0, MAX_KEYS as i32) as usize;

        let mut records = Vec::with_capacity(MAX_KEYS);
        let mut offset = offsets::RECORDS;
        for _ in 0..num_keys {
            let key = page.read_i64(offset);
            let mut value = [0u8; VALUE_SIZE];
            value.copy_from_slice(page.read_bytes(offset + 8, VALUE_SIZE));
            records.push(Record {
                key,
                value: Payload(value),
            });
            offset += RECORD_SIZE;
        }

        let mut children = Vec::new();
        if !is_leaf {
            children.reserve(MAX_CHILDREN);
            let mut offset = offsets::CHILDREN;
            for _ in 0..=num_keys {
                children.push(page.read_i64(offset));
                offset += 8;
            }
        }

        Self {
            self_index,
            is_leaf,
            records,
            children,
        }
    }

    /// Write the node into a zeroed record buffer.
    ///
    /// Unused record slots stay zero and unused child slots are `NULL_INDEX`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // num_keys <= MAX_KEYS
    pub fn write_to_page(&self, page: &mut Page) {
        page.write_i64(offsets::SELF_INDEX, self.self_index);
        page.write_u8(offsets::IS_LEAF, u8::from(self.is_leaf));
        page.write_i32(offsets::NUM_KEYS, self.records.len() as i32);

        let mut offset = offsets::RECORDS;
        for record in &self.records {
            page.write_i64(offset, record.key);
            page.write_bytes(offset + 8, record.value.as_bytes());
            offset += RECORD_SIZE;
        }

        let mut offset = offsets::CHILDREN;
        for slot in 0..MAX_CHILDREN {
            let child = self.children.get(slot).copied().unwrap_or(NULL_INDEX);
            page.write_i64(offset, child);
            offset += 8;
        }
    }
}
