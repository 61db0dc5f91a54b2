//! Node record geometry and the raw record buffer.
//!
//! Every node occupies one fixed-size record in the backing file. The record
//! is the unit of I/O: the page store never reads or writes anything smaller.

/// Minimum degree of the tree.
pub const DEGREE: usize = 100;

/// Maximum number of records in a node (`2t - 1`).
pub const MAX_KEYS: usize = 2 * DEGREE - 1;

/// Maximum number of children of an internal node (`2t`).
pub const MAX_CHILDREN: usize = 2 * DEGREE;

/// Minimum number of records in a non-root node (`t - 1`).
pub const MIN_KEYS: usize = DEGREE - 1;

/// On-disk width of a value slot, including the terminating null byte.
pub const VALUE_SIZE: usize = 40;

/// Usable bytes of a value; anything longer is truncated.
pub const MAX_VALUE_LEN: usize = VALUE_SIZE - 1;

/// A record slot: `key` (8 bytes) + value (40 bytes).
pub const RECORD_SIZE: usize = 8 + VALUE_SIZE;

/// Node record layout:
/// - `self_index`: 8 bytes
/// - `is_leaf`: 1 byte
/// - `num_keys`: 4 bytes
/// - records: `MAX_KEYS` * `RECORD_SIZE`
/// - children: `MAX_CHILDREN` * 8
///
/// Total: 11165 bytes, packed.
pub const NODE_SIZE: usize = 8 + 1 + 4 + MAX_KEYS * RECORD_SIZE + MAX_CHILDREN * 8;

/// Node size as u64 for offset calculations.
pub const NODE_SIZE_U64: u64 = NODE_SIZE as u64;

/// A logical node identifier (allocation slot number).
pub type NodeId = i64;

/// Sentinel for "no node", used on disk for an empty root and unused children.
pub const NULL_INDEX: NodeId = -1;

/// A raw node record buffer.
///
/// All multi-byte integers are little-endian.
pub struct Page {
    data: Box<[u8; NODE_SIZE]>,
}

impl Page {
    /// Create a new zeroed record buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; NODE_SIZE]),
        }
    }

    /// Get the raw record data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NODE_SIZE] {
        &self.data
    }

    /// Get mutable access to the raw record data.
    pub fn as_bytes_mut(&mut self) -> &mut [u8; NODE_SIZE] {
        &mut self.data
    }

    /// Read bytes at a specific offset.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Write bytes at a specific offset.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    #[must_use]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Read an i32 (little-endian) at the given offset.
    #[must_use]
    pub fn read_i32(&self, offset: usize) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        i32::from_le_bytes(bytes)
    }

    /// Write an i32 (little-endian) at the given offset.
    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Read an i64 (little-endian) at the given offset.
    #[must_use]
    pub fn read_i64(&self, offset: usize) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.data[offset..offset + 8]);
        i64::from_le_bytes(bytes)
    }

    /// Write an i64 (little-endian) at the given offset.
    pub fn write_i64(&mut self, offset: usize, value: i64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("first_16_bytes", &&self.data[..16])
            .finish_non_exhaustive()
    }
}
