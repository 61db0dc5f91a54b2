//! Shared test helpers: throwaway trees and structural checks.

mod invariants;

pub use invariants::{TreeShape, check_invariants};

use tempfile::TempDir;

use crate::storage::btree::BTree;

/// A tree backed by a file in its own temporary directory.
///
/// The directory (and the file) is removed when this is dropped.
pub struct TestTree {
    pub tree: BTree,
    pub dir: TempDir,
}

impl TestTree {
    /// Path of the backing file.
    pub fn path(&self) -> std::path::PathBuf {
        self.dir.path().join(TEST_FILE_NAME)
    }

    /// Check invariants and panic with the violation if any is broken.
    #[track_caller]
    pub fn assert_valid(&self) -> TreeShape {
        match check_invariants(&self.tree) {
            Ok(shape) => shape,
            Err(violation) => panic!("invariant violated: {violation}"),
        }
    }
}

const TEST_FILE_NAME: &str = "btree.bin";

/// Create an empty tree in a fresh temporary directory.
pub fn new_test_tree() -> TestTree {
    let dir = tempfile::tempdir().expect("create temp dir");
    let tree = BTree::open(&dir.path().join(TEST_FILE_NAME)).expect("create tree");
    TestTree { tree, dir }
}
