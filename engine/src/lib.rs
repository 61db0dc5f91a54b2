// A disk-resident B-tree of minimum degree 100 mapping i64 keys to short
// string values.
//
// Layers, bottom up:
//  - storage::page / storage::superblock: fixed-size byte layouts
//  - storage::file: node record I/O against the backing file
//  - storage::btree: the tree algorithms behind one mutex
//  - generator: background bulk loading through the public API
//
// Every public tree operation runs to completion under the lock and writes
// straight through to the file.

pub mod config;
pub mod generator;
pub mod storage;

#[cfg(test)]
mod simulation;
#[cfg(test)]
#[allow(clippy::expect_used)] // helpers panic on setup failure, like the tests using them
mod testing;

pub use storage::btree::BTree;
