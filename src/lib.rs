//! treesum: persistent directory-tree checksum inventory.
//!
//! Calculates per-directory MD5 records over a tree, persists them as
//! `tree_checksum.json` at the scope root, and uses the stored records for
//! fast record-based comparison, cache-driven synchronization, and duplicate
//! folder detection.

pub mod calculate;
pub mod cli;
pub mod compare;
pub mod duplicates;
pub mod error;
pub mod hashing;
pub mod links;
pub mod logging;
pub mod progress;
pub mod record;
pub mod update;
