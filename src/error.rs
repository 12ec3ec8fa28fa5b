//! Error types for the treesum checksum inventory.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by inventory operations. Every variant is fatal to the
/// invoking command; transient read failures are retried inside the hashing
/// capability and never appear here.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(
        "Checksum record file not found for: {}\nTry running --calculate first",
        .path.display()
    )]
    StoreNotFound { path: PathBuf },

    #[error(
        "After locating the subdirectory of interest in trees A and B, the relative paths do not match:\n\
         \tRelative path A: {}\n\
         \tRelative path B: {}",
        .a.display(),
        .b.display()
    )]
    PathMismatch { a: PathBuf, b: PathBuf },

    #[error(
        "While searching for the subdirectory entry for: {}\n\
         In checksum record file: {}\n\
         The subdirectory: {segment}\n\
         Was not found in the record. The checksum record might be out-of-date.",
        .target.display(),
        .store.display()
    )]
    StaleRecord {
        target: PathBuf,
        store: PathBuf,
        segment: String,
    },

    #[error(
        "Cannot recompute tree hash for '{}': '{member}' has no finished hash",
        .path.display()
    )]
    IncompleteRecord { path: PathBuf, member: String },

    #[error("While calculating checksum for file: {}: {detail}", .path.display())]
    FatalIo { path: PathBuf, detail: String },

    #[error(
        "Tree hashes differ for {} (A) vs {} (B) but no structural cause was found.\n\
         Record A: {a_summary}\n\
         Record B: {b_summary}",
        .a.display(),
        .b.display()
    )]
    HashMismatchUnexplained {
        a: PathBuf,
        b: PathBuf,
        a_summary: String,
        b_summary: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid checksum record file {}: {source}", .path.display())]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },
}
