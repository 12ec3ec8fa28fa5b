//! Symbolic-link detection capability.
//!
//! Content hashing must never follow a symbolic link or a Windows reparse
//! point: hashing the target would record another subtree's content under
//! this path. The predicate here is the single seam the rest of the crate
//! uses; platforms where the distinction cannot be observed fall back to
//! treating the entry as a regular file.

use std::path::Path;

/// Whether `path` names a symbolic link (or, on Windows, a symlink-class
/// reparse point).
///
/// Junction points created outside the symlink APIs are not reported by the
/// standard library on all Windows versions; those fall back to regular-file
/// treatment.
pub fn is_link(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.file_type().is_symlink(),
        // An entry we cannot stat is handled downstream as a read failure.
        Err(_) => false,
    }
}
