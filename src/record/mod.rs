//! Inventory record model.
//!
//! A [`Record`] is the persisted inventory node for one directory: how many
//! direct files it holds, a hash of those files' content, a combined hash of
//! the entire subtree, and a map of child records. The wire format is the
//! JSON object described in the store file (`tree_checksum.json`), with the
//! historical field names (`MD5`, `MD5-files_only`, `file-listing`) preserved
//! for compatibility with existing stores.

pub mod store;

pub use store::{Store, STORE_FILENAME};

use crate::error::InventoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-file detail captured under `--detail-files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Hex digest of the file content.
    #[serde(rename = "MD5")]
    pub md5: String,
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time, seconds since the Unix epoch (fractional).
    #[serde(rename = "last-modified-at")]
    pub last_modified_at: f64,
}

/// One directory's inventory node.
///
/// A record is *complete* iff `tree_hash` is present. Incomplete records
/// appear in checkpoints of interrupted calculations and in targeted
/// recalculations that have invalidated ancestors; they must never be folded
/// into an ancestor's tree hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Count of direct files (subdirectories excluded; the store's own file
    /// excluded at the scope root only).
    #[serde(default)]
    pub n_files: u64,

    /// Combined hash of the whole subtree (hex). `None` marks an incomplete
    /// record.
    #[serde(rename = "MD5", default, skip_serializing_if = "Option::is_none")]
    pub tree_hash: Option<String>,

    /// Hash of direct-file content only (hex).
    #[serde(
        rename = "MD5-files_only",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub files_hash: Option<String>,

    /// Child directory records, keyed by directory name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subdirectories: BTreeMap<String, Record>,

    /// Optional flat per-file metadata, captured under `--detail-files`.
    #[serde(
        rename = "file-listing",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_listing: Option<BTreeMap<String, FileEntry>>,

    /// Aggregate byte size of the subtree (direct files plus all
    /// descendants). Gates duplicate detection.
    #[serde(default)]
    pub size: u64,

    /// ISO-8601 timestamp of the last calculation pass. Root record only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_at: Option<String>,
}

impl Record {
    /// A record is complete once its subtree hash has been finalized.
    pub fn is_complete(&self) -> bool {
        self.tree_hash.is_some()
    }

    /// Resolve the ordered chain of records from `self` (the store root) down
    /// to the record for `rel`, inclusive at both ends.
    ///
    /// Fails with [`InventoryError::StaleRecord`] when a path segment is
    /// absent from a `subdirectories` map, which signals an out-of-date
    /// store. `store` and `target` are only used for the error message.
    pub fn chain<'a>(
        &'a self,
        rel: &Path,
        store: &Path,
        target: &Path,
    ) -> Result<Vec<&'a Record>, InventoryError> {
        let mut chain = vec![self];
        let mut current = self;
        for segment in rel.components() {
            let name = segment.as_os_str().to_string_lossy();
            match current.subdirectories.get(name.as_ref()) {
                Some(child) => {
                    chain.push(child);
                    current = child;
                }
                None => {
                    return Err(InventoryError::StaleRecord {
                        target: target.to_path_buf(),
                        store: store.to_path_buf(),
                        segment: name.into_owned(),
                    })
                }
            }
        }
        Ok(chain)
    }

    /// The record at `rel` below `self`, if every segment is present.
    pub fn descendant(&self, rel: &Path) -> Option<&Record> {
        let mut current = self;
        for segment in rel.components() {
            let name = segment.as_os_str().to_string_lossy();
            current = current.subdirectories.get(name.as_ref())?;
        }
        Some(current)
    }

    /// Mutable access to the record at `rel` below `self`.
    pub fn descendant_mut(&mut self, rel: &Path) -> Option<&mut Record> {
        let mut current = self;
        for segment in rel.components() {
            let name = segment.as_os_str().to_string_lossy();
            current = current.subdirectories.get_mut(name.as_ref())?;
        }
        Some(current)
    }

    /// Succinct one-record dump for diagnostics. Child records are listed by
    /// name only, and elided past ten entries.
    pub fn summary(&self) -> String {
        let mut out = String::from("{");
        out.push_str(&format!("\n\tn_files: {}", self.n_files));
        if let Some(hash) = &self.tree_hash {
            out.push_str(&format!("\n\tMD5: {}", hash));
        }
        if let Some(hash) = &self.files_hash {
            out.push_str(&format!("\n\tMD5-files_only: {}", hash));
        }
        out.push_str(&format!("\n\tsize: {}", self.size));
        if !self.subdirectories.is_empty() {
            if self.subdirectories.len() < 10 {
                let names: Vec<&str> = self.subdirectories.keys().map(String::as_str).collect();
                out.push_str(&format!("\n\tsubdirectories: {}", names.join(", ")));
            } else {
                out.push_str(&format!(
                    "\n\tsubdirectories: {} subdirectories (not shown)",
                    self.subdirectories.len()
                ));
            }
        }
        if let Some(at) = &self.calculated_at {
            out.push_str(&format!("\n\tcalculated_at: {}", at));
        }
        out.push_str("\n}");
        out
    }
}

/// Join a relative record path to a child name, collapsing the bare `.` used
/// for a store root so `./Folder` renders as `Folder`.
pub fn join_rel(base: &Path, name: &str) -> PathBuf {
    if base.as_os_str() == "." || base.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        base.join(name)
    }
}
