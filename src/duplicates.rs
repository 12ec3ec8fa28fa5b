//! Duplicate-folder detection over a record tree.
//!
//! One pre-order walk of the records, no filesystem access: every complete
//! record's tree hash is collected into a table, and a revisit of a known
//! hash with a matching size names a duplicate pair. Pairs nested inside an
//! already-reported pair are suppressed, so a duplicated tree is reported
//! once at its top.

use crate::error::InventoryError;
use crate::record::{join_rel, Record, Store};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One reported duplication: two relative folder paths with identical
/// subtree content of `size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePair {
    pub size: u64,
    /// First-seen folder, relative to the scope root.
    pub a: PathBuf,
    /// Later duplicate, relative to the scope root.
    pub b: PathBuf,
}

/// Find duplicated folders within the already-calculated tree at `path`.
/// Pairs are returned sorted by descending size.
pub fn find_duplicates(path: &Path) -> Result<Vec<DuplicatePair>, InventoryError> {
    info!("Searching for duplicate folders within:\n\t{}", path.display());
    let store = Store::locate(path)?;
    debug!("Checksum file found at: {}", store.file_path().display());
    let record = store.load()?;
    let rel = store.relative_of(path)?;
    record.chain(&rel, &store.file_path(), path)?;
    let target = record.descendant(&rel).unwrap_or(&record);

    let mut duplicates: Vec<DuplicatePair> = Vec::new();
    let mut hashtable: HashMap<&str, Vec<(u64, PathBuf)>> = HashMap::new();

    // Pre-order walk in subdirectory-name order. The flag marks subtrees
    // already inside a detected duplication.
    let mut stack: Vec<(PathBuf, &Record, bool)> = vec![(rel, target, false)];
    while let Some((rel_path, record, mut in_dup)) = stack.pop() {
        // Empty and unfinished subtrees carry no comparable content.
        if record.size < 1 {
            continue;
        }
        let Some(hash) = record.tree_hash.as_deref() else {
            continue;
        };

        if let Some(entries) = hashtable.get(hash) {
            if !in_dup {
                for (old_size, old_rel) in entries {
                    if *old_size != record.size {
                        continue;
                    }
                    if !already_covered(&duplicates, old_rel, &rel_path) {
                        duplicates.push(DuplicatePair {
                            size: record.size,
                            a: old_rel.clone(),
                            b: rel_path.clone(),
                        });
                    }
                    in_dup = true;
                    break;
                }
            }
        }
        hashtable
            .entry(hash)
            .or_default()
            .push((record.size, rel_path.clone()));

        for (name, child) in record.subdirectories.iter().rev() {
            stack.push((join_rel(&rel_path, name), child, in_dup));
        }
    }

    info!("{} duplicate folders were found.", duplicates.len());
    duplicates.sort_by(|x, y| y.size.cmp(&x.size));
    Ok(duplicates)
}

/// Whether the candidate pair sits inside an already-reported pair, in
/// either orientation.
fn already_covered(duplicates: &[DuplicatePair], new_a: &Path, new_b: &Path) -> bool {
    duplicates.iter().any(|pair| {
        (new_a.starts_with(&pair.a) && new_b.starts_with(&pair.b))
            || (new_b.starts_with(&pair.a) && new_a.starts_with(&pair.b))
    })
}

/// Write pairs as quoted CSV, one row per pair.
pub fn write_duplicates_csv<W: Write>(mut out: W, pairs: &[DuplicatePair]) -> io::Result<()> {
    writeln!(
        out,
        "\"Size (in bytes)\",\"Folder Path\",\"Duplicate Folder Path\","
    )?;
    for pair in pairs {
        writeln!(
            out,
            "\"{}\",\"{}\",\"{}\",",
            pair.size,
            pair.a.display(),
            pair.b.display()
        )?;
    }
    Ok(())
}
