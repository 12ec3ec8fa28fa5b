//! Record-based tree comparison.
//!
//! A diff over two stored record trees, never over live directory content:
//! the result is exactly as current as the records are. Equal subtree hashes
//! prune the walk, so comparing two largely identical trees costs almost
//! nothing regardless of their size.
//!
//! The report wording and tab indentation are a contract: external tooling
//! parses these lines. Do not reword them.

use crate::error::InventoryError;
use crate::record::{Record, Store};
use std::path::Path;
use tracing::{debug, info};

/// Compare the record trees behind `a` and `b`, returning the textual report.
///
/// Each side resolves its store independently; the two targets must occupy
/// the same relative position within their stores. `max_depth` bounds how
/// many levels below the first difference are expanded; differing
/// directories past the bound are named but not descended into.
pub fn compare_trees(a: &Path, b: &Path, max_depth: usize) -> Result<String, InventoryError> {
    info!("Comparing trees:\n\tA: {}\n\tB: {}", a.display(), b.display());
    let store_a = Store::locate(a)?;
    let store_b = Store::locate(b)?;
    debug!("Checksum file A found at: {}", store_a.file_path().display());
    debug!("Checksum file B found at: {}", store_b.file_path().display());
    let record_a = store_a.load()?;
    let record_b = store_b.load()?;
    let rel_a = store_a.relative_of(a)?;
    let rel_b = store_b.relative_of(b)?;
    if rel_a != rel_b {
        return Err(InventoryError::PathMismatch { a: rel_a, b: rel_b });
    }
    record_a.chain(&rel_a, &store_a.file_path(), a)?;
    record_b.chain(&rel_b, &store_b.file_path(), b)?;
    let target_a = record_a.descendant(&rel_a).unwrap_or(&record_a);
    let target_b = record_b.descendant(&rel_b).unwrap_or(&record_b);

    let a_base = store_a.root().join(&rel_a);
    let b_base = store_b.root().join(&rel_b);
    let body = compare_branch(&a_base, &b_base, target_a, target_b, 0, 0, max_depth)?;
    let body = if body.is_empty() {
        "\tNo differences found.\n".to_string()
    } else {
        body
    };
    Ok(format!(
        "\n\nAs of {} (A) and {} (B):\n{}",
        record_a.calculated_at.as_deref().unwrap_or("(never)"),
        record_b.calculated_at.as_deref().unwrap_or("(never)"),
        body
    ))
}

fn tabs(n: usize) -> String {
    "\t".repeat(n)
}

/// Whether two records disagree by the pruning criterion.
fn records_differ(a: &Record, b: &Record) -> bool {
    a.tree_hash != b.tree_hash || a.n_files != b.n_files
}

/// Diff one shared directory. `level` drives indentation and starts
/// incrementing only once a directory with differences has been found, so
/// the report nests from the first point of interest. `depth` counts levels
/// below the comparison targets and bounds expansion at `max_depth`.
fn compare_branch(
    a_path: &Path,
    b_path: &Path,
    a: &Record,
    b: &Record,
    mut level: usize,
    depth: usize,
    max_depth: usize,
) -> Result<String, InventoryError> {
    // A side without a finished hash cannot be meaningfully diffed.
    if a.tree_hash.is_none() || b.tree_hash.is_none() {
        let mut msg = String::new();
        if a.tree_hash.is_none() {
            msg += &format!(
                "{}Directory has not yet been calculated in A.\n",
                tabs(level + 1)
            );
        }
        if b.tree_hash.is_none() {
            msg += &format!(
                "{}Directory has not yet been calculated in B.\n",
                tabs(level + 1)
            );
        }
        return Ok(wrap_header(a_path, b_path, level + 1, msg));
    }
    if !records_differ(a, b) {
        return Ok(String::new());
    }

    let mut is_diff = false;
    let mut msg = String::new();
    if a.files_hash != b.files_hash {
        msg += &format!("{}Files within this folder mismatch.\n", tabs(level + 1));
        is_diff = true;
    }

    // Absences first, then shared children.
    for name in a.subdirectories.keys() {
        if !b.subdirectories.contains_key(name) {
            msg += &format!("{}Directory '{name}' absent from B.\n", tabs(level + 1));
            is_diff = true;
        }
    }
    for name in b.subdirectories.keys() {
        if !a.subdirectories.contains_key(name) {
            msg += &format!("{}Directory '{name}' absent from A.\n", tabs(level + 1));
            is_diff = true;
        }
    }

    // Once a differing directory has been found, every level below it
    // indents one step further.
    if level > 0 || is_diff {
        level += 1;
    }

    for (name, a_child) in &a.subdirectories {
        let Some(b_child) = b.subdirectories.get(name) else {
            continue;
        };
        if depth + 1 < max_depth {
            msg += &compare_branch(
                &a_path.join(name),
                &b_path.join(name),
                a_child,
                b_child,
                level,
                depth + 1,
                max_depth,
            )?;
        } else if records_differ(a_child, b_child) {
            msg += &format!(
                "{}Directory '{name}' contains differences between A and B.\n",
                tabs(level)
            );
        }
    }

    // The hashes disagree, so something above must have produced a line. An
    // empty message here means the record pair is internally inconsistent.
    if msg.is_empty() {
        return Err(InventoryError::HashMismatchUnexplained {
            a: a_path.to_path_buf(),
            b: b_path.to_path_buf(),
            a_summary: a.summary(),
            b_summary: b.summary(),
        });
    }
    Ok(wrap_header(a_path, b_path, level, msg))
}

fn wrap_header(a_path: &Path, b_path: &Path, level: usize, msg: String) -> String {
    format!(
        "{}{} (A) vs {} (B):\n{}",
        tabs(level.saturating_sub(1)),
        a_path.display(),
        b_path.display(),
        msg
    )
}
