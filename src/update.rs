//! Cache-driven tree synchronization.
//!
//! Brings a destination directory in line with a source directory using the
//! two record trees to decide where work is needed: a subtree whose hashes
//! already agree is skipped without a single filesystem syscall. Mutated
//! destination directories have their records invalidated during the pass
//! and are recomputed by one continuing Calculator run at the end.

use crate::calculate::{enumerate_dir, refresh_within, CalcOptions};
use crate::error::InventoryError;
use crate::hashing::ContentHasher;
use crate::progress::ProgressObserver;
use crate::record::{Record, Store, STORE_FILENAME};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Spacing between periodic destination-store saves during reconciliation.
const SAVE_INTERVAL: Duration = Duration::from_secs(60);

/// Synchronize `destination` with `source`.
///
/// Both sides must already have stores (calculate first), and the two
/// targets must occupy the same relative position within their stores. With
/// `dry_run`, intended actions are logged and nothing on disk or in the
/// destination record changes.
pub fn update_tree(
    source: &Path,
    destination: &Path,
    dry_run: bool,
    hasher: &dyn ContentHasher,
    progress: &mut dyn ProgressObserver,
) -> Result<(), InventoryError> {
    info!(
        "Updating tree:\n\tFrom source: {}\n\tTo destination: {}",
        source.display(),
        destination.display()
    );
    let src_store = Store::locate(source)?;
    let dst_store = Store::locate(destination)?;
    debug!("Checksum file SRC found at: {}", src_store.file_path().display());
    debug!("Checksum file DST found at: {}", dst_store.file_path().display());
    let src_root = src_store.load()?;
    let dst_root = dst_store.load()?;
    let src_rel = src_store.relative_of(source)?;
    let dst_rel = dst_store.relative_of(destination)?;
    if src_rel != dst_rel {
        return Err(InventoryError::PathMismatch {
            a: src_rel,
            b: dst_rel,
        });
    }
    src_root.chain(&src_rel, &src_store.file_path(), source)?;
    dst_root.chain(&dst_rel, &dst_store.file_path(), destination)?;
    let src_target = src_root.descendant(&src_rel).unwrap_or(&src_root).clone();

    let mut syncer = Syncer {
        src_store: &src_store,
        dst_store: &dst_store,
        dst_root,
        dry_run,
        dirs_done: 0,
        last_save: Instant::now(),
        progress,
    };
    syncer.reconcile(&src_target, source, dst_rel.clone())?;

    if dry_run {
        info!("Dry run complete; nothing was changed.");
        return Ok(());
    }

    // One continuing pass recomputes every record invalidated above (and
    // computes records for subtrees copied wholesale), then persists.
    let options = CalcOptions {
        continue_previous: true,
        ..CalcOptions::default()
    };
    refresh_within(
        &dst_store,
        syncer.dst_root,
        &dst_rel,
        options,
        hasher,
        syncer.progress,
    )?;
    info!("Done.");
    Ok(())
}

struct Syncer<'a> {
    src_store: &'a Store,
    dst_store: &'a Store,
    dst_root: Record,
    dry_run: bool,
    dirs_done: u64,
    last_save: Instant,
    progress: &'a mut dyn ProgressObserver,
}

impl<'a> Syncer<'a> {
    /// Reconcile one directory pair. `src_record` describes the source side;
    /// the destination record is navigated by `dst_rel` on each access so no
    /// borrow is held across the periodic saves.
    fn reconcile(
        &mut self,
        src_record: &Record,
        src_path: &Path,
        dst_rel: PathBuf,
    ) -> Result<(), InventoryError> {
        self.maybe_save()?;
        self.dirs_done += 1;
        let dst_path = self.dst_store.root().join(&dst_rel);

        let (dst_hash_matches, dst_files_hash, dst_sub_names) = {
            let dst = self
                .dst_root
                .descendant(&dst_rel)
                .cloned()
                .unwrap_or_default();
            (
                dst.is_complete()
                    && dst.tree_hash == src_record.tree_hash
                    && dst.n_files == src_record.n_files,
                dst.files_hash,
                dst.subdirectories.keys().cloned().collect::<Vec<_>>(),
            )
        };
        if dst_hash_matches {
            return Ok(());
        }
        debug!("Reconciling: {}", dst_path.display());

        if !self.dry_run {
            if let Some(dst) = self.dst_root.descendant_mut(&dst_rel) {
                // Invalid until the closing Calculator pass recomputes it.
                dst.tree_hash = None;
            }
        }

        if dst_files_hash.is_none() || dst_files_hash != src_record.files_hash {
            self.sync_files(src_path, &dst_path)?;
        }

        // Subdirectories are reconciled from the records, not from disk.
        for (name, src_child) in &src_record.subdirectories {
            if dst_sub_names.binary_search(name).is_ok() {
                self.reconcile(src_child, &src_path.join(name), dst_rel.join(name))?;
            } else {
                let from = src_path.join(name);
                let to = dst_path.join(name);
                if self.dry_run {
                    info!("Would copy tree: {} -> {}", from.display(), to.display());
                } else {
                    debug!("Copying {} -> {}", from.display(), to.display());
                    copy_tree(&from, &to)?;
                }
            }
        }

        let mut removed = Vec::new();
        for name in &dst_sub_names {
            if src_record.subdirectories.contains_key(name) {
                continue;
            }
            let rm_path = dst_path.join(name);
            if self.dry_run {
                info!("Would remove tree: {}", rm_path.display());
            } else {
                info!("Removing tree: {}", rm_path.display());
                fs::remove_dir_all(&rm_path)?;
                removed.push(name.clone());
            }
        }
        if !removed.is_empty() {
            if let Some(dst) = self.dst_root.descendant_mut(&dst_rel) {
                for name in &removed {
                    dst.subdirectories.remove(name);
                }
            }
        }
        Ok(())
    }

    /// Copy source files over destination files and delete destination-only
    /// files. Store files are exempt at their own scope roots.
    fn sync_files(&mut self, src_path: &Path, dst_path: &Path) -> Result<(), InventoryError> {
        let (src_files, _) = enumerate_dir(src_path)?;
        let (dst_files, _) = enumerate_dir(dst_path)?;

        for name in &src_files {
            if self.is_store_file(name, src_path, dst_path) {
                continue;
            }
            let src_file = src_path.join(name);
            let dst_file = dst_path.join(name);
            if self.dry_run {
                let verb = if dst_file.exists() { "overwrite" } else { "copy" };
                info!(
                    "\tWould {verb} file: {} -> {}",
                    src_file.display(),
                    dst_file.display()
                );
            } else {
                fs::copy(&src_file, &dst_file)?;
            }
            self.maybe_save()?;
        }

        for name in &dst_files {
            if self.is_store_file(name, src_path, dst_path) {
                continue;
            }
            if src_files.binary_search(name).is_ok() {
                continue;
            }
            let rm_path = dst_path.join(name);
            if self.dry_run {
                info!("\tWould remove file: {}", rm_path.display());
            } else {
                info!("\tRemoving file: {}", rm_path.display());
                fs::remove_file(&rm_path)?;
            }
            self.maybe_save()?;
        }
        Ok(())
    }

    /// Whether `name` is the store file of either side's scope root at this
    /// directory pair.
    fn is_store_file(&self, name: &str, src_path: &Path, dst_path: &Path) -> bool {
        name == STORE_FILENAME
            && (src_path == self.src_store.root() || dst_path == self.dst_store.root())
    }

    fn maybe_save(&mut self) -> Result<(), InventoryError> {
        if self.dry_run || self.last_save.elapsed() < SAVE_INTERVAL {
            return Ok(());
        }
        self.dst_store.save(&self.dst_root)?;
        self.progress.on_progress(self.dirs_done, self.dirs_done);
        self.last_save = Instant::now();
        Ok(())
    }
}

/// Recursive filesystem copy. Symbolic links are skipped, matching the
/// hashing rule that link content belongs to another path.
fn copy_tree(from: &Path, to: &Path) -> Result<(), InventoryError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| InventoryError::FatalIo {
            path: from.to_path_buf(),
            detail: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| InventoryError::FatalIo {
                path: entry.path().to_path_buf(),
                detail: e.to_string(),
            })?;
        let target = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
