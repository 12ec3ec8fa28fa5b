//! Record calculation engine.
//!
//! Builds and refreshes a [`Record`] subtree for a directory, bottom-up, with
//! three interacting modes: fresh (ignore any existing data), continue (skip
//! subdirectories whose record already has a tree hash), and targeted
//! (recompute exactly one subtree within a larger scope, then recompute the
//! ancestor hashes bottom-up).
//!
//! Traversal uses an explicit stack of pending directory frames rather than
//! call-stack recursion, so arbitrarily deep trees cannot overflow, and the
//! in-progress state can be spliced into a checkpoint snapshot at any point.

use crate::error::InventoryError;
use crate::hashing::{ContentHasher, FileDigest};
use crate::progress::ProgressObserver;
use crate::record::{FileEntry, Record, Store, STORE_FILENAME};
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, info};

/// Baseline spacing between checkpoint saves.
const BASE_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);
/// Ceiling for the adaptive spacing when saves are expensive.
const MAX_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(900);
/// A save cheaper than this keeps the baseline cadence.
const CHEAP_CHECKPOINT_COST: Duration = Duration::from_secs(2);

/// Calculation options shared by the CLI and the synchronizer.
#[derive(Debug, Clone, Default)]
pub struct CalcOptions {
    /// Reuse subdirectory records that already carry a tree hash.
    pub continue_previous: bool,
    /// Capture a per-file listing ({hash, size, mtime}) in each record.
    pub detail_files: bool,
    /// Worker threads for file hashing within a directory. Values below 2
    /// select the sequential path.
    pub parallel: usize,
    /// Baseline spacing between checkpoint saves; `None` selects the
    /// one-minute default. The adaptive widening under expensive saves
    /// applies either way.
    pub checkpoint_interval: Option<Duration>,
}

/// Calculate or refresh the record tree for `path`.
///
/// When `path` sits inside an existing larger scope (a store at some
/// ancestor) and `start_new` is false, this is a targeted recalculation: only
/// the `path` subtree is recomputed and the ancestor hashes are refreshed
/// bottom-up. With `start_new`, any existing data is discarded and a fresh
/// store is created at `path` itself.
pub fn calculate_tree(
    path: &Path,
    start_new: bool,
    options: CalcOptions,
    hasher: &dyn ContentHasher,
    progress: &mut dyn ProgressObserver,
) -> Result<(), InventoryError> {
    info!("Calculating checksum for path '{}'...", path.display());
    let store = if start_new {
        Store::at(path)?
    } else {
        match Store::locate(path) {
            Ok(store) => store,
            Err(InventoryError::StoreNotFound { .. }) => Store::at(path)?,
            Err(e) => return Err(e),
        }
    };
    let target_rel = store.relative_of(path)?;
    let root_record = if start_new || !store.exists() {
        Record::default()
    } else {
        store.load()?
    };
    refresh_within(&store, root_record, &target_rel, options, hasher, progress)?;
    info!("Done.");
    Ok(())
}

/// Run one calculation pass over the subtree at `target_rel` within `store`,
/// starting from `root_record`, and persist the result. Returns the updated
/// root record. The synchronizer uses this directly to refresh destination
/// records it has invalidated.
pub fn refresh_within(
    store: &Store,
    root_record: Record,
    target_rel: &Path,
    options: CalcOptions,
    hasher: &dyn ContentHasher,
    progress: &mut dyn ProgressObserver,
) -> Result<Record, InventoryError> {
    let base_interval = options
        .checkpoint_interval
        .unwrap_or(BASE_CHECKPOINT_INTERVAL);
    let mut session = Session {
        store,
        root_record,
        target_rel: target_rel.to_path_buf(),
        options,
        hasher,
        progress,
        state: CalcState::new(base_interval),
        pass_started: chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
    };
    session.run()?;
    Ok(session.root_record)
}

/// Enumerate a directory into name-sorted file and subdirectory lists.
/// Sorting is what makes the folded hashes independent of filesystem
/// enumeration order.
pub(crate) fn enumerate_dir(dir: &Path) -> Result<(Vec<String>, Vec<String>), InventoryError> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            subdirs.push(name);
        } else {
            files.push(name);
        }
    }
    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

/// Mutable traversal state: counts and the adaptive checkpoint timer.
struct CalcState {
    total_entries: u64,
    entries_done: u64,
    last_checkpoint: Instant,
    interval: Duration,
    base_interval: Duration,
}

impl CalcState {
    fn new(base_interval: Duration) -> Self {
        Self {
            total_entries: 0,
            entries_done: 0,
            last_checkpoint: Instant::now(),
            interval: base_interval,
            base_interval,
        }
    }
}

/// One pending directory on the traversal stack.
struct Frame {
    /// Entry name under the parent frame; empty for the subtree root.
    name: String,
    dir: PathBuf,
    /// Record being built for this directory.
    record: Record,
    /// Children from the previous pass, consumed as they are reused or
    /// replaced; survivors are carried into checkpoint snapshots so an
    /// interrupted run stays resumable.
    prior_children: BTreeMap<String, Record>,
    files: Vec<String>,
    subdirs: Vec<String>,
    next_child: usize,
    tree_md5: Md5,
}

enum Step {
    Recurse {
        name: String,
        dir: PathBuf,
        seed: Record,
    },
    Finished,
}

struct Session<'a> {
    store: &'a Store,
    root_record: Record,
    target_rel: PathBuf,
    options: CalcOptions,
    hasher: &'a dyn ContentHasher,
    progress: &'a mut dyn ProgressObserver,
    state: CalcState,
    pass_started: String,
}

impl<'a> Session<'a> {
    fn run(&mut self) -> Result<(), InventoryError> {
        let targeted = !self.target_rel.as_os_str().is_empty();
        let target_abs = self.store.root().join(&self.target_rel);

        if targeted {
            // A targeted pass requires the target to be known to the store;
            // otherwise the store is out of date and the caller must
            // recalculate a wider scope.
            self.root_record
                .chain(&self.target_rel, &self.store.file_path(), &target_abs)?;
            // Ancestors are provisionally invalid until recomputed at the
            // end of the pass.
            for prefix in ancestor_prefixes(&self.target_rel) {
                if let Some(rec) = self.root_record.descendant_mut(&prefix) {
                    rec.tree_hash = None;
                }
            }
        }

        let seed = if self.options.continue_previous {
            self.root_record
                .descendant(&self.target_rel)
                .cloned()
                .unwrap_or_default()
        } else {
            Record::default()
        };

        let result = self.compute_subtree(&target_abs, seed)?;
        if let Some(slot) = self.root_record.descendant_mut(&self.target_rel) {
            *slot = result;
        }

        if targeted {
            let mut prefixes = ancestor_prefixes(&self.target_rel);
            prefixes.reverse(); // deepest first: children before parents
            for prefix in prefixes {
                self.recompute_ancestor(&prefix)?;
            }
        }

        self.root_record.calculated_at = Some(self.pass_started.clone());
        self.store.save(&self.root_record)?;
        self.progress
            .on_progress(self.state.entries_done, self.state.total_entries);
        Ok(())
    }

    /// Iterative post-order computation of one subtree. Returns the finished
    /// record for `dir`.
    fn compute_subtree(&mut self, dir: &Path, seed: Record) -> Result<Record, InventoryError> {
        let first = self.open_frame(String::new(), dir.to_path_buf(), seed)?;
        let mut stack = vec![first];
        let mut completed = None;

        loop {
            self.maybe_checkpoint(&stack)?;
            let step = {
                let Some(frame) = stack.last_mut() else { break };
                if frame.next_child < frame.subdirs.len() {
                    let name = frame.subdirs[frame.next_child].clone();
                    frame.next_child += 1;
                    frame.tree_md5.update(name.as_bytes());
                    let prior = frame.prior_children.remove(&name).unwrap_or_default();
                    if self.options.continue_previous && prior.is_complete() {
                        // Already hashed in a previous pass: fold without
                        // recursing.
                        if let Some(hash) = &prior.tree_hash {
                            frame.tree_md5.update(hash.as_bytes());
                        }
                        frame.record.size += prior.size;
                        frame.record.subdirectories.insert(name, prior);
                        self.state.entries_done += 1;
                        continue;
                    }
                    let child_dir = frame.dir.join(&name);
                    Step::Recurse {
                        name,
                        dir: child_dir,
                        seed: prior,
                    }
                } else {
                    Step::Finished
                }
            };

            match step {
                Step::Recurse { name, dir, seed } => {
                    let child = self.open_frame(name, dir, seed)?;
                    stack.push(child);
                }
                Step::Finished => {
                    let Some(mut frame) = stack.pop() else { break };
                    self.finish_frame(&mut frame)?;
                    match stack.last_mut() {
                        Some(parent) => {
                            if let Some(hash) = &frame.record.tree_hash {
                                parent.tree_md5.update(hash.as_bytes());
                            }
                            parent.record.size += frame.record.size;
                            parent.record.subdirectories.insert(frame.name, frame.record);
                            self.state.entries_done += 1;
                        }
                        None => completed = Some(frame.record),
                    }
                }
            }
        }

        completed.ok_or_else(|| InventoryError::IncompleteRecord {
            path: dir.to_path_buf(),
            member: String::new(),
        })
    }

    fn open_frame(
        &mut self,
        name: String,
        dir: PathBuf,
        mut seed: Record,
    ) -> Result<Frame, InventoryError> {
        debug!("Entering directory: {}", dir.display());
        let (files, subdirs) = enumerate_dir(&dir)?;
        self.state.total_entries += (files.len() + subdirs.len()) as u64;
        let prior_children = std::mem::take(&mut seed.subdirectories);
        Ok(Frame {
            name,
            dir,
            record: Record::default(),
            prior_children,
            files,
            subdirs,
            next_child: 0,
            tree_md5: Md5::new(),
        })
    }

    /// Hash this frame's direct files, fold the files hash into the tree
    /// accumulator, and finalize the record.
    fn finish_frame(&mut self, frame: &mut Frame) -> Result<(), InventoryError> {
        // The store's own file is excluded from its own scope root, and only
        // there; a store file nested deeper belongs to another scope and is
        // hashed like any other file.
        let skip_store = frame.dir == self.store.root();
        let digests = self.hash_files(&frame.dir, &frame.files, skip_store)?;

        let mut files_md5 = Md5::new();
        let mut n_files = 0u64;
        let mut listing = self.options.detail_files.then(BTreeMap::new);
        for (name, digest) in frame.files.iter().zip(&digests) {
            self.state.entries_done += 1;
            let Some(digest) = digest else { continue };
            n_files += 1;
            files_md5.update(digest.hex.as_bytes());
            frame.record.size += digest.size;
            if let Some(listing) = listing.as_mut() {
                let meta = fs::metadata(frame.dir.join(name))?;
                let modified = meta
                    .modified()?
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                listing.insert(
                    name.clone(),
                    FileEntry {
                        md5: digest.hex.clone(),
                        size: digest.size,
                        last_modified_at: modified,
                    },
                );
            }
        }

        let files_hex = hex::encode(files_md5.finalize());
        frame.tree_md5.update(files_hex.as_bytes());
        frame.record.files_hash = Some(files_hex);
        frame.record.tree_hash = Some(hex::encode(frame.tree_md5.finalize_reset()));
        frame.record.n_files = n_files;
        frame.record.file_listing = listing;
        Ok(())
    }

    /// Hash the files of one directory, preserving input order in the
    /// result. Entries for the skipped store file are `None`.
    fn hash_files(
        &self,
        dir: &Path,
        files: &[String],
        skip_store: bool,
    ) -> Result<Vec<Option<FileDigest>>, InventoryError> {
        let jobs: Vec<Option<PathBuf>> = files
            .iter()
            .map(|name| {
                if skip_store && name == STORE_FILENAME {
                    None
                } else {
                    Some(dir.join(name))
                }
            })
            .collect();

        if self.options.parallel < 2 {
            return jobs
                .iter()
                .map(|job| {
                    job.as_ref()
                        .map(|path| self.hasher.hash_file(path, None))
                        .transpose()
                })
                .collect();
        }

        // Bounded worker pool. Workers claim indices; the caller folds the
        // results in the original (sorted) order, so the resulting hash does
        // not depend on completion order.
        let hasher = self.hasher;
        let results: Vec<Mutex<Option<Result<FileDigest, InventoryError>>>> =
            jobs.iter().map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);
        let workers = self.options.parallel.min(jobs.len().max(1));
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    if i >= jobs.len() {
                        break;
                    }
                    if let Some(path) = &jobs[i] {
                        let outcome = hasher.hash_file(path, None);
                        *results[i].lock() = Some(outcome);
                    }
                });
            }
        });

        let mut out = Vec::with_capacity(jobs.len());
        for (job, slot) in jobs.iter().zip(results) {
            match job {
                None => out.push(None),
                Some(path) => match slot.into_inner() {
                    Some(Ok(digest)) => out.push(Some(digest)),
                    Some(Err(e)) => return Err(e),
                    None => {
                        return Err(InventoryError::FatalIo {
                            path: path.clone(),
                            detail: "hash worker exited without a result".to_string(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Recompute one invalidated ancestor's tree hash and aggregate size
    /// from its (already finished) children and its unchanged files hash.
    fn recompute_ancestor(&mut self, prefix: &Path) -> Result<(), InventoryError> {
        let abs = self.store.root().join(prefix);
        let skip_store = abs == self.store.root();
        let (files, _) = enumerate_dir(&abs)?;
        let mut file_bytes = 0u64;
        for name in &files {
            if skip_store && name == STORE_FILENAME {
                continue;
            }
            file_bytes += fs::metadata(abs.join(name))?.len();
        }

        let Some(rec) = self.root_record.descendant_mut(prefix) else {
            return Err(InventoryError::IncompleteRecord {
                path: abs,
                member: String::new(),
            });
        };
        let files_hash = rec.files_hash.clone().ok_or_else(|| {
            InventoryError::IncompleteRecord {
                path: abs.clone(),
                member: "MD5-files_only".to_string(),
            }
        })?;

        let mut tree_md5 = Md5::new();
        let mut size = file_bytes;
        for (name, child) in &rec.subdirectories {
            let child_hash =
                child
                    .tree_hash
                    .as_ref()
                    .ok_or_else(|| InventoryError::IncompleteRecord {
                        path: abs.clone(),
                        member: name.clone(),
                    })?;
            tree_md5.update(name.as_bytes());
            tree_md5.update(child_hash.as_bytes());
            size += child.size;
        }
        tree_md5.update(files_hash.as_bytes());
        rec.tree_hash = Some(hex::encode(tree_md5.finalize()));
        rec.size = size;
        Ok(())
    }

    fn maybe_checkpoint(&mut self, stack: &[Frame]) -> Result<(), InventoryError> {
        if self.state.last_checkpoint.elapsed() < self.state.interval {
            return Ok(());
        }
        self.checkpoint(stack)
    }

    fn checkpoint(&mut self, stack: &[Frame]) -> Result<(), InventoryError> {
        let started = Instant::now();
        let snapshot = self.snapshot(stack);
        self.store.save(&snapshot)?;
        self.progress
            .on_progress(self.state.entries_done, self.state.total_entries);
        let cost = started.elapsed();
        self.state.interval = next_interval(cost, self.state.base_interval);
        self.state.last_checkpoint = Instant::now();
        Ok(())
    }

    /// Splice the in-progress frame stack into a clone of the scope-root
    /// record. The result is what resumability is built on: every finished
    /// subtree is present and complete, every pending one incomplete.
    fn snapshot(&self, stack: &[Frame]) -> Record {
        let mut current: Option<Record> = None;
        for (i, frame) in stack.iter().enumerate().rev() {
            let mut rec = frame.record.clone();
            for (name, prior) in &frame.prior_children {
                rec.subdirectories
                    .entry(name.clone())
                    .or_insert_with(|| prior.clone());
            }
            if let Some(child) = current.take() {
                rec.subdirectories.insert(stack[i + 1].name.clone(), child);
            }
            current = Some(rec);
        }

        let mut root = self.root_record.clone();
        if let Some(partial) = current {
            if let Some(slot) = root.descendant_mut(&self.target_rel) {
                *slot = partial;
            }
        }
        root.calculated_at = Some(self.pass_started.clone());
        root
    }
}

/// Checkpoint spacing after a save that took `cost`. Cheap saves keep the
/// base cadence; expensive ones widen it in proportion, up to the ceiling.
fn next_interval(cost: Duration, base: Duration) -> Duration {
    if cost < CHEAP_CHECKPOINT_COST {
        base
    } else {
        (cost * 25).clamp(base.min(MAX_CHECKPOINT_INTERVAL), MAX_CHECKPOINT_INTERVAL)
    }
}

/// Proper ancestor prefixes of `rel`, shallowest first, starting with the
/// empty prefix (the scope root itself).
fn ancestor_prefixes(rel: &Path) -> Vec<PathBuf> {
    let components: Vec<_> = rel.components().collect();
    let mut prefixes = vec![PathBuf::new()];
    let mut acc = PathBuf::new();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        acc.push(component);
        prefixes.push(acc.clone());
    }
    prefixes
}
