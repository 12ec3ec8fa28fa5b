//! Checksum store: locating, loading, and saving persisted record trees.
//!
//! Exactly one store file exists per scope root. Any directory without a
//! closer store inherits the nearest ancestor's store as its source of truth,
//! so consumers ascend the parent chain rather than assuming the target path
//! itself holds one.

use crate::error::InventoryError;
use crate::record::Record;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Store file name, fixed at the scope root.
pub const STORE_FILENAME: &str = "tree_checksum.json";

/// Handle to one checksum store, identified by its scope root directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Store rooted at exactly `root`, whether or not a store file exists
    /// there yet. Used when creating a fresh inventory.
    pub fn at(root: &Path) -> Result<Self, InventoryError> {
        let root = dunce::canonicalize(root)?;
        Ok(Self { root })
    }

    /// Locate the nearest store ascending from `start`, failing with
    /// [`InventoryError::StoreNotFound`] when no store file exists up to the
    /// filesystem root.
    pub fn locate(start: &Path) -> Result<Self, InventoryError> {
        let start = dunce::canonicalize(start)?;
        let mut dir = start.clone();
        loop {
            if dir.join(STORE_FILENAME).is_file() {
                debug!("Checksum file found at: {}", dir.display());
                return Ok(Self { root: dir });
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => return Err(InventoryError::StoreNotFound { path: start }),
            }
        }
    }

    /// The scope root directory this store covers.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the store file.
    pub fn file_path(&self) -> PathBuf {
        self.root.join(STORE_FILENAME)
    }

    /// Whether the store file exists on disk.
    pub fn exists(&self) -> bool {
        self.file_path().is_file()
    }

    /// Position of `target` relative to the scope root. Empty for the scope
    /// root itself. A target outside the scope is a caller error, not a
    /// missing store.
    pub fn relative_of(&self, target: &Path) -> Result<PathBuf, InventoryError> {
        let target = dunce::canonicalize(target)?;
        target
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| {
                InventoryError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "path {} is outside the checksum scope {}",
                        target.display(),
                        self.root.display()
                    ),
                ))
            })
    }

    /// Load the full record tree from the store file.
    pub fn load(&self) -> Result<Record, InventoryError> {
        let path = self.file_path();
        let data = fs::read_to_string(&path)?;
        serde_json::from_str(&data).map_err(|source| InventoryError::Serde { path, source })
    }

    /// Persist the record tree, overwriting the store file wholesale. Not
    /// atomic; interrupted runs fall back to the previous checkpoint.
    pub fn save(&self, record: &Record) -> Result<(), InventoryError> {
        let path = self.file_path();
        info!("Saving checksum to file: {}", path.display());
        let data = serde_json::to_string(record)
            .map_err(|source| InventoryError::Serde { path: path.clone(), source })?;
        fs::write(&path, data)?;
        Ok(())
    }
}
