//! Retry-tolerant content hashing capability.
//!
//! The inventory only requires a hashing capability with a defined retry
//! contract, not a specific implementation; [`ContentHasher`] is that seam.
//! The default [`StreamingMd5`] reads sequentially in 1 MiB blocks and, on a
//! transient offset-preserving failure, reopens the source and resumes from
//! the last consumed offset with a smaller block size and a brief pause,
//! until the retry budget is exhausted. Transient failures never escape this
//! module: the outcome is either a finished digest or a fatal error for the
//! file.

use crate::error::InventoryError;
use crate::links;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Starting read block size.
const DEFAULT_BLOCK_SIZE: usize = 1 << 20;
/// Floor for the shrinking block size under repeated failures.
const MIN_BLOCK_SIZE: usize = 4096;
/// Base retry allowance; one more is granted per GiB of file size.
const BASE_RETRIES: u32 = 1;
/// Pause between retry attempts.
const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Outcome of hashing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDigest {
    /// Lowercase hex digest of the file content.
    pub hex: String,
    /// File size in bytes.
    pub size: u64,
}

/// Content-hash capability with the retry contract described above.
pub trait ContentHasher: Send + Sync {
    /// Hash one file. `retry_budget` of `None` selects the size-derived
    /// default (1 + 1 per GiB).
    fn hash_file(&self, path: &Path, retry_budget: Option<u32>)
        -> Result<FileDigest, InventoryError>;
}

/// In-process streaming MD5 hasher.
pub struct StreamingMd5 {
    pause: Duration,
}

impl StreamingMd5 {
    pub fn new() -> Self {
        Self { pause: RETRY_PAUSE }
    }

    /// Hasher that does not sleep between retries. Test use.
    pub fn without_pause() -> Self {
        Self {
            pause: Duration::ZERO,
        }
    }
}

impl Default for StreamingMd5 {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for StreamingMd5 {
    fn hash_file(
        &self,
        path: &Path,
        retry_budget: Option<u32>,
    ) -> Result<FileDigest, InventoryError> {
        // Links are never hashed: the content belongs to another path.
        if links::is_link(path) {
            return Err(InventoryError::FatalIo {
                path: path.to_path_buf(),
                detail: "cannot hash a symbolic link or reparse point".to_string(),
            });
        }
        let size = std::fs::metadata(path)
            .map_err(|e| InventoryError::FatalIo {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
            .len();
        let budget = retry_budget.unwrap_or(BASE_RETRIES + (size >> 30) as u32);
        let (hex, _consumed) = digest_stream(|| File::open(path), budget, self.pause, path)?;
        Ok(FileDigest { hex, size })
    }
}

/// Whether a read failure is worth retrying from the preserved offset.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::InvalidInput
    ) || err.raw_os_error() == Some(22)
}

/// Digest a seekable stream with the retry contract. `reopen` is called for
/// the initial open and after every transient failure; the stream is then
/// positioned at the last successfully consumed offset, so already-hashed
/// bytes are never re-read.
///
/// Returns the hex digest and the number of bytes consumed.
pub(crate) fn digest_stream<R, F>(
    mut reopen: F,
    budget: u32,
    pause: Duration,
    label: &Path,
) -> Result<(String, u64), InventoryError>
where
    R: Read + Seek,
    F: FnMut() -> io::Result<R>,
{
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; DEFAULT_BLOCK_SIZE];
    let mut block = DEFAULT_BLOCK_SIZE;
    let mut position: u64 = 0;
    let mut retry: u32 = 0;

    loop {
        let attempt = (|| -> io::Result<()> {
            let mut src = reopen()?;
            src.seek(SeekFrom::Start(position))?;
            loop {
                let n = src.read(&mut buf[..block])?;
                if n == 0 {
                    return Ok(());
                }
                hasher.update(&buf[..n]);
                position += n as u64;
            }
        })();

        match attempt {
            Ok(()) => break,
            Err(e) if is_transient(&e) && retry < budget => {
                retry += 1;
                block = (block / 2).max(MIN_BLOCK_SIZE);
                warn!(
                    "Retrying ({} of {}) at position {} while calculating checksum for: {}...",
                    retry,
                    budget,
                    position,
                    label.display()
                );
                if !pause.is_zero() {
                    std::thread::sleep(pause);
                }
            }
            Err(e) => {
                return Err(InventoryError::FatalIo {
                    path: label.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        }
    }

    if retry > 0 {
        info!(
            "Retry successful, completed checksum for: {}",
            label.display()
        );
    }
    Ok((hex::encode(hasher.finalize()), position))
}
