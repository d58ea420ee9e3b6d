//! Stable storage for the counter.
//!
//! The on-disk format is the raw counter: exactly `size_of::<Count>()` bytes
//! in native byte order, no header, no checksum. [`FileStore::save`] rewrites
//! the file in place, so a crash during the write can leave a torn or stale
//! value behind; the counter is best effort and this gap is accepted.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

use log::Level;
use shared::Count;

use crate::myioctl_log;

/// Size of the persisted blob.
pub const BLOB_LEN: usize = size_of::<Count>();

/// Where the counter is loaded from and saved to.
pub trait CounterStore: Send + Sync {
    fn load(&self) -> io::Result<Count>;
    fn save(&self, value: Count) -> io::Result<()>;
    /// Human-readable location, for diagnostics.
    fn location(&self) -> String;
}

/// A counter blob in one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CounterStore for FileStore {
    fn load(&self) -> io::Result<Count> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len != BLOB_LEN as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {BLOB_LEN} bytes, found {len}"),
            ));
        }
        let mut buf = [0u8; BLOB_LEN];
        file.read_exact(&mut buf)?;
        let value = Count::from_ne_bytes(buf);
        myioctl_log!(Level::Debug, "store", "read {} from {}", value, self.path.display());
        Ok(value)
    }

    fn save(&self, value: Count) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&value.to_ne_bytes())?;
        myioctl_log!(Level::Debug, "store", "wrote {} to {}", value, self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
