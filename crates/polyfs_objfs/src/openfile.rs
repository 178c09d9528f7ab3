use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use polyfs_vfs::{Credential, FsError, OpenFlags, Result};

use crate::ObjFile;

/// An open handle onto an [`ObjFile`]. The handle records the open
/// flags; closing it releases only in-memory state. Writes commit
/// immediately in their own transaction and `flush` is the durability
/// barrier.
pub struct ObjOpenFile {
    cred: Credential,
    file: Arc<ObjFile>,
    flags: u32,
    need_flush: AtomicBool,
}

impl ObjOpenFile {
    pub(crate) fn new(cred: Credential, file: Arc<ObjFile>, flags: u32) -> Self {
        Self {
            cred,
            file,
            flags,
            need_flush: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn file(&self) -> &Arc<ObjFile> {
        &self.file
    }

    #[must_use]
    pub const fn cred(&self) -> &Credential {
        &self.cred
    }

    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Reads up to `len` bytes at `offset`. Holes read as zeros; the
    /// returned flag reports end-of-file.
    pub async fn read(&self, offset: u64, len: u32) -> Result<(Vec<u8>, bool)> {
        if self.flags & OpenFlags::READ == 0 {
            return Err(FsError::Invalid);
        }
        self.file.read_at(offset, len).await
    }

    /// Writes `data` at `offset`, extending the file if needed. Returns
    /// the number of bytes written.
    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<u32> {
        if self.flags & OpenFlags::WRITE == 0 {
            return Err(FsError::Invalid);
        }
        let written = self.file.write_at(offset, data).await?;
        self.need_flush.store(true, Ordering::Release);
        Ok(written)
    }

    /// Durability barrier for earlier writes.
    pub async fn flush(&self) -> Result<()> {
        if self.need_flush.swap(false, Ordering::AcqRel) {
            self.file.filesystem()?.database().flush();
        }
        Ok(())
    }
}
