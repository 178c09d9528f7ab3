use std::sync::Arc;

use polyfs_types::nfs3::{COMMIT3args, Nfs3Result, READ3args, WRITE3args, stable_how};
use polyfs_types::xdr::Opaque;
use polyfs_vfs::{FsError, OpenFlags, Result};

use crate::datacache::{BlockState, DataCache};
use crate::error::map_nfs_status;
use crate::file::NfsFile;
use crate::program::NfsProgram;

/// An open handle onto a remote file. Reads and writes are clipped to
/// the server's preferred transfer sizes; writes go out UNSTABLE and
/// `flush` issues the COMMIT. With write-behind enabled, writes land in
/// a local [`DataCache`] instead and `flush` pushes the dirty ranges.
pub struct NfsOpenFile<P: NfsProgram> {
    file: Arc<NfsFile<P>>,
    flags: u32,
    cache: Option<tokio::sync::Mutex<DataCache>>,
}

impl<P: NfsProgram> NfsOpenFile<P> {
    pub(crate) fn new(file: Arc<NfsFile<P>>, flags: u32, write_behind: bool) -> Self {
        Self {
            file,
            flags,
            cache: write_behind.then(|| tokio::sync::Mutex::new(DataCache::new())),
        }
    }

    #[must_use]
    pub const fn file(&self) -> &Arc<NfsFile<P>> {
        &self.file
    }

    #[must_use]
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Reads up to `len` bytes at `offset`. The count is clipped to the
    /// server's preferred read size; eof comes from the server's reply.
    pub async fn read(&self, offset: u64, len: u32) -> Result<(Vec<u8>, bool)> {
        if self.flags & OpenFlags::READ == 0 {
            return Err(FsError::Invalid);
        }
        let fs = self.file.nfs()?;

        // Locally buffered writes win over the server's copy.
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().await;
            if let Some(data) = cache.get(offset, len) {
                let size = self.file.cached_attr().size;
                let eof = offset + data.len() as u64 >= size;
                return Ok((data, eof));
            }
        }

        let count = len.min(fs.fsinfo().await?.rtpref);
        let res = fs
            .proto()
            .read(READ3args {
                file: self.file.fh().clone(),
                offset,
                count,
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.file.update_post_op(&ok.file_attributes);
                Ok((ok.data.into_owned(), ok.eof))
            }
            Nfs3Result::Err((status, fail)) => {
                self.file.update_post_op(&fail.file_attributes);
                Err(map_nfs_status(status))
            }
        }
    }

    /// Writes at `offset`, returning the number of bytes accepted. The
    /// count is clipped to the server's preferred write size, so short
    /// writes are normal.
    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<u32> {
        if self.flags & OpenFlags::WRITE == 0 {
            return Err(FsError::Invalid);
        }
        let fs = self.file.nfs()?;

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().await;
            cache.add(BlockState::Dirty, offset, data.to_vec());
            return Ok(u32::try_from(data.len()).unwrap_or(u32::MAX));
        }

        let wtpref = fs.fsinfo().await?.wtpref as usize;
        let data = if data.len() > wtpref {
            &data[..wtpref]
        } else {
            data
        };
        let count = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let res = fs
            .proto()
            .write(WRITE3args {
                file: self.file.fh().clone(),
                offset,
                count,
                stable: stable_how::UNSTABLE,
                data: Opaque::borrowed(data),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.file.update_post_op(&ok.file_wcc.after);
                Ok(ok.count)
            }
            Nfs3Result::Err((status, fail)) => {
                self.file.update_post_op(&fail.file_wcc.after);
                Err(map_nfs_status(status))
            }
        }
    }

    /// Pushes buffered writes (if any) and commits unstable data to
    /// stable storage.
    pub async fn flush(&self) -> Result<()> {
        let fs = self.file.nfs()?;

        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().await;
            if cache.has_dirty() {
                let mut dirty = Vec::new();
                cache.apply(|state, start, _end, data| {
                    if matches!(state, BlockState::Dirty) {
                        dirty.push((start, data.to_vec()));
                    }
                });
                for (start, data) in dirty {
                    self.push_range(start, &data).await?;
                }
                cache.set_all_state(BlockState::Unstable);
            }
        }

        let res = fs
            .proto()
            .commit(COMMIT3args {
                file: self.file.fh().clone(),
                offset: 0,
                count: 0,
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.file.update_post_op(&ok.file_wcc.after);
                if let Some(cache) = &self.cache {
                    cache.lock().await.set_all_state(BlockState::Stable);
                }
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                self.file.update_post_op(&fail.file_wcc.after);
                Err(map_nfs_status(status))
            }
        }
    }

    /// Writes one buffered range in wtpref-sized chunks.
    async fn push_range(&self, mut offset: u64, mut data: &[u8]) -> Result<()> {
        let fs = self.file.nfs()?;
        let wtpref = (fs.fsinfo().await?.wtpref as usize).max(1);
        while !data.is_empty() {
            let chunk = data.len().min(wtpref);
            let count = u32::try_from(chunk).unwrap_or(u32::MAX);
            let res = fs
                .proto()
                .write(WRITE3args {
                    file: self.file.fh().clone(),
                    offset,
                    count,
                    stable: stable_how::UNSTABLE,
                    data: Opaque::borrowed(&data[..chunk]),
                })
                .await
                .map_err(|e| e.to_fs_error())?;
            match res {
                Nfs3Result::Ok(ok) => {
                    self.file.update_post_op(&ok.file_wcc.after);
                }
                Nfs3Result::Err((status, fail)) => {
                    self.file.update_post_op(&fail.file_wcc.after);
                    return Err(map_nfs_status(status));
                }
            }
            offset += chunk as u64;
            data = &data[chunk..];
        }
        Ok(())
    }
}
