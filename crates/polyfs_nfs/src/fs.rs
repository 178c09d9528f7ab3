use std::sync::{Arc, Mutex};
use std::time::Duration;

use polyfs_types::nfs3::{FSINFO3args, FSINFO3res, GETATTR3args, GETATTR3res, Nfs3Result, fattr3, nfs_fh3, nfstime3};
use polyfs_vfs::{Clock, FileCache, FileHandle, FilesystemId, FsError, Result};

use crate::error::map_nfs_status;
use crate::file::NfsFile;
use crate::program::NfsProgram;

/// How long a cached attribute stays valid without a refresh.
pub const ATTR_TIMEOUT: Duration = Duration::from_secs(5);

/// Server limits and preferences learned from FSINFO on first use.
#[derive(Debug, Clone)]
pub struct FsInfo {
    pub rtmax: u32,
    pub rtpref: u32,
    pub rtmult: u32,
    pub wtmax: u32,
    pub wtpref: u32,
    pub wtmult: u32,
    pub dtpref: u32,
    pub maxfilesize: u64,
    pub time_delta: nfstime3,
    pub properties: u32,
}

/// A client filesystem rooted at one export of an NFSv3 server.
pub struct NfsFilesystem<P: NfsProgram> {
    proto: Arc<P>,
    clock: Clock,
    root_fh: nfs_fh3,
    fsid: FilesystemId,
    fsinfo: tokio::sync::OnceCell<FsInfo>,
    cache: Mutex<FileCache<Vec<u8>, NfsFile<P>>>,
    write_behind: bool,
}

impl<P: NfsProgram> NfsFilesystem<P> {
    /// A filesystem speaking to `proto`, rooted at `root_fh`.
    pub fn new(proto: P, clock: Clock, root_fh: nfs_fh3) -> Arc<Self> {
        Self::with_write_behind(proto, clock, root_fh, false)
    }

    /// As [`NfsFilesystem::new`], optionally buffering writes locally
    /// until `flush`.
    pub fn with_write_behind(
        proto: P,
        clock: Clock,
        root_fh: nfs_fh3,
        write_behind: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            proto: Arc::new(proto),
            clock,
            root_fh,
            fsid: rand::random::<[u8; 16]>().to_vec(),
            fsinfo: tokio::sync::OnceCell::new(),
            cache: Mutex::new(FileCache::default()),
            write_behind,
        })
    }

    #[must_use]
    pub fn fsid(&self) -> &FilesystemId {
        &self.fsid
    }

    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The program this filesystem speaks to.
    #[must_use]
    pub const fn proto(&self) -> &Arc<P> {
        &self.proto
    }

    pub(crate) const fn write_behind(&self) -> bool {
        self.write_behind
    }

    /// The root directory. The first call also bootstraps the transfer
    /// size preferences with FSINFO.
    pub async fn root(self: &Arc<Self>) -> Result<Arc<NfsFile<P>>> {
        let root = self.find_fh(&self.root_fh.clone()).await?;
        self.fsinfo().await?;
        Ok(root)
    }

    /// The FSINFO-derived limits, fetched once.
    pub async fn fsinfo(self: &Arc<Self>) -> Result<FsInfo> {
        let info = self
            .fsinfo
            .get_or_try_init(|| async {
                let res: FSINFO3res = self
                    .proto
                    .fsinfo(FSINFO3args {
                        fsroot: self.root_fh.clone(),
                    })
                    .await
                    .map_err(|e| e.to_fs_error())?;
                match res {
                    Nfs3Result::Ok(ok) => Ok(FsInfo {
                        rtmax: ok.rtmax,
                        rtpref: ok.rtpref,
                        rtmult: ok.rtmult,
                        wtmax: ok.wtmax,
                        wtpref: ok.wtpref,
                        wtmult: ok.wtmult,
                        dtpref: ok.dtpref,
                        maxfilesize: ok.maxfilesize,
                        time_delta: ok.time_delta,
                        properties: ok.properties,
                    }),
                    Nfs3Result::Err((status, _)) => Err(map_nfs_status(status)),
                }
            })
            .await?;
        Ok(info.clone())
    }

    /// Resolves a wire handle minted by this filesystem; unknown
    /// handles are resolved with GETATTR or fail stale.
    pub async fn find_handle(self: &Arc<Self>, handle: &FileHandle) -> Result<Arc<NfsFile<P>>> {
        let rest = handle.strip_fsid(&self.fsid).ok_or(FsError::Stale)?;
        let fh = nfs_fh3 {
            data: rest.to_vec().into(),
        };
        self.find_fh(&fh).await.map_err(|_| FsError::Stale)
    }

    /// Finds or creates the inode for a filehandle, issuing GETATTR for
    /// strangers.
    pub(crate) async fn find_fh(self: &Arc<Self>, fh: &nfs_fh3) -> Result<Arc<NfsFile<P>>> {
        {
            let mut cache = self.cache.lock().expect("lock is poisoned");
            if let Some(file) = cache.find(&fh.data.to_vec()) {
                return Ok(file);
            }
        }
        let res: GETATTR3res = self
            .proto
            .getattr(GETATTR3args { object: fh.clone() })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => Ok(self.intern(fh, ok.obj_attributes)),
            Nfs3Result::Err((status, _)) => Err(map_nfs_status(status)),
        }
    }

    /// Inserts (or refreshes) the inode for a filehandle whose
    /// attributes are already known, e.g. from a READDIRPLUS entry.
    pub(crate) fn intern(self: &Arc<Self>, fh: &nfs_fh3, attr: fattr3) -> Arc<NfsFile<P>> {
        let key = fh.data.to_vec();
        let mut cache = self.cache.lock().expect("lock is poisoned");
        if let Some(file) = cache.find(&key) {
            file.update(attr);
            return file;
        }
        let file = Arc::new(NfsFile::new(Arc::downgrade(self), fh.clone(), attr));
        cache.insert(key, Arc::clone(&file));
        file
    }
}
