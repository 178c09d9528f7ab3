use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use polyfs_keyval::{Database, Namespace, WriteBatch};
use polyfs_types::xdr::{pack_to_vec, unpack_from_slice};
use polyfs_vfs::{
    Clock, FileCache, FileHandle, FileId, FileType, FilesystemId, FsError, Result,
};

use crate::keys;
use crate::meta::{FsMeta, InodeMeta, META_VERSION};
use crate::{DEFAULT_BLOCK_SIZE, ObjFile};

const META_NS: &str = "meta";
const DIR_NS: &str = "dir";
const DATA_NS: &str = "data";

/// A filesystem whose inodes, directory entries and data blocks live in
/// a key/value database.
pub struct ObjFilesystem {
    db: Database,
    meta_ns: Namespace,
    dir_ns: Namespace,
    data_ns: Namespace,
    superblock: Mutex<FsMeta>,
    next_id: AtomicU64,
    fsid: FilesystemId,
    block_size: u32,
    clock: Clock,
    cache: Mutex<FileCache<u64, ObjFile>>,
    root: tokio::sync::Mutex<Option<Arc<ObjFile>>>,
    file_count: AtomicU64,
}

impl ObjFilesystem {
    /// Opens the filesystem stored in `db`, creating a fresh superblock
    /// when the store is empty.
    pub async fn new(db: Database, clock: Clock, block_size: u32) -> Result<Arc<Self>> {
        let meta_ns = db.namespace(META_NS);
        let dir_ns = db.namespace(DIR_NS);
        let data_ns = db.namespace(DATA_NS);

        let superblock = match meta_ns.get(&keys::meta_key(FileId::SUPERBLOCK)) {
            Some(bytes) => {
                let sb: FsMeta = unpack_from_slice(&bytes).map_err(|err| {
                    tracing::error!(%err, "error decoding filesystem metadata");
                    FsError::Io
                })?;
                if sb.vers != META_VERSION {
                    tracing::error!(vers = sb.vers, "unexpected filesystem metadata version");
                    return Err(FsError::Io);
                }
                sb
            }
            None => {
                let sb = FsMeta::fresh();
                let mut batch = WriteBatch::new();
                batch.put(
                    &meta_ns,
                    keys::meta_key(FileId::SUPERBLOCK),
                    pack_to_vec(&sb).map_err(|_| FsError::Io)?,
                );
                db.commit(batch).await;
                sb
            }
        };

        let fsid = superblock.fsid.to_vec();
        let next_id = superblock.next_id;
        Ok(Arc::new(Self {
            db,
            meta_ns,
            dir_ns,
            data_ns,
            superblock: Mutex::new(superblock),
            next_id: AtomicU64::new(next_id),
            fsid,
            block_size,
            clock,
            cache: Mutex::new(FileCache::default()),
            root: tokio::sync::Mutex::new(None),
            file_count: AtomicU64::new(0),
        }))
    }

    /// Opens the filesystem with the default block size and system clock.
    pub async fn open(db: Database) -> Result<Arc<Self>> {
        Self::new(db, Clock::system(), DEFAULT_BLOCK_SIZE).await
    }

    /// The root directory, created on first use with mode 0755 and its
    /// `.`/`..` entries written in one transaction.
    pub async fn root(self: &Arc<Self>) -> Result<Arc<ObjFile>> {
        let mut root_slot = self.root.lock().await;
        if let Some(root) = &*root_slot {
            return Ok(Arc::clone(root));
        }

        let root = match self.find(FileId::ROOT) {
            Ok(root) => root,
            Err(FsError::NotFound) => {
                let now = self.now();
                let mut meta = InodeMeta::new(FileId::ROOT, FileType::Directory, self.block_size);
                meta.attr.mode = 0o755;
                meta.attr.nlink = 2;
                meta.attr.size = 2;
                meta.attr.atime = now;
                meta.attr.mtime = now;
                meta.attr.ctime = now;
                meta.attr.birthtime = now;

                let mut batch = WriteBatch::new();
                self.put_dir_entry(&mut batch, FileId::ROOT, ".", FileId::ROOT)?;
                self.put_dir_entry(&mut batch, FileId::ROOT, "..", FileId::ROOT)?;
                self.put_inode(&mut batch, &meta)?;
                self.db.commit(batch).await;

                let root = Arc::new(ObjFile::from_meta(Arc::downgrade(self), meta));
                self.add(&root);
                root
            }
            Err(err) => return Err(err),
        };
        *root_slot = Some(Arc::clone(&root));
        Ok(root)
    }

    #[must_use]
    pub fn fsid(&self) -> &FilesystemId {
        &self.fsid
    }

    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub const fn clock(&self) -> &Clock {
        &self.clock
    }

    #[must_use]
    pub fn file_count(&self) -> u64 {
        self.file_count.load(Ordering::Relaxed)
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_nanos()
    }

    pub(crate) const fn meta_ns(&self) -> &Namespace {
        &self.meta_ns
    }

    pub(crate) const fn dir_ns(&self) -> &Namespace {
        &self.dir_ns
    }

    pub(crate) const fn data_ns(&self) -> &Namespace {
        &self.data_ns
    }

    /// Resolves a wire file handle minted by this filesystem.
    pub fn find_handle(self: &Arc<Self>, handle: &FileHandle) -> Result<Arc<ObjFile>> {
        let rest = handle.strip_fsid(&self.fsid).ok_or(FsError::Stale)?;
        let fileid: u64 = unpack_from_slice(rest).map_err(|_| FsError::Stale)?;
        self.find(FileId(fileid)).map_err(|_| FsError::Stale)
    }

    /// Loads an inode, going through the LRU cache.
    pub fn find(self: &Arc<Self>, fileid: FileId) -> Result<Arc<ObjFile>> {
        {
            let mut cache = self.cache.lock().expect("lock is poisoned");
            if let Some(file) = cache.find(&fileid.0) {
                return Ok(file);
            }
        }

        let bytes = self
            .meta_ns
            .get(&keys::meta_key(fileid))
            .ok_or(FsError::NotFound)?;
        let meta: InodeMeta = unpack_from_slice(&bytes).map_err(|err| {
            tracing::error!(%fileid, %err, "error decoding file metadata");
            FsError::Io
        })?;
        if meta.vers != META_VERSION {
            tracing::error!(%fileid, vers = meta.vers, "unexpected file metadata version");
            return Err(FsError::Io);
        }

        let mut cache = self.cache.lock().expect("lock is poisoned");
        if let Some(file) = cache.find(&fileid.0) {
            return Ok(file);
        }
        let file = Arc::new(ObjFile::from_meta(Arc::downgrade(self), meta));
        cache.insert(fileid.0, Arc::clone(&file));
        Ok(file)
    }

    /// Allocates the next file id; persisted through the superblock
    /// write that accompanies every create.
    pub(crate) fn alloc_id(&self) -> FileId {
        FileId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn add(&self, file: &Arc<ObjFile>) {
        let mut cache = self.cache.lock().expect("lock is poisoned");
        cache.insert(file.fileid().0, Arc::clone(file));
        self.file_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn forget(&self, fileid: FileId) {
        let mut cache = self.cache.lock().expect("lock is poisoned");
        cache.remove(&fileid.0);
        // Saturating: files loaded from disk were never counted as
        // created in this process.
        let _ = self
            .file_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Adds the superblock (with the current id watermark) to a batch.
    pub(crate) fn put_superblock(&self, batch: &mut WriteBatch) -> Result<()> {
        let mut sb = self.superblock.lock().expect("lock is poisoned");
        sb.next_id = self.next_id.load(Ordering::SeqCst);
        batch.put(
            &self.meta_ns,
            keys::meta_key(FileId::SUPERBLOCK),
            pack_to_vec(&*sb).map_err(|_| FsError::Io)?,
        );
        Ok(())
    }

    pub(crate) fn put_inode(&self, batch: &mut WriteBatch, meta: &InodeMeta) -> Result<()> {
        batch.put(
            &self.meta_ns,
            keys::meta_key(meta.fileid()),
            pack_to_vec(meta).map_err(|_| FsError::Io)?,
        );
        Ok(())
    }

    pub(crate) fn put_dir_entry(
        &self,
        batch: &mut WriteBatch,
        dir: FileId,
        name: &str,
        child: FileId,
    ) -> Result<()> {
        batch.put(
            &self.dir_ns,
            keys::dir_key(dir, name),
            pack_to_vec(&crate::meta::DirEntryValue { fileid: child.0 }).map_err(|_| FsError::Io)?,
        );
        Ok(())
    }

    /// Reads a directory entry straight from the store.
    pub(crate) fn dir_entry(&self, dir: FileId, name: &str) -> Option<FileId> {
        let bytes = self.dir_ns.get(&keys::dir_key(dir, name))?;
        let entry: crate::meta::DirEntryValue = unpack_from_slice(&bytes).ok()?;
        Some(FileId(entry.fileid))
    }

    pub(crate) async fn commit(&self, batch: WriteBatch) {
        self.db.commit(batch).await;
    }
}
