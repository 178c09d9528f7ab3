use std::collections::HashMap;
use std::sync::{Arc, Weak};

use polyfs_keyval::WriteBatch;
use polyfs_types::xdr::pack_to_vec;
use polyfs_vfs::{
    AccessFlags, Credential, FileHandle, FileId, FileType, FsError, Fsattr, ModeFlags, NAME_MAX,
    OpenFlags, PosixAttr, Result, Setattr, check_access,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::attr::apply_setattr;
use crate::dir::ObjDirIter;
use crate::fs::ObjFilesystem;
use crate::keys;
use crate::meta::InodeMeta;
use crate::openfile::ObjOpenFile;

/// What kind of inode a create operation makes.
enum NewFile {
    Regular,
    Directory,
    Symlink(String),
    Fifo,
}

impl NewFile {
    const fn file_type(&self) -> FileType {
        match self {
            Self::Regular => FileType::File,
            Self::Directory => FileType::Directory,
            Self::Symlink(_) => FileType::Symlink,
            Self::Fifo => FileType::Fifo,
        }
    }
}

/// One inode of an [`ObjFilesystem`]. All operations serialise on the
/// per-inode mutex; operations touching two inodes take both locks in
/// ascending file id order.
pub struct ObjFile {
    fs: Weak<ObjFilesystem>,
    fileid: FileId,
    state: Mutex<InodeMeta>,
}

impl ObjFile {
    pub(crate) fn from_meta(fs: Weak<ObjFilesystem>, meta: InodeMeta) -> Self {
        Self {
            fs,
            fileid: meta.fileid(),
            state: Mutex::new(meta),
        }
    }

    #[must_use]
    pub const fn fileid(&self) -> FileId {
        self.fileid
    }

    pub fn filesystem(&self) -> Result<Arc<ObjFilesystem>> {
        self.fs.upgrade().ok_or(FsError::Stale)
    }

    /// The wire handle: the filesystem id followed by the encoded file
    /// id.
    pub fn handle(&self) -> Result<FileHandle> {
        let fs = self.filesystem()?;
        let mut data = fs.fsid().clone();
        data.extend_from_slice(&pack_to_vec(&self.fileid.0).map_err(|_| FsError::Io)?);
        FileHandle::new(data)
    }

    /// A snapshot of the inode attributes.
    pub async fn getattr(&self) -> PosixAttr {
        self.state.lock().await.attr.clone()
    }

    /// Approximate bytes of data stored for this file.
    #[must_use]
    pub fn used(&self) -> u64 {
        let Ok(fs) = self.filesystem() else {
            return 0;
        };
        let (start, end) = keys::data_range(self.fileid);
        fs.data_ns().space_used(&start, &end)
    }

    /// True if the credential may perform the requested access. Never
    /// fails; permission problems just yield `false`.
    pub async fn access(&self, cred: &Credential, accmode: u32) -> bool {
        let meta = self.state.lock().await;
        Self::check_meta_access(&meta, cred, accmode).is_ok()
    }

    /// Applies a staged attribute mutation. A size change purges data
    /// beyond the new size and zeroes the tail of the last block in the
    /// same transaction.
    pub async fn setattr(&self, cred: &Credential, staged: &Setattr) -> Result<()> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        let old_size = meta.attr.size;
        apply_setattr(cred, staged, &mut meta.attr)?;
        meta.attr.ctime = fs.now();

        let mut batch = WriteBatch::new();
        if meta.attr.size != old_size {
            meta.attr.mtime = meta.attr.ctime;
            Self::truncate_blocks(&fs, &meta, meta.attr.size, &mut batch);
        }
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;
        Ok(())
    }

    /// Looks up a name in this directory. Requires execute permission.
    pub async fn lookup(&self, cred: &Credential, name: &str) -> Result<Arc<ObjFile>> {
        let fs = self.filesystem()?;
        let meta = self.state.lock().await;
        Self::check_meta_access(&meta, cred, AccessFlags::EXECUTE)?;
        Self::lookup_locked(&fs, &meta, name)
    }

    /// Opens (and possibly creates) `name` in this directory.
    pub async fn open_named(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        flags: u32,
        staged: &Setattr,
    ) -> Result<ObjOpenFile> {
        let fs = self.filesystem()?;
        let (file, created) = {
            let mut meta = self.state.lock().await;
            Self::check_meta_access(&meta, cred, AccessFlags::EXECUTE)?;
            if flags & OpenFlags::CREATE == 0 {
                (Self::lookup_locked(&fs, &meta, name)?, false)
            } else {
                match Self::lookup_locked(&fs, &meta, name) {
                    Ok(existing) => {
                        if flags & OpenFlags::EXCLUSIVE != 0 {
                            return Err(FsError::Exists);
                        }
                        (existing, false)
                    }
                    Err(FsError::NotFound) => {
                        let file = Self::create_locked(
                            &fs,
                            &mut meta,
                            cred,
                            &NewFile::Regular,
                            name,
                            staged,
                        )
                        .await?;
                        (file, true)
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        if !created {
            let mut accmode = 0;
            if flags & OpenFlags::READ != 0 {
                accmode |= AccessFlags::READ;
            }
            if flags & OpenFlags::WRITE != 0 {
                accmode |= AccessFlags::WRITE;
            }
            {
                let meta = file.state.lock().await;
                Self::check_meta_access(&meta, cred, accmode)?;
            }
            if flags & OpenFlags::TRUNCATE != 0 {
                file.truncate_to_zero(&fs).await?;
            }
        }

        Ok(ObjOpenFile::new(cred.clone(), file, flags))
    }

    /// Opens this file directly.
    pub async fn open(self: &Arc<Self>, cred: &Credential, flags: u32) -> Result<ObjOpenFile> {
        let mut accmode = 0;
        if flags & OpenFlags::READ != 0 {
            accmode |= AccessFlags::READ;
        }
        if flags & OpenFlags::WRITE != 0 {
            accmode |= AccessFlags::WRITE;
        }
        {
            let meta = self.state.lock().await;
            Self::check_meta_access(&meta, cred, accmode)?;
        }
        Ok(ObjOpenFile::new(cred.clone(), Arc::clone(self), flags))
    }

    /// The target of a symbolic link; updates the access time.
    pub async fn readlink(&self, cred: &Credential) -> Result<String> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        if meta.attr.file_type != FileType::Symlink {
            return Err(FsError::Invalid);
        }
        Self::check_meta_access(&meta, cred, AccessFlags::READ)?;

        let now = fs.now();
        meta.attr.atime = now;
        meta.attr.ctime = now;
        let mut batch = WriteBatch::new();
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;

        String::from_utf8(meta.extra.clone()).map_err(|_| FsError::Invalid)
    }

    pub async fn mkdir(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        staged: &Setattr,
    ) -> Result<Arc<ObjFile>> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        Self::create_locked(&fs, &mut meta, cred, &NewFile::Directory, name, staged).await
    }

    pub async fn symlink(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        target: &str,
        staged: &Setattr,
    ) -> Result<Arc<ObjFile>> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        Self::create_locked(
            &fs,
            &mut meta,
            cred,
            &NewFile::Symlink(target.to_owned()),
            name,
            staged,
        )
        .await
    }

    pub async fn mkfifo(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        staged: &Setattr,
    ) -> Result<Arc<ObjFile>> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        Self::create_locked(&fs, &mut meta, cred, &NewFile::Fifo, name, staged).await
    }

    /// Removes a non-directory entry.
    pub async fn remove(self: &Arc<Self>, cred: &Credential, name: &str) -> Result<()> {
        self.unlink_entry(cred, name, false).await
    }

    /// Removes an empty directory.
    pub async fn rmdir(self: &Arc<Self>, cred: &Credential, name: &str) -> Result<()> {
        self.unlink_entry(cred, name, true).await
    }

    /// Links an existing file into this directory under `name`.
    pub async fn link(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        target: &Arc<ObjFile>,
    ) -> Result<()> {
        let fs = self.filesystem()?;
        if !Weak::ptr_eq(&self.fs, &target.fs) {
            return Err(FsError::CrossDevice);
        }
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        if name == "." || name == ".." {
            return Err(FsError::Invalid);
        }
        if self.fileid == target.fileid {
            return Err(FsError::Invalid);
        }

        let (mut parent, mut child) = Self::lock_two(self, target).await;
        if !parent.is_dir() {
            return Err(FsError::NotDir);
        }
        if child.is_dir() {
            return Err(FsError::IsDir);
        }
        if fs.dir_entry(self.fileid, name).is_some() {
            return Err(FsError::Exists);
        }
        Self::check_meta_access(&parent, cred, AccessFlags::WRITE | AccessFlags::EXECUTE)?;

        let now = fs.now();
        let mut batch = WriteBatch::new();
        parent.attr.size += 1;
        parent.attr.ctime = now;
        parent.attr.mtime = now;
        child.attr.nlink += 1;
        child.attr.ctime = now;
        fs.put_dir_entry(&mut batch, self.fileid, name, target.fileid)?;
        fs.put_inode(&mut batch, &parent)?;
        fs.put_inode(&mut batch, &child)?;
        fs.commit(batch).await;
        Ok(())
    }

    /// Atomically renames `from_dir/from_name` to `self/to_name`,
    /// replacing an existing target unless it is a non-empty directory.
    pub async fn rename(
        self: &Arc<Self>,
        cred: &Credential,
        to_name: &str,
        from_dir: &Arc<ObjFile>,
        from_name: &str,
    ) -> Result<()> {
        let fs = self.filesystem()?;
        if !Weak::ptr_eq(&self.fs, &from_dir.fs) {
            return Err(FsError::CrossDevice);
        }
        if to_name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        for name in [from_name, to_name] {
            if name == "." || name == ".." || name.is_empty() {
                return Err(FsError::Invalid);
            }
        }
        let same_dir = self.fileid == from_dir.fileid;
        if same_dir && from_name == to_name {
            return if fs.dir_entry(self.fileid, from_name).is_some() {
                Ok(())
            } else {
                Err(FsError::NotFound)
            };
        }

        loop {
            // Resolve the participants without holding any inode lock,
            // then lock them all in ascending id order and re-verify.
            let from_child_id = fs
                .dir_entry(from_dir.fileid, from_name)
                .ok_or(FsError::NotFound)?;
            let to_child_id = fs.dir_entry(self.fileid, to_name);
            let from_child = match fs.find(from_child_id) {
                Ok(file) => file,
                // Unlinked between the entry read and the load: retry.
                Err(FsError::NotFound) => continue,
                Err(err) => return Err(err),
            };
            let to_child = match to_child_id {
                Some(id) => match fs.find(id) {
                    Ok(file) => Some(file),
                    Err(FsError::NotFound) => continue,
                    Err(err) => return Err(err),
                },
                None => None,
            };

            let mut parts: Vec<&Arc<Self>> = vec![self, from_dir, &from_child];
            if let Some(target) = &to_child {
                parts.push(target);
            }
            parts.sort_by_key(|f| f.fileid.0);
            parts.dedup_by_key(|f| f.fileid.0);
            let mut guards: Vec<MutexGuard<'_, InodeMeta>> = Vec::with_capacity(parts.len());
            for part in &parts {
                guards.push(part.state.lock().await);
            }

            if fs.dir_entry(from_dir.fileid, from_name) != Some(from_child_id)
                || fs.dir_entry(self.fileid, to_name) != to_child_id
            {
                drop(guards);
                continue;
            }

            let mut metas: HashMap<u64, InodeMeta> = parts
                .iter()
                .zip(guards.iter())
                .map(|(part, guard)| (part.fileid.0, (**guard).clone()))
                .collect();

            self.rename_locked(
                &fs,
                cred,
                &mut metas,
                from_dir,
                from_name,
                to_name,
                from_child_id,
                to_child_id,
            )
            .await?;

            // Push the committed snapshots back into the inode states.
            for (part, guard) in parts.iter().zip(guards.iter_mut()) {
                if let Some(meta) = metas.remove(&part.fileid.0) {
                    **guard = meta;
                }
            }
            return Ok(());
        }
    }

    /// Streams this directory's entries; `seek` resumes after a cookie
    /// returned by an earlier iteration.
    pub async fn readdir(&self, cred: &Credential, seek: u64) -> Result<ObjDirIter> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;
        if !meta.is_dir() {
            return Err(FsError::NotDir);
        }
        Self::check_meta_access(&meta, cred, AccessFlags::READ)?;

        let now = fs.now();
        meta.attr.atime = now;
        meta.attr.ctime = now;
        let mut batch = WriteBatch::new();
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;

        Ok(ObjDirIter::new(fs, self.fileid, seek))
    }

    /// Filesystem attributes as seen from this file.
    pub async fn fsstat(&self, cred: &Credential) -> Result<Fsattr> {
        let fs = self.filesystem()?;
        let meta = self.state.lock().await;
        Self::check_meta_access(&meta, cred, AccessFlags::READ)?;
        Ok(Fsattr {
            total_files: fs.file_count(),
            link_max: u32::MAX,
            name_max: u32::try_from(NAME_MAX).unwrap_or(u32::MAX),
            ..Fsattr::default()
        })
    }

    // ---- internals --------------------------------------------------

    pub(crate) fn check_meta_access(meta: &InodeMeta, cred: &Credential, accmode: u32) -> Result<()> {
        check_access(meta.attr.uid, meta.attr.gid, meta.attr.mode, cred, accmode)
    }

    fn lookup_locked(
        fs: &Arc<ObjFilesystem>,
        meta: &InodeMeta,
        name: &str,
    ) -> Result<Arc<ObjFile>> {
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        if !meta.is_dir() {
            return Err(FsError::NotDir);
        }
        let id = fs
            .dir_entry(meta.fileid(), name)
            .ok_or(FsError::NotFound)?;
        fs.find(id)
    }

    /// Creates a new inode and its directory entry in one transaction,
    /// with the parent inode locked by the caller.
    async fn create_locked(
        fs: &Arc<ObjFilesystem>,
        parent: &mut InodeMeta,
        cred: &Credential,
        kind: &NewFile,
        name: &str,
        staged: &Setattr,
    ) -> Result<Arc<ObjFile>> {
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        if name.is_empty() || name == "." || name == ".." {
            return Err(FsError::Invalid);
        }
        if !parent.is_dir() {
            return Err(FsError::NotDir);
        }
        Self::check_meta_access(parent, cred, AccessFlags::WRITE | AccessFlags::EXECUTE)?;
        if fs.dir_entry(parent.fileid(), name).is_some() {
            return Err(FsError::Exists);
        }

        let now = fs.now();
        let id = fs.alloc_id();
        let mut meta = InodeMeta::new(id, kind.file_type(), fs.block_size());
        meta.attr.uid = cred.uid();
        // Setgid directories hand their group down to new children.
        meta.attr.gid = if parent.attr.mode & ModeFlags::SETGID != 0 {
            parent.attr.gid
        } else {
            cred.gid()
        };
        meta.attr.atime = now;
        meta.attr.mtime = now;
        meta.attr.ctime = now;
        meta.attr.birthtime = now;
        apply_setattr(cred, staged, &mut meta.attr)?;

        let mut batch = WriteBatch::new();
        match kind {
            NewFile::Directory => {
                fs.put_dir_entry(&mut batch, id, ".", id)?;
                fs.put_dir_entry(&mut batch, id, "..", parent.fileid())?;
                meta.attr.size = 2;
                meta.attr.nlink = 1;
                if parent.attr.mode & ModeFlags::SETGID != 0 {
                    meta.attr.mode |= ModeFlags::SETGID;
                }
                parent.attr.nlink += 1;
            }
            NewFile::Symlink(target) => {
                meta.attr.size = target.len() as u64;
                meta.extra = target.clone().into_bytes();
            }
            NewFile::Regular | NewFile::Fifo => {}
        }

        // The named entry itself.
        parent.attr.size += 1;
        parent.attr.ctime = now;
        parent.attr.mtime = now;
        meta.attr.nlink += 1;
        fs.put_dir_entry(&mut batch, parent.fileid(), name, id)?;

        fs.put_superblock(&mut batch)?;
        fs.put_inode(&mut batch, &meta)?;
        fs.put_inode(&mut batch, parent)?;

        let file = Arc::new(ObjFile::from_meta(Arc::downgrade(fs), meta));
        fs.add(&file);
        fs.commit(batch).await;
        tracing::debug!(fileid = %id, name, "created file");
        Ok(file)
    }

    async fn unlink_entry(self: &Arc<Self>, cred: &Credential, name: &str, want_dir: bool) -> Result<()> {
        let fs = self.filesystem()?;
        if name == "." || name == ".." || name.is_empty() {
            return Err(FsError::Invalid);
        }
        loop {
            let child_id = {
                let meta = self.state.lock().await;
                if !meta.is_dir() {
                    return Err(FsError::NotDir);
                }
                fs.dir_entry(self.fileid, name).ok_or(FsError::NotFound)?
            };
            if child_id == self.fileid {
                return Err(FsError::Invalid);
            }
            let child = fs.find(child_id)?;

            let (mut parent, mut child_meta) = Self::lock_two(self, &child).await;
            if fs.dir_entry(self.fileid, name) != Some(child_id) {
                continue;
            }
            Self::check_meta_access(&parent, cred, AccessFlags::WRITE | AccessFlags::EXECUTE)?;
            if want_dir && !child_meta.is_dir() {
                return Err(FsError::NotDir);
            }
            if !want_dir && child_meta.is_dir() {
                return Err(FsError::IsDir);
            }
            Self::check_sticky(&parent.attr, cred, &child_meta.attr)?;

            let mut batch = WriteBatch::new();
            Self::unlink_locked(&fs, &mut parent, &mut child_meta, name, &mut batch)?;
            fs.commit(batch).await;
            return Ok(());
        }
    }

    /// Removes the entry `parent/name` referring to `child`, destroying
    /// the child inode when its last link goes away. Both inodes are
    /// locked by the caller.
    fn unlink_locked(
        fs: &Arc<ObjFilesystem>,
        parent: &mut InodeMeta,
        child: &mut InodeMeta,
        name: &str,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        let child_id = child.fileid();
        if child.is_dir() {
            if child.attr.size != 2 {
                return Err(FsError::NotEmpty);
            }
            tracing::debug!(fileid = %child_id, "deleting directory");
            batch.remove(fs.dir_ns(), keys::dir_key(child_id, "."));
            batch.remove(fs.dir_ns(), keys::dir_key(child_id, ".."));
            batch.remove(fs.meta_ns(), keys::meta_key(child_id));
            child.attr.nlink = 0;
            parent.attr.nlink -= 1;
            fs.forget(child_id);
        } else {
            child.attr.nlink -= 1;
            if child.attr.nlink > 0 {
                child.attr.ctime = fs.now();
                fs.put_inode(batch, child)?;
            } else {
                tracing::debug!(fileid = %child_id, "deleting file");
                Self::purge_data(fs, child_id, batch);
                batch.remove(fs.meta_ns(), keys::meta_key(child_id));
                fs.forget(child_id);
            }
        }

        batch.remove(fs.dir_ns(), keys::dir_key(parent.fileid(), name));
        parent.attr.size -= 1;
        let now = fs.now();
        parent.attr.ctime = now;
        parent.attr.mtime = now;
        fs.put_inode(batch, parent)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn rename_locked(
        self: &Arc<Self>,
        fs: &Arc<ObjFilesystem>,
        cred: &Credential,
        metas: &mut HashMap<u64, InodeMeta>,
        from_dir: &Arc<ObjFile>,
        from_name: &str,
        to_name: &str,
        from_child_id: FileId,
        to_child_id: Option<FileId>,
    ) -> Result<()> {
        let same_dir = self.fileid == from_dir.fileid;
        let now = fs.now();

        // Checks against the snapshots.
        {
            let to_dir = metas.get(&self.fileid.0).ok_or(FsError::Io)?;
            if !to_dir.is_dir() {
                return Err(FsError::NotDir);
            }
            Self::check_meta_access(to_dir, cred, AccessFlags::WRITE | AccessFlags::EXECUTE)?;
        }
        {
            let from_meta = metas.get(&from_dir.fileid.0).ok_or(FsError::Io)?;
            if !from_meta.is_dir() {
                return Err(FsError::NotDir);
            }
            Self::check_meta_access(from_meta, cred, AccessFlags::WRITE | AccessFlags::EXECUTE)?;
            let child_attr = &metas.get(&from_child_id.0).ok_or(FsError::Io)?.attr;
            Self::check_sticky(&from_meta.attr, cred, child_attr)?;
        }
        if let Some(target_id) = to_child_id {
            // Overwriting either of the directories involved would tie
            // the tree into a knot.
            if target_id == self.fileid || target_id == from_dir.fileid {
                return Err(FsError::Invalid);
            }
            let to_dir_attr = &metas.get(&self.fileid.0).ok_or(FsError::Io)?.attr;
            let target_attr = &metas.get(&target_id.0).ok_or(FsError::Io)?.attr;
            Self::check_sticky(to_dir_attr, cred, target_attr)?;
        }

        let child_is_dir = metas.get(&from_child_id.0).ok_or(FsError::Io)?.is_dir();

        // Moving a directory into its own descendant would orphan the
        // subtree; walk the destination's parent chain to rule it out.
        if child_is_dir && !same_dir {
            let mut cur = self.fileid;
            while cur != FileId::ROOT {
                if cur == from_child_id {
                    return Err(FsError::Invalid);
                }
                cur = fs.dir_entry(cur, "..").ok_or(FsError::Io)?;
            }
        }

        // A hard-link alias: both names refer to the same inode, so the
        // rename collapses to dropping the source entry.
        if to_child_id == Some(from_child_id) {
            let mut batch = WriteBatch::new();
            let mut child = metas.remove(&from_child_id.0).ok_or(FsError::Io)?;
            child.attr.nlink -= 1;
            child.attr.ctime = now;
            fs.put_inode(&mut batch, &child)?;
            metas.insert(from_child_id.0, child);

            let mut from_meta = metas.remove(&from_dir.fileid.0).ok_or(FsError::Io)?;
            from_meta.attr.size -= 1;
            from_meta.attr.ctime = now;
            from_meta.attr.mtime = now;
            batch.remove(fs.dir_ns(), keys::dir_key(from_dir.fileid, from_name));
            fs.put_inode(&mut batch, &from_meta)?;
            metas.insert(from_dir.fileid.0, from_meta);

            fs.commit(batch).await;
            return Ok(());
        }

        let mut batch = WriteBatch::new();
        let mut to_dir = metas.remove(&self.fileid.0).ok_or(FsError::Io)?;
        let mut from_meta = if same_dir {
            None
        } else {
            Some(metas.remove(&from_dir.fileid.0).ok_or(FsError::Io)?)
        };
        let mut child = metas.remove(&from_child_id.0).ok_or(FsError::Io)?;

        // Replace an existing target atomically.
        if let Some(target_id) = to_child_id {
            let mut target = metas.remove(&target_id.0).ok_or(FsError::Io)?;
            if target.is_dir() && !child_is_dir {
                return Err(FsError::IsDir);
            }
            if !target.is_dir() && child_is_dir {
                return Err(FsError::NotDir);
            }
            tracing::debug!(name = to_name, "rename: target name exists");
            if target.is_dir() {
                if target.attr.size != 2 {
                    return Err(FsError::NotEmpty);
                }
                batch.remove(fs.dir_ns(), keys::dir_key(target_id, "."));
                batch.remove(fs.dir_ns(), keys::dir_key(target_id, ".."));
                batch.remove(fs.meta_ns(), keys::meta_key(target_id));
                target.attr.nlink = 0;
                to_dir.attr.nlink -= 1;
                fs.forget(target_id);
            } else {
                target.attr.nlink -= 1;
                if target.attr.nlink > 0 {
                    target.attr.ctime = now;
                    fs.put_inode(&mut batch, &target)?;
                } else {
                    Self::purge_data(fs, target_id, &mut batch);
                    batch.remove(fs.meta_ns(), keys::meta_key(target_id));
                    fs.forget(target_id);
                }
            }
            batch.remove(fs.dir_ns(), keys::dir_key(self.fileid, to_name));
            to_dir.attr.size -= 1;
            metas.insert(target_id.0, target);
        }

        // Write the destination entry and drop the source entry.
        to_dir.attr.size += 1;
        to_dir.attr.ctime = now;
        to_dir.attr.mtime = now;
        fs.put_dir_entry(&mut batch, self.fileid, to_name, from_child_id)?;

        {
            let source = from_meta.as_mut().unwrap_or(&mut to_dir);
            source.attr.size -= 1;
            source.attr.ctime = now;
            source.attr.mtime = now;
            batch.remove(fs.dir_ns(), keys::dir_key(from_dir.fileid, from_name));
        }

        // A directory moving between parents takes its `..` with it.
        if child_is_dir && !same_dir {
            if let Some(from_meta) = from_meta.as_mut() {
                from_meta.attr.nlink -= 1;
            }
            to_dir.attr.nlink += 1;
            fs.put_dir_entry(&mut batch, from_child_id, "..", self.fileid)?;
            child.attr.ctime = now;
            child.attr.mtime = now;
            fs.put_inode(&mut batch, &child)?;
        }

        fs.put_inode(&mut batch, &to_dir)?;
        if let Some(from_meta) = &from_meta {
            fs.put_inode(&mut batch, from_meta)?;
        }
        fs.commit(batch).await;

        metas.insert(self.fileid.0, to_dir);
        if let Some(from_meta) = from_meta {
            metas.insert(from_dir.fileid.0, from_meta);
        }
        metas.insert(from_child_id.0, child);
        Ok(())
    }

    /// If the sticky bit is set on the directory, only the owner of the
    /// entry (or a privileged credential) may remove or replace it.
    fn check_sticky(dir: &PosixAttr, cred: &Credential, entry: &PosixAttr) -> Result<()> {
        if cred.privileged() {
            return Ok(());
        }
        if dir.mode & ModeFlags::STICKY != 0 && cred.uid() != entry.uid {
            return Err(FsError::Perm);
        }
        Ok(())
    }

    /// Truncates file data to zero length in its own transaction; used
    /// by `open(..., TRUNCATE)`.
    async fn truncate_to_zero(&self, fs: &Arc<ObjFilesystem>) -> Result<()> {
        let mut meta = self.state.lock().await;
        if meta.attr.size == 0 {
            return Ok(());
        }
        meta.attr.size = 0;
        let now = fs.now();
        meta.attr.ctime = now;
        meta.attr.mtime = now;
        let mut batch = WriteBatch::new();
        Self::truncate_blocks(fs, &meta, 0, &mut batch);
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;
        Ok(())
    }

    /// Adds block purges for everything past `new_size`, zeroing the
    /// tail of a partial final block so a later extension cannot expose
    /// stale bytes.
    pub(crate) fn truncate_blocks(
        fs: &Arc<ObjFilesystem>,
        meta: &InodeMeta,
        new_size: u64,
        batch: &mut WriteBatch,
    ) {
        let fileid = meta.fileid();
        let bs = u64::from(meta.block_size);
        let purge_from = new_size.div_ceil(bs) * bs;

        let (start, end) = keys::data_range_from(fileid, purge_from);
        let mut cursor = fs.data_ns().cursor_range(&start, &end);
        while cursor.valid() {
            if let Some(key) = cursor.key() {
                batch.remove(fs.data_ns(), key.to_vec());
            }
            cursor.next();
        }

        let tail = new_size % bs;
        if tail > 0 {
            let block_off = new_size - tail;
            let key = keys::data_key(fileid, block_off);
            if let Some(mut block) = fs.data_ns().get(&key) {
                block.resize(usize::try_from(bs).unwrap_or(usize::MAX), 0);
                let tail = usize::try_from(tail).unwrap_or(usize::MAX);
                block[tail..].fill(0);
                batch.put(fs.data_ns(), key, block);
            }
        }
    }

    /// Removes every data block of a file.
    fn purge_data(fs: &Arc<ObjFilesystem>, fileid: FileId, batch: &mut WriteBatch) {
        let (start, end) = keys::data_range(fileid);
        let mut cursor = fs.data_ns().cursor_range(&start, &end);
        while cursor.valid() {
            if let Some(key) = cursor.key() {
                batch.remove(fs.data_ns(), key.to_vec());
            }
            cursor.next();
        }
    }

    /// Locks two distinct inodes in ascending file id order, returning
    /// the guards in (self, other) order.
    async fn lock_two<'a>(
        a: &'a Self,
        b: &'a Self,
    ) -> (MutexGuard<'a, InodeMeta>, MutexGuard<'a, InodeMeta>) {
        debug_assert_ne!(a.fileid, b.fileid);
        if a.fileid < b.fileid {
            let ga = a.state.lock().await;
            let gb = b.state.lock().await;
            (ga, gb)
        } else {
            let gb = b.state.lock().await;
            let ga = a.state.lock().await;
            (ga, gb)
        }
    }

    // ---- data i/o (used by ObjOpenFile) ------------------------------

    /// Reads up to `len` bytes at `offset`, zero-filling holes and
    /// clipping to the file size. Returns the data and the eof flag.
    pub(crate) async fn read_at(&self, offset: u64, len: u32) -> Result<(Vec<u8>, bool)> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;

        let now = fs.now();
        meta.attr.atime = now;
        meta.attr.ctime = now;
        let mut batch = WriteBatch::new();
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;

        let size = meta.attr.size;
        let bs = u64::from(meta.block_size);
        if offset >= size {
            return Ok((Vec::new(), true));
        }
        let mut len = u64::from(len);
        let eof = offset + len >= size;
        if eof {
            len = size - offset;
        }

        let out_len = usize::try_from(len).map_err(|_| FsError::Invalid)?;
        let mut out = vec![0u8; out_len];
        let mut pos = 0u64;
        let mut block = offset / bs;
        let mut boff = offset % bs;
        while pos < len {
            let chunk = (bs - boff).min(len - pos);
            let key = keys::data_key(self.fileid, block * bs);
            if let Some(stored) = fs.data_ns().get(&key) {
                let from = usize::try_from(boff).map_err(|_| FsError::Invalid)?;
                let to = usize::try_from(boff + chunk).map_err(|_| FsError::Invalid)?;
                let at = usize::try_from(pos).map_err(|_| FsError::Invalid)?;
                if let Some(src) = stored.get(from..to) {
                    out[at..at + src.len()].copy_from_slice(src);
                }
            }
            pos += chunk;
            boff = 0;
            block += 1;
        }
        Ok((out, eof))
    }

    /// Writes `data` at `offset`, merging partial blocks and extending
    /// the file size; data blocks, size and times commit as one batch.
    pub(crate) async fn write_at(&self, offset: u64, data: &[u8]) -> Result<u32> {
        let fs = self.filesystem()?;
        let mut meta = self.state.lock().await;

        let bs = u64::from(meta.block_size);
        let bs_usize = usize::try_from(bs).map_err(|_| FsError::Invalid)?;
        let len = data.len() as u64;
        let mut batch = WriteBatch::new();

        let mut pos = 0u64;
        let mut block = offset / bs;
        let mut boff = offset % bs;
        while pos < len {
            let chunk = (bs - boff).min(len - pos);
            let key = keys::data_key(self.fileid, block * bs);
            let at = usize::try_from(pos).map_err(|_| FsError::Invalid)?;
            let chunk_usize = usize::try_from(chunk).map_err(|_| FsError::Invalid)?;
            if chunk == bs {
                // Whole-block overwrite.
                batch.put(fs.data_ns(), key, data[at..at + bs_usize].to_vec());
            } else {
                // Merge into the existing block, or into zeros for a
                // fresh or sparse block.
                let mut stored = fs
                    .data_ns()
                    .get(&key)
                    .unwrap_or_else(|| vec![0u8; bs_usize]);
                stored.resize(bs_usize, 0);
                let from = usize::try_from(boff).map_err(|_| FsError::Invalid)?;
                stored[from..from + chunk_usize].copy_from_slice(&data[at..at + chunk_usize]);
                batch.put(fs.data_ns(), key, stored);
            }
            pos += chunk;
            boff = 0;
            block += 1;
        }

        let now = fs.now();
        meta.attr.ctime = now;
        meta.attr.mtime = now;
        if offset + len > meta.attr.size {
            meta.attr.size = offset + len;
        }
        fs.put_inode(&mut batch, &meta)?;
        fs.commit(batch).await;

        Ok(u32::try_from(len).unwrap_or(u32::MAX))
    }
}
