use std::sync::{Arc, Mutex, Weak};

use polyfs_types::nfs3::{
    ACCESS3_EXECUTE, ACCESS3_LOOKUP, ACCESS3_MODIFY, ACCESS3_READ, ACCESS3args, CREATE3args,
    FSSTAT3args, GETATTR3args, LINK3args, LOOKUP3args, MKDIR3args, MKNOD3args, Nfs3Result,
    PATHCONF3args, READLINK3args, REMOVE3args, RENAME3args, RMDIR3args, SETATTR3args,
    SYMLINK3args, createhow3, createverf3, diropargs3, fattr3, ftype3, mknoddata3, nfs_fh3,
    post_op_attr, post_op_fh3, symlinkdata3,
};
use polyfs_vfs::{
    AccessFlags, Credential, FileHandle, FsError, Fsattr, OpenFlags, PosixAttr, Result, Setattr,
};

use crate::attr::{setattr_is_noop, to_posix_attr, to_sattr3};
use crate::dir::NfsDirIter;
use crate::fs::{ATTR_TIMEOUT, NfsFilesystem};
use crate::openfile::NfsOpenFile;
use crate::program::NfsProgram;

struct CachedAttr {
    attr: fattr3,
    fetched_at: i64,
}

/// One remote inode, identified by its server filehandle. Attributes
/// are cached for [`ATTR_TIMEOUT`] and refreshed from every post-op
/// attribute the server returns, on failures as much as on successes.
pub struct NfsFile<P: NfsProgram> {
    fs: Weak<NfsFilesystem<P>>,
    fh: nfs_fh3,
    attr: Mutex<CachedAttr>,
}

impl<P: NfsProgram> NfsFile<P> {
    pub(crate) fn new(fs: Weak<NfsFilesystem<P>>, fh: nfs_fh3, attr: fattr3) -> Self {
        let fetched_at = fs
            .upgrade()
            .map_or(0, |fs| fs.clock().now_nanos());
        Self {
            fs,
            fh,
            attr: Mutex::new(CachedAttr { attr, fetched_at }),
        }
    }

    pub fn nfs(&self) -> Result<Arc<NfsFilesystem<P>>> {
        self.fs.upgrade().ok_or(FsError::Stale)
    }

    #[must_use]
    pub const fn fh(&self) -> &nfs_fh3 {
        &self.fh
    }

    #[must_use]
    pub fn fileid(&self) -> u64 {
        self.attr.lock().expect("lock is poisoned").attr.fileid
    }

    /// The last attributes the server reported, regardless of age.
    #[must_use]
    pub fn cached_attr(&self) -> fattr3 {
        self.attr.lock().expect("lock is poisoned").attr.clone()
    }

    /// Refreshes the cached attributes and their timestamp.
    pub(crate) fn update(&self, attr: fattr3) {
        let now = self.fs.upgrade().map_or(0, |fs| fs.clock().now_nanos());
        let mut cached = self.attr.lock().expect("lock is poisoned");
        cached.attr = attr;
        cached.fetched_at = now;
    }

    /// Opportunistic refresh from a post-op attribute; applied on error
    /// responses too, before the error propagates.
    pub(crate) fn update_post_op(&self, post: &post_op_attr) {
        if let Some(attr) = post {
            self.update(attr.clone());
        }
    }

    /// The wire handle: this filesystem's id followed by the server
    /// filehandle.
    pub fn handle(&self) -> Result<FileHandle> {
        let fs = self.nfs()?;
        let mut data = fs.fsid().clone();
        data.extend_from_slice(self.fh.data.as_ref());
        FileHandle::new(data)
    }

    /// The attribute snapshot, served from cache within the timeout and
    /// refreshed with GETATTR past it.
    pub async fn getattr(&self) -> Result<PosixAttr> {
        let fs = self.nfs()?;
        let now = fs.clock().now_nanos();
        {
            let cached = self.attr.lock().expect("lock is poisoned");
            let age = now.saturating_sub(cached.fetched_at);
            if age <= i64::try_from(ATTR_TIMEOUT.as_nanos()).unwrap_or(i64::MAX) {
                return Ok(to_posix_attr(&cached.attr));
            }
        }
        let res = fs
            .proto()
            .getattr(GETATTR3args {
                object: self.fh.clone(),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update(ok.obj_attributes.clone());
                Ok(to_posix_attr(&ok.obj_attributes))
            }
            Nfs3Result::Err((status, _)) => Err(crate::error::map_nfs_status(status)),
        }
    }

    /// Asks the server whether the requested access is allowed. Never
    /// fails; transport or protocol errors just report `false`.
    pub async fn access(&self, _cred: &Credential, accmode: u32) -> bool {
        let Ok(fs) = self.nfs() else {
            return false;
        };
        let mut flags = 0;
        if accmode & AccessFlags::READ != 0 {
            flags |= ACCESS3_READ;
        }
        if accmode & AccessFlags::WRITE != 0 {
            flags |= ACCESS3_MODIFY;
        }
        if accmode & AccessFlags::EXECUTE != 0 {
            let is_dir = self.cached_attr().type_ == ftype3::NF3DIR;
            flags |= if is_dir { ACCESS3_LOOKUP } else { ACCESS3_EXECUTE };
        }
        let res = fs
            .proto()
            .access(ACCESS3args {
                object: self.fh.clone(),
                access: flags,
            })
            .await;
        match res {
            Ok(Nfs3Result::Ok(ok)) => {
                self.update_post_op(&ok.obj_attributes);
                ok.access & flags == flags
            }
            Ok(Nfs3Result::Err((_, fail))) => {
                self.update_post_op(&fail.obj_attributes);
                false
            }
            Err(_) => false,
        }
    }

    /// Stages an attribute mutation on the server. The RPC is elided
    /// when every staged field already matches the cached attributes.
    pub async fn setattr(&self, _cred: &Credential, staged: &Setattr) -> Result<()> {
        let fs = self.nfs()?;
        if setattr_is_noop(staged, &self.cached_attr()) {
            return Ok(());
        }
        let args = SETATTR3args {
            object: self.fh.clone(),
            new_attributes: to_sattr3(staged),
            guard: None,
        };
        let res = fs
            .proto()
            .setattr(args)
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.obj_wcc.after);
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.obj_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Resolves a name in this directory, warming the inode cache from
    /// the returned attributes.
    pub async fn lookup(self: &Arc<Self>, _cred: &Credential, name: &str) -> Result<Arc<Self>> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .lookup(LOOKUP3args {
                what: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_attributes);
                match ok.obj_attributes {
                    Some(attr) => Ok(fs.intern(&ok.object, attr)),
                    None => fs.find_fh(&ok.object).await,
                }
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_attributes);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Opens (and possibly creates) `name` in this directory. Exclusive
    /// creates carry a random verifier and apply the staged attributes
    /// with a follow-up SETATTR.
    pub async fn open_named(
        self: &Arc<Self>,
        cred: &Credential,
        name: &str,
        flags: u32,
        staged: &Setattr,
    ) -> Result<NfsOpenFile<P>> {
        let fs = self.nfs()?;
        if flags & OpenFlags::CREATE == 0 {
            let file = self.lookup(cred, name).await?;
            return Ok(NfsOpenFile::new(file, flags, fs.write_behind()));
        }

        let exclusive = flags & OpenFlags::EXCLUSIVE != 0;
        let how = if exclusive {
            createhow3::EXCLUSIVE(createverf3(rand::random::<u64>().to_be_bytes()))
        } else {
            createhow3::UNCHECKED(to_sattr3(staged))
        };
        let res = fs
            .proto()
            .create(CREATE3args {
                where_: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
                how,
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                let file = self
                    .resolve_created(name, &ok.obj, &ok.obj_attributes)
                    .await?;
                if flags & OpenFlags::TRUNCATE != 0 {
                    let mut shrink = Setattr::new();
                    shrink.set_size(0);
                    file.setattr(cred, &shrink).await?;
                }
                if exclusive {
                    file.setattr(cred, staged).await?;
                }
                Ok(NfsOpenFile::new(file, flags, fs.write_behind()))
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// An open handle onto this file.
    pub fn open(self: &Arc<Self>, _cred: &Credential, flags: u32) -> Result<NfsOpenFile<P>> {
        let fs = self.nfs()?;
        Ok(NfsOpenFile::new(
            Arc::clone(self),
            flags,
            fs.write_behind(),
        ))
    }

    pub async fn readlink(&self, _cred: &Credential) -> Result<String> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .readlink(READLINK3args {
                symlink: self.fh.clone(),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.symlink_attributes);
                String::from_utf8(ok.data.0.into_owned()).map_err(|_| FsError::Invalid)
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.symlink_attributes);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    pub async fn mkdir(
        self: &Arc<Self>,
        _cred: &Credential,
        name: &str,
        staged: &Setattr,
    ) -> Result<Arc<Self>> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .mkdir(MKDIR3args {
                where_: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
                attributes: to_sattr3(staged),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                self.resolve_created(name, &ok.obj, &ok.obj_attributes).await
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    pub async fn symlink(
        self: &Arc<Self>,
        _cred: &Credential,
        name: &str,
        target: &str,
        staged: &Setattr,
    ) -> Result<Arc<Self>> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .symlink(SYMLINK3args {
                where_: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
                symlink: symlinkdata3 {
                    symlink_attributes: to_sattr3(staged),
                    symlink_data: target.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                self.resolve_created(name, &ok.obj, &ok.obj_attributes).await
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Creates a named pipe with MKNOD.
    pub async fn mkfifo(
        self: &Arc<Self>,
        _cred: &Credential,
        name: &str,
        staged: &Setattr,
    ) -> Result<Arc<Self>> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .mknod(MKNOD3args {
                where_: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
                what: mknoddata3::FIFO(to_sattr3(staged)),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                self.resolve_created(name, &ok.obj, &ok.obj_attributes).await
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    pub async fn remove(&self, _cred: &Credential, name: &str) -> Result<()> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .remove(REMOVE3args {
                object: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    pub async fn rmdir(&self, _cred: &Credential, name: &str) -> Result<()> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .rmdir(RMDIR3args {
                object: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.dir_wcc.after);
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.dir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Renames `from_dir/from_name` to `self/to_name` on the server.
    pub async fn rename(
        &self,
        _cred: &Credential,
        to_name: &str,
        from_dir: &Arc<Self>,
        from_name: &str,
    ) -> Result<()> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .rename(RENAME3args {
                from: diropargs3 {
                    dir: from_dir.fh.clone(),
                    name: from_name.into(),
                },
                to: diropargs3 {
                    dir: self.fh.clone(),
                    name: to_name.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                from_dir.update_post_op(&ok.fromdir_wcc.after);
                self.update_post_op(&ok.todir_wcc.after);
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                from_dir.update_post_op(&fail.fromdir_wcc.after);
                self.update_post_op(&fail.todir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Links `target` into this directory under `name`.
    pub async fn link(
        &self,
        _cred: &Credential,
        name: &str,
        target: &Arc<Self>,
    ) -> Result<()> {
        let fs = self.nfs()?;
        let res = fs
            .proto()
            .link(LINK3args {
                file: target.fh.clone(),
                link: diropargs3 {
                    dir: self.fh.clone(),
                    name: name.into(),
                },
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                target.update_post_op(&ok.file_attributes);
                self.update_post_op(&ok.linkdir_wcc.after);
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                target.update_post_op(&fail.file_attributes);
                self.update_post_op(&fail.linkdir_wcc.after);
                Err(crate::error::map_nfs_status(status))
            }
        }
    }

    /// Streams this directory through READDIRPLUS; `seek` resumes at
    /// the entry after that cookie.
    pub fn readdir(self: &Arc<Self>, _cred: &Credential, seek: u64) -> NfsDirIter<P> {
        NfsDirIter::new(Arc::clone(self), seek)
    }

    /// FSSTAT and PATHCONF combined into the shared attribute shape.
    pub async fn fsstat(&self, _cred: &Credential) -> Result<Fsattr> {
        let fs = self.nfs()?;
        let stat = fs
            .proto()
            .fsstat(FSSTAT3args {
                fsroot: self.fh.clone(),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        let stat = match stat {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.obj_attributes);
                ok
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.obj_attributes);
                return Err(crate::error::map_nfs_status(status));
            }
        };
        let pc = fs
            .proto()
            .pathconf(PATHCONF3args {
                object: self.fh.clone(),
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        let pc = match pc {
            Nfs3Result::Ok(ok) => {
                self.update_post_op(&ok.obj_attributes);
                ok
            }
            Nfs3Result::Err((status, fail)) => {
                self.update_post_op(&fail.obj_attributes);
                return Err(crate::error::map_nfs_status(status));
            }
        };
        Ok(Fsattr {
            total_space: stat.tbytes,
            free_space: stat.fbytes,
            avail_space: stat.abytes,
            total_files: stat.tfiles,
            free_files: stat.ffiles,
            avail_files: stat.afiles,
            link_max: pc.linkmax,
            name_max: pc.name_max,
            repair_queue_size: 0,
        })
    }

    /// Turns a create-style reply into an inode, falling back to LOOKUP
    /// when the server did not embed a filehandle.
    async fn resolve_created(
        self: &Arc<Self>,
        name: &str,
        fh: &post_op_fh3,
        attr: &post_op_attr,
    ) -> Result<Arc<Self>> {
        let fs = self.nfs()?;
        match fh {
            Some(fh) => match attr {
                Some(attr) => Ok(fs.intern(fh, attr.clone())),
                None => fs.find_fh(fh).await,
            },
            None => {
                tracing::warn!(name, "no filehandle in create reply, falling back to lookup");
                self.lookup(&Credential::superuser(), name).await
            }
        }
    }
}
