use std::sync::Arc;

use polyfs_objfs::{ObjDirIter, ObjFile, ObjFilesystem, ObjOpenFile};
use polyfs_vfs::{
    Credential, FileHandle, FsError, Fsattr, PosixAttr, Result, Setattr,
};

use crate::pfs::{PfsFilesystem, PfsNode};
use crate::{TcpNfsFile, TcpNfsFilesystem, TcpNfsProgram};

/// A mounted filesystem of any flavour.
#[derive(Clone)]
pub enum Filesystem {
    Obj(Arc<ObjFilesystem>),
    Nfs(Arc<TcpNfsFilesystem>),
    Pfs(Arc<PfsFilesystem>),
}

impl Filesystem {
    /// The root directory.
    pub async fn root(&self) -> Result<File> {
        match self {
            Self::Obj(fs) => Ok(File::Obj(fs.root().await?)),
            Self::Nfs(fs) => Ok(File::Nfs(fs.root().await?)),
            Self::Pfs(fs) => Ok(File::Pfs(fs.root())),
        }
    }

    /// Routes a wire handle back to a file of this filesystem.
    pub async fn find_handle(&self, handle: &FileHandle) -> Result<File> {
        match self {
            Self::Obj(fs) => Ok(File::Obj(fs.find_handle(handle)?)),
            Self::Nfs(fs) => Ok(File::Nfs(fs.find_handle(handle).await?)),
            Self::Pfs(_) => Err(FsError::Stale),
        }
    }
}

/// A file, directory or other filesystem object.
#[derive(Clone)]
pub enum File {
    Obj(Arc<ObjFile>),
    Nfs(Arc<TcpNfsFile>),
    Pfs(Arc<PfsNode>),
}

impl File {
    #[must_use]
    pub fn fileid(&self) -> u64 {
        match self {
            Self::Obj(f) => f.fileid().0,
            Self::Nfs(f) => f.fileid(),
            Self::Pfs(f) => f.fileid(),
        }
    }

    pub fn handle(&self) -> Result<FileHandle> {
        match self {
            Self::Obj(f) => f.handle(),
            Self::Nfs(f) => f.handle(),
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn getattr(&self) -> Result<PosixAttr> {
        match self {
            Self::Obj(f) => Ok(f.getattr().await),
            Self::Nfs(f) => f.getattr().await,
            Self::Pfs(f) => Ok(f.getattr()),
        }
    }

    pub async fn access(&self, cred: &Credential, accmode: u32) -> bool {
        match self {
            Self::Obj(f) => f.access(cred, accmode).await,
            Self::Nfs(f) => f.access(cred, accmode).await,
            // Pseudo-directories are world readable and searchable.
            Self::Pfs(_) => accmode & polyfs_vfs::AccessFlags::WRITE == 0,
        }
    }

    pub async fn setattr(&self, cred: &Credential, staged: &Setattr) -> Result<()> {
        match self {
            Self::Obj(f) => f.setattr(cred, staged).await,
            Self::Nfs(f) => f.setattr(cred, staged).await,
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn lookup(&self, cred: &Credential, name: &str) -> Result<Self> {
        match self {
            Self::Obj(f) => Ok(Self::Obj(f.lookup(cred, name).await?)),
            Self::Nfs(f) => Ok(Self::Nfs(f.lookup(cred, name).await?)),
            Self::Pfs(f) => f.lookup(name).await,
        }
    }

    pub async fn open_named(
        &self,
        cred: &Credential,
        name: &str,
        flags: u32,
        staged: &Setattr,
    ) -> Result<OpenFile> {
        match self {
            Self::Obj(f) => Ok(OpenFile::Obj(f.open_named(cred, name, flags, staged).await?)),
            Self::Nfs(f) => Ok(OpenFile::Nfs(f.open_named(cred, name, flags, staged).await?)),
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn open(&self, cred: &Credential, flags: u32) -> Result<OpenFile> {
        match self {
            Self::Obj(f) => Ok(OpenFile::Obj(f.open(cred, flags).await?)),
            Self::Nfs(f) => Ok(OpenFile::Nfs(f.open(cred, flags)?)),
            Self::Pfs(_) => Err(FsError::IsDir),
        }
    }

    pub async fn readlink(&self, cred: &Credential) -> Result<String> {
        match self {
            Self::Obj(f) => f.readlink(cred).await,
            Self::Nfs(f) => f.readlink(cred).await,
            Self::Pfs(_) => Err(FsError::Invalid),
        }
    }

    pub async fn mkdir(&self, cred: &Credential, name: &str, staged: &Setattr) -> Result<Self> {
        match self {
            Self::Obj(f) => Ok(Self::Obj(f.mkdir(cred, name, staged).await?)),
            Self::Nfs(f) => Ok(Self::Nfs(f.mkdir(cred, name, staged).await?)),
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn symlink(
        &self,
        cred: &Credential,
        name: &str,
        target: &str,
        staged: &Setattr,
    ) -> Result<Self> {
        match self {
            Self::Obj(f) => Ok(Self::Obj(f.symlink(cred, name, target, staged).await?)),
            Self::Nfs(f) => Ok(Self::Nfs(f.symlink(cred, name, target, staged).await?)),
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn mkfifo(&self, cred: &Credential, name: &str, staged: &Setattr) -> Result<Self> {
        match self {
            Self::Obj(f) => Ok(Self::Obj(f.mkfifo(cred, name, staged).await?)),
            Self::Nfs(f) => Ok(Self::Nfs(f.mkfifo(cred, name, staged).await?)),
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn remove(&self, cred: &Credential, name: &str) -> Result<()> {
        match self {
            Self::Obj(f) => f.remove(cred, name).await,
            Self::Nfs(f) => f.remove(cred, name).await,
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    pub async fn rmdir(&self, cred: &Credential, name: &str) -> Result<()> {
        match self {
            Self::Obj(f) => f.rmdir(cred, name).await,
            Self::Nfs(f) => f.rmdir(cred, name).await,
            Self::Pfs(_) => Err(FsError::Unsupported),
        }
    }

    /// Renames `from_dir/from_name` to `self/to_name`. Both directories
    /// must live in the same filesystem.
    pub async fn rename(
        &self,
        cred: &Credential,
        to_name: &str,
        from_dir: &Self,
        from_name: &str,
    ) -> Result<()> {
        match (self, from_dir) {
            (Self::Obj(to), Self::Obj(from)) => to.rename(cred, to_name, from, from_name).await,
            (Self::Nfs(to), Self::Nfs(from)) => to.rename(cred, to_name, from, from_name).await,
            (Self::Pfs(_), Self::Pfs(_)) => Err(FsError::Unsupported),
            _ => Err(FsError::CrossDevice),
        }
    }

    /// Links `target` under `name` in this directory; same filesystem
    /// only.
    pub async fn link(&self, cred: &Credential, name: &str, target: &Self) -> Result<()> {
        match (self, target) {
            (Self::Obj(dir), Self::Obj(target)) => dir.link(cred, name, target).await,
            (Self::Nfs(dir), Self::Nfs(target)) => dir.link(cred, name, target).await,
            (Self::Pfs(_), Self::Pfs(_)) => Err(FsError::Unsupported),
            _ => Err(FsError::CrossDevice),
        }
    }

    /// Streams directory entries, starting after `seek` when non-zero.
    pub async fn readdir(&self, cred: &Credential, seek: u64) -> Result<DirIter> {
        match self {
            Self::Obj(f) => Ok(DirIter::Obj(f.readdir(cred, seek).await?)),
            Self::Nfs(f) => Ok(DirIter::Nfs(f.readdir(cred, seek))),
            Self::Pfs(f) => {
                let entries = f.entries();
                let skip = usize::try_from(seek).unwrap_or(usize::MAX);
                Ok(DirIter::Pfs {
                    node: Arc::clone(f),
                    entries,
                    pos: skip,
                })
            }
        }
    }

    pub async fn fsstat(&self, cred: &Credential) -> Result<Fsattr> {
        match self {
            Self::Obj(f) => f.fsstat(cred).await,
            Self::Nfs(f) => f.fsstat(cred).await,
            Self::Pfs(_) => Ok(Fsattr::default()),
        }
    }
}

/// An open file handle of any flavour.
pub enum OpenFile {
    Obj(ObjOpenFile),
    Nfs(polyfs_nfs::NfsOpenFile<TcpNfsProgram>),
}

impl OpenFile {
    #[must_use]
    pub fn file(&self) -> File {
        match self {
            Self::Obj(of) => File::Obj(Arc::clone(of.file())),
            Self::Nfs(of) => File::Nfs(Arc::clone(of.file())),
        }
    }

    pub async fn read(&self, offset: u64, len: u32) -> Result<(Vec<u8>, bool)> {
        match self {
            Self::Obj(of) => of.read(offset, len).await,
            Self::Nfs(of) => of.read(offset, len).await,
        }
    }

    pub async fn write(&self, offset: u64, data: &[u8]) -> Result<u32> {
        match self {
            Self::Obj(of) => of.write(offset, data).await,
            Self::Nfs(of) => of.write(offset, data).await,
        }
    }

    pub async fn flush(&self) -> Result<()> {
        match self {
            Self::Obj(of) => of.flush().await,
            Self::Nfs(of) => of.flush().await,
        }
    }
}

/// One directory entry together with its resolved file.
pub struct DirEntry {
    pub fileid: u64,
    pub name: String,
    pub cookie: u64,
}

/// A unified directory stream.
pub enum DirIter {
    Obj(ObjDirIter),
    Nfs(polyfs_nfs::NfsDirIter<TcpNfsProgram>),
    Pfs {
        node: Arc<PfsNode>,
        entries: Vec<DirEntry>,
        pos: usize,
    },
}

impl DirIter {
    /// The next entry and its file, or `None` at the end.
    pub async fn next(&mut self) -> Result<Option<(DirEntry, File)>> {
        match self {
            Self::Obj(iter) => match iter.next_entry() {
                Some(entry) => {
                    let file = File::Obj(iter.file(&entry)?);
                    Ok(Some((
                        DirEntry {
                            fileid: entry.fileid.0,
                            name: entry.name,
                            cookie: entry.cookie,
                        },
                        file,
                    )))
                }
                None => Ok(None),
            },
            Self::Nfs(iter) => match iter.next_entry().await? {
                Some(entry) => {
                    let file = File::Nfs(iter.file(&entry).await?);
                    Ok(Some((
                        DirEntry {
                            fileid: entry.fileid,
                            name: entry.name,
                            cookie: entry.cookie,
                        },
                        file,
                    )))
                }
                None => Ok(None),
            },
            Self::Pfs { node, entries, pos } => {
                let Some(entry) = entries.get(*pos) else {
                    return Ok(None);
                };
                *pos += 1;
                let file = node.lookup(&entry.name).await?;
                Ok(Some((
                    DirEntry {
                        fileid: entry.fileid,
                        name: entry.name.clone(),
                        cookie: entry.cookie,
                    },
                    file,
                )))
            }
        }
    }
}
