use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use polyfs_vfs::{FileType, FsError, PosixAttr, Result};

use crate::fs::{DirEntry, File, Filesystem};

/// A pseudo-filesystem composing mounted filesystems into one
/// namespace. Pseudo-directories are synthesised for the intermediate
/// path components; looking up a mount point lands in the mounted
/// filesystem's root.
pub struct PfsFilesystem {
    root: Arc<PfsNode>,
    next_id: AtomicU64,
}

enum PfsEntry {
    Dir(Arc<PfsNode>),
    Mount(Filesystem),
}

/// One synthetic directory in the pseudo-filesystem tree.
pub struct PfsNode {
    fileid: u64,
    parent: Weak<PfsNode>,
    entries: Mutex<BTreeMap<String, PfsEntry>>,
}

impl PfsNode {
    #[must_use]
    pub const fn fileid(&self) -> u64 {
        self.fileid
    }

    /// Pseudo-directories are read-only: mode 0555, owned by root.
    #[must_use]
    pub fn getattr(&self) -> PosixAttr {
        let mut attr = PosixAttr::new(FileType::Directory);
        attr.mode = 0o555;
        attr.nlink = 2;
        attr.size = self.entries.lock().expect("lock is poisoned").len() as u64 + 2;
        attr
    }

    /// Resolves one name. Mount points resolve to the mounted root.
    pub async fn lookup(self: &Arc<Self>, name: &str) -> Result<File> {
        match name {
            "." => Ok(File::Pfs(Arc::clone(self))),
            ".." => Ok(File::Pfs(
                self.parent.upgrade().unwrap_or_else(|| Arc::clone(self)),
            )),
            name => {
                let entry = {
                    let entries = self.entries.lock().expect("lock is poisoned");
                    match entries.get(name) {
                        Some(PfsEntry::Dir(dir)) => Some(Ok(File::Pfs(Arc::clone(dir)))),
                        Some(PfsEntry::Mount(fs)) => Some(Err(fs.clone())),
                        None => None,
                    }
                };
                match entry {
                    Some(Ok(file)) => Ok(file),
                    Some(Err(fs)) => fs.root().await,
                    None => Err(FsError::NotFound),
                }
            }
        }
    }

    /// Lists the pseudo-entries; cookies are ordinal positions.
    pub fn entries(&self) -> Vec<DirEntry> {
        let entries = self.entries.lock().expect("lock is poisoned");
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, entry))| DirEntry {
                fileid: match entry {
                    PfsEntry::Dir(dir) => dir.fileid,
                    PfsEntry::Mount(_) => 0,
                },
                name: name.clone(),
                cookie: (i + 1) as u64,
            })
            .collect()
    }
}

impl Default for PfsFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl PfsFilesystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Arc::new(PfsNode {
                fileid: 1,
                parent: Weak::new(),
                entries: Mutex::new(BTreeMap::new()),
            }),
            next_id: AtomicU64::new(2),
        }
    }

    #[must_use]
    pub fn root(&self) -> Arc<PfsNode> {
        Arc::clone(&self.root)
    }

    /// Mounts `fs` at `path`, synthesising intermediate directories.
    pub fn add(&self, path: &str, fs: Filesystem) -> Result<()> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let Some((last, parents)) = components.split_last() else {
            return Err(FsError::Invalid);
        };

        let mut node = Arc::clone(&self.root);
        for component in parents {
            let next = {
                let mut entries = node.entries.lock().expect("lock is poisoned");
                match entries.get(*component) {
                    Some(PfsEntry::Dir(dir)) => Arc::clone(dir),
                    Some(PfsEntry::Mount(_)) => return Err(FsError::Exists),
                    None => {
                        let dir = Arc::new(PfsNode {
                            fileid: self.next_id.fetch_add(1, Ordering::Relaxed),
                            parent: Arc::downgrade(&node),
                            entries: Mutex::new(BTreeMap::new()),
                        });
                        entries.insert((*component).to_owned(), PfsEntry::Dir(Arc::clone(&dir)));
                        dir
                    }
                }
            };
            node = next;
        }

        let mut entries = node.entries.lock().expect("lock is poisoned");
        if entries.contains_key(*last) {
            return Err(FsError::Exists);
        }
        entries.insert((*last).to_owned(), PfsEntry::Mount(fs));
        tracing::info!(path, "mounted");
        Ok(())
    }
}
