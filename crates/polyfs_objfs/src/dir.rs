use std::sync::Arc;

use polyfs_keyval::Cursor;
use polyfs_types::xdr::unpack_from_slice;
use polyfs_vfs::{FileId, Result};

use crate::fs::ObjFilesystem;
use crate::meta::DirEntryValue;
use crate::{ObjFile, keys};

/// One directory entry produced by [`ObjDirIter`]. The cookie restarts
/// iteration at the following entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjDirEntry {
    pub fileid: FileId,
    pub name: String,
    pub cookie: u64,
}

/// An ordered scan over one directory's entries in the `dir` namespace.
/// Entries added or removed mid-iteration may or may not be observed,
/// but existing entries are never duplicated or skipped.
pub struct ObjDirIter {
    fs: Arc<ObjFilesystem>,
    cursor: Cursor,
    next_cookie: u64,
}

impl ObjDirIter {
    pub(crate) fn new(fs: Arc<ObjFilesystem>, dir: FileId, seek: u64) -> Self {
        let (start, end) = keys::dir_range(dir);
        let mut cursor = fs.dir_ns().cursor_range(&start, &end);
        // Cookies are ordinal positions, starting at 1 for the first
        // entry; resuming at cookie N skips the first N entries.
        let mut skip = seek;
        while skip > 0 && cursor.valid() {
            cursor.next();
            skip -= 1;
        }
        Self {
            fs,
            cursor,
            next_cookie: seek + 1,
        }
    }

    /// The next entry, or `None` at the end of the directory.
    pub fn next_entry(&mut self) -> Option<ObjDirEntry> {
        while self.cursor.valid() {
            let decoded = self.cursor.key().and_then(|key| {
                let name = keys::dir_key_name(key)?;
                let name = String::from_utf8(name.to_vec()).ok()?;
                let value: DirEntryValue = unpack_from_slice(self.cursor.value()?).ok()?;
                Some((name, FileId(value.fileid)))
            });
            self.cursor.next();
            let cookie = self.next_cookie;
            self.next_cookie += 1;

            match decoded {
                Some((name, fileid)) => {
                    return Some(ObjDirEntry {
                        fileid,
                        name,
                        cookie,
                    });
                }
                None => {
                    tracing::warn!("skipping undecodable directory entry");
                }
            }
        }
        None
    }

    /// The file object for an entry returned by this iterator.
    pub fn file(&self, entry: &ObjDirEntry) -> Result<Arc<ObjFile>> {
        self.fs.find(entry.fileid)
    }
}
