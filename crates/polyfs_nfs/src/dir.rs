use std::collections::VecDeque;
use std::sync::Arc;

use polyfs_types::nfs3::{Nfs3Result, READDIRPLUS3args, cookieverf3};
use polyfs_vfs::Result;

use crate::error::map_nfs_status;
use crate::file::NfsFile;
use crate::program::NfsProgram;

/// One directory entry from a READDIRPLUS page. When the server
/// embedded a filehandle the resolved inode rides along, saving the
/// per-entry LOOKUP.
pub struct NfsDirEntry<P: NfsProgram> {
    pub fileid: u64,
    pub name: String,
    pub cookie: u64,
    pub file: Option<Arc<NfsFile<P>>>,
}

/// A lazy stream over a directory. Pages are fetched with READDIRPLUS,
/// carrying the cookie verifier from one page to the next; a stale
/// verifier on resume surfaces as [`polyfs_vfs::FsError::BadCookie`].
pub struct NfsDirIter<P: NfsProgram> {
    dir: Arc<NfsFile<P>>,
    cookie: u64,
    verf: cookieverf3,
    buffer: VecDeque<NfsDirEntry<P>>,
    eof: bool,
}

impl<P: NfsProgram> NfsDirIter<P> {
    pub(crate) fn new(dir: Arc<NfsFile<P>>, seek: u64) -> Self {
        Self {
            dir,
            cookie: seek,
            verf: cookieverf3::default(),
            buffer: VecDeque::new(),
            eof: false,
        }
    }

    /// The next entry, or `None` once the directory is exhausted.
    pub async fn next_entry(&mut self) -> Result<Option<NfsDirEntry<P>>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.cookie = entry.cookie;
                return Ok(Some(entry));
            }
            if self.eof {
                return Ok(None);
            }
            self.fetch().await?;
        }
    }

    /// The inode for an entry, via the embedded filehandle when the
    /// server supplied one and LOOKUP otherwise.
    pub async fn file(&self, entry: &NfsDirEntry<P>) -> Result<Arc<NfsFile<P>>> {
        match &entry.file {
            Some(file) => Ok(Arc::clone(file)),
            None => {
                self.dir
                    .lookup(&polyfs_vfs::Credential::superuser(), &entry.name)
                    .await
            }
        }
    }

    async fn fetch(&mut self) -> Result<()> {
        let fs = self.dir.nfs()?;
        if self.cookie == 0 {
            // A fresh iteration starts with a zero verifier.
            self.verf = cookieverf3::default();
        }
        let dtpref = fs.fsinfo().await?.dtpref;
        let res = fs
            .proto()
            .readdirplus(READDIRPLUS3args {
                dir: self.dir.fh().clone(),
                cookie: self.cookie,
                cookieverf: self.verf,
                dircount: dtpref,
                maxcount: dtpref,
            })
            .await
            .map_err(|e| e.to_fs_error())?;
        match res {
            Nfs3Result::Ok(ok) => {
                self.dir.update_post_op(&ok.dir_attributes);
                self.verf = ok.cookieverf;
                self.eof = ok.reply.eof;
                for entry in ok.reply.entries.into_inner() {
                    // Embedded handles and attributes insert the child
                    // into the inode cache directly.
                    let file = match (&entry.name_handle, &entry.name_attributes) {
                        (Some(fh), Some(attr)) => Some(fs.intern(fh, attr.clone())),
                        _ => None,
                    };
                    let name = String::from_utf8_lossy(entry.name.as_bytes()).into_owned();
                    self.buffer.push_back(NfsDirEntry {
                        fileid: entry.fileid,
                        name,
                        cookie: entry.cookie,
                        file,
                    });
                }
                if self.buffer.is_empty() && !self.eof {
                    // A server returning no entries without eof would
                    // loop us forever.
                    tracing::warn!("empty readdirplus page without eof");
                    self.eof = true;
                }
                Ok(())
            }
            Nfs3Result::Err((status, fail)) => {
                self.dir.update_post_op(&fail.dir_attributes);
                self.eof = true;
                Err(map_nfs_status(status))
            }
        }
    }
}
