use polyfs_types::xdr::XdrCodec;
use polyfs_vfs::{FileId, FileType, PosixAttr};

pub const META_VERSION: u32 = 1;

/// The superblock, stored in the `meta` namespace under file id 0.
#[derive(Debug, Clone, XdrCodec)]
pub struct FsMeta {
    pub vers: u32,
    pub fsid: [u8; 16],
    pub next_id: u64,
    pub committed_instance: u64,
}

impl FsMeta {
    pub fn fresh() -> Self {
        Self {
            vers: META_VERSION,
            fsid: rand::random(),
            // 0 is the superblock itself, 1 the root directory.
            next_id: 2,
            committed_instance: 0,
        }
    }
}

/// One inode, stored in the `meta` namespace under its file id. `extra`
/// carries the target path for symlinks and is empty otherwise.
#[derive(Debug, Clone, XdrCodec)]
pub struct InodeMeta {
    pub vers: u32,
    pub fileid: u64,
    pub block_size: u32,
    pub attr: PosixAttr,
    pub extra: Vec<u8>,
}

impl InodeMeta {
    pub fn new(fileid: FileId, file_type: FileType, block_size: u32) -> Self {
        Self {
            vers: META_VERSION,
            fileid: fileid.0,
            block_size,
            attr: PosixAttr::new(file_type),
            extra: Vec::new(),
        }
    }

    pub const fn fileid(&self) -> FileId {
        FileId(self.fileid)
    }

    pub const fn is_dir(&self) -> bool {
        self.attr.is_dir()
    }
}

/// The value of a directory entry: the child's file id.
#[derive(Debug, Clone, Copy, XdrCodec)]
pub struct DirEntryValue {
    pub fileid: u64,
}
