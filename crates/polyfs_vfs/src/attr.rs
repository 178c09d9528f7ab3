use polyfs_types::xdr::XdrCodec;

/// A unique identifier for a file within one filesystem. Id 0 is
/// reserved for filesystem metadata and id 1 is the root directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, XdrCodec)]
pub struct FileId(pub u64);

impl FileId {
    /// Reserved id holding the superblock.
    pub const SUPERBLOCK: Self = Self(0);
    /// The root directory.
    pub const ROOT: Self = Self(1);

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl From<u64> for FileId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, XdrCodec)]
#[repr(u32)]
pub enum FileType {
    File = 1,
    Directory = 2,
    BlockDev = 3,
    CharDev = 4,
    Symlink = 5,
    Socket = 6,
    Fifo = 7,
}

/// The persistent inode body. Times are nanoseconds since the Unix
/// epoch; `ctime` doubles as the change attribute and `atime` is
/// overlaid by the NFS exclusive-create verifier.
#[derive(Debug, Clone, PartialEq, Eq, XdrCodec)]
pub struct PosixAttr {
    pub file_type: FileType,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub birthtime: i64,
}

impl PosixAttr {
    #[must_use]
    pub const fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            mode: 0,
            nlink: 0,
            uid: 0,
            gid: 0,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            birthtime: 0,
        }
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    /// The change attribute: a value that moves forward whenever data or
    /// metadata changes.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn change(&self) -> u64 {
        self.ctime as u64
    }

    /// The NFS exclusive-create verifier, overlaid on atime.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn createverf(&self) -> u64 {
        self.atime as u64
    }
}

/// Filesystem-level attributes reported by `fsstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fsattr {
    pub total_space: u64,
    pub free_space: u64,
    pub avail_space: u64,
    pub total_files: u64,
    pub free_files: u64,
    pub avail_files: u64,
    pub link_max: u32,
    pub name_max: u32,
    pub repair_queue_size: u32,
}
