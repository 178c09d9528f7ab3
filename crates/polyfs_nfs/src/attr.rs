//! Conversions between the NFSv3 wire attributes and the shared POSIX
//! attribute model.

use polyfs_types::nfs3::{fattr3, ftype3, nfstime3, sattr3, set_time};
use polyfs_vfs::{FileType, PosixAttr, Setattr};

const NANOS: i64 = 1_000_000_000;

#[must_use]
pub const fn from_nfstime(t: nfstime3) -> i64 {
    t.seconds as i64 * NANOS + t.nseconds as i64
}

#[must_use]
pub fn to_nfstime(nanos: i64) -> nfstime3 {
    let nanos = nanos.max(0);
    nfstime3 {
        seconds: u32::try_from(nanos / NANOS).unwrap_or(u32::MAX),
        nseconds: u32::try_from(nanos % NANOS).unwrap_or(0),
    }
}

#[must_use]
pub const fn from_ftype(t: ftype3) -> FileType {
    match t {
        ftype3::NF3REG => FileType::File,
        ftype3::NF3DIR => FileType::Directory,
        ftype3::NF3BLK => FileType::BlockDev,
        ftype3::NF3CHR => FileType::CharDev,
        ftype3::NF3LNK => FileType::Symlink,
        ftype3::NF3SOCK => FileType::Socket,
        ftype3::NF3FIFO => FileType::Fifo,
    }
}

#[must_use]
pub const fn to_ftype(t: FileType) -> ftype3 {
    match t {
        FileType::File => ftype3::NF3REG,
        FileType::Directory => ftype3::NF3DIR,
        FileType::BlockDev => ftype3::NF3BLK,
        FileType::CharDev => ftype3::NF3CHR,
        FileType::Symlink => ftype3::NF3LNK,
        FileType::Socket => ftype3::NF3SOCK,
        FileType::Fifo => ftype3::NF3FIFO,
    }
}

/// The shared attribute snapshot corresponding to a server `fattr3`.
#[must_use]
pub fn to_posix_attr(attr: &fattr3) -> PosixAttr {
    PosixAttr {
        file_type: from_ftype(attr.type_),
        mode: attr.mode,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        size: attr.size,
        atime: from_nfstime(attr.atime),
        mtime: from_nfstime(attr.mtime),
        ctime: from_nfstime(attr.ctime),
        // NFSv3 does not carry a birth time; the change time is the
        // closest thing a server reports.
        birthtime: from_nfstime(attr.ctime),
    }
}

/// The wire form of a staged mutation. Only the staged fields are set;
/// client times are sent explicitly.
#[must_use]
pub fn to_sattr3(staged: &Setattr) -> sattr3 {
    sattr3 {
        mode: staged.mode(),
        uid: staged.uid(),
        gid: staged.gid(),
        size: staged.size(),
        atime: staged
            .atime()
            .map_or(set_time::DontChange, |t| set_time::ClientTime(to_nfstime(t))),
        mtime: staged
            .mtime()
            .map_or(set_time::DontChange, |t| set_time::ClientTime(to_nfstime(t))),
    }
}

/// True if applying `staged` to the cached attributes would change
/// nothing, in which case the SETATTR RPC can be elided.
#[must_use]
pub fn setattr_is_noop(staged: &Setattr, cached: &fattr3) -> bool {
    if staged.is_empty() {
        return true;
    }
    if staged.change().is_some() || staged.createverf().is_some() {
        return false;
    }
    staged.mode().is_none_or(|m| m == cached.mode)
        && staged.uid().is_none_or(|u| u == cached.uid)
        && staged.gid().is_none_or(|g| g == cached.gid)
        && staged.size().is_none_or(|s| s == cached.size)
        && staged
            .atime()
            .is_none_or(|t| to_nfstime(t) == cached.atime)
        && staged
            .mtime()
            .is_none_or(|t| to_nfstime(t) == cached.mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfs_types::nfs3::specdata3;

    fn sample_fattr() -> fattr3 {
        fattr3 {
            type_: ftype3::NF3REG,
            mode: 0o644,
            nlink: 1,
            uid: 10,
            gid: 20,
            size: 100,
            used: 100,
            rdev: specdata3::default(),
            fsid: 1,
            fileid: 7,
            atime: nfstime3 { seconds: 5, nseconds: 1 },
            mtime: nfstime3 { seconds: 6, nseconds: 2 },
            ctime: nfstime3 { seconds: 7, nseconds: 3 },
        }
    }

    #[test]
    fn attr_conversion() {
        let attr = to_posix_attr(&sample_fattr());
        assert_eq!(attr.file_type, FileType::File);
        assert_eq!(attr.mode, 0o644);
        assert_eq!(attr.size, 100);
        assert_eq!(attr.atime, 5 * NANOS + 1);
        assert_eq!(attr.mtime, 6 * NANOS + 2);
    }

    #[test]
    fn noop_detection() {
        let cached = sample_fattr();

        let same_mode = Setattr::with_mode(0o644);
        assert!(setattr_is_noop(&same_mode, &cached));

        let new_mode = Setattr::with_mode(0o600);
        assert!(!setattr_is_noop(&new_mode, &cached));

        let mut same_size = Setattr::new();
        same_size.set_size(100);
        assert!(setattr_is_noop(&same_size, &cached));

        let mut grow = Setattr::new();
        grow.set_size(101);
        assert!(!setattr_is_noop(&grow, &cached));

        assert!(setattr_is_noop(&Setattr::new(), &cached));
    }

    #[test]
    fn time_roundtrip() {
        let t = to_nfstime(6 * NANOS + 2);
        assert_eq!(t.seconds, 6);
        assert_eq!(t.nseconds, 2);
        assert_eq!(from_nfstime(t), 6 * NANOS + 2);
    }
}
