use std::io::{Read, Write};

use polyfs_types::xdr::{Error, Pack, Result as XdrResult, Unpack};

/// Maximum number of bytes in a file handle, matching the NFSv3 limit.
pub const FILE_HANDLE_MAX: usize = 128;

/// An opaque, wire-level identifier for a file. Filesystems prefix the
/// handle body with their [`crate::FilesystemId`] so handles can be
/// routed back to the filesystem that minted them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    pub version: u32,
    pub data: Vec<u8>,
}

impl FileHandle {
    pub const VERSION: u32 = 1;

    /// Builds a version-1 handle, rejecting oversized bodies.
    pub fn new(data: Vec<u8>) -> crate::Result<Self> {
        if data.len() > FILE_HANDLE_MAX {
            return Err(crate::FsError::Invalid);
        }
        Ok(Self {
            version: Self::VERSION,
            data,
        })
    }

    /// Splits the handle into the filesystem id prefix and the
    /// filesystem-specific remainder, if the prefix matches.
    #[must_use]
    pub fn strip_fsid<'a>(&'a self, fsid: &[u8]) -> Option<&'a [u8]> {
        if self.version != Self::VERSION {
            return None;
        }
        self.data.strip_prefix(fsid)
    }
}

impl Pack for FileHandle {
    fn packed_size(&self) -> usize {
        4 + self.data.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> XdrResult<usize> {
        if self.data.len() > FILE_HANDLE_MAX {
            return Err(Error::ObjectTooLarge(self.data.len()));
        }
        Ok(self.version.pack(out)? + self.data.pack(out)?)
    }
}

impl Unpack for FileHandle {
    fn unpack(input: &mut impl Read) -> XdrResult<(Self, usize)> {
        let (version, mut read) = u32::unpack(input)?;
        let (data, n) = Vec::<u8>::unpack(input)?;
        read += n;
        if data.len() > FILE_HANDLE_MAX {
            return Err(Error::InvalidLength(data.len()));
        }
        Ok((Self { version, data }, read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyfs_types::xdr::{pack_to_vec, unpack_from_slice};

    #[test]
    fn roundtrip() {
        let fh = FileHandle::new(vec![1, 2, 3]).expect("small handle");
        let bytes = pack_to_vec(&fh).expect("pack");
        let decoded: FileHandle = unpack_from_slice(&bytes).expect("unpack");
        assert_eq!(fh, decoded);
    }

    #[test]
    fn size_limit() {
        assert!(FileHandle::new(vec![0; FILE_HANDLE_MAX]).is_ok());
        assert!(FileHandle::new(vec![0; FILE_HANDLE_MAX + 1]).is_err());
    }

    #[test]
    fn fsid_routing() {
        let mut data = b"fsid".to_vec();
        data.extend_from_slice(&[9, 9]);
        let fh = FileHandle::new(data).expect("small handle");
        assert_eq!(fh.strip_fsid(b"fsid"), Some(&[9u8, 9][..]));
        assert_eq!(fh.strip_fsid(b"other"), None);
    }
}
