//! Key encodings for the three namespaces. File ids and block offsets
//! are big-endian so the store's byte order matches numeric order, which
//! makes per-file and per-directory scans simple key ranges.

use polyfs_vfs::FileId;

/// `meta` namespace: inode metadata keyed by file id.
#[must_use]
pub fn meta_key(id: FileId) -> Vec<u8> {
    id.0.to_be_bytes().to_vec()
}

/// `dir` namespace: one key per directory entry.
#[must_use]
pub fn dir_key(dir: FileId, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + name.len());
    key.extend_from_slice(&dir.0.to_be_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

/// The key range `[start, end)` covering every entry of a directory.
#[must_use]
pub fn dir_range(dir: FileId) -> (Vec<u8>, Vec<u8>) {
    (
        dir.0.to_be_bytes().to_vec(),
        (dir.0 + 1).to_be_bytes().to_vec(),
    )
}

/// The entry name carried in a `dir` namespace key.
#[must_use]
pub fn dir_key_name(key: &[u8]) -> Option<&[u8]> {
    key.get(8..)
}

/// `data` namespace: one key per block, offset is block-aligned.
#[must_use]
pub fn data_key(file: FileId, offset: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&file.0.to_be_bytes());
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

/// The key range `[start, end)` covering a file's blocks from
/// `from_offset` onward.
#[must_use]
pub fn data_range_from(file: FileId, from_offset: u64) -> (Vec<u8>, Vec<u8>) {
    (
        data_key(file, from_offset),
        (file.0 + 1).to_be_bytes().to_vec(),
    )
}

/// The key range `[start, end)` covering all of a file's blocks.
#[must_use]
pub fn data_range(file: FileId) -> (Vec<u8>, Vec<u8>) {
    data_range_from(file, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_keys_sort_within_their_range() {
        let (start, end) = dir_range(FileId(5));
        let a = dir_key(FileId(5), "a");
        let z = dir_key(FileId(5), "zz");
        assert!(start <= a && a < z && z < end);
        let other = dir_key(FileId(6), "a");
        assert!(other >= end);
    }

    #[test]
    fn data_keys_sort_by_offset() {
        let lo = data_key(FileId(7), 0);
        let hi = data_key(FileId(7), 1 << 40);
        assert!(lo < hi);
        let (start, end) = data_range(FileId(7));
        assert!(start <= lo && hi < end);
    }

    #[test]
    fn entry_name_suffix() {
        let key = dir_key(FileId(1), "hello");
        assert_eq!(dir_key_name(&key), Some(b"hello".as_slice()));
    }
}
