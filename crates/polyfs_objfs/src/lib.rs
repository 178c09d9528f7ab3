//! The object filesystem: POSIX file semantics layered over an ordered
//! key/value store.
//!
//! Three namespaces carry the state: `meta` holds inode bodies (and the
//! superblock under id 0), `dir` holds one key per directory entry, and
//! `data` holds block-aligned file data. Every metadata mutation groups
//! its writes into one [`polyfs_keyval::WriteBatch`], so a commit either
//! lands completely or not at all — including on a Paxos-replicated
//! store, where the batch travels through consensus first.

mod attr;
mod dir;
mod file;
mod fs;
mod keys;
mod meta;
mod openfile;

pub use dir::{ObjDirEntry, ObjDirIter};
pub use file::ObjFile;
pub use fs::ObjFilesystem;
pub use openfile::ObjOpenFile;

/// Default block size for file data.
pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
