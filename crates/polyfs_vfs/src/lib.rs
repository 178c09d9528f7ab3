//! Vocabulary shared by every polyfs filesystem: identifiers, handles,
//! credentials, POSIX attributes with their staged-mutation builder,
//! permission checks, the error model, a busy-safe LRU cache, a
//! test-controllable clock and the mount URL parser.

mod access;
mod attr;
mod cache;
mod clock;
mod cred;
mod error;
mod flags;
mod handle;
mod setattr;
mod url;

pub use access::check_access;
pub use attr::{FileId, FileType, Fsattr, PosixAttr};
pub use cache::FileCache;
pub use clock::Clock;
pub use cred::Credential;
pub use error::{FsError, Result};
pub use flags::{AccessFlags, ModeFlags, OpenFlags};
pub use handle::{FILE_HANDLE_MAX, FileHandle};
pub use setattr::Setattr;
pub use url::Url;

/// An opaque identifier for one filesystem instance; prefixes file
/// handles so they can be routed back to the owning filesystem.
pub type FilesystemId = Vec<u8>;

/// Maximum file name length accepted by the object filesystem, matching
/// the usual BSD default.
pub const NAME_MAX: usize = 255;
