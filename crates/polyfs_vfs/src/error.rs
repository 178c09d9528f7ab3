use std::fmt;

pub type Result<T> = std::result::Result<T, FsError>;

/// The abstract error kinds surfaced by filesystem operations. Each
/// implementation maps its native failures onto these; callers never see
/// numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No such entry.
    NotFound,
    /// Entry exists where it must not.
    Exists,
    /// Expected a directory.
    NotDir,
    /// Expected a non-directory.
    IsDir,
    /// Directory not empty.
    NotEmpty,
    /// Permission check failed.
    AccessDenied,
    /// Privileged operation not allowed.
    Perm,
    /// Name exceeds the per-component limit.
    NameTooLong,
    /// Operation spans filesystems.
    CrossDevice,
    /// Out of space.
    NoSpace,
    /// Quota exceeded.
    Quota,
    /// Bad or expired file handle.
    Stale,
    /// Underlying storage or transport failure.
    Io,
    /// Invalid argument.
    Invalid,
    /// Operation not supported by this filesystem.
    Unsupported,
    /// Filesystem is read-only.
    ReadOnly,
    /// Directory cookie verifier mismatch.
    BadCookie,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "no such file or directory",
            Self::Exists => "file exists",
            Self::NotDir => "not a directory",
            Self::IsDir => "is a directory",
            Self::NotEmpty => "directory not empty",
            Self::AccessDenied => "permission denied",
            Self::Perm => "operation not permitted",
            Self::NameTooLong => "file name too long",
            Self::CrossDevice => "cross-device link",
            Self::NoSpace => "no space left on device",
            Self::Quota => "disc quota exceeded",
            Self::Stale => "stale file handle",
            Self::Io => "input/output error",
            Self::Invalid => "invalid argument",
            Self::Unsupported => "operation not supported",
            Self::ReadOnly => "read-only file system",
            Self::BadCookie => "directory cookie is stale",
        };
        f.write_str(text)
    }
}

impl std::error::Error for FsError {}
