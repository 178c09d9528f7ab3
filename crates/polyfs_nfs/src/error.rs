use std::fmt;

use polyfs_types::mount::mountstat3;
use polyfs_types::nfs3::nfsstat3;
use polyfs_types::rpc::{accept_stat_data, rejected_reply};
use polyfs_vfs::FsError;

/// Client-side failures: transport, codec, RPC-layer and protocol
/// status errors.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Xdr(polyfs_types::xdr::Error),
    Rpc(RpcError),
    Mount(mountstat3),
    Nfs(nfsstat3),
    Portmap(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Xdr(e) => write!(f, "xdr error: {e}"),
            Self::Rpc(e) => write!(f, "rpc error: {e}"),
            Self::Mount(status) => write!(f, "mount error: {}", *status as u32),
            Self::Nfs(status) => write!(f, "nfs error: {}", *status as u32),
            Self::Portmap(prog) => write!(f, "program {prog} is not registered"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<polyfs_types::xdr::Error> for Error {
    fn from(e: polyfs_types::xdr::Error) -> Self {
        Self::Xdr(e)
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

impl From<rejected_reply> for Error {
    fn from(e: rejected_reply) -> Self {
        Self::Rpc(e.into())
    }
}

impl Error {
    /// The abstract error kind surfaced to filesystem callers.
    #[must_use]
    pub fn to_fs_error(&self) -> FsError {
        match self {
            Self::Nfs(status) => map_nfs_status(*status),
            _ => FsError::Io,
        }
    }
}

/// Failures at the RPC message layer.
#[derive(Debug)]
pub enum RpcError {
    UnexpectedCall,
    Auth,
    RpcMismatch,
    UnexpectedXid,
    NotFullyParsed,
    ProgUnavail,
    ProgMismatch,
    ProcUnavail,
    GarbageArgs,
    SystemErr,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnexpectedCall => "unexpected CALL message",
            Self::Auth => "authentication failed",
            Self::RpcMismatch => "rpc version mismatch",
            Self::UnexpectedXid => "reply xid does not match any call",
            Self::NotFullyParsed => "trailing bytes after the reply body",
            Self::ProgUnavail => "program unavailable",
            Self::ProgMismatch => "program version mismatch",
            Self::ProcUnavail => "procedure unavailable",
            Self::GarbageArgs => "garbage arguments",
            Self::SystemErr => "system error",
        };
        f.write_str(text)
    }
}

impl std::error::Error for RpcError {}

impl From<rejected_reply> for RpcError {
    fn from(e: rejected_reply) -> Self {
        match e {
            rejected_reply::RPC_MISMATCH(_) => Self::RpcMismatch,
            rejected_reply::AUTH_ERROR(_) => Self::Auth,
        }
    }
}

impl TryFrom<accept_stat_data> for RpcError {
    type Error = ();

    fn try_from(value: accept_stat_data) -> Result<Self, ()> {
        match value {
            accept_stat_data::SUCCESS => Err(()),
            accept_stat_data::PROG_UNAVAIL => Ok(Self::ProgUnavail),
            accept_stat_data::PROG_MISMATCH(_) => Ok(Self::ProgMismatch),
            accept_stat_data::PROC_UNAVAIL => Ok(Self::ProcUnavail),
            accept_stat_data::GARBAGE_ARGS => Ok(Self::GarbageArgs),
            accept_stat_data::SYSTEM_ERR => Ok(Self::SystemErr),
        }
    }
}

/// Maps NFSv3 status codes to the abstract error kinds.
#[must_use]
pub fn map_nfs_status(status: nfsstat3) -> FsError {
    match status {
        nfsstat3::NFS3_OK => FsError::Io,
        nfsstat3::NFS3ERR_PERM => FsError::Perm,
        nfsstat3::NFS3ERR_NOENT => FsError::NotFound,
        nfsstat3::NFS3ERR_EXIST => FsError::Exists,
        nfsstat3::NFS3ERR_XDEV => FsError::CrossDevice,
        nfsstat3::NFS3ERR_NOTDIR => FsError::NotDir,
        nfsstat3::NFS3ERR_ISDIR => FsError::IsDir,
        nfsstat3::NFS3ERR_INVAL => FsError::Invalid,
        nfsstat3::NFS3ERR_NOSPC => FsError::NoSpace,
        nfsstat3::NFS3ERR_ROFS => FsError::ReadOnly,
        nfsstat3::NFS3ERR_NAMETOOLONG => FsError::NameTooLong,
        nfsstat3::NFS3ERR_NOTEMPTY => FsError::NotEmpty,
        nfsstat3::NFS3ERR_DQUOT => FsError::Quota,
        nfsstat3::NFS3ERR_STALE | nfsstat3::NFS3ERR_BADHANDLE => FsError::Stale,
        nfsstat3::NFS3ERR_ACCES => FsError::AccessDenied,
        nfsstat3::NFS3ERR_BAD_COOKIE => FsError::BadCookie,
        nfsstat3::NFS3ERR_NOTSUPP | nfsstat3::NFS3ERR_BADTYPE => FsError::Unsupported,
        nfsstat3::NFS3ERR_IO
        | nfsstat3::NFS3ERR_NXIO
        | nfsstat3::NFS3ERR_NODEV
        | nfsstat3::NFS3ERR_FBIG
        | nfsstat3::NFS3ERR_MLINK
        | nfsstat3::NFS3ERR_REMOTE
        | nfsstat3::NFS3ERR_NOT_SYNC
        | nfsstat3::NFS3ERR_TOOSMALL
        | nfsstat3::NFS3ERR_SERVERFAULT
        | nfsstat3::NFS3ERR_JUKEBOX => FsError::Io,
    }
}
