//! An NFSv3 client filesystem.
//!
//! The wire side is a record-marked ONC RPC client with typed program
//! wrappers for NFSv3, MOUNT and the portmapper. The filesystem side
//! caches attributes per filehandle for [`ATTR_TIMEOUT`], refreshes them
//! opportunistically from every post-op attribute a server sends (on
//! failures too), and streams directories through READDIRPLUS with the
//! cookie verifier carried between pages. The RPC layer is reached
//! through the [`NfsProgram`] trait so tests can stand in a fake server.

mod attr;
mod client;
mod datacache;
mod dir;
mod error;
mod file;
mod fs;
mod mount;
mod openfile;
mod portmap;
mod program;
mod rpc;

pub use attr::{to_posix_attr, to_sattr3};
pub use client::Nfs3Client;
pub use datacache::{BlockState, DataCache};
pub use dir::{NfsDirEntry, NfsDirIter};
pub use error::{Error, RpcError, map_nfs_status};
pub use file::NfsFile;
pub use fs::{ATTR_TIMEOUT, FsInfo, NfsFilesystem};
pub use mount::MountClient;
pub use openfile::NfsOpenFile;
pub use portmap::PortmapClient;
pub use program::{NfsProgram, RpcNfsProgram};
pub use rpc::RpcClient;
