//! The polyfs facade: one [`Filesystem`]/[`File`] surface over the
//! object filesystem, the NFSv3 client and the pseudo-filesystem that
//! stitches mounts into a single namespace.
//!
//! Polymorphism is an enum of variants rather than a trait-object
//! hierarchy; each operation dispatches to the concrete implementation.

mod fs;
mod mount;
mod pfs;

pub use fs::{DirEntry, DirIter, File, Filesystem, OpenFile};
pub use mount::mount;
pub use pfs::{PfsFilesystem, PfsNode};

use polyfs_nfs::RpcNfsProgram;

/// The RPC program type used for real network mounts.
pub type TcpNfsProgram = RpcNfsProgram<tokio::net::TcpStream>;
pub type TcpNfsFilesystem = polyfs_nfs::NfsFilesystem<TcpNfsProgram>;
pub type TcpNfsFile = polyfs_nfs::NfsFile<TcpNfsProgram>;
