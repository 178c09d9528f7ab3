//! Wire-level type definitions shared by the polyfs crates: the XDR
//! codec, the NFSv3 protocol subset, the MOUNT protocol, ONC RPC message
//! framing and the portmapper.

// Lets the derive macro refer to `polyfs_types::xdr` from inside this
// crate as well as from dependent crates.
extern crate self as polyfs_types;

pub mod mount;
pub mod nfs3;
pub mod portmap;
pub mod rpc;
pub mod xdr;
