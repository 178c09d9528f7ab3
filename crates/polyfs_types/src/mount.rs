#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

//! MOUNT version 3 protocol (RFC 1813, appendix I).

use crate::xdr::{List, Opaque, XdrCodec};

pub const PROGRAM: u32 = 100_005;
pub const VERSION: u32 = 3;

pub const MNTPATHLEN: usize = 1024;
pub const MNTNAMLEN: usize = 255;
pub const FHSIZE3: usize = 64;

/// MOUNT procedure numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MOUNT_PROGRAM {
    MOUNTPROC3_NULL = 0,
    MOUNTPROC3_MNT = 1,
    MOUNTPROC3_DUMP = 2,
    MOUNTPROC3_UMNT = 3,
    MOUNTPROC3_UMNTALL = 4,
    MOUNTPROC3_EXPORT = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, XdrCodec)]
#[repr(u32)]
pub enum mountstat3 {
    MNT3_OK = 0,
    MNT3ERR_PERM = 1,
    MNT3ERR_NOENT = 2,
    MNT3ERR_IO = 5,
    MNT3ERR_ACCES = 13,
    MNT3ERR_NOTDIR = 20,
    MNT3ERR_INVAL = 22,
    MNT3ERR_NAMETOOLONG = 63,
    MNT3ERR_NOTSUPP = 10004,
    MNT3ERR_SERVERFAULT = 10006,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, XdrCodec)]
pub struct dirpath<'a>(pub Opaque<'a>);

impl<'a> From<&'a str> for dirpath<'a> {
    fn from(path: &'a str) -> Self {
        Self(Opaque::borrowed(path.as_bytes()))
    }
}

#[derive(Debug, Clone, XdrCodec)]
pub struct mountres3_ok {
    pub fhandle: Vec<u8>,
    pub auth_flavors: Vec<u32>,
}

#[derive(Debug, Clone, XdrCodec)]
pub enum mountres3 {
    #[xdr(0)]
    Ok(mountres3_ok),
    // Every non-zero status carries no body; the discriminant itself is
    // the status. The common failures are enumerated explicitly so the
    // decoder can report them.
    #[xdr(1)]
    ErrPerm,
    #[xdr(2)]
    ErrNoent,
    #[xdr(5)]
    ErrIo,
    #[xdr(13)]
    ErrAcces,
    #[xdr(20)]
    ErrNotdir,
    #[xdr(22)]
    ErrInval,
    #[xdr(63)]
    ErrNametoolong,
    #[xdr(10004)]
    ErrNotsupp,
    #[xdr(10006)]
    ErrServerfault,
}

impl mountres3 {
    pub const fn status(&self) -> mountstat3 {
        match self {
            Self::Ok(_) => mountstat3::MNT3_OK,
            Self::ErrPerm => mountstat3::MNT3ERR_PERM,
            Self::ErrNoent => mountstat3::MNT3ERR_NOENT,
            Self::ErrIo => mountstat3::MNT3ERR_IO,
            Self::ErrAcces => mountstat3::MNT3ERR_ACCES,
            Self::ErrNotdir => mountstat3::MNT3ERR_NOTDIR,
            Self::ErrInval => mountstat3::MNT3ERR_INVAL,
            Self::ErrNametoolong => mountstat3::MNT3ERR_NAMETOOLONG,
            Self::ErrNotsupp => mountstat3::MNT3ERR_NOTSUPP,
            Self::ErrServerfault => mountstat3::MNT3ERR_SERVERFAULT,
        }
    }
}

#[derive(Debug, Clone, XdrCodec)]
pub struct groupnode<'a>(pub Opaque<'a>);

#[derive(Debug, Clone, XdrCodec)]
pub struct exportnode<'a, 'b> {
    pub ex_dir: dirpath<'a>,
    pub ex_groups: List<groupnode<'b>>,
}

pub type exports<'a, 'b> = List<exportnode<'a, 'b>>;
