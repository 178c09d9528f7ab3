#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

//! ONC RPC version 2 message framing (RFC 5531).

use std::io::{Read, Write};

use crate::xdr::{Error, Opaque, Pack, Result, Unpack, XdrCodec};

pub const RPC_VERSION_2: u32 = 2;

pub const AUTH_NONE: u32 = 0;
pub const AUTH_UNIX: u32 = 1;

/// Record-marking fragment header: 31 bits of length plus a final-fragment
/// flag in the top bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct fragment_header(u32);

impl fragment_header {
    pub const MAX_FRAGMENT_LEN: u32 = 0x7fff_ffff;

    #[must_use]
    pub const fn new(len: u32, last: bool) -> Self {
        if last {
            Self(len | 0x8000_0000)
        } else {
            Self(len)
        }
    }

    #[must_use]
    pub const fn last(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    #[must_use]
    pub const fn fragment_length(self) -> u32 {
        self.0 & Self::MAX_FRAGMENT_LEN
    }

    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl From<[u8; 4]> for fragment_header {
    fn from(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

#[derive(Debug, Default, Clone, XdrCodec)]
pub struct opaque_auth<'a> {
    pub flavor: u32,
    pub body: Opaque<'a>,
}

impl opaque_auth<'_> {
    /// A second view of the same credential without cloning the body.
    #[must_use]
    pub fn borrow(&self) -> opaque_auth<'_> {
        opaque_auth {
            flavor: self.flavor,
            body: Opaque::borrowed(self.body.as_ref()),
        }
    }
}

/// AUTH_UNIX credential body (RFC 5531, appendix A).
#[derive(Debug, Clone, XdrCodec)]
pub struct auth_unix {
    pub stamp: u32,
    pub machinename: String,
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct call_body<'a, 'b> {
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth<'a>,
    pub verf: opaque_auth<'b>,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}

#[derive(Debug, Clone, XdrCodec)]
pub enum accept_stat_data {
    /// Procedure results follow the reply header and are decoded by the
    /// caller.
    #[xdr(0)]
    SUCCESS,
    #[xdr(1)]
    PROG_UNAVAIL,
    #[xdr(2)]
    PROG_MISMATCH(mismatch_info),
    #[xdr(3)]
    PROC_UNAVAIL,
    #[xdr(4)]
    GARBAGE_ARGS,
    #[xdr(5)]
    SYSTEM_ERR,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct accepted_reply<'a> {
    pub verf: opaque_auth<'a>,
    pub reply_data: accept_stat_data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, XdrCodec)]
#[repr(u32)]
pub enum auth_stat {
    AUTH_OK = 0,
    AUTH_BADCRED = 1,
    AUTH_REJECTEDCRED = 2,
    AUTH_BADVERF = 3,
    AUTH_REJECTEDVERF = 4,
    AUTH_TOOWEAK = 5,
    AUTH_INVALIDRESP = 6,
    AUTH_FAILED = 7,
}

#[derive(Debug, Clone, XdrCodec)]
pub enum rejected_reply {
    #[xdr(0)]
    RPC_MISMATCH(mismatch_info),
    #[xdr(1)]
    AUTH_ERROR(auth_stat),
}

#[derive(Debug, Clone, XdrCodec)]
pub enum reply_body<'a> {
    #[xdr(0)]
    MSG_ACCEPTED(accepted_reply<'a>),
    #[xdr(1)]
    MSG_DENIED(rejected_reply),
}

#[derive(Debug, Clone, XdrCodec)]
pub enum msg_body<'a, 'b> {
    #[xdr(0)]
    CALL(call_body<'a, 'b>),
    #[xdr(1)]
    REPLY(reply_body<'a>),
}

#[derive(Debug, Clone)]
pub struct rpc_msg<'a, 'b> {
    pub xid: u32,
    pub body: msg_body<'a, 'b>,
}

impl Pack for rpc_msg<'_, '_> {
    fn packed_size(&self) -> usize {
        4 + self.body.packed_size()
    }

    fn pack(&self, out: &mut impl Write) -> Result<usize> {
        Ok(self.xid.pack(out)? + self.body.pack(out)?)
    }
}

impl Unpack for rpc_msg<'_, '_> {
    fn unpack(input: &mut impl Read) -> Result<(Self, usize)> {
        let (xid, mut read) = u32::unpack(input)?;
        let (body, n) = msg_body::unpack(input)?;
        read += n;
        Ok((Self { xid, body }, read))
    }
}

/// Builds an AUTH_UNIX credential from numeric ids.
pub fn auth_unix_credential(
    stamp: u32,
    machinename: &str,
    uid: u32,
    gid: u32,
    gids: &[u32],
) -> Result<opaque_auth<'static>> {
    let body = auth_unix {
        stamp,
        machinename: machinename.to_owned(),
        uid,
        gid,
        gids: gids.to_vec(),
    };
    if body.packed_size() > 400 {
        return Err(Error::ObjectTooLarge(body.packed_size()));
    }
    let bytes = crate::xdr::pack_to_vec(&body)?;
    Ok(opaque_auth {
        flavor: AUTH_UNIX,
        body: Opaque::owned(bytes),
    })
}
