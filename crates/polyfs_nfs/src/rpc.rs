use std::fmt::Debug;
use std::io::Cursor;

use polyfs_types::rpc::{
    self, RPC_VERSION_2, accept_stat_data, call_body, fragment_header, msg_body, opaque_auth,
    reply_body, rpc_msg,
};
use polyfs_types::xdr::{Pack, Unpack};
use polyfs_vfs::Credential;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, RpcError};

/// A record-marked ONC RPC client over a byte stream.
pub struct RpcClient<IO> {
    io: IO,
    xid: u32,
    credential: opaque_auth<'static>,
    verifier: opaque_auth<'static>,
}

impl<IO> Debug for RpcClient<IO> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").field("xid", &self.xid).finish()
    }
}

impl<IO> RpcClient<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// A client with no authentication; the starting XID is random.
    pub fn new(io: IO) -> Self {
        Self::new_with_auth(io, opaque_auth::default(), opaque_auth::default())
    }

    /// A client presenting an AUTH_UNIX credential built from `cred`.
    pub fn with_credential(io: IO, cred: &Credential) -> Result<Self, Error> {
        let auth = rpc::auth_unix_credential(
            rand::random(),
            "polyfs",
            cred.uid(),
            cred.gid(),
            cred.groups(),
        )?;
        Ok(Self::new_with_auth(io, auth, opaque_auth::default()))
    }

    pub fn new_with_auth(
        io: IO,
        credential: opaque_auth<'static>,
        verifier: opaque_auth<'static>,
    ) -> Self {
        Self {
            io,
            xid: rand::random(),
            credential,
            verifier,
        }
    }

    /// Calls a procedure, packing `args` and unpacking the reply body.
    pub async fn call<C, R>(&mut self, prog: u32, vers: u32, proc: u32, args: &C) -> Result<R, Error>
    where
        C: Pack,
        R: Unpack,
    {
        let call = call_body {
            rpcvers: RPC_VERSION_2,
            prog,
            vers,
            proc,
            cred: self.credential.borrow(),
            verf: self.verifier.borrow(),
        };
        let msg = rpc_msg {
            xid: self.xid,
            body: msg_body::CALL(call),
        };
        self.xid = self.xid.wrapping_add(1);

        let xid = msg.xid;
        Self::send_call(&mut self.io, &msg, args).await?;
        Self::recv_reply::<R>(&mut self.io, xid).await
    }

    async fn send_call<C: Pack>(io: &mut IO, msg: &rpc_msg<'_, '_>, args: &C) -> Result<(), Error> {
        let total_len = msg.packed_size() + args.packed_size();
        let header = fragment_header::new(
            u32::try_from(total_len)
                .map_err(|_| polyfs_types::xdr::Error::ObjectTooLarge(total_len))?,
            true,
        );
        let mut buf = Vec::with_capacity(total_len + 4);
        buf.extend_from_slice(&header.to_be_bytes());
        msg.pack(&mut buf)?;
        args.pack(&mut buf)?;
        io.write_all(&buf).await?;
        io.flush().await?;
        Ok(())
    }

    async fn recv_reply<R: Unpack>(io: &mut IO, xid: u32) -> Result<R, Error> {
        // Reassemble the record from its fragments.
        let mut record = Vec::new();
        loop {
            let mut header = [0u8; 4];
            io.read_exact(&mut header).await?;
            let header = fragment_header::from(header);
            let len = header.fragment_length() as usize;
            let start = record.len();
            record.resize(start + len, 0);
            io.read_exact(&mut record[start..]).await?;
            if header.last() {
                break;
            }
        }

        let total = record.len() as u64;
        let mut cursor = Cursor::new(record);
        let (reply, _) = rpc_msg::unpack(&mut cursor)?;
        if reply.xid != xid {
            return Err(RpcError::UnexpectedXid.into());
        }

        let accepted = match reply.body {
            msg_body::REPLY(reply_body::MSG_ACCEPTED(accepted)) => accepted,
            msg_body::REPLY(reply_body::MSG_DENIED(denied)) => return Err(denied.into()),
            msg_body::CALL(_) => return Err(RpcError::UnexpectedCall.into()),
        };
        if !matches!(accepted.reply_data, accept_stat_data::SUCCESS) {
            let err =
                RpcError::try_from(accepted.reply_data).map_err(|()| RpcError::UnexpectedCall)?;
            return Err(err.into());
        }

        let (value, _) = R::unpack(&mut cursor)?;
        if cursor.position() != total {
            return Err(RpcError::NotFullyParsed.into());
        }
        Ok(value)
    }
}
