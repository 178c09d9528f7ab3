use polyfs_types::mount::{
    MOUNT_PROGRAM, PROGRAM, VERSION, dirpath, exports, mountres3, mountres3_ok,
};
use polyfs_types::xdr::{Pack, Unpack, Void};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::rpc::RpcClient;

/// Client for the MOUNT service, used to enumerate exports and obtain
/// root filehandles.
#[derive(Debug)]
pub struct MountClient<IO> {
    rpc: RpcClient<IO>,
}

impl<IO> MountClient<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub const fn new(rpc: RpcClient<IO>) -> Self {
        Self { rpc }
    }

    pub async fn null(&mut self) -> Result<(), Error> {
        let Void = self
            .call::<Void, Void>(MOUNT_PROGRAM::MOUNTPROC3_NULL, &Void)
            .await?;
        Ok(())
    }

    /// Mounts an export, returning its root filehandle.
    pub async fn mnt(&mut self, path: dirpath<'_>) -> Result<mountres3_ok, Error> {
        let res: mountres3 = self.call(MOUNT_PROGRAM::MOUNTPROC3_MNT, &path).await?;
        match res {
            mountres3::Ok(ok) => Ok(ok),
            err => Err(Error::Mount(err.status())),
        }
    }

    pub async fn umnt(&mut self, path: dirpath<'_>) -> Result<(), Error> {
        let Void = self.call(MOUNT_PROGRAM::MOUNTPROC3_UMNT, &path).await?;
        Ok(())
    }

    pub async fn umntall(&mut self) -> Result<(), Error> {
        let Void = self
            .call::<Void, Void>(MOUNT_PROGRAM::MOUNTPROC3_UMNTALL, &Void)
            .await?;
        Ok(())
    }

    /// Lists the server's export table.
    pub async fn export(&mut self) -> Result<exports<'static, 'static>, Error> {
        self.call::<Void, exports>(MOUNT_PROGRAM::MOUNTPROC3_EXPORT, &Void)
            .await
    }

    async fn call<C, R>(&mut self, proc: MOUNT_PROGRAM, args: &C) -> Result<R, Error>
    where
        C: Pack,
        R: Unpack,
    {
        self.rpc.call(PROGRAM, VERSION, proc as u32, args).await
    }
}
