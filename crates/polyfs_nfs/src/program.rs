use std::future::Future;

use polyfs_types::nfs3::{
    ACCESS3args, ACCESS3res, COMMIT3args, COMMIT3res, CREATE3args, CREATE3res, FSINFO3args,
    FSINFO3res, FSSTAT3args, FSSTAT3res, GETATTR3args, GETATTR3res, LINK3args, LINK3res,
    LOOKUP3args, LOOKUP3res, MKDIR3args, MKDIR3res, MKNOD3args, MKNOD3res, PATHCONF3args,
    PATHCONF3res, READ3args, READ3res, READDIRPLUS3args, READDIRPLUS3res, READLINK3args,
    READLINK3res, REMOVE3args, REMOVE3res, RENAME3args, RENAME3res, RMDIR3args, RMDIR3res,
    SETATTR3args, SETATTR3res, SYMLINK3args, SYMLINK3res, WRITE3args, WRITE3res,
};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::client::Nfs3Client;
use crate::error::Error;

/// The NFSv3 program as seen by the client filesystem: one method per
/// procedure. The production implementation drives RPCs over a stream;
/// tests substitute an in-process fake server.
pub trait NfsProgram: Send + Sync + 'static {
    fn getattr(&self, args: GETATTR3args)
    -> impl Future<Output = Result<GETATTR3res, Error>> + Send;
    fn setattr(&self, args: SETATTR3args)
    -> impl Future<Output = Result<SETATTR3res, Error>> + Send;
    fn lookup(&self, args: LOOKUP3args<'_>)
    -> impl Future<Output = Result<LOOKUP3res, Error>> + Send;
    fn access(&self, args: ACCESS3args) -> impl Future<Output = Result<ACCESS3res, Error>> + Send;
    fn readlink(
        &self,
        args: READLINK3args,
    ) -> impl Future<Output = Result<READLINK3res<'static>, Error>> + Send;
    fn read(&self, args: READ3args) -> impl Future<Output = Result<READ3res<'static>, Error>> + Send;
    fn write(&self, args: WRITE3args<'_>) -> impl Future<Output = Result<WRITE3res, Error>> + Send;
    fn create(&self, args: CREATE3args<'_>)
    -> impl Future<Output = Result<CREATE3res, Error>> + Send;
    fn mkdir(&self, args: MKDIR3args<'_>) -> impl Future<Output = Result<MKDIR3res, Error>> + Send;
    fn symlink(
        &self,
        args: SYMLINK3args<'_>,
    ) -> impl Future<Output = Result<SYMLINK3res, Error>> + Send;
    fn mknod(&self, args: MKNOD3args<'_>) -> impl Future<Output = Result<MKNOD3res, Error>> + Send;
    fn remove(&self, args: REMOVE3args<'_>)
    -> impl Future<Output = Result<REMOVE3res, Error>> + Send;
    fn rmdir(&self, args: RMDIR3args<'_>) -> impl Future<Output = Result<RMDIR3res, Error>> + Send;
    fn rename(
        &self,
        args: RENAME3args<'_, '_>,
    ) -> impl Future<Output = Result<RENAME3res, Error>> + Send;
    fn link(&self, args: LINK3args<'_>) -> impl Future<Output = Result<LINK3res, Error>> + Send;
    fn readdirplus(
        &self,
        args: READDIRPLUS3args,
    ) -> impl Future<Output = Result<READDIRPLUS3res<'static>, Error>> + Send;
    fn fsstat(&self, args: FSSTAT3args) -> impl Future<Output = Result<FSSTAT3res, Error>> + Send;
    fn fsinfo(&self, args: FSINFO3args) -> impl Future<Output = Result<FSINFO3res, Error>> + Send;
    fn pathconf(
        &self,
        args: PATHCONF3args,
    ) -> impl Future<Output = Result<PATHCONF3res, Error>> + Send;
    fn commit(&self, args: COMMIT3args) -> impl Future<Output = Result<COMMIT3res, Error>> + Send;
}

/// [`NfsProgram`] over a real RPC connection. Calls serialise on the
/// connection mutex, matching the single-stream transport underneath.
pub struct RpcNfsProgram<IO> {
    client: tokio::sync::Mutex<Nfs3Client<IO>>,
}

impl<IO> RpcNfsProgram<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    #[must_use]
    pub fn new(client: Nfs3Client<IO>) -> Self {
        Self {
            client: tokio::sync::Mutex::new(client),
        }
    }
}

macro_rules! forward {
    ($($method:ident($args:ty) -> $res:ty;)*) => {
        $(
            async fn $method(&self, args: $args) -> Result<$res, Error> {
                self.client.lock().await.$method(&args).await
            }
        )*
    };
}

impl<IO> NfsProgram for RpcNfsProgram<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    forward! {
        getattr(GETATTR3args) -> GETATTR3res;
        setattr(SETATTR3args) -> SETATTR3res;
        lookup(LOOKUP3args<'_>) -> LOOKUP3res;
        access(ACCESS3args) -> ACCESS3res;
        readlink(READLINK3args) -> READLINK3res<'static>;
        read(READ3args) -> READ3res<'static>;
        write(WRITE3args<'_>) -> WRITE3res;
        create(CREATE3args<'_>) -> CREATE3res;
        mkdir(MKDIR3args<'_>) -> MKDIR3res;
        symlink(SYMLINK3args<'_>) -> SYMLINK3res;
        mknod(MKNOD3args<'_>) -> MKNOD3res;
        remove(REMOVE3args<'_>) -> REMOVE3res;
        rmdir(RMDIR3args<'_>) -> RMDIR3res;
        rename(RENAME3args<'_, '_>) -> RENAME3res;
        link(LINK3args<'_>) -> LINK3res;
        readdirplus(READDIRPLUS3args) -> READDIRPLUS3res<'static>;
        fsstat(FSSTAT3args) -> FSSTAT3res;
        fsinfo(FSINFO3args) -> FSINFO3res;
        pathconf(PATHCONF3args) -> PATHCONF3res;
        commit(COMMIT3args) -> COMMIT3res;
    }
}
