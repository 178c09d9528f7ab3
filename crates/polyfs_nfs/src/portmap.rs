use polyfs_types::portmap::{IPPROTO_TCP, PMAPPROC_GETPORT, PROGRAM, VERSION, mapping};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Error;
use crate::rpc::RpcClient;

/// Client for the portmapper, used to discover the MOUNT and NFS ports.
#[derive(Debug)]
pub struct PortmapClient<IO> {
    rpc: RpcClient<IO>,
}

impl<IO> PortmapClient<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub const fn new(rpc: RpcClient<IO>) -> Self {
        Self { rpc }
    }

    /// The TCP port a program version is registered on.
    pub async fn getport(&mut self, prog: u32, vers: u32) -> Result<u16, Error> {
        let args = mapping {
            prog,
            vers,
            prot: IPPROTO_TCP,
            port: 0,
        };
        let port: u32 = self
            .rpc
            .call(PROGRAM, VERSION, PMAPPROC_GETPORT, &args)
            .await?;
        u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(Error::Portmap(prog))
    }
}
