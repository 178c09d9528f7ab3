use std::sync::Arc;

use polyfs_keyval::Database;
use polyfs_nfs::{MountClient, Nfs3Client, PortmapClient, RpcClient, RpcNfsProgram};
use polyfs_objfs::ObjFilesystem;
use polyfs_types::{mount as mountproto, nfs3, portmap};
use polyfs_vfs::{Clock, Credential, FsError, Result, Url};
use tokio::net::TcpStream;

use crate::fs::Filesystem;
use crate::pfs::PfsFilesystem;
use crate::{TcpNfsFilesystem, TcpNfsProgram};

/// Mounts a filesystem from a URL:
///
/// * `objfs:<path>` or `memfs:` — an object filesystem on a fresh local
///   store;
/// * `nfs://host[/export]` — an NFSv3 mount; without an export path,
///   every export the server lists is composed under a
///   pseudo-filesystem.
pub async fn mount(url: &str, cred: &Credential) -> Result<Filesystem> {
    let url = Url::parse(url)?;
    match url.scheme.as_str() {
        "objfs" | "memfs" => {
            let fs = ObjFilesystem::open(Database::memory()).await?;
            Ok(Filesystem::Obj(fs))
        }
        "nfs" => mount_nfs(&url, cred).await,
        _ => Err(FsError::Unsupported),
    }
}

async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    TcpStream::connect((host, port)).await.map_err(|err| {
        tracing::error!(host, port, %err, "connect failed");
        FsError::Io
    })
}

fn io_error(err: &polyfs_nfs::Error) -> FsError {
    tracing::error!(%err, "mount rpc failed");
    err.to_fs_error()
}

async fn mount_nfs(url: &Url, cred: &Credential) -> Result<Filesystem> {
    let host = url.host.as_str();
    tracing::info!(host, "contacting portmapper");

    // Discover ports, then speak to the MOUNT service.
    let pm_stream = connect(host, portmap::PMAP_PORT).await?;
    let mut portmapper = PortmapClient::new(RpcClient::new(pm_stream));
    let mount_port = portmapper
        .getport(mountproto::PROGRAM, mountproto::VERSION)
        .await
        .map_err(|e| io_error(&e))?;
    let nfs_port = portmapper
        .getport(nfs3::PROGRAM, nfs3::VERSION)
        .await
        .map_err(|e| io_error(&e))?;

    let mount_stream = connect(host, mount_port).await?;
    let mut mounter = MountClient::new(
        RpcClient::with_credential(mount_stream, cred).map_err(|e| io_error(&e))?,
    );

    // Either mount the named export, or enumerate and mount them all.
    let mut targets: Vec<String> = Vec::new();
    if url.path.is_empty() || url.path == "/" {
        let exports = mounter.export().await.map_err(|e| io_error(&e))?;
        for export in exports.into_inner() {
            if let Ok(dir) = String::from_utf8(export.ex_dir.0.to_vec()) {
                targets.push(dir);
            }
        }
        if targets.is_empty() {
            return Err(FsError::NotFound);
        }
    } else {
        targets.push(url.path.clone());
    }

    let single = targets.len() == 1;
    let pfs = PfsFilesystem::new();
    for target in targets {
        tracing::info!(export = %target, "mounting");
        let res = mounter
            .mnt(mountproto::dirpath::from(target.as_str()))
            .await
            .map_err(|e| io_error(&e))?;
        let root_fh = nfs3::nfs_fh3 {
            data: res.fhandle.into(),
        };

        let stream = connect(host, nfs_port).await?;
        let rpc = RpcClient::with_credential(stream, cred).map_err(|e| io_error(&e))?;
        let proto: TcpNfsProgram = RpcNfsProgram::new(Nfs3Client::new(rpc));
        let fs: Arc<TcpNfsFilesystem> =
            polyfs_nfs::NfsFilesystem::new(proto, Clock::system(), root_fh);

        if single {
            return Ok(Filesystem::Nfs(fs));
        }
        pfs.add(&target, Filesystem::Nfs(fs))?;
    }
    Ok(Filesystem::Pfs(Arc::new(pfs)))
}
