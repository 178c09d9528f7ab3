use anyhow::{Result, bail};
use polyfs::Filesystem;

use crate::state::CliState;

pub async fn stat(state: &mut CliState, args: &[String]) -> Result<()> {
    let [path] = args else {
        bail!("usage: stat <file>");
    };
    let file = state.resolve(path).await?;
    let attr = file.getattr().await?;
    println!("  file: {path}");
    println!("fileid: {}", file.fileid());
    println!("  type: {:?}", attr.file_type);
    println!("  mode: {:o}", attr.mode);
    println!(" nlink: {}", attr.nlink);
    println!(" owner: {}:{}", attr.uid, attr.gid);
    println!("  size: {}", attr.size);
    println!(" atime: {}", attr.atime);
    println!(" mtime: {}", attr.mtime);
    println!(" ctime: {}", attr.ctime);
    println!(" birth: {}", attr.birthtime);
    Ok(())
}

pub async fn fsid(state: &mut CliState, _args: &[String]) -> Result<()> {
    match &state.fs {
        Filesystem::Obj(fs) => {
            let hex: String = fs.fsid().iter().map(|b| format!("{b:02x}")).collect();
            println!("{hex}");
        }
        Filesystem::Nfs(fs) => {
            let hex: String = fs.fsid().iter().map(|b| format!("{b:02x}")).collect();
            println!("{hex}");
        }
        Filesystem::Pfs(_) => println!("(pseudo filesystem)"),
    }
    Ok(())
}
