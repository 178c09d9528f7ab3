use anyhow::{Result, bail};
use polyfs_vfs::Setattr;

use crate::state::CliState;

pub async fn mkdir(state: &mut CliState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: mkdir <dir>...");
    }
    for path in args {
        let (dir, name) = state.resolve_parent(path).await?;
        dir.mkdir(&state.cred, name, &Setattr::with_mode(0o755))
            .await?;
    }
    Ok(())
}

pub async fn mkfifo(state: &mut CliState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: mkfifo <name>...");
    }
    for path in args {
        let (dir, name) = state.resolve_parent(path).await?;
        dir.mkfifo(&state.cred, name, &Setattr::with_mode(0o644))
            .await?;
    }
    Ok(())
}
