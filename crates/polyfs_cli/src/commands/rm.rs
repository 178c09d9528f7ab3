use anyhow::{Result, bail};

use crate::state::CliState;

pub async fn rm(state: &mut CliState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: rm <file>...");
    }
    for path in args {
        let (dir, name) = state.resolve_parent(path).await?;
        dir.remove(&state.cred, name).await?;
    }
    Ok(())
}

pub async fn rmdir(state: &mut CliState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: rmdir <dir>...");
    }
    for path in args {
        let (dir, name) = state.resolve_parent(path).await?;
        dir.rmdir(&state.cred, name).await?;
    }
    Ok(())
}
