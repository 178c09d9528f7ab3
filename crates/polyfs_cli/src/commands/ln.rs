use anyhow::{Result, bail};
use polyfs_vfs::Setattr;

use crate::state::CliState;

pub async fn ln(state: &mut CliState, args: &[String]) -> Result<()> {
    match args {
        [flag, target, name] if flag == "-s" => {
            let (dir, leaf) = state.resolve_parent(name).await?;
            dir.symlink(&state.cred, leaf, target, &Setattr::with_mode(0o777))
                .await?;
            Ok(())
        }
        [target, name] => {
            let file = state.resolve(target).await?;
            let (dir, leaf) = state.resolve_parent(name).await?;
            dir.link(&state.cred, leaf, &file).await?;
            Ok(())
        }
        _ => bail!("usage: ln [-s] <target> <name>"),
    }
}
