use anyhow::{Context, Result, bail};
use polyfs_vfs::Setattr;

use crate::state::CliState;

pub async fn chmod(state: &mut CliState, args: &[String]) -> Result<()> {
    let [mode, path] = args else {
        bail!("usage: chmod <octal-mode> <file>");
    };
    let mode = u32::from_str_radix(mode, 8).with_context(|| format!("bad mode '{mode}'"))?;
    let file = state.resolve(path).await?;
    file.setattr(&state.cred, &Setattr::with_mode(mode)).await?;
    Ok(())
}

pub async fn chown(state: &mut CliState, args: &[String]) -> Result<()> {
    let [uid, path] = args else {
        bail!("usage: chown <uid> <file>");
    };
    let uid: u32 = uid.parse().with_context(|| format!("bad uid '{uid}'"))?;
    let file = state.resolve(path).await?;
    let mut staged = Setattr::new();
    staged.set_uid(uid);
    file.setattr(&state.cred, &staged).await?;
    Ok(())
}

pub async fn chgrp(state: &mut CliState, args: &[String]) -> Result<()> {
    let [gid, path] = args else {
        bail!("usage: chgrp <gid> <file>");
    };
    let gid: u32 = gid.parse().with_context(|| format!("bad gid '{gid}'"))?;
    let file = state.resolve(path).await?;
    let mut staged = Setattr::new();
    staged.set_gid(gid);
    file.setattr(&state.cred, &staged).await?;
    Ok(())
}
