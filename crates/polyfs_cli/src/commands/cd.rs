use anyhow::{Result, bail};

use crate::state::CliState;

pub async fn cd(state: &mut CliState, args: &[String]) -> Result<()> {
    let path = args.first().map_or("/", String::as_str);
    let dir = state.resolve(path).await?;
    if !dir.getattr().await?.is_dir() {
        bail!("{path}: not a directory");
    }
    state.pwd = state.normalized_pwd(path);
    state.cwd = dir;
    Ok(())
}

pub async fn pwd(state: &mut CliState, _args: &[String]) -> Result<()> {
    println!("{}", state.pwd);
    Ok(())
}
