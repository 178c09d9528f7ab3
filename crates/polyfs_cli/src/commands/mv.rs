use anyhow::{Result, bail};

use crate::state::CliState;

pub async fn mv(state: &mut CliState, args: &[String]) -> Result<()> {
    let [from, to] = args else {
        bail!("usage: mv <from> <to>");
    };
    let (from_dir, from_name) = state.resolve_parent(from).await?;

    // Moving onto an existing directory means moving into it, keeping
    // the source name.
    let mut destination = None;
    if let Ok(target) = state.resolve(to).await {
        if target.getattr().await.is_ok_and(|attr| attr.is_dir()) {
            destination = Some((target, from_name));
        }
    }
    let (to_dir, to_name) = match destination {
        Some(dest) => dest,
        None => state.resolve_parent(to).await?,
    };

    to_dir
        .rename(&state.cred, to_name, &from_dir, from_name)
        .await?;
    Ok(())
}
