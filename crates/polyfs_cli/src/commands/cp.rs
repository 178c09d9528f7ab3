use anyhow::{Result, bail};
use polyfs_vfs::{OpenFlags, Setattr};

use crate::state::CliState;

pub async fn cp(state: &mut CliState, args: &[String]) -> Result<()> {
    let [from, to] = args else {
        bail!("usage: cp <from> <to>");
    };

    let src = state.resolve(from).await?;
    let attr = src.getattr().await?;
    let input = src.open(&state.cred, OpenFlags::READ).await?;

    let (dir, name) = state.resolve_parent(to).await?;
    let output = dir
        .open_named(
            &state.cred,
            name,
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            &Setattr::with_mode(attr.mode),
        )
        .await?;

    let mut offset = 0u64;
    loop {
        let (data, eof) = input.read(offset, 65536).await?;
        let mut written = 0usize;
        while written < data.len() {
            written += output.write(offset + written as u64, &data[written..]).await? as usize;
        }
        offset += data.len() as u64;
        if eof {
            break;
        }
    }
    output.flush().await?;
    Ok(())
}
