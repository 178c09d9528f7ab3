use std::io::Write as _;

use anyhow::{Result, bail};
use polyfs_vfs::OpenFlags;

use crate::state::CliState;

pub async fn cat(state: &mut CliState, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("usage: cat <file>...");
    }
    let stdout = std::io::stdout();
    for path in args {
        let file = state.resolve(path).await?;
        let of = file.open(&state.cred, OpenFlags::READ).await?;
        let mut offset = 0u64;
        loop {
            let (data, eof) = of.read(offset, 65536).await?;
            offset += data.len() as u64;
            stdout.lock().write_all(&data)?;
            if eof {
                break;
            }
        }
    }
    Ok(())
}
