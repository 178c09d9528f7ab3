use anyhow::Result;
use polyfs_vfs::{FileType, ModeFlags, PosixAttr};

use crate::state::CliState;

pub async fn ls(state: &mut CliState, args: &[String]) -> Result<()> {
    let path = args.first().map_or(".", String::as_str);
    let dir = state.resolve(path).await?;
    let mut iter = dir.readdir(&state.cred, 0).await?;
    let mut names = Vec::new();
    while let Some((entry, _)) = iter.next().await? {
        names.push(entry.name);
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// `ls -l` style listing with one attribute line per entry.
pub async fn lh(state: &mut CliState, args: &[String]) -> Result<()> {
    let path = args.first().map_or(".", String::as_str);
    let dir = state.resolve(path).await?;
    let mut iter = dir.readdir(&state.cred, 0).await?;
    while let Some((entry, file)) = iter.next().await? {
        let attr = file.getattr().await?;
        println!(
            "{} {:>4} {:>5} {:>5} {:>10} {:>12} {}",
            mode_string(&attr),
            attr.nlink,
            attr.uid,
            attr.gid,
            attr.size,
            attr.mtime / 1_000_000_000,
            entry.name
        );
    }
    Ok(())
}

fn mode_string(attr: &PosixAttr) -> String {
    let kind = match attr.file_type {
        FileType::File => '-',
        FileType::Directory => 'd',
        FileType::BlockDev => 'b',
        FileType::CharDev => 'c',
        FileType::Symlink => 'l',
        FileType::Socket => 's',
        FileType::Fifo => 'p',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    let triples = [
        (ModeFlags::RUSER, ModeFlags::WUSER, ModeFlags::XUSER),
        (ModeFlags::RGROUP, ModeFlags::WGROUP, ModeFlags::XGROUP),
        (ModeFlags::ROTHER, ModeFlags::WOTHER, ModeFlags::XOTHER),
    ];
    for (r, w, x) in triples {
        out.push(if attr.mode & r != 0 { 'r' } else { '-' });
        out.push(if attr.mode & w != 0 { 'w' } else { '-' });
        out.push(if attr.mode & x != 0 { 'x' } else { '-' });
    }
    // Overlay the setuid/setgid/sticky markers.
    let mut bytes: Vec<char> = out.chars().collect();
    if attr.mode & ModeFlags::SETUID != 0 {
        bytes[3] = if bytes[3] == 'x' { 's' } else { 'S' };
    }
    if attr.mode & ModeFlags::SETGID != 0 {
        bytes[6] = if bytes[6] == 'x' { 's' } else { 'S' };
    }
    if attr.mode & ModeFlags::STICKY != 0 {
        bytes[9] = if bytes[9] == 'x' { 't' } else { 'T' };
    }
    bytes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_rendering() {
        let mut attr = PosixAttr::new(FileType::Directory);
        attr.mode = 0o755;
        assert_eq!(mode_string(&attr), "drwxr-xr-x");

        attr.file_type = FileType::File;
        attr.mode = 0o4644;
        assert_eq!(mode_string(&attr), "-rwSr--r--");

        attr.file_type = FileType::Directory;
        attr.mode = 0o1777;
        assert_eq!(mode_string(&attr), "drwxrwxrwt");
    }
}
