#![allow(clippy::unwrap_used)]

mod fake;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use fake::FakeServer;
use polyfs_nfs::NfsFilesystem;
use polyfs_vfs::{Clock, Credential, FsError, OpenFlags, Setattr};

fn cred() -> Credential {
    Credential::user(0, 0)
}

fn mode(m: u32) -> Setattr {
    Setattr::with_mode(m)
}

fn mount(clock: &Clock) -> Arc<NfsFilesystem<FakeServer>> {
    NfsFilesystem::new(FakeServer::new(), clock.clone(), FakeServer::root_fh())
}

fn mount_write_behind(clock: &Clock) -> Arc<NfsFilesystem<FakeServer>> {
    NfsFilesystem::with_write_behind(
        FakeServer::new(),
        clock.clone(),
        FakeServer::root_fh(),
        true,
    )
}

#[tokio::test]
async fn attribute_cache_expires_after_timeout() {
    // Property 4: at most one GETATTR per timeout window per inode.
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let file = root.mkdir(&cred(), "d", &mode(0o755)).await.unwrap();

    let baseline = fs.proto().calls.getattr.load(Ordering::Relaxed);
    for _ in 0..5 {
        file.getattr().await.unwrap();
    }
    assert_eq!(
        fs.proto().calls.getattr.load(Ordering::Relaxed),
        baseline,
        "fresh attributes are served from cache"
    );

    clock.advance(Duration::from_secs(6));
    file.getattr().await.unwrap();
    file.getattr().await.unwrap();
    assert_eq!(
        fs.proto().calls.getattr.load(Ordering::Relaxed),
        baseline + 1,
        "one refresh per expiry"
    );
}

#[tokio::test]
async fn post_op_attributes_refresh_even_on_error() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();

    // The server mutates the directory behind the client's back.
    fs.proto().touch(fake::ROOT_ID);
    let before = root.cached_attr().mtime.seconds;

    // A failing lookup still carries post-op attributes for the dir.
    let err = root.lookup(&cred(), "missing").await.err();
    assert_eq!(err, Some(FsError::NotFound));
    assert!(
        root.cached_attr().mtime.seconds > before,
        "error replies refresh the attribute cache"
    );
}

#[tokio::test]
async fn setattr_elides_noop_rpcs() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let file = root.mkdir(&cred(), "d", &mode(0o750)).await.unwrap();

    let baseline = fs.proto().calls.setattr.load(Ordering::Relaxed);
    // Same mode as cached: no RPC.
    file.setattr(&cred(), &mode(0o750)).await.unwrap();
    assert_eq!(fs.proto().calls.setattr.load(Ordering::Relaxed), baseline);

    // A real change goes to the server.
    file.setattr(&cred(), &mode(0o700)).await.unwrap();
    assert_eq!(
        fs.proto().calls.setattr.load(Ordering::Relaxed),
        baseline + 1
    );
    assert_eq!(file.getattr().await.unwrap().mode, 0o700);
}

#[tokio::test]
async fn exclusive_create_detects_duplicates() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();

    root.open_named(
        &cred(),
        "x",
        OpenFlags::CREATE | OpenFlags::EXCLUSIVE | OpenFlags::RDWR,
        &mode(0o666),
    )
    .await
    .unwrap();

    let err = root
        .open_named(
            &cred(),
            "x",
            OpenFlags::CREATE | OpenFlags::EXCLUSIVE | OpenFlags::RDWR,
            &mode(0o666),
        )
        .await
        .err();
    assert_eq!(err, Some(FsError::Exists));
}

#[tokio::test]
async fn exclusive_create_applies_mode_with_setattr() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();

    let baseline = fs.proto().calls.setattr.load(Ordering::Relaxed);
    let of = root
        .open_named(
            &cred(),
            "y",
            OpenFlags::CREATE | OpenFlags::EXCLUSIVE | OpenFlags::RDWR,
            &mode(0o620),
        )
        .await
        .unwrap();
    assert!(
        fs.proto().calls.setattr.load(Ordering::Relaxed) > baseline,
        "exclusive create is followed by SETATTR"
    );
    assert_eq!(of.file().getattr().await.unwrap().mode, 0o620);
}

#[tokio::test]
async fn reads_and_writes_are_chunked_to_preferences() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let of = root
        .open_named(&cred(), "f", OpenFlags::CREATE | OpenFlags::RDWR, &mode(0o666))
        .await
        .unwrap();

    // A write larger than wtpref is clipped; callers loop on the count.
    let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
    let mut written = 0usize;
    while written < payload.len() {
        let n = of.write(written as u64, &payload[written..]).await.unwrap();
        assert!(n > 0 && n <= fake::WTPREF);
        written += n as usize;
    }
    assert_eq!(
        fs.proto().file_content(of.file().fileid()).unwrap(),
        payload
    );

    // Reads come back at most rtpref at a time.
    let mut collected = Vec::new();
    loop {
        let (data, eof) = of.read(collected.len() as u64, 4096).await.unwrap();
        assert!(data.len() as u32 <= fake::RTPREF);
        collected.extend_from_slice(&data);
        if eof {
            break;
        }
    }
    assert_eq!(collected, payload);
}

#[tokio::test]
async fn readdirplus_streams_all_entries_once() {
    // S5: many entries, observed exactly once with ascending cookies.
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();

    for i in 0..1000 {
        root.open_named(
            &cred(),
            &format!("e{i:04}"),
            OpenFlags::CREATE | OpenFlags::RDWR,
            &mode(0o666),
        )
        .await
        .unwrap();
    }

    let mut iter = root.readdir(&cred(), 0);
    let mut seen = HashSet::new();
    let mut last_cookie = 0;
    while let Some(entry) = iter.next_entry().await.unwrap() {
        assert!(entry.cookie > last_cookie, "cookies are monotone");
        last_cookie = entry.cookie;
        assert!(seen.insert(entry.name.clone()), "no duplicates: {}", entry.name);
        // The embedded filehandles avoid per-entry lookups.
        assert!(entry.file.is_some());
    }
    assert_eq!(seen.len(), 1002);
    assert!(seen.contains("."));
    assert!(seen.contains(".."));
    assert!(
        fs.proto().calls.readdirplus.load(Ordering::Relaxed) > 10,
        "the listing paged through many READDIRPLUS calls"
    );

    // Resuming from a cookie yields the suffix.
    let mut iter = root.readdir(&cred(), 500);
    let mut rest = 0;
    while iter.next_entry().await.unwrap().is_some() {
        rest += 1;
    }
    assert_eq!(rest, 502);
}

#[tokio::test]
async fn stale_cookie_verifier_is_bad_cookie() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    for i in 0..50 {
        root.mkdir(&cred(), &format!("d{i}"), &mode(0o755))
            .await
            .unwrap();
    }

    let mut iter = root.readdir(&cred(), 0);
    // Consume the first page so the iterator holds a verifier.
    let first = iter.next_entry().await.unwrap();
    assert!(first.is_some());

    // Drain the buffered page, then invalidate cookies server-side.
    for _ in 0..20 {
        let _ = iter.next_entry().await.unwrap();
    }
    fs.proto().bump_cookie_epoch();

    let mut result = Ok(());
    loop {
        match iter.next_entry().await {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    assert_eq!(result, Err(FsError::BadCookie));
}

#[tokio::test]
async fn rename_remove_and_links() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let cred = cred();

    let of = root
        .open_named(&cred, "a", OpenFlags::CREATE | OpenFlags::RDWR, &mode(0o666))
        .await
        .unwrap();
    of.write(0, b"content").await.unwrap();
    let file = Arc::clone(of.file());

    root.link(&cred, "alias", &file).await.unwrap();
    let alias = root.lookup(&cred, "alias").await.unwrap();
    assert_eq!(alias.fileid(), file.fileid());

    root.rename(&cred, "renamed", &root, "a").await.unwrap();
    assert_eq!(
        root.lookup(&cred, "a").await.err(),
        Some(FsError::NotFound)
    );
    let renamed = root.lookup(&cred, "renamed").await.unwrap();
    assert_eq!(renamed.fileid(), file.fileid());

    root.remove(&cred, "alias").await.unwrap();
    root.remove(&cred, "renamed").await.unwrap();
    assert_eq!(
        root.lookup(&cred, "renamed").await.err(),
        Some(FsError::NotFound)
    );
}

#[tokio::test]
async fn symlink_and_mkfifo() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let cred = cred();

    let link = root
        .symlink(&cred, "l", "/somewhere/else", &mode(0o777))
        .await
        .unwrap();
    assert_eq!(link.readlink(&cred).await.unwrap(), "/somewhere/else");

    let fifo = root.mkfifo(&cred, "pipe", &mode(0o666)).await.unwrap();
    assert_eq!(
        fifo.getattr().await.unwrap().file_type,
        polyfs_vfs::FileType::Fifo
    );
}

#[tokio::test]
async fn fsstat_combines_fsstat_and_pathconf() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();

    let stat = root.fsstat(&cred()).await.unwrap();
    assert_eq!(stat.total_space, 1 << 30);
    assert_eq!(stat.name_max, 255);
    assert_eq!(stat.link_max, 32_000);
}

#[tokio::test]
async fn write_behind_buffers_until_flush() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount_write_behind(&clock);
    let root = fs.root().await.unwrap();
    let of = root
        .open_named(&cred(), "wb", OpenFlags::CREATE | OpenFlags::RDWR, &mode(0o666))
        .await
        .unwrap();

    let baseline = fs.proto().write_calls();
    of.write(0, b"hello ").await.unwrap();
    of.write(6, b"world").await.unwrap();
    assert_eq!(
        fs.proto().write_calls(),
        baseline,
        "writes are buffered locally"
    );

    // Buffered data is readable before it reaches the server.
    let (data, _) = of.read(0, 11).await.unwrap();
    assert_eq!(data, b"hello world");
    assert!(fs.proto().file_content(of.file().fileid()).unwrap().is_empty());

    of.flush().await.unwrap();
    assert!(fs.proto().write_calls() > baseline);
    assert!(fs.proto().calls.commit.load(Ordering::Relaxed) > 0);
    assert_eq!(
        fs.proto().file_content(of.file().fileid()).unwrap(),
        b"hello world"
    );
}

#[tokio::test]
async fn handles_route_back_through_the_cache() {
    let clock = Clock::manual(1_000_000_000);
    let fs = mount(&clock);
    let root = fs.root().await.unwrap();
    let file = root.mkdir(&cred(), "sub", &mode(0o755)).await.unwrap();

    let handle = file.handle().unwrap();
    let resolved = fs.find_handle(&handle).await.unwrap();
    assert_eq!(resolved.fileid(), file.fileid());

    // A handle from another filesystem is stale here.
    let mut foreign = handle.clone();
    foreign.data[0] ^= 0xff;
    assert_eq!(
        fs.find_handle(&foreign).await.err(),
        Some(FsError::Stale)
    );
}
