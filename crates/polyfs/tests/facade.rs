#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use polyfs::{File, Filesystem, PfsFilesystem, mount};
use polyfs_keyval::Database;
use polyfs_objfs::ObjFilesystem;
use polyfs_vfs::{Credential, FileType, FsError, OpenFlags, Setattr};

fn cred() -> Credential {
    Credential::user(0, 0)
}

fn mode(m: u32) -> Setattr {
    Setattr::with_mode(m)
}

async fn objfs() -> Filesystem {
    Filesystem::Obj(ObjFilesystem::open(Database::memory()).await.unwrap())
}

#[tokio::test]
async fn object_filesystem_through_the_facade() {
    let fs = mount("memfs:", &cred()).await.unwrap();
    let root = fs.root().await.unwrap();

    let of = root
        .open_named(&cred(), "hello", OpenFlags::RDWR | OpenFlags::CREATE, &mode(0o644))
        .await
        .unwrap();
    of.write(0, b"facade").await.unwrap();
    let (data, eof) = of.read(0, 100).await.unwrap();
    assert_eq!(data, b"facade");
    assert!(eof);

    let attr = of.file().getattr().await.unwrap();
    assert_eq!(attr.size, 6);
    assert_eq!(attr.file_type, FileType::File);

    // Handles round-trip through the owning filesystem.
    let handle = of.file().handle().unwrap();
    let found = fs.find_handle(&handle).await.unwrap();
    assert_eq!(found.fileid(), of.file().fileid());
}

#[tokio::test]
async fn pseudo_filesystem_composes_mounts() {
    let pfs = PfsFilesystem::new();
    pfs.add("/left", objfs().await).unwrap();
    pfs.add("/nested/right", objfs().await).unwrap();
    let fs = Filesystem::Pfs(Arc::new(pfs));

    let root = fs.root().await.unwrap();

    // The pseudo-root lists its mount points and synthesised dirs.
    let mut iter = root.readdir(&cred(), 0).await.unwrap();
    let mut names = Vec::new();
    while let Some((entry, _file)) = iter.next().await.unwrap() {
        names.push(entry.name);
    }
    assert_eq!(names, vec!["left".to_owned(), "nested".to_owned()]);

    // A mount point resolves into the mounted filesystem's root.
    let left = root.lookup(&cred(), "left").await.unwrap();
    assert!(matches!(left, File::Obj(_)));
    left.mkdir(&cred(), "inside", &mode(0o755)).await.unwrap();
    assert!(left.lookup(&cred(), "inside").await.is_ok());

    // Intermediate components are pseudo-directories.
    let nested = root.lookup(&cred(), "nested").await.unwrap();
    assert!(matches!(nested, File::Pfs(_)));
    let right = nested.lookup(&cred(), "right").await.unwrap();
    assert!(matches!(right, File::Obj(_)));

    // `..` of a pseudo-directory walks back up.
    let up = nested.lookup(&cred(), "..").await.unwrap();
    assert_eq!(up.fileid(), root.fileid());
}

#[tokio::test]
async fn pseudo_filesystem_is_read_only() {
    let pfs = PfsFilesystem::new();
    pfs.add("/only", objfs().await).unwrap();
    let root = Filesystem::Pfs(Arc::new(pfs)).root().await.unwrap();

    assert_eq!(
        root.mkdir(&cred(), "nope", &mode(0o755)).await.err(),
        Some(FsError::Unsupported)
    );
    assert_eq!(
        root.remove(&cred(), "only").await.err(),
        Some(FsError::Unsupported)
    );
    assert!(root.access(&cred(), polyfs_vfs::AccessFlags::READ).await);
    assert!(!root.access(&cred(), polyfs_vfs::AccessFlags::WRITE).await);
}

#[tokio::test]
async fn mount_rejects_duplicates_and_bad_paths() {
    let pfs = PfsFilesystem::new();
    pfs.add("/a", objfs().await).unwrap();
    assert_eq!(pfs.add("/a", objfs().await).err(), Some(FsError::Exists));
    assert_eq!(pfs.add("/", objfs().await).err(), Some(FsError::Invalid));
    // Mounting beneath an existing mount point is refused.
    assert_eq!(
        pfs.add("/a/b", objfs().await).err(),
        Some(FsError::Exists)
    );
}

#[tokio::test]
async fn unknown_scheme_is_rejected() {
    assert_eq!(
        mount("gopher://example", &cred()).await.err(),
        Some(FsError::Unsupported)
    );
    assert_eq!(
        mount("not a url", &cred()).await.err(),
        Some(FsError::Invalid)
    );
}

#[tokio::test]
async fn cross_filesystem_rename_and_link_are_refused() {
    let a = objfs().await;
    let b = objfs().await;
    let root_a = a.root().await.unwrap();
    let root_b = b.root().await.unwrap();

    root_a
        .open_named(&cred(), "f", OpenFlags::RDWR | OpenFlags::CREATE, &mode(0o644))
        .await
        .unwrap();

    assert_eq!(
        root_b.rename(&cred(), "f", &root_a, "f").await.err(),
        Some(FsError::CrossDevice)
    );
    let file = root_a.lookup(&cred(), "f").await.unwrap();
    // Same variant, different filesystem instances: still cross-device.
    assert_eq!(
        root_b.link(&cred(), "f2", &file).await.err(),
        Some(FsError::CrossDevice)
    );
}
