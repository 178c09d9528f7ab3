#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use polyfs_keyval::paxos::{LoopbackNet, Replica, ReplicaConfig};
use polyfs_keyval::{Database, MemoryStore};
use polyfs_objfs::ObjFilesystem;
use polyfs_vfs::{Clock, Credential, OpenFlags, Setattr};

const TEST_LWT: Duration = Duration::from_millis(50);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn filesystem_metadata_replicates_across_peers() {
    let net = LoopbackNet::new();
    let replicas: Vec<Arc<Replica>> = (0..3)
        .map(|_| {
            let (transport, inbox) = net.endpoint();
            Replica::spawn(
                transport,
                inbox,
                MemoryStore::new(),
                ReplicaConfig {
                    leader_wait: TEST_LWT,
                    ..ReplicaConfig::default()
                },
            )
        })
        .collect();

    // Every filesystem transaction becomes one consensus command.
    let cred = Credential::user(0, 0);
    let db = Database::replicated(Arc::clone(&replicas[0]));
    let fs = ObjFilesystem::new(db, Clock::manual(1_000_000_000), 4096)
        .await
        .unwrap();
    let root = fs.root().await.unwrap();
    let of = root
        .open_named(
            &cred,
            "replicated.txt",
            OpenFlags::RDWR | OpenFlags::CREATE,
            &Setattr::with_mode(0o644),
        )
        .await
        .unwrap();
    of.write(0, b"replicated payload").await.unwrap();

    // Wait until every follower has applied the same history, then read
    // the file straight out of each follower's local store.
    let target = replicas[0].applied_instance();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while replicas.iter().any(|r| r.applied_instance() < target) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "followers did not catch up"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for replica in &replicas[1..] {
        let follower = ObjFilesystem::new(
            Database::Memory(replica.store().clone()),
            Clock::manual(1_000_000_000),
            4096,
        )
        .await
        .unwrap();
        assert_eq!(follower.fsid(), fs.fsid(), "superblock replicated");

        let froot = follower.root().await.unwrap();
        let file = froot.lookup(&cred, "replicated.txt").await.unwrap();
        let of = file.open(&cred, OpenFlags::READ).await.unwrap();
        let (data, eof) = of.read(0, 100).await.unwrap();
        assert_eq!(data, b"replicated payload");
        assert!(eof);
    }
}
