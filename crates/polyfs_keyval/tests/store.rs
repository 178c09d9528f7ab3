#![allow(clippy::unwrap_used)]

use polyfs_keyval::{Database, WriteBatch};

#[tokio::test]
async fn put_get_remove() {
    let db = Database::memory();
    let ns = db.namespace("default");

    assert_eq!(ns.get(b"missing"), None);

    let mut batch = WriteBatch::new();
    batch.put(&ns, b"alpha".to_vec(), b"1".to_vec());
    batch.put(&ns, b"beta".to_vec(), b"2".to_vec());
    db.commit(batch).await;

    assert_eq!(ns.get(b"alpha"), Some(b"1".to_vec()));
    assert_eq!(ns.get(b"beta"), Some(b"2".to_vec()));

    let mut batch = WriteBatch::new();
    batch.remove(&ns, b"alpha".to_vec());
    db.commit(batch).await;
    assert_eq!(ns.get(b"alpha"), None);
    assert_eq!(ns.get(b"beta"), Some(b"2".to_vec()));
}

#[tokio::test]
async fn namespaces_are_disjoint() {
    let db = Database::memory();
    let meta = db.namespace("meta");
    let data = db.namespace("data");

    let mut batch = WriteBatch::new();
    batch.put(&meta, b"k".to_vec(), b"meta".to_vec());
    batch.put(&data, b"k".to_vec(), b"data".to_vec());
    db.commit(batch).await;

    assert_eq!(meta.get(b"k"), Some(b"meta".to_vec()));
    assert_eq!(data.get(b"k"), Some(b"data".to_vec()));
}

#[tokio::test]
async fn cursor_walks_in_key_order() {
    let db = Database::memory();
    let ns = db.namespace("default");

    let mut batch = WriteBatch::new();
    for key in [b"c".to_vec(), b"a".to_vec(), b"d".to_vec(), b"b".to_vec()] {
        batch.put(&ns, key.clone(), key);
    }
    db.commit(batch).await;

    let mut cursor = ns.cursor();
    let mut keys = Vec::new();
    while cursor.valid() {
        keys.push(cursor.key().unwrap().to_vec());
        cursor.next();
    }
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

    cursor.seek_to_last();
    assert_eq!(cursor.key(), Some(b"d".as_slice()));
    cursor.prev();
    assert_eq!(cursor.key(), Some(b"c".as_slice()));
}

#[tokio::test]
async fn range_cursor_stops_at_end() {
    let db = Database::memory();
    let ns = db.namespace("default");

    let mut batch = WriteBatch::new();
    for i in 0u8..8 {
        batch.put(&ns, vec![i], vec![i]);
    }
    db.commit(batch).await;

    let mut cursor = ns.cursor_range(&[2], &[5]);
    let mut seen = Vec::new();
    while cursor.valid() {
        seen.push(cursor.key().unwrap().to_vec());
        cursor.next();
    }
    assert_eq!(seen, vec![vec![2], vec![3], vec![4]]);
}

#[tokio::test]
async fn cursor_survives_mutation() {
    let db = Database::memory();
    let ns = db.namespace("default");

    let mut batch = WriteBatch::new();
    for i in 0u8..4 {
        batch.put(&ns, vec![i], vec![i]);
    }
    db.commit(batch).await;

    let mut cursor = ns.cursor();
    assert_eq!(cursor.key(), Some(&[0u8][..]));

    // Delete the entry the cursor is on; the next step lands on the
    // following live key.
    let mut batch = WriteBatch::new();
    batch.remove(&ns, vec![1u8]);
    db.commit(batch).await;

    cursor.next();
    assert_eq!(cursor.key(), Some(&[2u8][..]));
}

#[tokio::test]
async fn space_used_counts_range_bytes() {
    let db = Database::memory();
    let ns = db.namespace("data");

    let mut batch = WriteBatch::new();
    batch.put(&ns, vec![1], vec![0; 10]);
    batch.put(&ns, vec![2], vec![0; 20]);
    batch.put(&ns, vec![9], vec![0; 100]);
    db.commit(batch).await;

    // keys are 1 byte each
    assert_eq!(ns.space_used(&[1], &[3]), 32);
    assert_eq!(ns.space_used(&[0], &[255]), 133);
    assert_eq!(ns.space_used(&[3], &[9]), 0);
}
