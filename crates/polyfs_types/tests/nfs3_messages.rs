#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use polyfs_types::nfs3::{
    GETATTR3args, GETATTR3res, LOOKUP3res, Nfs3Result, READ3args, cookieverf3, nfs_fh3, nfsstat3,
    sattr3, set_time,
};
use polyfs_types::rpc::{self, fragment_header, msg_body, rpc_msg};
use polyfs_types::xdr::{Opaque, Pack, Unpack, pack_to_vec, unpack_from_slice};

#[test]
fn getattr_args_layout() {
    let args = GETATTR3args {
        object: nfs_fh3 {
            data: Opaque::owned(vec![0xaa, 0xbb, 0xcc, 0xdd]),
        },
    };
    let bytes = pack_to_vec(&args).unwrap();
    // length prefix + 4 handle bytes, already aligned
    assert_eq!(bytes, [0, 0, 0, 4, 0xaa, 0xbb, 0xcc, 0xdd]);
}

#[test]
fn result_union_decodes_failure_arm() {
    // A GETATTR error reply is just the status code.
    let bytes = pack_to_vec(&(nfsstat3::NFS3ERR_STALE as u32)).unwrap();
    let res: GETATTR3res = unpack_from_slice(&bytes).unwrap();
    assert_eq!(res.status(), nfsstat3::NFS3ERR_STALE);
    assert!(matches!(res, Nfs3Result::Err((nfsstat3::NFS3ERR_STALE, _))));
}

#[test]
fn lookup_failure_carries_dir_attributes() {
    let mut bytes = Vec::new();
    (nfsstat3::NFS3ERR_NOENT as u32).pack(&mut bytes).unwrap();
    // post_op_attr: not present
    false.pack(&mut bytes).unwrap();
    let res: LOOKUP3res = unpack_from_slice(&bytes).unwrap();
    match res {
        Nfs3Result::Err((status, fail)) => {
            assert_eq!(status, nfsstat3::NFS3ERR_NOENT);
            assert!(fail.dir_attributes.is_none());
        }
        Nfs3Result::Ok(_) => panic!("expected an error arm"),
    }
}

#[test]
fn sattr3_default_sets_nothing() {
    let attr = sattr3::default();
    assert!(attr.mode.is_none());
    assert!(matches!(attr.atime, set_time::DontChange));
    let bytes = pack_to_vec(&attr).unwrap();
    // six absent discriminants
    assert_eq!(bytes.len(), 24);
    assert!(bytes.iter().all(|b| *b == 0));
}

#[test]
fn read_args_roundtrip() {
    let args = READ3args {
        file: nfs_fh3 {
            data: Opaque::owned(vec![1, 2, 3, 4, 5, 6, 7, 8]),
        },
        offset: 65536,
        count: 4096,
    };
    let bytes = pack_to_vec(&args).unwrap();
    assert_eq!(bytes.len(), args.packed_size());
    let decoded: READ3args = unpack_from_slice(&bytes).unwrap();
    assert_eq!(decoded.offset, 65536);
    assert_eq!(decoded.count, 4096);
    assert_eq!(decoded.file.data.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn cookieverf_is_eight_bytes() {
    let verf = cookieverf3([9; 8]);
    let bytes = pack_to_vec(&verf).unwrap();
    assert_eq!(bytes, [9; 8]);
}

#[test]
fn fragment_header_flags() {
    let header = fragment_header::new(124, true);
    assert!(header.last());
    assert_eq!(header.fragment_length(), 124);
    assert_eq!(header.to_be_bytes(), [0x80, 0, 0, 124]);

    let partial = fragment_header::from([0x00, 0x00, 0x01, 0x00]);
    assert!(!partial.last());
    assert_eq!(partial.fragment_length(), 256);
}

#[test]
fn rpc_call_roundtrip() {
    let cred = rpc::auth_unix_credential(1, "testhost", 0, 0, &[0]).unwrap();
    let msg = rpc_msg {
        xid: 0x1020_3040,
        body: msg_body::CALL(rpc::call_body {
            rpcvers: rpc::RPC_VERSION_2,
            prog: polyfs_types::nfs3::PROGRAM,
            vers: polyfs_types::nfs3::VERSION,
            proc: 1,
            cred,
            verf: rpc::opaque_auth::default(),
        }),
    };

    let bytes = pack_to_vec(&msg).unwrap();
    assert_eq!(bytes.len(), msg.packed_size());
    assert_eq!(&bytes[..4], [0x10, 0x20, 0x30, 0x40]);

    let (decoded, len) = rpc_msg::unpack(&mut Cursor::new(bytes.clone())).unwrap();
    assert_eq!(len, bytes.len());
    assert_eq!(decoded.xid, 0x1020_3040);
    match decoded.body {
        msg_body::CALL(call) => {
            assert_eq!(call.prog, polyfs_types::nfs3::PROGRAM);
            assert_eq!(call.cred.flavor, rpc::AUTH_UNIX);
        }
        msg_body::REPLY(_) => panic!("expected a call body"),
    }
}
