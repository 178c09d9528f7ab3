//! An in-memory NFSv3 server implementing [`NfsProgram`] directly, so
//! the client filesystem can be exercised without a socket. Call counts
//! are recorded per procedure for cache and elision tests.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use polyfs_nfs::{Error, NfsProgram};
use polyfs_types::nfs3::{
    ACCESS3args, ACCESS3res, ACCESS3resok, COMMIT3args, COMMIT3res, COMMIT3resok, CREATE3args,
    CREATE3res, CREATE3resok, CREATE3resfail, FSINFO3args, FSINFO3res, FSINFO3resok, FSSTAT3args,
    FSSTAT3res, FSSTAT3resok, GETATTR3args, GETATTR3res, GETATTR3resok, LINK3args, LINK3res,
    LINK3resok, LINK3resfail, LOOKUP3args, LOOKUP3res, LOOKUP3resok, LOOKUP3resfail, MKDIR3args,
    MKDIR3res, MKDIR3resok, MKDIR3resfail, MKNOD3args, MKNOD3res, MKNOD3resok, MKNOD3resfail,
    Nfs3Result, PATHCONF3args, PATHCONF3res, PATHCONF3resok, READ3args, READ3res, READ3resok,
    READ3resfail, READDIRPLUS3args, READDIRPLUS3res, READDIRPLUS3resok, READDIRPLUS3resfail,
    READLINK3args, READLINK3res, READLINK3resok, REMOVE3args, REMOVE3res, REMOVE3resok,
    REMOVE3resfail, RENAME3args, RENAME3res, RENAME3resok, RENAME3resfail, RMDIR3args, RMDIR3res,
    RMDIR3resok, RMDIR3resfail, SETATTR3args, SETATTR3res, SETATTR3resok, SETATTR3resfail,
    SYMLINK3args, SYMLINK3res, SYMLINK3resok, SYMLINK3resfail, WRITE3args, WRITE3res,
    WRITE3resok, WRITE3resfail, cookieverf3, createhow3, createverf3, dirlistplus3, entryplus3,
    fattr3, filename3, ftype3, mknoddata3, nfs_fh3, nfspath3, nfsstat3, nfstime3, sattr3,
    set_time, specdata3, stable_how, wcc_data, writeverf3,
};
use polyfs_types::xdr::{List, Opaque};

pub const RTPREF: u32 = 512;
pub const WTPREF: u32 = 512;
pub const DTPREF: u32 = 512;

#[derive(Default)]
pub struct Counters {
    pub getattr: AtomicU32,
    pub setattr: AtomicU32,
    pub lookup: AtomicU32,
    pub read: AtomicU32,
    pub write: AtomicU32,
    pub readdirplus: AtomicU32,
    pub commit: AtomicU32,
    pub create: AtomicU32,
}

enum Node {
    File {
        attr: fattr3,
        content: Vec<u8>,
        verf: Option<createverf3>,
    },
    Dir {
        attr: fattr3,
        parent: u64,
        entries: BTreeMap<String, u64>,
    },
    Symlink {
        attr: fattr3,
        target: String,
    },
    Fifo {
        attr: fattr3,
    },
}

impl Node {
    fn attr(&self) -> &fattr3 {
        match self {
            Self::File { attr, .. }
            | Self::Dir { attr, .. }
            | Self::Symlink { attr, .. }
            | Self::Fifo { attr } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut fattr3 {
        match self {
            Self::File { attr, .. }
            | Self::Dir { attr, .. }
            | Self::Symlink { attr, .. }
            | Self::Fifo { attr } => attr,
        }
    }
}

struct ServerState {
    nodes: HashMap<u64, Node>,
    next_id: u64,
    time: u32,
    cookie_epoch: u64,
}

pub struct FakeServer {
    state: Mutex<ServerState>,
    pub calls: Counters,
}

pub const ROOT_ID: u64 = 1;

fn fh(id: u64) -> nfs_fh3 {
    nfs_fh3 {
        data: Opaque::owned(id.to_be_bytes().to_vec()),
    }
}

fn fh_id(handle: &nfs_fh3) -> Result<u64, nfsstat3> {
    let bytes: [u8; 8] = handle
        .data
        .as_ref()
        .try_into()
        .map_err(|_| nfsstat3::NFS3ERR_BADHANDLE)?;
    Ok(u64::from_be_bytes(bytes))
}

fn name_of(name: &filename3<'_>) -> Result<String, nfsstat3> {
    String::from_utf8(name.as_bytes().to_vec()).map_err(|_| nfsstat3::NFS3ERR_INVAL)
}

fn base_attr(id: u64, type_: ftype3, time: u32) -> fattr3 {
    fattr3 {
        type_,
        mode: 0o755,
        nlink: 1,
        uid: 0,
        gid: 0,
        size: 0,
        used: 0,
        rdev: specdata3::default(),
        fsid: 1,
        fileid: id,
        atime: nfstime3 { seconds: time, nseconds: 0 },
        mtime: nfstime3 { seconds: time, nseconds: 0 },
        ctime: nfstime3 { seconds: time, nseconds: 0 },
    }
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        let mut attr = base_attr(ROOT_ID, ftype3::NF3DIR, 1);
        attr.nlink = 2;
        nodes.insert(
            ROOT_ID,
            Node::Dir {
                attr,
                parent: ROOT_ID,
                entries: BTreeMap::new(),
            },
        );
        Self {
            state: Mutex::new(ServerState {
                nodes,
                next_id: 2,
                time: 1,
                cookie_epoch: 1,
            }),
            calls: Counters::default(),
        }
    }

    pub fn root_fh() -> nfs_fh3 {
        fh(ROOT_ID)
    }

    /// Invalidates outstanding directory cookies, as a server restart
    /// would.
    pub fn bump_cookie_epoch(&self) {
        self.state.lock().unwrap().cookie_epoch += 1;
    }

    /// Mutates a file's attributes behind the client's back, bumping
    /// its times.
    pub fn touch(&self, id: u64) {
        let mut st = self.state.lock().unwrap();
        st.time += 1;
        let time = st.time;
        if let Some(node) = st.nodes.get_mut(&id) {
            let attr = node.attr_mut();
            attr.mtime.seconds = time;
            attr.ctime.seconds = time;
        }
    }

    pub fn file_content(&self, id: u64) -> Option<Vec<u8>> {
        let st = self.state.lock().unwrap();
        match st.nodes.get(&id)? {
            Node::File { content, .. } => Some(content.clone()),
            _ => None,
        }
    }

    pub fn write_calls(&self) -> u32 {
        self.calls.write.load(Ordering::Relaxed)
    }
}

impl ServerState {
    fn tick(&mut self) -> u32 {
        self.time += 1;
        self.time
    }

    fn apply_sattr(attr: &mut fattr3, sattr: &sattr3, time: u32) {
        if let Some(mode) = sattr.mode {
            attr.mode = mode;
        }
        if let Some(uid) = sattr.uid {
            attr.uid = uid;
        }
        if let Some(gid) = sattr.gid {
            attr.gid = gid;
        }
        match sattr.atime {
            set_time::ClientTime(t) => attr.atime = t,
            set_time::ServerTime => attr.atime = nfstime3 { seconds: time, nseconds: 0 },
            set_time::DontChange => {}
        }
        match sattr.mtime {
            set_time::ClientTime(t) => attr.mtime = t,
            set_time::ServerTime => attr.mtime = nfstime3 { seconds: time, nseconds: 0 },
            set_time::DontChange => {}
        }
        attr.ctime = nfstime3 { seconds: time, nseconds: 0 };
    }

    fn create_node(&mut self, node: Node) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    fn dir_entries(&self, id: u64) -> Result<&BTreeMap<String, u64>, nfsstat3> {
        match self.nodes.get(&id).ok_or(nfsstat3::NFS3ERR_STALE)? {
            Node::Dir { entries, .. } => Ok(entries),
            _ => Err(nfsstat3::NFS3ERR_NOTDIR),
        }
    }

    fn attr_of(&self, id: u64) -> Option<fattr3> {
        self.nodes.get(&id).map(|n| n.attr().clone())
    }

    fn insert_entry(
        &mut self,
        dir: u64,
        name: &str,
        child: u64,
    ) -> Result<(), nfsstat3> {
        let time = self.tick();
        match self.nodes.get_mut(&dir).ok_or(nfsstat3::NFS3ERR_STALE)? {
            Node::Dir { entries, attr, .. } => {
                entries.insert(name.to_owned(), child);
                attr.size = entries.len() as u64;
                attr.mtime.seconds = time;
                attr.ctime.seconds = time;
                Ok(())
            }
            _ => Err(nfsstat3::NFS3ERR_NOTDIR),
        }
    }

    fn wcc(&self, id: u64) -> wcc_data {
        wcc_data {
            before: None,
            after: self.attr_of(id),
        }
    }
}

impl NfsProgram for FakeServer {
    async fn getattr(&self, args: GETATTR3args) -> Result<GETATTR3res, Error> {
        self.calls.getattr.fetch_add(1, Ordering::Relaxed);
        let st = self.state.lock().unwrap();
        let res = match fh_id(&args.object).and_then(|id| {
            st.attr_of(id).ok_or(nfsstat3::NFS3ERR_STALE)
        }) {
            Ok(attr) => Nfs3Result::Ok(GETATTR3resok {
                obj_attributes: attr,
            }),
            Err(status) => Nfs3Result::Err((status, polyfs_types::xdr::Void)),
        };
        Ok(res)
    }

    async fn setattr(&self, args: SETATTR3args) -> Result<SETATTR3res, Error> {
        self.calls.setattr.fetch_add(1, Ordering::Relaxed);
        let mut st = self.state.lock().unwrap();
        let id = match fh_id(&args.object) {
            Ok(id) => id,
            Err(status) => {
                return Ok(Nfs3Result::Err((
                    status,
                    SETATTR3resfail {
                        obj_wcc: wcc_data::default(),
                    },
                )));
            }
        };
        let time = st.tick();
        let Some(node) = st.nodes.get_mut(&id) else {
            return Ok(Nfs3Result::Err((
                nfsstat3::NFS3ERR_STALE,
                SETATTR3resfail {
                    obj_wcc: wcc_data::default(),
                },
            )));
        };
        ServerState::apply_sattr(node.attr_mut(), &args.new_attributes, time);
        if let Some(size) = args.new_attributes.size {
            if let Node::File { content, attr, .. } = node {
                content.resize(usize::try_from(size).unwrap(), 0);
                attr.size = size;
                attr.used = size;
            }
        }
        Ok(Nfs3Result::Ok(SETATTR3resok { obj_wcc: st.wcc(id) }))
    }

    async fn lookup(&self, args: LOOKUP3args<'_>) -> Result<LOOKUP3res, Error> {
        self.calls.lookup.fetch_add(1, Ordering::Relaxed);
        let st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.what.dir)?;
            let name = name_of(&args.what.name)?;
            let entries = st.dir_entries(dir)?;
            let child = match name.as_str() {
                "." => dir,
                ".." => match st.nodes.get(&dir) {
                    Some(Node::Dir { parent, .. }) => *parent,
                    _ => return Err(nfsstat3::NFS3ERR_NOTDIR),
                },
                name => *entries.get(name).ok_or(nfsstat3::NFS3ERR_NOENT)?,
            };
            Ok((dir, child))
        })();
        let res = match outcome {
            Ok((dir, child)) => Nfs3Result::Ok(LOOKUP3resok {
                object: fh(child),
                obj_attributes: st.attr_of(child),
                dir_attributes: st.attr_of(dir),
            }),
            Err(status) => {
                let dir_attributes = fh_id(&args.what.dir).ok().and_then(|id| st.attr_of(id));
                Nfs3Result::Err((status, LOOKUP3resfail { dir_attributes }))
            }
        };
        Ok(res)
    }

    async fn access(&self, args: ACCESS3args) -> Result<ACCESS3res, Error> {
        let st = self.state.lock().unwrap();
        let attr = fh_id(&args.object).ok().and_then(|id| st.attr_of(id));
        Ok(Nfs3Result::Ok(ACCESS3resok {
            obj_attributes: attr,
            access: args.access,
        }))
    }

    async fn readlink(&self, args: READLINK3args) -> Result<READLINK3res<'static>, Error> {
        let st = self.state.lock().unwrap();
        let id = fh_id(&args.symlink).map_err(Error::Nfs)?;
        match st.nodes.get(&id) {
            Some(Node::Symlink { attr, target }) => Ok(Nfs3Result::Ok(READLINK3resok {
                symlink_attributes: Some(attr.clone()),
                data: nfspath3(Opaque::owned(target.clone().into_bytes())),
            })),
            _ => Err(Error::Nfs(nfsstat3::NFS3ERR_INVAL)),
        }
    }

    async fn read(&self, args: READ3args) -> Result<READ3res<'static>, Error> {
        self.calls.read.fetch_add(1, Ordering::Relaxed);
        let st = self.state.lock().unwrap();
        let outcome = (|| {
            let id = fh_id(&args.file)?;
            match st.nodes.get(&id).ok_or(nfsstat3::NFS3ERR_STALE)? {
                Node::File { attr, content, .. } => {
                    let start = usize::try_from(args.offset)
                        .unwrap_or(usize::MAX)
                        .min(content.len());
                    let end = start
                        .saturating_add(args.count.min(RTPREF) as usize)
                        .min(content.len());
                    Ok((attr.clone(), content[start..end].to_vec(), end == content.len()))
                }
                _ => Err(nfsstat3::NFS3ERR_INVAL),
            }
        })();
        let res = match outcome {
            Ok((attr, data, eof)) => Nfs3Result::Ok(READ3resok {
                file_attributes: Some(attr),
                count: u32::try_from(data.len()).unwrap(),
                eof,
                data: Opaque::owned(data),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                READ3resfail {
                    file_attributes: None,
                },
            )),
        };
        Ok(res)
    }

    async fn write(&self, args: WRITE3args<'_>) -> Result<WRITE3res, Error> {
        self.calls.write.fetch_add(1, Ordering::Relaxed);
        let mut st = self.state.lock().unwrap();
        let time = st.tick();
        let outcome = (|| {
            let id = fh_id(&args.file)?;
            let node = st.nodes.get_mut(&id).ok_or(nfsstat3::NFS3ERR_STALE)?;
            match node {
                Node::File { attr, content, .. } => {
                    let count = (args.count.min(WTPREF)) as usize;
                    let data = &args.data.as_ref()[..count.min(args.data.len())];
                    let start = usize::try_from(args.offset).map_err(|_| nfsstat3::NFS3ERR_FBIG)?;
                    if start + data.len() > content.len() {
                        content.resize(start + data.len(), 0);
                    }
                    content[start..start + data.len()].copy_from_slice(data);
                    attr.size = content.len() as u64;
                    attr.used = attr.size;
                    attr.mtime.seconds = time;
                    attr.ctime.seconds = time;
                    Ok((id, u32::try_from(data.len()).unwrap()))
                }
                _ => Err(nfsstat3::NFS3ERR_INVAL),
            }
        })();
        let res = match outcome {
            Ok((id, count)) => Nfs3Result::Ok(WRITE3resok {
                file_wcc: st.wcc(id),
                count,
                committed: stable_how::UNSTABLE,
                verf: writeverf3::default(),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                WRITE3resfail {
                    file_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn create(&self, args: CREATE3args<'_>) -> Result<CREATE3res, Error> {
        self.calls.create.fetch_add(1, Ordering::Relaxed);
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.where_.dir)?;
            let name = name_of(&args.where_.name)?;
            if let Some(existing) = st.dir_entries(dir)?.get(&name).copied() {
                // Exclusive retries with the same verifier are
                // idempotent; everything else is EEXIST.
                if let createhow3::EXCLUSIVE(verf) = &args.how {
                    if let Some(Node::File { verf: Some(stored), .. }) = st.nodes.get(&existing) {
                        if stored == verf {
                            return Ok((dir, existing));
                        }
                    }
                }
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            let time = st.tick();
            let mut attr = base_attr(st.next_id, ftype3::NF3REG, time);
            attr.mode = 0o644;
            let verf = match &args.how {
                createhow3::EXCLUSIVE(verf) => Some(*verf),
                createhow3::UNCHECKED(sattr) | createhow3::GUARDED(sattr) => {
                    ServerState::apply_sattr(&mut attr, sattr, time);
                    None
                }
            };
            let child = st.create_node(Node::File {
                attr,
                content: Vec::new(),
                verf,
            });
            st.insert_entry(dir, &name, child)?;
            Ok((dir, child))
        })();
        let res = match outcome {
            Ok((dir, child)) => Nfs3Result::Ok(CREATE3resok {
                obj: Some(fh(child)),
                obj_attributes: st.attr_of(child),
                dir_wcc: st.wcc(dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                CREATE3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn mkdir(&self, args: MKDIR3args<'_>) -> Result<MKDIR3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.where_.dir)?;
            let name = name_of(&args.where_.name)?;
            if st.dir_entries(dir)?.contains_key(&name) {
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            let time = st.tick();
            let mut attr = base_attr(st.next_id, ftype3::NF3DIR, time);
            attr.nlink = 2;
            ServerState::apply_sattr(&mut attr, &args.attributes, time);
            let child = st.create_node(Node::Dir {
                attr,
                parent: dir,
                entries: BTreeMap::new(),
            });
            st.insert_entry(dir, &name, child)?;
            Ok((dir, child))
        })();
        let res = match outcome {
            Ok((dir, child)) => Nfs3Result::Ok(MKDIR3resok {
                obj: Some(fh(child)),
                obj_attributes: st.attr_of(child),
                dir_wcc: st.wcc(dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                MKDIR3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn symlink(&self, args: SYMLINK3args<'_>) -> Result<SYMLINK3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.where_.dir)?;
            let name = name_of(&args.where_.name)?;
            if st.dir_entries(dir)?.contains_key(&name) {
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            let time = st.tick();
            let target = String::from_utf8(args.symlink.symlink_data.0.to_vec())
                .map_err(|_| nfsstat3::NFS3ERR_INVAL)?;
            let mut attr = base_attr(st.next_id, ftype3::NF3LNK, time);
            attr.size = target.len() as u64;
            ServerState::apply_sattr(&mut attr, &args.symlink.symlink_attributes, time);
            let child = st.create_node(Node::Symlink { attr, target });
            st.insert_entry(dir, &name, child)?;
            Ok((dir, child))
        })();
        let res = match outcome {
            Ok((dir, child)) => Nfs3Result::Ok(SYMLINK3resok {
                obj: Some(fh(child)),
                obj_attributes: st.attr_of(child),
                dir_wcc: st.wcc(dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                SYMLINK3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn mknod(&self, args: MKNOD3args<'_>) -> Result<MKNOD3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.where_.dir)?;
            let name = name_of(&args.where_.name)?;
            let mknoddata3::FIFO(sattr) = &args.what else {
                return Err(nfsstat3::NFS3ERR_NOTSUPP);
            };
            if st.dir_entries(dir)?.contains_key(&name) {
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            let time = st.tick();
            let mut attr = base_attr(st.next_id, ftype3::NF3FIFO, time);
            ServerState::apply_sattr(&mut attr, sattr, time);
            let child = st.create_node(Node::Fifo { attr });
            st.insert_entry(dir, &name, child)?;
            Ok((dir, child))
        })();
        let res = match outcome {
            Ok((dir, child)) => Nfs3Result::Ok(MKNOD3resok {
                obj: Some(fh(child)),
                obj_attributes: st.attr_of(child),
                dir_wcc: st.wcc(dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                MKNOD3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn remove(&self, args: REMOVE3args<'_>) -> Result<REMOVE3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.object.dir)?;
            let name = name_of(&args.object.name)?;
            let child = *st
                .dir_entries(dir)?
                .get(&name)
                .ok_or(nfsstat3::NFS3ERR_NOENT)?;
            if matches!(st.nodes.get(&child), Some(Node::Dir { .. })) {
                return Err(nfsstat3::NFS3ERR_ISDIR);
            }
            let time = st.tick();
            st.nodes.remove(&child);
            if let Some(Node::Dir { entries, attr, .. }) = st.nodes.get_mut(&dir) {
                entries.remove(&name);
                attr.size = entries.len() as u64;
                attr.mtime.seconds = time;
                attr.ctime.seconds = time;
            }
            Ok(dir)
        })();
        let res = match outcome {
            Ok(dir) => Nfs3Result::Ok(REMOVE3resok { dir_wcc: st.wcc(dir) }),
            Err(status) => Nfs3Result::Err((
                status,
                REMOVE3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn rmdir(&self, args: RMDIR3args<'_>) -> Result<RMDIR3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let dir = fh_id(&args.object.dir)?;
            let name = name_of(&args.object.name)?;
            let child = *st
                .dir_entries(dir)?
                .get(&name)
                .ok_or(nfsstat3::NFS3ERR_NOENT)?;
            match st.nodes.get(&child) {
                Some(Node::Dir { entries, .. }) => {
                    if !entries.is_empty() {
                        return Err(nfsstat3::NFS3ERR_NOTEMPTY);
                    }
                }
                _ => return Err(nfsstat3::NFS3ERR_NOTDIR),
            }
            let time = st.tick();
            st.nodes.remove(&child);
            if let Some(Node::Dir { entries, attr, .. }) = st.nodes.get_mut(&dir) {
                entries.remove(&name);
                attr.size = entries.len() as u64;
                attr.mtime.seconds = time;
                attr.ctime.seconds = time;
            }
            Ok(dir)
        })();
        let res = match outcome {
            Ok(dir) => Nfs3Result::Ok(RMDIR3resok { dir_wcc: st.wcc(dir) }),
            Err(status) => Nfs3Result::Err((
                status,
                RMDIR3resfail {
                    dir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn rename(&self, args: RENAME3args<'_, '_>) -> Result<RENAME3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let from_dir = fh_id(&args.from.dir)?;
            let from_name = name_of(&args.from.name)?;
            let to_dir = fh_id(&args.to.dir)?;
            let to_name = name_of(&args.to.name)?;
            let child = *st
                .dir_entries(from_dir)?
                .get(&from_name)
                .ok_or(nfsstat3::NFS3ERR_NOENT)?;
            if let Some(target) = st.dir_entries(to_dir)?.get(&to_name).copied() {
                if let Some(Node::Dir { entries, .. }) = st.nodes.get(&target) {
                    if !entries.is_empty() {
                        return Err(nfsstat3::NFS3ERR_NOTEMPTY);
                    }
                }
                st.nodes.remove(&target);
            }
            if let Some(Node::Dir { entries, .. }) = st.nodes.get_mut(&from_dir) {
                entries.remove(&from_name);
            }
            st.insert_entry(to_dir, &to_name, child)?;
            if let Some(Node::Dir { parent, .. }) = st.nodes.get_mut(&child) {
                *parent = to_dir;
            }
            Ok((from_dir, to_dir))
        })();
        let res = match outcome {
            Ok((from_dir, to_dir)) => Nfs3Result::Ok(RENAME3resok {
                fromdir_wcc: st.wcc(from_dir),
                todir_wcc: st.wcc(to_dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                RENAME3resfail {
                    fromdir_wcc: wcc_data::default(),
                    todir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn link(&self, args: LINK3args<'_>) -> Result<LINK3res, Error> {
        let mut st = self.state.lock().unwrap();
        let outcome = (|| {
            let file = fh_id(&args.file)?;
            let dir = fh_id(&args.link.dir)?;
            let name = name_of(&args.link.name)?;
            if st.dir_entries(dir)?.contains_key(&name) {
                return Err(nfsstat3::NFS3ERR_EXIST);
            }
            if !st.nodes.contains_key(&file) {
                return Err(nfsstat3::NFS3ERR_STALE);
            }
            st.insert_entry(dir, &name, file)?;
            if let Some(node) = st.nodes.get_mut(&file) {
                node.attr_mut().nlink += 1;
            }
            Ok((file, dir))
        })();
        let res = match outcome {
            Ok((file, dir)) => Nfs3Result::Ok(LINK3resok {
                file_attributes: st.attr_of(file),
                linkdir_wcc: st.wcc(dir),
            }),
            Err(status) => Nfs3Result::Err((
                status,
                LINK3resfail {
                    file_attributes: None,
                    linkdir_wcc: wcc_data::default(),
                },
            )),
        };
        Ok(res)
    }

    async fn readdirplus(
        &self,
        args: READDIRPLUS3args,
    ) -> Result<READDIRPLUS3res<'static>, Error> {
        self.calls.readdirplus.fetch_add(1, Ordering::Relaxed);
        let st = self.state.lock().unwrap();
        let dir = match fh_id(&args.dir) {
            Ok(dir) => dir,
            Err(status) => {
                return Ok(Nfs3Result::Err((
                    status,
                    READDIRPLUS3resfail {
                        dir_attributes: None,
                    },
                )));
            }
        };
        let epoch_verf = cookieverf3(st.cookie_epoch.to_be_bytes());
        // A zero verifier means a fresh iteration; only a stale non-zero
        // verifier is rejected.
        if args.cookie != 0
            && args.cookieverf != cookieverf3::default()
            && args.cookieverf != epoch_verf
        {
            return Ok(Nfs3Result::Err((
                nfsstat3::NFS3ERR_BAD_COOKIE,
                READDIRPLUS3resfail {
                    dir_attributes: st.attr_of(dir),
                },
            )));
        }
        let entries = match st.dir_entries(dir) {
            Ok(entries) => entries,
            Err(status) => {
                return Ok(Nfs3Result::Err((
                    status,
                    READDIRPLUS3resfail {
                        dir_attributes: st.attr_of(dir),
                    },
                )));
            }
        };

        // Full listing: ".", "..", then the named entries in order.
        let parent = match st.nodes.get(&dir) {
            Some(Node::Dir { parent, .. }) => *parent,
            _ => dir,
        };
        let mut listing: Vec<(String, u64)> =
            vec![(".".to_owned(), dir), ("..".to_owned(), parent)];
        listing.extend(entries.iter().map(|(n, id)| (n.clone(), *id)));

        let per_page = ((args.dircount / 64).max(1)) as usize;
        let skip = usize::try_from(args.cookie).unwrap_or(usize::MAX);
        let page: Vec<entryplus3<'static>> = listing
            .iter()
            .enumerate()
            .skip(skip)
            .take(per_page)
            .map(|(i, (name, id))| entryplus3 {
                fileid: *id,
                name: filename3(Opaque::owned(name.clone().into_bytes())),
                cookie: (i + 1) as u64,
                name_attributes: st.attr_of(*id),
                name_handle: Some(fh(*id)),
            })
            .collect();
        let eof = skip + page.len() >= listing.len();

        Ok(Nfs3Result::Ok(READDIRPLUS3resok {
            dir_attributes: st.attr_of(dir),
            cookieverf: epoch_verf,
            reply: dirlistplus3 {
                entries: List(page),
                eof,
            },
        }))
    }

    async fn fsstat(&self, args: FSSTAT3args) -> Result<FSSTAT3res, Error> {
        let st = self.state.lock().unwrap();
        let attr = fh_id(&args.fsroot).ok().and_then(|id| st.attr_of(id));
        Ok(Nfs3Result::Ok(FSSTAT3resok {
            obj_attributes: attr,
            tbytes: 1 << 30,
            fbytes: 1 << 29,
            abytes: 1 << 29,
            tfiles: 1 << 20,
            ffiles: 1 << 19,
            afiles: 1 << 19,
            invarsec: 0,
        }))
    }

    async fn fsinfo(&self, args: FSINFO3args) -> Result<FSINFO3res, Error> {
        let st = self.state.lock().unwrap();
        let attr = fh_id(&args.fsroot).ok().and_then(|id| st.attr_of(id));
        Ok(Nfs3Result::Ok(FSINFO3resok {
            obj_attributes: attr,
            rtmax: RTPREF * 2,
            rtpref: RTPREF,
            rtmult: 512,
            wtmax: WTPREF * 2,
            wtpref: WTPREF,
            wtmult: 512,
            dtpref: DTPREF,
            maxfilesize: u64::MAX,
            time_delta: nfstime3 { seconds: 0, nseconds: 1 },
            properties: 0x1b,
        }))
    }

    async fn pathconf(&self, args: PATHCONF3args) -> Result<PATHCONF3res, Error> {
        let st = self.state.lock().unwrap();
        let attr = fh_id(&args.object).ok().and_then(|id| st.attr_of(id));
        Ok(Nfs3Result::Ok(PATHCONF3resok {
            obj_attributes: attr,
            linkmax: 32_000,
            name_max: 255,
            no_trunc: true,
            chown_restricted: true,
            case_insensitive: false,
            case_preserving: true,
        }))
    }

    async fn commit(&self, args: COMMIT3args) -> Result<COMMIT3res, Error> {
        self.calls.commit.fetch_add(1, Ordering::Relaxed);
        let st = self.state.lock().unwrap();
        let id = fh_id(&args.file).map_err(Error::Nfs)?;
        Ok(Nfs3Result::Ok(COMMIT3resok {
            file_wcc: st.wcc(id),
            verf: writeverf3::default(),
        }))
    }
}
