//! Ordered key/value storage for polyfs.
//!
//! A [`Database`] groups key/value pairs into named namespaces, supports
//! ordered range scans through [`Cursor`], and commits [`WriteBatch`]es
//! atomically. Two variants exist: a local in-memory store and a
//! [`paxos::Replica`]-backed store that linearizes every committed batch
//! across a peer set before applying it.

mod memory;
pub mod paxos;

pub use memory::{Cursor, MemoryStore, Namespace};

use std::sync::Arc;

use crate::paxos::{Replica, ReplicaStatus};

/// Health of one replica in a replicated database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaHealth {
    Dead,
    Healthy,
    Recovering,
    Unknown,
}

/// Per-replica status reported by [`Database::replicas`].
#[derive(Debug, Clone)]
pub struct ReplicaInfo {
    pub health: ReplicaHealth,
    pub appdata: Vec<u8>,
}

/// A single write operation inside a [`WriteBatch`]. Namespaces are
/// carried by name so a batch can be re-encoded as a replicated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        ns: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Remove {
        ns: String,
        key: Vec<u8>,
    },
}

/// A set of writes that commits atomically: either every operation is
/// visible or none is.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, ns: &Namespace, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            ns: ns.name().to_owned(),
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn remove(&mut self, ns: &Namespace, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Remove {
            ns: ns.name().to_owned(),
            key: key.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// A key/value database. Operations on namespaces and cursors are
/// synchronous; committing may suspend when the store is replicated,
/// because the batch must first be chosen by a Paxos quorum.
#[derive(Clone)]
pub enum Database {
    Memory(MemoryStore),
    Replica(Arc<Replica>),
}

impl Database {
    /// A fresh local in-memory database.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    /// A database replicated through the given Paxos replica.
    #[must_use]
    pub fn replicated(replica: Arc<Replica>) -> Self {
        Self::Replica(replica)
    }

    #[must_use]
    pub fn namespace(&self, name: &str) -> Namespace {
        match self {
            Self::Memory(store) => store.namespace(name),
            Self::Replica(replica) => replica.store().namespace(name),
        }
    }

    /// Atomically applies a batch. On a replicated database this runs the
    /// batch through consensus and resolves once the command has been
    /// applied locally; loss of quorum manifests as waiting, not as an
    /// error.
    pub async fn commit(&self, batch: WriteBatch) {
        if batch.is_empty() {
            return;
        }
        match self {
            Self::Memory(store) => store.apply(batch),
            Self::Replica(replica) => {
                let pending = replica.execute(paxos::encode_batch(&batch));
                pending.wait().await;
            }
        }
    }

    /// Durability barrier. The in-memory store has nothing to do; the
    /// replicated store is durable once a command is chosen.
    pub fn flush(&self) {}

    #[must_use]
    pub const fn is_replicated(&self) -> bool {
        matches!(self, Self::Replica(_))
    }

    /// For replicated databases, whether this instance currently holds
    /// the leadership lease. Local databases are always master.
    #[must_use]
    pub fn is_master(&self) -> bool {
        match self {
            Self::Memory(_) => true,
            Self::Replica(replica) => replica.is_leader(),
        }
    }

    /// Registers a callback fired when mastership changes.
    pub fn on_master_change(&self, cb: Box<dyn Fn(bool) + Send + Sync>) {
        if let Self::Replica(replica) = self {
            replica.on_leader_change(cb);
        }
    }

    /// State of each replica, the master first. Empty for local stores.
    #[must_use]
    pub fn replicas(&self) -> Vec<ReplicaInfo> {
        match self {
            Self::Memory(_) => Vec::new(),
            Self::Replica(replica) => replica.replicas(),
        }
    }
}

impl From<ReplicaStatus> for ReplicaHealth {
    fn from(status: ReplicaStatus) -> Self {
        match status {
            ReplicaStatus::Healthy => Self::Healthy,
            ReplicaStatus::Recovering => Self::Recovering,
            ReplicaStatus::Dead => Self::Dead,
        }
    }
}
