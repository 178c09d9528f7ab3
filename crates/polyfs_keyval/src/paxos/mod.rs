//! A multi-decree, leader-based Paxos replicated log.
//!
//! Every peer plays all three roles for every instance: proposer,
//! acceptor and learner. Chosen commands are applied to the local store
//! strictly in instance order; the committed-instance watermark and the
//! per-instance acceptor state are persisted in the `PaxosMeta` and
//! `PaxosLog` namespaces of the backing store.

mod pending;
mod replica;
mod transport;
mod wire;

pub use pending::PendingCommand;
pub use replica::{LEADER_WAIT_TIME, Replica, ReplicaConfig};
pub use transport::{LoopbackNet, LoopbackTransport, Transport, UdpTransport};
pub use wire::{
    AcceptArgs, AcceptorRecord, Command, CommandOp, IdentityArgs, Message, NackArgs, PrepareArgs,
    PromiseArgs, PutOp, RemoveOp, ReplicaStatus, Round, Uuid,
};

use crate::{BatchOp, WriteBatch};

/// Encodes a write batch as the replicated command payload.
#[must_use]
pub fn encode_batch(batch: &WriteBatch) -> Vec<u8> {
    let ops = batch
        .ops()
        .iter()
        .map(|op| match op {
            BatchOp::Put { ns, key, value } => CommandOp::Put(PutOp {
                ns: ns.clone(),
                key: key.clone(),
                value: value.clone(),
            }),
            BatchOp::Remove { ns, key } => CommandOp::Remove(RemoveOp {
                ns: ns.clone(),
                key: key.clone(),
            }),
        })
        .collect();
    wire::encode_command(&Command { ops })
}
