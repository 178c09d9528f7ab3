use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::{Notify, mpsc};

use super::pending::PendingCommand;
use super::transport::Transport;
use super::wire::{
    self, AcceptArgs, AcceptorRecord, IdentityArgs, Message, NackArgs, PrepareArgs, PromiseArgs,
    ReplicaStatus, Round, Uuid,
};
use crate::{MemoryStore, Namespace, ReplicaInfo, WriteBatch};

/// How long a replica waits without ACCEPT traffic before it assumes
/// the leader has failed and starts an election.
pub const LEADER_WAIT_TIME: Duration = Duration::from_secs(2);

const META_NS: &str = "PaxosMeta";
const LOG_NS: &str = "PaxosLog";
const UUID_KEY: &[u8] = b"uuid";
const INSTANCE_KEY: &[u8] = b"instance";

#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// The leader failure detection interval; retry timers and the lease
    /// are derived from it.
    pub leader_wait: Duration,
    /// Lower bound on the quorum size regardless of peer count.
    pub minimum_quorum: usize,
    /// Disable to keep a replica from starting elections (used by unit
    /// tests that drive leadership by hand).
    pub elections: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            leader_wait: LEADER_WAIT_TIME,
            minimum_quorum: 2,
            elections: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Prepare not yet sent.
    Init,
    /// Prepare sent, collecting promises.
    Phase1,
    /// Accept sent, collecting accepteds.
    Phase2,
}

/// Proposer bookkeeping for one instance.
struct Proposer {
    phase: Phase,
    crnd: Round,
    cval: Vec<u8>,
    largest_vrnd: Round,
    promisers: HashSet<Uuid>,
    nack_count: u32,
    command: Option<Arc<PendingCommand>>,
}

impl Proposer {
    fn new() -> Self {
        Self {
            phase: Phase::Init,
            crnd: Round::ZERO,
            cval: Vec::new(),
            largest_vrnd: Round::ZERO,
            promisers: HashSet::new(),
            nack_count: 0,
            command: None,
        }
    }
}

/// Learner bookkeeping for one instance: accepted votes per value, with
/// acceptors deduplicated so re-sent messages are not double counted.
struct Learner {
    created: Instant,
    values: HashMap<Vec<u8>, usize>,
    acceptors: HashSet<Uuid>,
    chosen: Option<Vec<u8>>,
}

struct PeerState {
    seen: Instant,
    status: ReplicaStatus,
    appdata: Vec<u8>,
}

struct State {
    status: ReplicaStatus,
    appdata: Vec<u8>,
    peers: HashMap<Uuid, PeerState>,
    proposers: HashMap<u64, Proposer>,
    learners: HashMap<u64, Learner>,
    acceptors: HashMap<u64, AcceptorRecord>,
    /// Highest instance known to exist.
    max_instance: u64,
    /// Last instance applied to the store.
    applied_instance: u64,
    active_instances: usize,
    leader: Uuid,
    is_leader: bool,
    /// Set until the first conflict-free instance completes; forces the
    /// full protocol instead of the leader fast path.
    new_leader: bool,
    /// The round retained for the leader fast path.
    crnd: Round,
    pending: VecDeque<Arc<PendingCommand>>,
    /// Commands whose instance has been chosen but not yet applied;
    /// waiters are released only once the writes are locally visible.
    chosen_commands: Vec<(u64, Arc<PendingCommand>)>,
    last_accept: Instant,
    last_commit: Instant,
}

/// Messages and follow-up work gathered while the state lock is held and
/// executed after it is released, so no RPC is ever sent under the lock.
#[derive(Default)]
struct Effects {
    send: Vec<Message>,
    leader_changed: Option<bool>,
    completions: Vec<Arc<PendingCommand>>,
    prepare_retries: Vec<(u64, Round)>,
    accept_retries: Vec<(u64, Round)>,
}

/// One peer of a Paxos-replicated log. See the module documentation for
/// the protocol outline.
pub struct Replica {
    uuid: Uuid,
    store: MemoryStore,
    meta: Namespace,
    log: Namespace,
    config: ReplicaConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
    progress: Notify,
    leader_callbacks: Mutex<Vec<Box<dyn Fn(bool) + Send + Sync>>>,
}

impl Replica {
    /// Creates the replica, restores its persistent identity and
    /// watermark, and spawns the message pump and timer tasks.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        inbox: mpsc::UnboundedReceiver<Message>,
        store: MemoryStore,
        config: ReplicaConfig,
    ) -> Arc<Self> {
        let meta = store.namespace(META_NS);
        let log = store.namespace(LOG_NS);

        let uuid = match meta.get(UUID_KEY) {
            Some(bytes) => polyfs_types::xdr::unpack_from_slice(&bytes).unwrap_or_else(|_| {
                tracing::error!("corrupt replica uuid, generating a new one");
                Uuid::generate()
            }),
            None => {
                let uuid = Uuid::generate();
                let mut batch = WriteBatch::new();
                batch.put(
                    &meta,
                    UUID_KEY,
                    polyfs_types::xdr::pack_to_vec(&uuid).unwrap_or_default(),
                );
                store.apply(batch);
                uuid
            }
        };

        let applied = meta
            .get(INSTANCE_KEY)
            .and_then(|bytes| polyfs_types::xdr::unpack_from_slice::<u64>(&bytes).ok())
            .unwrap_or(0);
        tracing::debug!(%uuid, applied, "replica starting");

        let now = Instant::now();
        let mut peers = HashMap::new();
        peers.insert(
            uuid,
            PeerState {
                seen: now,
                status: ReplicaStatus::Healthy,
                appdata: Vec::new(),
            },
        );

        let replica = Arc::new(Self {
            uuid,
            store,
            meta,
            log,
            config,
            transport,
            state: Mutex::new(State {
                status: ReplicaStatus::Healthy,
                appdata: Vec::new(),
                peers,
                proposers: HashMap::new(),
                learners: HashMap::new(),
                acceptors: HashMap::new(),
                max_instance: applied,
                applied_instance: applied,
                active_instances: 0,
                leader: Uuid::NULL,
                is_leader: false,
                new_leader: false,
                crnd: Round::ZERO,
                pending: VecDeque::new(),
                chosen_commands: Vec::new(),
                last_accept: now,
                last_commit: now,
            }),
            progress: Notify::new(),
            leader_callbacks: Mutex::new(Vec::new()),
        });

        Self::spawn_pump(&replica, inbox);
        Self::spawn_identity_loop(&replica);
        Self::spawn_timer_loop(&replica);

        // Announce ourselves right away rather than waiting for the
        // first identity interval.
        let msg = {
            let st = replica.state.lock().expect("lock is poisoned");
            Self::identity_message(replica.uuid, &st)
        };
        replica.transport.broadcast(&msg);

        replica
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The backing store that chosen commands are applied to.
    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.state.lock().expect("lock is poisoned").is_leader
    }

    #[must_use]
    pub fn applied_instance(&self) -> u64 {
        self.state.lock().expect("lock is poisoned").applied_instance
    }

    #[must_use]
    pub fn status(&self) -> ReplicaStatus {
        self.state.lock().expect("lock is poisoned").status
    }

    /// Opaque data carried inside our identity broadcasts.
    pub fn set_appdata(&self, appdata: Vec<u8>) {
        self.state.lock().expect("lock is poisoned").appdata = appdata;
    }

    pub fn on_leader_change(&self, cb: Box<dyn Fn(bool) + Send + Sync>) {
        self.leader_callbacks
            .lock()
            .expect("lock is poisoned")
            .push(cb);
    }

    /// Forces this replica to believe it is leader; test hook.
    pub fn force_leader(self: &Arc<Self>) {
        let mut fx = Effects::default();
        {
            let mut guard = self.state.lock().expect("lock is poisoned");
            let st = &mut *guard;
            st.leader = self.uuid;
            st.is_leader = true;
            st.new_leader = true;
            fx.leader_changed = Some(true);
        }
        self.flush(&fx);
    }

    /// Per-peer health, the current leader listed first. A peer is
    /// reported with its advertised status only while its identity is
    /// fresh; silent peers count as dead.
    #[must_use]
    pub fn replicas(&self) -> Vec<ReplicaInfo> {
        let guard = self.state.lock().expect("lock is poisoned");
        let cutoff = Instant::now()
            .checked_sub(self.config.leader_wait)
            .unwrap_or_else(Instant::now);
        let mut out = Vec::with_capacity(guard.peers.len());
        let mut push = |peer: &PeerState| {
            let health = if peer.seen >= cutoff {
                peer.status.into()
            } else {
                crate::ReplicaHealth::Dead
            };
            out.push(ReplicaInfo {
                health,
                appdata: peer.appdata.clone(),
            });
        };
        if let Some(leader) = guard.peers.get(&guard.leader) {
            push(leader);
        }
        for (uuid, peer) in &guard.peers {
            if *uuid != guard.leader {
                push(peer);
            }
        }
        out
    }

    /// Submits a command to the replicated log. The returned handle
    /// resolves once the command has been chosen and applied locally.
    pub fn execute(self: &Arc<Self>, value: Vec<u8>) -> Arc<PendingCommand> {
        let command = Arc::new(PendingCommand::new(value));
        let mut fx = Effects::default();
        {
            let mut guard = self.state.lock().expect("lock is poisoned");
            let st = &mut *guard;
            st.pending.push_back(Arc::clone(&command));
            let instance = st.max_instance + 1;
            tracing::debug!(%self.uuid, instance, "executing command in new instance");
            self.start_new_instance(st, instance, &mut fx);
        }
        self.flush(&fx);
        command
    }

    /// Waits until at least `instance` has been applied locally.
    pub async fn wait_for_instance(&self, instance: u64) {
        loop {
            let notified = self.progress.notified();
            if self.applied_instance() >= instance {
                return;
            }
            notified.await;
        }
    }

    // ---- tasks ------------------------------------------------------

    fn spawn_pump(replica: &Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Message>) {
        let weak = Arc::downgrade(replica);
        tokio::spawn(async move {
            while let Some(msg) = inbox.recv().await {
                let Some(replica) = weak.upgrade() else {
                    break;
                };
                replica.handle(&msg);
            }
        });
    }

    fn spawn_identity_loop(replica: &Arc<Self>) {
        let weak = Arc::downgrade(replica);
        let lwt = replica.config.leader_wait;
        tokio::spawn(async move {
            loop {
                // Fuzz the interval so identities do not synchronise.
                let quarter = u64::try_from((lwt / 4).as_millis()).unwrap_or(u64::MAX);
                let jitter = rand::rng().random_range(0..=quarter.max(1));
                tokio::time::sleep(lwt / 2 + Duration::from_millis(jitter)).await;
                let Some(replica) = weak.upgrade() else {
                    break;
                };
                let msg = {
                    let st = replica.state.lock().expect("lock is poisoned");
                    Self::identity_message(replica.uuid, &st)
                };
                replica.transport.broadcast(&msg);
            }
        });
    }

    fn spawn_timer_loop(replica: &Arc<Self>) {
        let weak = Arc::downgrade(replica);
        let lwt = replica.config.leader_wait;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(lwt / 4).await;
                let Some(replica) = weak.upgrade() else {
                    break;
                };
                replica.tick();
            }
        });
    }

    /// Leader-failure and lease housekeeping, run every quarter wait
    /// interval.
    fn tick(self: &Arc<Self>) {
        if !self.config.elections {
            return;
        }
        let mut fx = Effects::default();
        {
            let mut guard = self.state.lock().expect("lock is poisoned");
            let st = &mut *guard;
            let now = Instant::now();
            if st.is_leader {
                if now.duration_since(st.last_commit) >= self.config.leader_wait * 3 / 4 {
                    tracing::debug!(%self.uuid, "extending leadership lease");
                    st.last_commit = now;
                    let instance = st.max_instance + 1;
                    self.start_new_instance(st, instance, &mut fx);
                }
            } else if now.duration_since(st.last_accept) >= self.config.leader_wait {
                tracing::info!(%self.uuid, "leadership timeout");
                st.last_accept = now;
                let instance = st.max_instance + 1;
                self.start_new_instance(st, instance, &mut fx);
            }
        }
        self.flush(&fx);
    }

    // ---- message handling -------------------------------------------

    fn handle(self: &Arc<Self>, msg: &Message) {
        let mut fx = Effects::default();
        {
            let mut guard = self.state.lock().expect("lock is poisoned");
            let st = &mut *guard;
            match msg {
                Message::Identity(args) => Self::handle_identity(st, args),
                Message::Prepare(args) => self.handle_prepare(st, args, &mut fx),
                Message::Promise(args) => self.handle_promise(st, args, &mut fx),
                Message::Accept(args) => self.handle_accept(st, args, &mut fx),
                Message::Accepted(args) => self.handle_accepted(st, args, &mut fx),
                Message::Nack(args) => Self::handle_nack(self.uuid, st, args, &mut fx),
            }
        }
        self.flush(&fx);
    }

    fn handle_identity(st: &mut State, args: &IdentityArgs) {
        let new_peer = !st.peers.contains_key(&args.uuid);
        st.peers.insert(
            args.uuid,
            PeerState {
                seen: Instant::now(),
                status: args.status,
                appdata: args.appdata.clone(),
            },
        );
        if new_peer {
            tracing::info!(peer = %args.uuid, peers = st.peers.len(), "new peer");
        }
    }

    fn handle_prepare(&self, st: &mut State, args: &PrepareArgs, fx: &mut Effects) {
        let rnd = self.acceptor(st, args.instance).rnd;
        if args.round > rnd {
            if args.instance > st.max_instance {
                Self::set_leader(self.uuid, st, args.uuid, fx);
            }
            let record = {
                let ap = self.acceptor(st, args.instance);
                ap.rnd = args.round;
                ap.clone()
            };
            self.persist_acceptor(args.instance, &record);
            tracing::debug!(instance = args.instance, round = %args.round, "sending promise");
            fx.send.push(Message::Promise(PromiseArgs {
                uuid: self.uuid,
                instance: args.instance,
                round: args.round,
                vrnd: record.vrnd,
                vval: record.vval,
            }));
        } else if args.round != rnd {
            tracing::debug!(instance = args.instance, round = %rnd, "sending nack");
            fx.send.push(Message::Nack(NackArgs {
                uuid: self.uuid,
                instance: args.instance,
                round: rnd,
            }));
        }
    }

    fn handle_promise(&self, st: &mut State, args: &PromiseArgs, fx: &mut Effects) {
        let quorum = self.quorum(st.peers.len());
        let status = st.status;
        let Some(pp) = st.proposers.get_mut(&args.instance) else {
            return;
        };
        if pp.phase != Phase::Phase1 || args.round != pp.crnd {
            return;
        }
        pp.promisers.insert(args.uuid);
        tracing::debug!(
            instance = args.instance,
            replies = pp.promisers.len(),
            "received promise"
        );

        if args.vrnd > pp.largest_vrnd {
            pp.largest_vrnd = args.vrnd;
            pp.cval = args.vval.clone();
        }

        if pp.promisers.len() < quorum {
            return;
        }

        // We hold a quorum of promises. If some value was already voted
        // on we are bound to it; otherwise propose the next pending
        // command, or an empty command to extend the lease or recover.
        if pp.largest_vrnd.is_zero() {
            if status != ReplicaStatus::Recovering {
                if let Some(command) = st.pending.pop_front() {
                    pp.cval = command.value().to_vec();
                    pp.command = Some(command);
                } else {
                    pp.cval = Vec::new();
                }
            } else {
                pp.cval = Vec::new();
            }
            pp.largest_vrnd = pp.crnd;
        }
        Self::send_accept(self.uuid, pp, args.instance, fx);
    }

    fn handle_accept(&self, st: &mut State, args: &AcceptArgs, fx: &mut Effects) {
        let (rnd, vrnd) = {
            let ap = self.acceptor(st, args.instance);
            (ap.rnd, ap.vrnd)
        };
        if args.round >= rnd && args.round != vrnd {
            st.last_accept = Instant::now();
            if args.instance > st.max_instance {
                Self::set_leader(self.uuid, st, args.uuid, fx);
                st.max_instance = args.instance;
            }
            let record = {
                let ap = self.acceptor(st, args.instance);
                ap.rnd = args.round;
                ap.vrnd = args.round;
                ap.vval = args.value.clone();
                ap.clone()
            };
            self.persist_acceptor(args.instance, &record);
            tracing::debug!(instance = args.instance, round = %args.round, "sending accepted");
            fx.send.push(Message::Accepted(AcceptArgs {
                uuid: self.uuid,
                instance: args.instance,
                round: args.round,
                value: record.vval,
            }));
        } else {
            fx.send.push(Message::Nack(NackArgs {
                uuid: self.uuid,
                instance: args.instance,
                round: rnd,
            }));
        }
    }

    fn handle_accepted(&self, st: &mut State, args: &AcceptArgs, fx: &mut Effects) {
        // Values at or below the watermark are already in the store.
        if args.instance <= st.applied_instance {
            return;
        }
        if args.instance > st.max_instance {
            st.max_instance = args.instance;
        }

        let quorum = self.quorum(st.peers.len());
        let lp = st.learners.entry(args.instance).or_insert_with(|| Learner {
            created: Instant::now(),
            values: HashMap::new(),
            acceptors: HashSet::new(),
            chosen: None,
        });
        if lp.chosen.is_some() {
            return;
        }
        if lp.acceptors.insert(args.uuid) {
            *lp.values.entry(args.value.clone()).or_default() += 1;
        }
        tracing::debug!(
            instance = args.instance,
            replies = lp.acceptors.len(),
            "received accepted"
        );

        let Some((value, count)) = lp
            .values
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(value, count)| (value.clone(), *count))
        else {
            return;
        };
        if count < quorum {
            return;
        }

        // The value is chosen.
        lp.chosen = Some(value.clone());
        tracing::debug!(instance = args.instance, "instance complete");
        if args.instance == st.max_instance {
            Self::set_leader(self.uuid, st, args.round.id, fx);
        }

        if let Some(mut pp) = st.proposers.remove(&args.instance) {
            st.active_instances = st.active_instances.saturating_sub(1);
            if st.is_leader {
                if pp.nack_count == 0 {
                    st.new_leader = false;
                }
                st.last_commit = Instant::now();
            }
            if let Some(command) = pp.command.take() {
                if command.value() == value.as_slice() {
                    st.chosen_commands.push((args.instance, command));
                } else {
                    // Another proposer's value won this instance; our
                    // command goes back to the queue for the next one.
                    st.pending.push_front(command);
                }
            }
        }

        if self.apply_commands(st, fx) {
            // Fully caught up with commands still queued: start the next
            // instance for them. A follower whose proposal lost a round
            // re-proposes here rather than waiting out the leader timer.
            if !st.pending.is_empty() && st.active_instances == 0 {
                let instance = st.max_instance + 1;
                self.start_new_instance(st, instance, fx);
            }
            if st.status == ReplicaStatus::Recovering {
                tracing::info!(%self.uuid, to = st.max_instance, "recovered");
                st.status = ReplicaStatus::Healthy;
                fx.send.push(Self::identity_message(self.uuid, st));
            }
        }

        // Release waiters whose writes are now locally visible.
        let applied = st.applied_instance;
        let mut i = 0;
        while i < st.chosen_commands.len() {
            if st.chosen_commands[i].0 <= applied {
                let (_, command) = st.chosen_commands.swap_remove(i);
                fx.completions.push(command);
            } else {
                i += 1;
            }
        }
    }

    fn handle_nack(uuid: Uuid, st: &mut State, args: &NackArgs, fx: &mut Effects) {
        let Some(pp) = st.proposers.get_mut(&args.instance) else {
            return;
        };
        tracing::debug!(instance = args.instance, round = %args.round, "received nack");
        if !pp.crnd.is_zero() && args.round > pp.crnd {
            pp.nack_count += 1;
            pp.crnd = Round::new(args.round.generation + 1, uuid);
            Self::send_prepare(uuid, &mut st.crnd, pp, args.instance, fx);
        }
    }

    // ---- proposer helpers -------------------------------------------

    fn start_new_instance(&self, st: &mut State, instance: u64, fx: &mut Effects) {
        if !st.proposers.contains_key(&instance) {
            st.active_instances += 1;
            st.proposers.insert(instance, Proposer::new());
        }
        let pp = st.proposers.get_mut(&instance).expect("just inserted");
        if pp.phase != Phase::Init {
            return;
        }
        if !st.is_leader || st.new_leader {
            // Followers catching up and freshly elected leaders run the
            // full protocol.
            pp.crnd = Round::new(1, self.uuid);
            Self::send_prepare(self.uuid, &mut st.crnd, pp, instance, fx);
        } else {
            // The leader fast path: skip straight to accept at the round
            // we already gained promises for.
            pp.crnd = st.crnd;
            if let Some(command) = st.pending.pop_front() {
                pp.cval = command.value().to_vec();
                pp.command = Some(command);
            } else {
                pp.cval = Vec::new();
            }
            pp.largest_vrnd = pp.crnd;
            Self::send_accept(self.uuid, pp, instance, fx);
        }
    }

    fn send_prepare(uuid: Uuid, crnd_slot: &mut Round, pp: &mut Proposer, instance: u64, fx: &mut Effects) {
        tracing::debug!(instance, round = %pp.crnd, "sending prepare");
        pp.phase = Phase::Phase1;
        pp.promisers.clear();
        *crnd_slot = pp.crnd;
        fx.send.push(Message::Prepare(PrepareArgs {
            uuid,
            instance,
            round: pp.crnd,
        }));
        fx.prepare_retries.push((instance, pp.crnd));
    }

    fn send_accept(uuid: Uuid, pp: &mut Proposer, instance: u64, fx: &mut Effects) {
        tracing::debug!(
            instance,
            round = %pp.crnd,
            bytes = pp.cval.len(),
            "sending accept"
        );
        pp.phase = Phase::Phase2;
        fx.send.push(Message::Accept(AcceptArgs {
            uuid,
            instance,
            round: pp.crnd,
            value: pp.cval.clone(),
        }));
        fx.accept_retries.push((instance, pp.crnd));
    }

    // ---- learner / apply --------------------------------------------

    /// Applies chosen commands strictly in instance order. Returns true
    /// when everything up to `max_instance` has been applied; returns
    /// false and begins recovery when a gap is detected.
    fn apply_commands(&self, st: &mut State, fx: &mut Effects) -> bool {
        let now = Instant::now();
        while st.applied_instance < st.max_instance {
            let instance = st.applied_instance + 1;
            let stale_after = self.config.leader_wait * 10;

            let chosen = match st.learners.get(&instance) {
                Some(lp) => match &lp.chosen {
                    Some(value) => Some(value.clone()),
                    None if now.duration_since(lp.created) <= stale_after => return false,
                    None => None,
                },
                None => None,
            };

            let Some(value) = chosen else {
                // We are missing the value for this instance; run the
                // full protocol for it to learn what was chosen.
                if st.status != ReplicaStatus::Recovering {
                    tracing::info!(%self.uuid, from = instance, "recovering");
                }
                st.status = ReplicaStatus::Recovering;
                if st.is_leader {
                    // Someone else is creating instances, so whoever is
                    // leader, it is not us.
                    Self::set_leader(self.uuid, st, Uuid::NULL, fx);
                }
                self.start_new_instance(st, instance, fx);
                fx.send.push(Self::identity_message(self.uuid, st));
                return false;
            };

            if value.is_empty() {
                tracing::debug!(instance, "empty command, advancing watermark");
                let mut batch = WriteBatch::new();
                self.save_instance(instance, &mut batch);
                self.store.apply(batch);
            } else {
                self.apply_value(instance, &value);
            }
            st.learners.remove(&instance);
            st.applied_instance = instance;
        }
        true
    }

    /// Decodes a chosen command and commits its writes together with the
    /// new watermark in one batch.
    fn apply_value(&self, instance: u64, value: &[u8]) {
        let command = match wire::decode_command(value) {
            Ok(command) => command,
            Err(err) => {
                tracing::error!(instance, %err, "undecodable command, skipping");
                wire::Command::default()
            }
        };
        let mut batch = WriteBatch::new();
        for op in command.ops {
            match op {
                wire::CommandOp::Put(put) => {
                    let ns = self.store.namespace(&put.ns);
                    batch.put(&ns, put.key, put.value);
                }
                wire::CommandOp::Remove(remove) => {
                    let ns = self.store.namespace(&remove.ns);
                    batch.remove(&ns, remove.key);
                }
            }
        }
        self.save_instance(instance, &mut batch);
        self.store.apply(batch);
    }

    // ---- shared helpers ---------------------------------------------

    fn quorum(&self, peers: usize) -> usize {
        (peers / 2 + 1).max(self.config.minimum_quorum)
    }

    fn acceptor<'st>(&self, st: &'st mut State, instance: u64) -> &'st mut AcceptorRecord {
        st.acceptors.entry(instance).or_insert_with(|| {
            let key = polyfs_types::xdr::pack_to_vec(&instance).unwrap_or_default();
            self.log
                .get(&key)
                .and_then(|bytes| polyfs_types::xdr::unpack_from_slice(&bytes).ok())
                .unwrap_or_default()
        })
    }

    /// Acceptor state must be durable before the reply leaves.
    fn persist_acceptor(&self, instance: u64, record: &AcceptorRecord) {
        let key = polyfs_types::xdr::pack_to_vec(&instance).unwrap_or_default();
        let value = polyfs_types::xdr::pack_to_vec(record).unwrap_or_default();
        let mut batch = WriteBatch::new();
        batch.put(&self.log, key, value);
        self.store.apply(batch);
    }

    fn save_instance(&self, instance: u64, batch: &mut WriteBatch) {
        batch.put(
            &self.meta,
            INSTANCE_KEY,
            polyfs_types::xdr::pack_to_vec(&instance).unwrap_or_default(),
        );
    }

    fn set_leader(uuid: Uuid, st: &mut State, id: Uuid, fx: &mut Effects) {
        // A recovering replica cannot claim or assign leadership.
        if st.status == ReplicaStatus::Recovering {
            return;
        }
        if id == st.leader {
            return;
        }
        let was_leader = st.is_leader;
        st.leader = id;
        st.is_leader = id == uuid;
        if st.is_leader != was_leader {
            if st.is_leader {
                tracing::info!(%uuid, "becoming leader");
                st.new_leader = true;
            } else {
                tracing::info!(%uuid, "becoming follower");
            }
            fx.leader_changed = Some(st.is_leader);
        }
    }

    fn identity_message(uuid: Uuid, st: &State) -> Message {
        Message::Identity(IdentityArgs {
            uuid,
            status: st.status,
            instance: st.max_instance,
            appdata: st.appdata.clone(),
        })
    }

    /// Runs the side effects gathered under the lock: callbacks, command
    /// completions, broadcasts and retry timers.
    fn flush(self: &Arc<Self>, fx: &Effects) {
        if let Some(is_leader) = fx.leader_changed {
            let callbacks = self.leader_callbacks.lock().expect("lock is poisoned");
            for cb in callbacks.iter() {
                cb(is_leader);
            }
        }
        for command in &fx.completions {
            command.complete();
        }
        for msg in &fx.send {
            self.transport.broadcast(msg);
        }
        for (instance, round) in &fx.prepare_retries {
            self.spawn_prepare_retry(*instance, *round);
        }
        for (instance, round) in &fx.accept_retries {
            self.spawn_accept_retry(*instance, *round);
        }
        self.progress.notify_waiters();
    }

    fn spawn_prepare_retry(self: &Arc<Self>, instance: u64, round: Round) {
        let weak = Arc::downgrade(self);
        let rtt = self.config.leader_wait;
        tokio::spawn(async move {
            tokio::time::sleep(rtt).await;
            let Some(replica) = weak.upgrade() else {
                return;
            };
            let mut fx = Effects::default();
            {
                let mut guard = replica.state.lock().expect("lock is poisoned");
                let st = &mut *guard;
                if let Some(pp) = st.proposers.get_mut(&instance) {
                    if pp.phase == Phase::Phase1 && pp.crnd == round {
                        tracing::info!(instance, "prepare timeout");
                        pp.crnd.generation += 1;
                        Self::send_prepare(replica.uuid, &mut st.crnd, pp, instance, &mut fx);
                    }
                }
            }
            replica.flush(&fx);
        });
    }

    fn spawn_accept_retry(self: &Arc<Self>, instance: u64, round: Round) {
        let weak = Arc::downgrade(self);
        let rtt = self.config.leader_wait;
        tokio::spawn(async move {
            tokio::time::sleep(rtt).await;
            let Some(replica) = weak.upgrade() else {
                return;
            };
            let mut fx = Effects::default();
            {
                let mut guard = replica.state.lock().expect("lock is poisoned");
                let st = &mut *guard;
                if let Some(pp) = st.proposers.get_mut(&instance) {
                    if pp.phase == Phase::Phase2 && pp.crnd == round {
                        tracing::info!(instance, "accept timeout");
                        pp.crnd.generation += 1;
                        Self::send_accept(replica.uuid, pp, instance, &mut fx);
                    }
                }
            }
            replica.flush(&fx);
        });
    }
}
