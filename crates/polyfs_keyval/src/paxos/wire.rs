use std::fmt;
use std::io::{Read, Write};

use polyfs_types::xdr::{self, Pack, Result as XdrResult, Unpack, XdrCodec};

/// A 128-bit replica identity, generated as a random (version 4) UUID
/// and persisted in the replica's store. Identities order
/// lexicographically, which breaks ties between competing rounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, XdrCodec)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub const NULL: Self = Self([0; 16]);

    /// A fresh random identity with the RFC 4122 version/variant bits.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes: [u8; 16] = rand::random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        Self(bytes)
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        let mut i = 0;
        while i < 16 {
            if self.0[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A proposal round. Rounds order by generation first and identity
/// second; the zero round sorts before every real round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, XdrCodec)]
pub struct Round {
    pub generation: u64,
    pub id: Uuid,
}

impl Round {
    pub const ZERO: Self = Self {
        generation: 0,
        id: Uuid::NULL,
    };

    #[must_use]
    pub const fn new(generation: u64, id: Uuid) -> Self {
        Self { generation, id }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.generation == 0
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.generation, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, XdrCodec)]
#[repr(u32)]
pub enum ReplicaStatus {
    Healthy = 0,
    Recovering = 1,
    Dead = 2,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct IdentityArgs {
    pub uuid: Uuid,
    pub status: ReplicaStatus,
    pub instance: u64,
    pub appdata: Vec<u8>,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct PrepareArgs {
    pub uuid: Uuid,
    pub instance: u64,
    pub round: Round,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct PromiseArgs {
    pub uuid: Uuid,
    pub instance: u64,
    pub round: Round,
    pub vrnd: Round,
    pub vval: Vec<u8>,
}

/// Shared by ACCEPT and ACCEPTED, which carry the same payload.
#[derive(Debug, Clone, XdrCodec)]
pub struct AcceptArgs {
    pub uuid: Uuid,
    pub instance: u64,
    pub round: Round,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, XdrCodec)]
pub struct NackArgs {
    pub uuid: Uuid,
    pub instance: u64,
    pub round: Round,
}

/// The datagram protocol between replicas. Delivery is unordered and
/// unreliable; every handler is idempotent and retry timers re-send lost
/// messages.
#[derive(Debug, Clone, XdrCodec)]
pub enum Message {
    #[xdr(0)]
    Identity(IdentityArgs),
    #[xdr(1)]
    Prepare(PrepareArgs),
    #[xdr(2)]
    Promise(PromiseArgs),
    #[xdr(3)]
    Accept(AcceptArgs),
    #[xdr(4)]
    Accepted(AcceptArgs),
    #[xdr(5)]
    Nack(NackArgs),
}

/// Per-instance acceptor state, persisted in `PaxosLog` before any
/// PROMISE or ACCEPTED reply leaves the replica.
#[derive(Debug, Default, Clone, XdrCodec)]
pub struct AcceptorRecord {
    pub rnd: Round,
    pub vrnd: Round,
    pub vval: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, XdrCodec)]
pub struct PutOp {
    pub ns: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, XdrCodec)]
pub struct RemoveOp {
    pub ns: String,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, XdrCodec)]
pub enum CommandOp {
    #[xdr(0)]
    Put(PutOp),
    #[xdr(1)]
    Remove(RemoveOp),
}

/// A chosen value: the batch of store writes one instance carries. An
/// empty byte string (not an empty op list) is the lease-extension
/// command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    pub ops: Vec<CommandOp>,
}

impl Pack for Command {
    fn packed_size(&self) -> usize {
        4 + self.ops.iter().map(Pack::packed_size).sum::<usize>()
    }

    fn pack(&self, out: &mut impl Write) -> XdrResult<usize> {
        let mut written = u32::try_from(self.ops.len())
            .map_err(|_| xdr::Error::ObjectTooLarge(self.ops.len()))?
            .pack(out)?;
        for op in &self.ops {
            written += op.pack(out)?;
        }
        Ok(written)
    }
}

impl Unpack for Command {
    fn unpack(input: &mut impl Read) -> XdrResult<(Self, usize)> {
        let (count, mut read) = u32::unpack(input)?;
        let mut ops = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (op, n) = CommandOp::unpack(input)?;
            read += n;
            ops.push(op);
        }
        Ok((Self { ops }, read))
    }
}

pub(crate) fn encode_command(command: &Command) -> Vec<u8> {
    xdr::pack_to_vec(command).unwrap_or_default()
}

pub(crate) fn decode_command(bytes: &[u8]) -> XdrResult<Command> {
    xdr::unpack_from_slice(bytes)
}

pub(crate) fn encode_message(message: &Message) -> Vec<u8> {
    xdr::pack_to_vec(message).unwrap_or_default()
}

pub(crate) fn decode_message(bytes: &[u8]) -> XdrResult<Message> {
    xdr::unpack_from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_ordering() {
        let a = Uuid([1; 16]);
        let b = Uuid([2; 16]);
        assert!(Round::new(1, a) < Round::new(2, a));
        assert!(Round::new(1, a) < Round::new(1, b));
        assert!(Round::ZERO < Round::new(1, a));
        assert!(Round::new(3, b) > Round::new(3, a));
    }

    #[test]
    fn uuid_version_bits() {
        let id = Uuid::generate();
        assert_eq!(id.0[6] & 0xf0, 0x40);
        assert_eq!(id.0[8] & 0xc0, 0x80);
        assert!(!id.is_null());
        assert!(Uuid::NULL.is_null());
    }

    #[test]
    fn message_roundtrip() {
        let msg = Message::Prepare(PrepareArgs {
            uuid: Uuid([7; 16]),
            instance: 42,
            round: Round::new(3, Uuid([7; 16])),
        });
        let bytes = encode_message(&msg);
        let decoded = decode_message(&bytes).expect("decodes");
        match decoded {
            Message::Prepare(args) => {
                assert_eq!(args.instance, 42);
                assert_eq!(args.round.generation, 3);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn command_roundtrip() {
        let command = Command {
            ops: vec![
                CommandOp::Put(PutOp {
                    ns: "meta".to_owned(),
                    key: vec![1],
                    value: vec![2, 3],
                }),
                CommandOp::Remove(RemoveOp {
                    ns: "data".to_owned(),
                    key: vec![9],
                }),
            ],
        };
        let bytes = encode_command(&command);
        let decoded = decode_command(&bytes).expect("decodes");
        assert_eq!(command, decoded);
    }
}
