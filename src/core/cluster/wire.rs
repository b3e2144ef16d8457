// src/core/cluster/wire.rs

//! The bit-exact binary protocol carried over the cluster bus.
//!
//! Every packet is a fixed-size header followed by a type-specific payload.
//! All multi-byte integers are encoded big-endian. This module only knows how
//! to turn a `Message` into bytes and back; it never touches `ClusterState`.

use super::slot::NUM_SLOTS;
use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// 40 hex characters identify a node for its lifetime.
pub const ID_LEN: usize = 40;
/// Room for a textual IPv4 or IPv6 address.
pub const IP_LEN: usize = 46;
/// One bit per hash slot.
pub const SLOT_BYTES: usize = NUM_SLOTS / 8;

const SIGNATURE: [u8; 4] = *b"RCmb";
const PROTOCOL_VERSION: u16 = 1;

/// Size of the fixed header, excluding the variable-length payload.
pub const HEADER_LEN: usize = 4   // signature
    + 2   // version
    + 4   // total_length
    + 2   // message type
    + 2   // gossip entry count
    + 8   // sender currentEpoch
    + 8   // sender configEpoch
    + 8   // sender replication offset
    + ID_LEN   // sender id
    + SLOT_BYTES // sender master's claimed slot bitmap
    + ID_LEN   // replica-of id (or all-zero)
    + IP_LEN   // sender ip
    + 2   // sender client port
    + 2   // sender node flags
    + 1   // cluster-state byte
    + 3; // message flags

/// One gossip entry inside a PING/PONG/MEET payload.
const GOSSIP_ENTRY_LEN: usize = ID_LEN + 8 + 8 + IP_LEN + 2 + 2;

bitflags::bitflags! {
    /// Bits carried in the header's 3 trailing message-flag bytes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MessageFlags: u32 {
        /// Set on pings sent by a master during a manual-failover pause.
        const PAUSED   = 1 << 0;
        /// Set on a vote request to force a grant even if the master is
        /// not yet FAIL (used by manual failover).
        const FORCEACK = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    Ping = 0,
    Pong = 1,
    Meet = 2,
    Fail = 3,
    Publish = 4,
    FailoverAuthRequest = 5,
    FailoverAuthAck = 6,
    MfStart = 7,
    Update = 8,
}

impl MessageType {
    fn from_u16(v: u16) -> Result<Self, WireError> {
        Ok(match v {
            0 => Self::Ping,
            1 => Self::Pong,
            2 => Self::Meet,
            3 => Self::Fail,
            4 => Self::Publish,
            5 => Self::FailoverAuthRequest,
            6 => Self::FailoverAuthAck,
            7 => Self::MfStart,
            8 => Self::Update,
            other => return Err(WireError::UnknownType(other)),
        })
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),
    #[error("bad signature")]
    BadSignature,
    #[error("unsupported protocol version {0}")]
    BadVersion(u16),
    #[error("declared length {declared} exceeds available {available} bytes")]
    Truncated { declared: usize, available: usize },
    #[error("unknown message type {0}")]
    UnknownType(u16),
    #[error("payload length does not match message type")]
    BadPayloadLength,
    #[error("non-UTF8 string field")]
    BadString,
}

/// One entry in a gossip payload, describing a peer the sender knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipEntry {
    pub node_id: String,
    pub ping_sent_ms: u64,
    pub pong_received_ms: u64,
    pub ip: String,
    pub port: u16,
    pub flags: u16,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Gossip(Vec<GossipEntry>),
    Fail {
        node_id: String,
    },
    Publish {
        channel: Vec<u8>,
        message: Vec<u8>,
    },
    Update {
        node_id: String,
        config_epoch: u64,
        slots: Vec<u8>,
    },
    Empty,
}

/// The fixed header present on every bus packet.
#[derive(Debug, Clone)]
pub struct Header {
    pub msg_type: MessageType,
    pub current_epoch: u64,
    pub config_epoch: u64,
    pub repl_offset: u64,
    pub sender_id: String,
    /// The claimed slot bitmap of the sender's master (or the sender itself,
    /// if it is a master).
    pub slots: Vec<u8>,
    pub replica_of: Option<String>,
    pub ip: String,
    pub port: u16,
    pub node_flags: u16,
    pub cluster_state_ok: bool,
    pub message_flags: MessageFlags,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Payload,
}

fn write_fixed_str(buf: &mut BytesMut, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, len - n);
}

fn read_fixed_str(buf: &mut impl Buf, len: usize) -> Result<String, WireError> {
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    String::from_utf8(raw[..end].to_vec()).map_err(|_| WireError::BadString)
}

impl Message {
    pub fn encode(&self) -> BytesMut {
        let payload_bytes = encode_payload(&self.payload);
        let gossip_count = match &self.payload {
            Payload::Gossip(entries) => entries.len() as u16,
            _ => 0,
        };
        let total_length = HEADER_LEN + payload_bytes.len();

        let mut buf = BytesMut::with_capacity(total_length);
        buf.put_slice(&SIGNATURE);
        buf.put_u16(PROTOCOL_VERSION);
        buf.put_u32(total_length as u32);
        buf.put_u16(self.header.msg_type as u16);
        buf.put_u16(gossip_count);
        buf.put_u64(self.header.current_epoch);
        buf.put_u64(self.header.config_epoch);
        buf.put_u64(self.header.repl_offset);
        write_fixed_str(&mut buf, &self.header.sender_id, ID_LEN);

        let mut slots = self.header.slots.clone();
        slots.resize(SLOT_BYTES, 0);
        buf.put_slice(&slots);

        write_fixed_str(
            &mut buf,
            self.header.replica_of.as_deref().unwrap_or(""),
            ID_LEN,
        );
        write_fixed_str(&mut buf, &self.header.ip, IP_LEN);
        buf.put_u16(self.header.port);
        buf.put_u16(self.header.node_flags);
        buf.put_u8(if self.header.cluster_state_ok { 1 } else { 0 });
        let flag_bits = self.header.message_flags.bits();
        buf.put_u8((flag_bits & 0xFF) as u8);
        buf.put_u8(((flag_bits >> 8) & 0xFF) as u8);
        buf.put_u8(((flag_bits >> 16) & 0xFF) as u8);

        buf.put_slice(&payload_bytes);
        buf
    }

    /// Decodes one message from the front of `data`. Returns the message and
    /// the number of bytes consumed, so the caller can advance a link's read
    /// buffer past it. A single read may yield several packets, so callers
    /// loop until `decode` reports the buffer no longer holds a full packet.
    pub fn decode(data: &[u8]) -> Result<(Message, usize), WireError> {
        if data.len() < 16 {
            return Err(WireError::TooShort(data.len()));
        }
        if data[..4] != SIGNATURE {
            return Err(WireError::BadSignature);
        }
        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != PROTOCOL_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let total_length = u32::from_be_bytes([data[6], data[7], data[8], data[9]]) as usize;
        if total_length < HEADER_LEN {
            return Err(WireError::BadPayloadLength);
        }
        if data.len() < total_length {
            return Err(WireError::Truncated {
                declared: total_length,
                available: data.len(),
            });
        }

        let mut cursor = &data[10..total_length];
        let msg_type = MessageType::from_u16(cursor.get_u16())?;
        let gossip_count = cursor.get_u16();
        let current_epoch = cursor.get_u64();
        let config_epoch = cursor.get_u64();
        let repl_offset = cursor.get_u64();
        let sender_id = read_fixed_str(&mut cursor, ID_LEN)?;

        let mut slots = vec![0u8; SLOT_BYTES];
        cursor.copy_to_slice(&mut slots);

        let replica_of_raw = read_fixed_str(&mut cursor, ID_LEN)?;
        let replica_of = if replica_of_raw.is_empty() {
            None
        } else {
            Some(replica_of_raw)
        };
        let ip = read_fixed_str(&mut cursor, IP_LEN)?;
        let port = cursor.get_u16();
        let node_flags = cursor.get_u16();
        let cluster_state_ok = cursor.get_u8() != 0;
        let mut flag_bits: u32 = 0;
        flag_bits |= cursor.get_u8() as u32;
        flag_bits |= (cursor.get_u8() as u32) << 8;
        flag_bits |= (cursor.get_u8() as u32) << 16;
        let message_flags = MessageFlags::from_bits_truncate(flag_bits);

        let payload = decode_payload(msg_type, gossip_count, cursor)?;

        let header = Header {
            msg_type,
            current_epoch,
            config_epoch,
            repl_offset,
            sender_id,
            slots,
            replica_of,
            ip,
            port,
            node_flags,
            cluster_state_ok,
            message_flags,
        };

        Ok((Message { header, payload }, total_length))
    }
}

fn encode_payload(payload: &Payload) -> BytesMut {
    let mut buf = BytesMut::new();
    match payload {
        Payload::Gossip(entries) => {
            for e in entries {
                write_fixed_str(&mut buf, &e.node_id, ID_LEN);
                buf.put_u64(e.ping_sent_ms);
                buf.put_u64(e.pong_received_ms);
                write_fixed_str(&mut buf, &e.ip, IP_LEN);
                buf.put_u16(e.port);
                buf.put_u16(e.flags);
            }
        }
        Payload::Fail { node_id } => {
            write_fixed_str(&mut buf, node_id, ID_LEN);
        }
        Payload::Publish { channel, message } => {
            buf.put_u32(channel.len() as u32);
            buf.put_slice(channel);
            buf.put_u32(message.len() as u32);
            buf.put_slice(message);
        }
        Payload::Update {
            node_id,
            config_epoch,
            slots,
        } => {
            write_fixed_str(&mut buf, node_id, ID_LEN);
            buf.put_u64(*config_epoch);
            let mut padded = slots.clone();
            padded.resize(SLOT_BYTES, 0);
            buf.put_slice(&padded);
        }
        Payload::Empty => {}
    }
    buf
}

fn decode_payload(
    msg_type: MessageType,
    gossip_count: u16,
    mut cursor: &[u8],
) -> Result<Payload, WireError> {
    match msg_type {
        MessageType::Ping | MessageType::Pong | MessageType::Meet => {
            let expected = gossip_count as usize * GOSSIP_ENTRY_LEN;
            if cursor.len() < expected {
                return Err(WireError::BadPayloadLength);
            }
            let mut entries = Vec::with_capacity(gossip_count as usize);
            for _ in 0..gossip_count {
                let node_id = read_fixed_str(&mut cursor, ID_LEN)?;
                let ping_sent_ms = cursor.get_u64();
                let pong_received_ms = cursor.get_u64();
                let ip = read_fixed_str(&mut cursor, IP_LEN)?;
                let port = cursor.get_u16();
                let flags = cursor.get_u16();
                entries.push(GossipEntry {
                    node_id,
                    ping_sent_ms,
                    pong_received_ms,
                    ip,
                    port,
                    flags,
                });
            }
            Ok(Payload::Gossip(entries))
        }
        MessageType::Fail => {
            if cursor.len() < ID_LEN {
                return Err(WireError::BadPayloadLength);
            }
            Ok(Payload::Fail {
                node_id: read_fixed_str(&mut cursor, ID_LEN)?,
            })
        }
        MessageType::Publish => {
            if cursor.remaining() < 4 {
                return Err(WireError::BadPayloadLength);
            }
            let channel_len = cursor.get_u32() as usize;
            if cursor.remaining() < channel_len + 4 {
                return Err(WireError::BadPayloadLength);
            }
            let mut channel = vec![0u8; channel_len];
            cursor.copy_to_slice(&mut channel);
            let message_len = cursor.get_u32() as usize;
            if cursor.remaining() < message_len {
                return Err(WireError::BadPayloadLength);
            }
            let mut message = vec![0u8; message_len];
            cursor.copy_to_slice(&mut message);
            Ok(Payload::Publish { channel, message })
        }
        MessageType::FailoverAuthRequest | MessageType::FailoverAuthAck | MessageType::MfStart => {
            Ok(Payload::Empty)
        }
        MessageType::Update => {
            if cursor.len() < ID_LEN + 8 + SLOT_BYTES {
                return Err(WireError::BadPayloadLength);
            }
            let node_id = read_fixed_str(&mut cursor, ID_LEN)?;
            let config_epoch = cursor.get_u64();
            let mut slots = vec![0u8; SLOT_BYTES];
            cursor.copy_to_slice(&mut slots);
            Ok(Payload::Update {
                node_id,
                config_epoch,
                slots,
            })
        }
    }
}
