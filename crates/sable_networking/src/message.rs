//! # Replication Messages
//!
//! Every packet starts with a fixed 9-byte header (little-endian):
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────┐
//! │ type: u8 │ guid: u32    │ nonce: u32   │
//! └──────────┴──────────────┴──────────────┘
//! ```
//!
//! Update messages append one segment per replicated component, laid out
//! like a world snapshot entry:
//!
//! ```text
//! ┌──────────────┬────────────┬────────────┬──────────────┐
//! │ name_len: u8 │ name bytes │ size: u32  │ payload      │
//! └──────────────┴────────────┴────────────┴──────────────┘
//! ```

use sable_core::{ByteReader, ByteWriter};

use crate::error::{NetworkError, NetworkResult};

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 9;

/// Header type byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Nonce exchange.
    Handshake = 0,
    /// A peer created a replicated entity.
    CreateEntity = 1,
    /// A peer deleted a replicated entity.
    DeleteEntity = 2,
    /// Component state of a replicated entity.
    UpdateEntity = 3,
}

impl TryFrom<u8> for MessageType {
    type Error = NetworkError;

    fn try_from(value: u8) -> NetworkResult<Self> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::CreateEntity),
            2 => Ok(Self::DeleteEntity),
            3 => Ok(Self::UpdateEntity),
            other => Err(NetworkError::UnknownMessageType(other)),
        }
    }
}

/// Serialized state of one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSegment {
    /// Name of the owning system.
    pub system: String,
    /// Encoded component.
    pub payload: Vec<u8>,
}

/// A decoded replication message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkMessage {
    /// Handshake carrying a nonce.
    Handshake {
        /// Sender's nonce, or the echoed nonce of the receiver.
        nonce: u32,
    },
    /// Entity creation.
    Create {
        /// Global id of the entity.
        guid: u32,
    },
    /// Entity deletion.
    Delete {
        /// Global id of the entity.
        guid: u32,
    },
    /// Component updates.
    Update {
        /// Global id of the entity.
        guid: u32,
        /// One segment per replicated system.
        segments: Vec<ComponentSegment>,
    },
}

impl NetworkMessage {
    /// Header type of this message.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Handshake { .. } => MessageType::Handshake,
            Self::Create { .. } => MessageType::CreateEntity,
            Self::Delete { .. } => MessageType::DeleteEntity,
            Self::Update { .. } => MessageType::UpdateEntity,
        }
    }

    /// Encodes the message into a packet.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::NameTooLong`] if a segment's system name
    /// exceeds 255 bytes.
    pub fn encode(&self) -> NetworkResult<Vec<u8>> {
        let (guid, nonce) = match self {
            Self::Handshake { nonce } => (0, *nonce),
            Self::Create { guid } | Self::Delete { guid } | Self::Update { guid, .. } => (*guid, 0),
        };

        let mut out = ByteWriter::new();
        out.write_u8(self.message_type() as u8);
        out.write_u32(guid);
        out.write_u32(nonce);

        if let Self::Update { segments, .. } = self {
            for segment in segments {
                let name_len = u8::try_from(segment.system.len())
                    .map_err(|_| NetworkError::NameTooLong(segment.system.clone()))?;
                out.write_u8(name_len);
                out.write_bytes(segment.system.as_bytes());
                out.write_u32(segment.payload.len() as u32);
                out.write_bytes(&segment.payload);
            }
        }
        Ok(out.into_bytes())
    }

    /// Decodes a packet.
    ///
    /// # Errors
    ///
    /// Fails on a short header, an unknown type, or a malformed segment.
    pub fn decode(packet: &[u8]) -> NetworkResult<Self> {
        if packet.len() < HEADER_SIZE {
            return Err(NetworkError::TooShort { len: packet.len() });
        }
        let mut input = ByteReader::new(packet);
        let header = (input.read_u8(), input.read_u32(), input.read_u32());
        let (Some(kind), Some(guid), Some(nonce)) = header else {
            return Err(NetworkError::TooShort { len: packet.len() });
        };

        Ok(match MessageType::try_from(kind)? {
            MessageType::Handshake => Self::Handshake { nonce },
            MessageType::CreateEntity => Self::Create { guid },
            MessageType::DeleteEntity => Self::Delete { guid },
            MessageType::UpdateEntity => Self::Update {
                guid,
                segments: decode_segments(&mut input)?,
            },
        })
    }
}

fn decode_segments(input: &mut ByteReader<'_>) -> NetworkResult<Vec<ComponentSegment>> {
    let mut segments = Vec::new();
    while input.remaining() > 0 {
        let offset = input.position();
        let truncated = NetworkError::TruncatedSegment { offset };

        let name_len = input.read_u8().ok_or_else(|| truncated.clone())?;
        let name = input
            .read_bytes(usize::from(name_len))
            .ok_or_else(|| truncated.clone())?;
        let system = std::str::from_utf8(name)
            .map_err(|_| NetworkError::InvalidSystemName { offset })?
            .to_owned();
        let size = input.read_u32().ok_or_else(|| truncated.clone())? as usize;
        let payload = input.read_bytes(size).ok_or(truncated)?.to_vec();

        segments.push(ComponentSegment { system, payload });
    }
    Ok(segments)
}
