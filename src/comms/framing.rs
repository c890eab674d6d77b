// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! OPC UA TCP framing (Part 6 §7.1): the 8-byte chunk header, the
//! connection-negotiation messages (HEL/ACK/ERR) and the reassembly of
//! multi-chunk messages.

use std::collections::HashMap;

use bytes::{Buf, Bytes, BytesMut};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

use crate::{
    types::{
        basic::UaString,
        encoding::{
            BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult, UaError,
        },
        status::StatusCode,
    },
    ua_struct,
};

pub const CHUNK_HEADER_LEN: usize = 8;

/// Version this client speaks in Hello; servers answering with a higher
/// version must still accept it (Part 6 negotiates downwards).
pub const PROTOCOL_VERSION: u32 = 0;

/// Message type discriminator, three ASCII bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Acknowledge,
    Error,
    OpenSecureChannel,
    CloseSecureChannel,
    Message,
}

impl MessageType {
    pub fn as_bytes(self) -> [u8; 3] {
        match self {
            MessageType::Hello => *b"HEL",
            MessageType::Acknowledge => *b"ACK",
            MessageType::Error => *b"ERR",
            MessageType::OpenSecureChannel => *b"OPN",
            MessageType::CloseSecureChannel => *b"CLO",
            MessageType::Message => *b"MSG",
        }
    }

    pub fn from_bytes(raw: [u8; 3]) -> EncodingResult<Self> {
        match &raw {
            b"HEL" => Ok(MessageType::Hello),
            b"ACK" => Ok(MessageType::Acknowledge),
            b"ERR" => Ok(MessageType::Error),
            b"OPN" => Ok(MessageType::OpenSecureChannel),
            b"CLO" => Ok(MessageType::CloseSecureChannel),
            b"MSG" => Ok(MessageType::Message),
            other => Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                format!("unknown message type {:?}", String::from_utf8_lossy(other)),
            )),
        }
    }

    /// Types that carry a secure channel id and a sequence header.
    pub fn is_channel_bound(self) -> bool {
        matches!(
            self,
            MessageType::OpenSecureChannel
                | MessageType::CloseSecureChannel
                | MessageType::Message
        )
    }
}

/// Continuation marker, one ASCII byte after the message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// `C`: more chunks of this message follow.
    Intermediate,
    /// `F`: last chunk of the message.
    Final,
    /// `A`: the sender aborts the partially transferred message.
    Abort,
}

impl ChunkKind {
    pub fn as_byte(self) -> u8 {
        match self {
            ChunkKind::Intermediate => b'C',
            ChunkKind::Final => b'F',
            ChunkKind::Abort => b'A',
        }
    }

    pub fn from_byte(raw: u8) -> EncodingResult<Self> {
        match raw {
            b'C' => Ok(ChunkKind::Intermediate),
            b'F' => Ok(ChunkKind::Final),
            b'A' => Ok(ChunkKind::Abort),
            other => Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                format!("unknown chunk kind 0x{other:02x}"),
            )),
        }
    }
}

/// Fixed wire prefix of every frame.
#[repr(C)]
#[derive(Debug, Default, Clone, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct ChunkHeader {
    pub message_type: [u8; 3],
    pub chunk_kind: u8,
    /// Total frame size including this header, little-endian.
    pub message_size: U32<LittleEndian>,
}

impl ChunkHeader {
    pub fn new(message_type: MessageType, kind: ChunkKind, message_size: u32) -> Self {
        ChunkHeader {
            message_type: message_type.as_bytes(),
            chunk_kind: kind.as_byte(),
            message_size: message_size.into(),
        }
    }
}

/// One frame split off the byte stream: parsed header plus the body that
/// follows it (channel ids, security and sequence headers still inside).
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub message_type: MessageType,
    pub kind: ChunkKind,
    pub body: Bytes,
}

/// Incremental splitter: buffers transport bytes and pops complete frames.
#[derive(Debug, Default)]
pub struct ChunkSplitter {
    buffer: BytesMut,
    max_chunk_size: usize,
}

impl ChunkSplitter {
    /// `max_chunk_size` is this side's receive buffer from the Hello
    /// negotiation; a frame larger than that is a protocol violation.
    pub fn new(max_chunk_size: usize) -> Self {
        ChunkSplitter {
            buffer: BytesMut::with_capacity(max_chunk_size.min(64 * 1024)),
            max_chunk_size,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> EncodingResult<Vec<RawChunk>> {
        self.buffer.extend_from_slice(data);
        let mut chunks = Vec::new();
        loop {
            if self.buffer.len() < CHUNK_HEADER_LEN {
                return Ok(chunks);
            }
            let header = ChunkHeader::read_from_bytes(&self.buffer[..CHUNK_HEADER_LEN])
                .map_err(|_| UaError::decoding("chunk header read failed"))?;
            let message_type = MessageType::from_bytes(header.message_type)?;
            let kind = ChunkKind::from_byte(header.chunk_kind)?;
            let size = header.message_size.get() as usize;
            if size < CHUNK_HEADER_LEN {
                return Err(UaError::decoding(format!(
                    "frame size {size} below header length"
                )));
            }
            if self.max_chunk_size > 0 && size > self.max_chunk_size {
                return Err(UaError::new(
                    StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
                    format!("frame of {size} bytes exceeds {}", self.max_chunk_size),
                ));
            }
            if self.buffer.len() < size {
                return Ok(chunks);
            }
            let mut frame = self.buffer.split_to(size);
            frame.advance(CHUNK_HEADER_LEN);
            chunks.push(RawChunk {
                message_type,
                kind,
                body: frame.freeze(),
            });
        }
    }

    /// A half-received frame at connection close is a hard error
    /// (`BadCommunicationError` in status terms).
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

/// Frame a payload that carries no channel id (HEL/ACK/ERR). These never
/// span chunks.
pub fn encode_transport_message(
    message_type: MessageType,
    payload: &impl BinaryEncodable,
) -> EncodingResult<Bytes> {
    let size = CHUNK_HEADER_LEN + payload.byte_len();
    let header = ChunkHeader::new(
        message_type,
        ChunkKind::Final,
        u32::try_from(size).map_err(|_| UaError::encoding("message too large"))?,
    );
    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(header.as_bytes());
    payload.encode(&mut out)?;
    Ok(Bytes::from(out))
}

ua_struct! {
    /// First message on the wire; advertises this side's buffer limits.
    pub struct HelloMessage {
        pub protocol_version: u32,
        pub receive_buffer_size: u32,
        pub send_buffer_size: u32,
        pub max_message_size: u32,
        pub max_chunk_count: u32,
        pub endpoint_url: UaString,
    }
}

ua_struct! {
    /// Server answer to Hello with the limits all later traffic obeys.
    pub struct AcknowledgeMessage {
        pub protocol_version: u32,
        pub receive_buffer_size: u32,
        pub send_buffer_size: u32,
        pub max_message_size: u32,
        pub max_chunk_count: u32,
    }
}

ua_struct! {
    /// Fatal transport error; the connection dies right after it.
    pub struct ErrorMessage {
        pub error: StatusCode,
        pub reason: UaString,
    }
}

ua_struct! {
    /// Per-chunk ordering and correlation ids.
    pub struct SequenceHeader {
        pub sequence_number: u32,
        pub request_id: u32,
    }
}

ua_struct! {
    /// Security header of OPN chunks. With policy None all certificate
    /// fields stay null.
    pub struct AsymmetricSecurityHeader {
        pub security_policy_uri: crate::types::basic::ByteString,
        pub sender_certificate: crate::types::basic::ByteString,
        pub receiver_certificate_thumbprint: crate::types::basic::ByteString,
    }
}

/// A fully reassembled message ready for response routing.
#[derive(Debug)]
pub struct AssembledMessage {
    pub request_id: u32,
    pub message_type: MessageType,
    pub body: Bytes,
}

/// Outcome of pushing one processed chunk into the assembler.
#[derive(Debug)]
pub enum AssemblyOutcome {
    /// Message still incomplete.
    Pending,
    Complete(AssembledMessage),
    /// Peer aborted the message; the pending request must fail. The
    /// payload carries the abort chunk's error/reason fields.
    Aborted { request_id: u32, payload: Bytes },
}

#[derive(Debug, Default)]
struct PartialMessage {
    chunks: Vec<Bytes>,
    total_len: usize,
}

/// Reassembles per-request message bodies out of decoded chunk payloads.
#[derive(Debug)]
pub struct MessageAssembler {
    partial: HashMap<u32, PartialMessage>,
    limits: DecodingLimits,
}

impl MessageAssembler {
    pub fn new(limits: DecodingLimits) -> Self {
        MessageAssembler {
            partial: HashMap::new(),
            limits,
        }
    }

    pub fn push(
        &mut self,
        message_type: MessageType,
        request_id: u32,
        kind: ChunkKind,
        payload: Bytes,
    ) -> EncodingResult<AssemblyOutcome> {
        if kind == ChunkKind::Abort {
            self.partial.remove(&request_id);
            return Ok(AssemblyOutcome::Aborted {
                request_id,
                payload,
            });
        }

        let entry = self.partial.entry(request_id).or_default();
        entry.total_len += payload.len();
        entry.chunks.push(payload);

        if self.limits.max_message_size > 0 && entry.total_len > self.limits.max_message_size
        {
            self.partial.remove(&request_id);
            return Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
                format!("reassembled message exceeds {}", self.limits.max_message_size),
            ));
        }
        if self.limits.max_chunk_count > 0 && entry.chunks.len() > self.limits.max_chunk_count
        {
            self.partial.remove(&request_id);
            return Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
                format!("message exceeds {} chunks", self.limits.max_chunk_count),
            ));
        }
        if kind == ChunkKind::Intermediate {
            return Ok(AssemblyOutcome::Pending);
        }

        let entry = self
            .partial
            .remove(&request_id)
            .unwrap_or_default();
        let body = match entry.chunks.len() {
            1 => entry
                .chunks
                .into_iter()
                .next()
                .unwrap_or_default(),
            _ => {
                let mut merged = BytesMut::with_capacity(entry.total_len);
                for chunk in entry.chunks {
                    merged.extend_from_slice(&chunk);
                }
                merged.freeze()
            },
        };
        Ok(AssemblyOutcome::Complete(AssembledMessage {
            request_id,
            message_type,
            body,
        }))
    }

    /// Drop all partial state (channel teardown).
    pub fn reset(&mut self) {
        self.partial.clear();
    }
}

/// Decode a transport-negotiation payload (everything after the 8-byte
/// header of a HEL/ACK/ERR frame).
pub fn decode_transport_payload<T: BinaryDecodable>(
    body: &Bytes,
    limits: &DecodingLimits,
) -> EncodingResult<T> {
    let mut slice = body.as_ref();
    T::decode(&mut slice, limits)
}
