// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Secure channel state: token lifecycle, per-chunk sequence numbers and
//! the symmetric/asymmetric chunk envelopes. With security policy None no
//! actual cryptography is applied; the wire layout is still exact so the
//! signing policies can slot in behind the same calls.

use std::time::{Duration, Instant};

use bytes::{Buf, Bytes};
use tracing::{debug, warn};

use crate::{
    comms::framing::{
        AsymmetricSecurityHeader, CHUNK_HEADER_LEN, ChunkHeader, ChunkKind, MessageType,
        RawChunk, SequenceHeader,
    },
    types::{
        basic::ByteString,
        encoding::{
            BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult, UaError,
        },
        service::channel::OpenSecureChannelResponse,
        status::StatusCode,
    },
};

/// Above this value the next sequence number wraps to 1 (Part 6 §6.7.2).
pub const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX - 1023;

/// Renewal is due once this fraction of the revised token lifetime has
/// elapsed.
const RENEWAL_FRACTION: f64 = 0.75;

/// Security policies this client can negotiate. Only `None` ships; the
/// enum pins the URI handling for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPolicy {
    #[default]
    None,
}

impl SecurityPolicy {
    pub fn uri(self) -> &'static str {
        match self {
            SecurityPolicy::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://opcfoundation.org/UA/SecurityPolicy#None" => {
                Some(SecurityPolicy::None)
            },
            _ => None,
        }
    }
}

/// Outgoing limits taken from the server's Acknowledge.
#[derive(Debug, Clone, Copy)]
pub struct SendLimits {
    pub max_chunk_size: usize,
    pub max_message_size: usize,
    pub max_chunk_count: usize,
}

impl Default for SendLimits {
    fn default() -> Self {
        SendLimits {
            max_chunk_size: 65_535,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 0,
        }
    }
}

/// One decoded chunk ready for reassembly.
#[derive(Debug)]
pub struct DecodedChunk {
    pub request_id: u32,
    pub kind: ChunkKind,
    pub payload: Bytes,
}

#[derive(Debug)]
pub struct SecureChannel {
    policy: SecurityPolicy,
    channel_id: u32,
    token_id: u32,
    /// Previous token accepted during the renewal overlap window.
    previous_token_id: Option<u32>,
    token_created_at: Instant,
    revised_lifetime: Duration,
    /// Last sequence number put on the wire (0 before the first chunk).
    send_sequence_number: u32,
    last_received_sequence: Option<u32>,
    next_request_id: u32,
    local_nonce: ByteString,
    remote_nonce: ByteString,
    send_limits: SendLimits,
}

impl SecureChannel {
    pub fn new(policy: SecurityPolicy, send_limits: SendLimits) -> Self {
        SecureChannel {
            policy,
            channel_id: 0,
            token_id: 0,
            previous_token_id: None,
            token_created_at: Instant::now(),
            revised_lifetime: Duration::ZERO,
            send_sequence_number: 0,
            last_received_sequence: None,
            next_request_id: 0,
            local_nonce: ByteString::null(),
            remote_nonce: ByteString::null(),
            send_limits,
        }
    }

    #[inline]
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    #[inline]
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    #[inline]
    pub fn policy(&self) -> SecurityPolicy {
        self.policy
    }

    #[inline]
    pub fn remote_nonce(&self) -> &ByteString {
        &self.remote_nonce
    }

    /// Allocate the channel-scoped correlation id for the next request.
    pub fn next_request_id(&mut self) -> u32 {
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        self.next_request_id
    }

    /// Fresh client nonce for an OpenSecureChannel call.
    pub fn make_client_nonce(&mut self) -> ByteString {
        // Policy None still sends a 32-byte nonce; servers use it for
        // session signatures.
        self.local_nonce = ByteString::nonce(32);
        self.local_nonce.clone()
    }

    /// Install the server's answer to an Issue or Renew call. The old
    /// token stays valid for incoming traffic until we first send under
    /// the new one.
    pub fn apply_open_response(&mut self, response: &OpenSecureChannelResponse, now: Instant) {
        let token = &response.security_token;
        if self.token_id != 0 {
            self.previous_token_id = Some(self.token_id);
        }
        self.channel_id = token.channel_id;
        self.token_id = token.token_id;
        self.token_created_at = now;
        self.revised_lifetime = Duration::from_millis(u64::from(token.revised_lifetime));
        self.remote_nonce = response.server_nonce.clone();
        debug!(
            channel_id = token.channel_id,
            token_id = token.token_id,
            revised_lifetime_ms = token.revised_lifetime,
            "secure channel token installed"
        );
    }

    /// True once 75% of the revised lifetime has elapsed.
    pub fn needs_renewal(&self, now: Instant) -> bool {
        if self.channel_id == 0 || self.revised_lifetime.is_zero() {
            return false;
        }
        let due = self.revised_lifetime.mul_f64(RENEWAL_FRACTION);
        now.duration_since(self.token_created_at) >= due
    }

    /// Deadline for the renewal check, for the event-loop wait
    /// computation.
    pub fn renewal_deadline(&self) -> Option<Instant> {
        if self.channel_id == 0 || self.revised_lifetime.is_zero() {
            return None;
        }
        Some(self.token_created_at + self.revised_lifetime.mul_f64(RENEWAL_FRACTION))
    }

    fn next_sequence_number(&mut self) -> u32 {
        self.send_sequence_number = if self.send_sequence_number >= SEQUENCE_WRAP_THRESHOLD
        {
            1
        } else {
            self.send_sequence_number + 1
        };
        self.send_sequence_number
    }

    fn verify_sequence_number(&mut self, received: u32) -> EncodingResult<()> {
        let ok = match self.last_received_sequence {
            None => true,
            Some(last) if last >= SEQUENCE_WRAP_THRESHOLD => {
                received == 1 || received == last.wrapping_add(1)
            },
            Some(last) => received == last + 1,
        };
        if !ok {
            return Err(UaError::new(
                StatusCode::BAD_SECURITY_CHECKS_FAILED,
                format!(
                    "sequence number {received} does not follow {:?}",
                    self.last_received_sequence
                ),
            ));
        }
        self.last_received_sequence = Some(received);
        Ok(())
    }

    fn security_header_len(&self, message_type: MessageType) -> usize {
        match message_type {
            MessageType::OpenSecureChannel => AsymmetricSecurityHeader {
                security_policy_uri: self.policy.uri().as_bytes().into(),
                sender_certificate: ByteString::null(),
                receiver_certificate_thumbprint: ByteString::null(),
            }
            .byte_len(),
            _ => 4,
        }
    }

    /// Frame an encoded message body into one or more chunks, assigning
    /// consecutive sequence numbers.
    pub fn encode_message(
        &mut self,
        message_type: MessageType,
        request_id: u32,
        body: &[u8],
    ) -> EncodingResult<Vec<Bytes>> {
        if self.send_limits.max_message_size > 0
            && body.len() > self.send_limits.max_message_size
        {
            return Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
                format!("request body of {} bytes exceeds negotiated limit", body.len()),
            ));
        }

        // chunk header + channel id + security header + sequence header
        let overhead =
            CHUNK_HEADER_LEN + 4 + self.security_header_len(message_type) + 8;
        let max_body = self.send_limits.max_chunk_size.saturating_sub(overhead);
        if max_body == 0 {
            return Err(UaError::encoding("negotiated chunk size too small"));
        }

        let pieces: Vec<&[u8]> = if body.is_empty() {
            vec![&[]]
        } else {
            body.chunks(max_body).collect()
        };
        if self.send_limits.max_chunk_count > 0
            && pieces.len() > self.send_limits.max_chunk_count
        {
            return Err(UaError::new(
                StatusCode::BAD_TCP_MESSAGE_TOO_LARGE,
                format!("message needs {} chunks", pieces.len()),
            ));
        }

        // The first message under a fresh token retires the previous one.
        if message_type != MessageType::OpenSecureChannel {
            self.previous_token_id = None;
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        let last = pieces.len() - 1;
        for (i, piece) in pieces.iter().enumerate() {
            let kind = if i == last {
                ChunkKind::Final
            } else {
                ChunkKind::Intermediate
            };
            let size = overhead + piece.len();
            let header = ChunkHeader::new(
                message_type,
                kind,
                u32::try_from(size)
                    .map_err(|_| UaError::encoding("chunk size overflow"))?,
            );
            let mut out = Vec::with_capacity(size);
            out.extend_from_slice(zerocopy::IntoBytes::as_bytes(&header));
            self.channel_id.encode(&mut out)?;
            match message_type {
                MessageType::OpenSecureChannel => {
                    AsymmetricSecurityHeader {
                        security_policy_uri: self.policy.uri().as_bytes().into(),
                        sender_certificate: ByteString::null(),
                        receiver_certificate_thumbprint: ByteString::null(),
                    }
                    .encode(&mut out)?;
                },
                _ => self.token_id.encode(&mut out)?,
            }
            SequenceHeader {
                sequence_number: self.next_sequence_number(),
                request_id,
            }
            .encode(&mut out)?;
            out.extend_from_slice(piece);
            chunks.push(Bytes::from(out));
        }
        Ok(chunks)
    }

    /// Strip the channel envelope off a raw chunk: verify the channel id,
    /// the token and the sequence number, and hand back the payload.
    pub fn decode_chunk(
        &mut self,
        chunk: RawChunk,
        limits: &DecodingLimits,
    ) -> EncodingResult<DecodedChunk> {
        let mut body = chunk.body;
        if body.len() < 4 {
            return Err(UaError::decoding("chunk too short for channel id"));
        }
        let channel_id = body.get_u32_le();
        if self.channel_id != 0 && channel_id != self.channel_id {
            return Err(UaError::new(
                StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN,
                format!("chunk for channel {channel_id}, ours is {}", self.channel_id),
            ));
        }

        let mut slice = body.as_ref();
        match chunk.message_type {
            MessageType::OpenSecureChannel => {
                let header = AsymmetricSecurityHeader::decode(&mut slice, limits)?;
                let uri = String::from_utf8_lossy(header.security_policy_uri.as_bytes())
                    .into_owned();
                if SecurityPolicy::from_uri(&uri) != Some(self.policy) {
                    return Err(UaError::new(
                        StatusCode::BAD_SECURITY_CHECKS_FAILED,
                        format!("unexpected security policy {uri}"),
                    ));
                }
            },
            _ => {
                let token_id = u32::decode(&mut slice, limits)?;
                if token_id != self.token_id && Some(token_id) != self.previous_token_id {
                    return Err(UaError::new(
                        StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN,
                        format!("token {token_id} is neither current nor previous"),
                    ));
                }
                if Some(token_id) == self.previous_token_id {
                    warn!(token_id, "accepting chunk under the previous channel token");
                }
            },
        }
        let sequence = SequenceHeader::decode(&mut slice, limits)?;
        self.verify_sequence_number(sequence.sequence_number)?;

        let consumed = body.len() - slice.len();
        body.advance(consumed);
        Ok(DecodedChunk {
            request_id: sequence.request_id,
            kind: chunk.kind,
            payload: body,
        })
    }

    /// Forget token and sequence state, keeping limits and policy. Used by
    /// `reset` and on channel teardown.
    pub fn reset(&mut self) {
        self.channel_id = 0;
        self.token_id = 0;
        self.previous_token_id = None;
        self.revised_lifetime = Duration::ZERO;
        self.send_sequence_number = 0;
        self.last_received_sequence = None;
        self.next_request_id = 0;
        self.local_nonce = ByteString::null();
        self.remote_nonce = ByteString::null();
    }

    /// Override the last-used sequence number (wrap testing, harnesses
    /// emulating a peer).
    pub fn set_send_sequence_number(&mut self, value: u32) {
        self.send_sequence_number = value;
    }

    /// Install ids directly, bypassing the OPN exchange. Used by
    /// harnesses that emulate the server side of a channel.
    pub fn install_token(&mut self, channel_id: u32, token_id: u32) {
        self.channel_id = channel_id;
        self.token_id = token_id;
    }
}
