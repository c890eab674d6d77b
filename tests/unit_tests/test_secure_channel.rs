// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::{Duration, Instant};

use anyhow::Result;
use opcua_client_rs::{
    comms::{
        framing::{ChunkKind, ChunkSplitter, MessageType, RawChunk, SequenceHeader},
        secure_channel::{
            SEQUENCE_WRAP_THRESHOLD, SecureChannel, SecurityPolicy, SendLimits,
        },
    },
    types::{
        basic::ByteString,
        encoding::{BinaryDecodable, DecodingLimits},
        service::channel::{ChannelSecurityToken, OpenSecureChannelResponse},
        status::StatusCode,
    },
};

fn channel_with_limits(max_chunk_size: usize) -> SecureChannel {
    SecureChannel::new(
        SecurityPolicy::None,
        SendLimits {
            max_chunk_size,
            max_message_size: 1024 * 1024,
            max_chunk_count: 64,
        },
    )
}

fn open_response(channel_id: u32, token_id: u32, lifetime_ms: u32) -> OpenSecureChannelResponse {
    OpenSecureChannelResponse {
        security_token: ChannelSecurityToken {
            channel_id,
            token_id,
            revised_lifetime: lifetime_ms,
            ..ChannelSecurityToken::default()
        },
        server_nonce: ByteString::nonce(32),
        ..OpenSecureChannelResponse::default()
    }
}

/// Parse the sequence header out of an encoded MSG chunk
/// (header 8 + channel id 4 + token id 4).
fn sequence_header_of(chunk: &[u8]) -> Result<SequenceHeader> {
    let mut slice = &chunk[16..];
    Ok(SequenceHeader::decode(&mut slice, &DecodingLimits::default())?)
}

#[test]
fn sequence_numbers_increase_by_one_per_chunk() -> Result<()> {
    let mut channel = channel_with_limits(64);
    channel.apply_open_response(&open_response(5, 1, 60_000), Instant::now());

    // 80 bytes of body with ~40 bytes of payload room per chunk.
    let body = vec![0xABu8; 80];
    let request_id = channel.next_request_id();
    let chunks = channel.encode_message(MessageType::Message, request_id, &body)?;
    assert!(chunks.len() > 1, "body should span several chunks");

    let mut expected = 1u32;
    for chunk in &chunks {
        let seq = sequence_header_of(chunk)?;
        assert_eq!(seq.sequence_number, expected);
        assert_eq!(seq.request_id, request_id);
        expected += 1;
    }
    Ok(())
}

#[test]
fn sequence_number_wraps_to_one_at_the_boundary() -> Result<()> {
    let mut channel = channel_with_limits(1024);
    channel.apply_open_response(&open_response(5, 1, 60_000), Instant::now());
    channel.set_send_sequence_number(SEQUENCE_WRAP_THRESHOLD);

    let request_id = channel.next_request_id();
    let chunks = channel.encode_message(MessageType::Message, request_id, b"x")?;
    let seq = sequence_header_of(&chunks[0])?;
    assert_eq!(seq.sequence_number, 1, "sequence must wrap to 1, not 0");
    Ok(())
}

#[test]
fn request_ids_are_strictly_increasing() {
    let mut channel = channel_with_limits(1024);
    let first = channel.next_request_id();
    let second = channel.next_request_id();
    let third = channel.next_request_id();
    assert!(first < second && second < third);
}

#[test]
fn renewal_fires_at_three_quarters_of_the_lifetime() {
    let mut channel = channel_with_limits(1024);
    let now = Instant::now();
    channel.apply_open_response(&open_response(5, 1, 1_000), now);

    assert!(!channel.needs_renewal(now));
    assert!(!channel.needs_renewal(now + Duration::from_millis(749)));
    assert!(channel.needs_renewal(now + Duration::from_millis(750)));
    assert!(channel.needs_renewal(now + Duration::from_millis(2_000)));
}

#[test]
fn renewal_keeps_the_previous_token_until_first_send() -> Result<()> {
    let limits = DecodingLimits::default();
    let now = Instant::now();

    // Server-side channel used to fabricate incoming chunks.
    let mut server = channel_with_limits(1024);
    server.install_token(5, 1);

    let mut client = channel_with_limits(1024);
    client.apply_open_response(&open_response(5, 1, 60_000), now);

    // Token renewed: id 2, but the server still signs with token 1.
    client.apply_open_response(&open_response(5, 2, 60_000), now);
    let chunks = server.encode_message(MessageType::Message, 1, b"old-token")?;
    let raw = split_one(&chunks[0])?;
    assert!(client.decode_chunk(raw, &limits).is_ok());

    // First outgoing message under the new token ends the overlap.
    let _ = client.encode_message(MessageType::Message, 2, b"retire")?;
    let chunks = server.encode_message(MessageType::Message, 3, b"stale")?;
    let raw = split_one(&chunks[0])?;
    let err = client.decode_chunk(raw, &limits).expect_err("stale token accepted");
    assert_eq!(err.status(), StatusCode::BAD_SECURE_CHANNEL_TOKEN_UNKNOWN);
    Ok(())
}

#[test]
fn chunks_for_a_foreign_channel_are_rejected() -> Result<()> {
    let limits = DecodingLimits::default();
    let mut server = channel_with_limits(1024);
    server.install_token(99, 1);

    let mut client = channel_with_limits(1024);
    client.apply_open_response(&open_response(5, 1, 60_000), Instant::now());

    let chunks = server.encode_message(MessageType::Message, 1, b"wrong-channel")?;
    let err = client
        .decode_chunk(split_one(&chunks[0])?, &limits)
        .expect_err("foreign channel accepted");
    assert_eq!(err.status(), StatusCode::BAD_TCP_SECURE_CHANNEL_UNKNOWN);
    Ok(())
}

#[test]
fn out_of_order_sequence_numbers_are_rejected() -> Result<()> {
    let limits = DecodingLimits::default();
    let mut server = channel_with_limits(1024);
    server.install_token(5, 1);

    let mut client = channel_with_limits(1024);
    client.apply_open_response(&open_response(5, 1, 60_000), Instant::now());

    let first = server.encode_message(MessageType::Message, 1, b"one")?;
    client.decode_chunk(split_one(&first[0])?, &limits)?;

    // Skip a sequence number on the server side.
    let _skipped = server.encode_message(MessageType::Message, 2, b"skipped")?;
    let third = server.encode_message(MessageType::Message, 3, b"three")?;
    let err = client
        .decode_chunk(split_one(&third[0])?, &limits)
        .expect_err("sequence gap accepted");
    assert_eq!(err.status(), StatusCode::BAD_SECURITY_CHECKS_FAILED);
    Ok(())
}

fn split_one(frame: &[u8]) -> Result<RawChunk> {
    let mut splitter = ChunkSplitter::new(1024 * 1024);
    let mut chunks = splitter.feed(frame)?;
    anyhow::ensure!(chunks.len() == 1, "expected exactly one chunk");
    let chunk = chunks.remove(0);
    assert_eq!(chunk.kind, ChunkKind::Final);
    Ok(chunk)
}
