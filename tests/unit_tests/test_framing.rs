// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::Bytes;
use opcua_client_rs::{
    comms::framing::{
        AssemblyOutcome, ChunkKind, ChunkSplitter, HelloMessage, MessageAssembler,
        MessageType, PROTOCOL_VERSION, encode_transport_message,
    },
    types::{
        encoding::{BinaryDecodable, DecodingLimits},
        status::StatusCode,
    },
};

use crate::unit_tests::load_fixture;

#[test]
fn hello_frame_matches_fixture() -> Result<()> {
    let expected = load_fixture("tests/unit_tests/fixtures/framing/hello.hex")?;

    let hello = HelloMessage {
        protocol_version: PROTOCOL_VERSION,
        receive_buffer_size: 65_535,
        send_buffer_size: 65_535,
        max_message_size: 16 * 1024 * 1024,
        max_chunk_count: 4096,
        endpoint_url: "opc.tcp://localhost:4840".into(),
    };
    let frame = encode_transport_message(MessageType::Hello, &hello)?;
    assert_eq!(frame.as_ref(), expected.as_slice(), "HEL frame differs");
    Ok(())
}

#[test]
fn hello_frame_parses_back() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/framing/hello.hex")?;

    let mut splitter = ChunkSplitter::new(65_535);
    let chunks = splitter.feed(&bytes)?;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].message_type, MessageType::Hello);
    assert_eq!(chunks[0].kind, ChunkKind::Final);

    let mut slice = chunks[0].body.as_ref();
    let parsed = HelloMessage::decode(&mut slice, &DecodingLimits::default())?;
    assert_eq!(parsed.endpoint_url.as_str(), "opc.tcp://localhost:4840");
    assert_eq!(parsed.max_chunk_count, 4096);
    Ok(())
}

#[test]
fn splitter_survives_byte_by_byte_delivery() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/framing/hello.hex")?;

    let mut splitter = ChunkSplitter::new(65_535);
    let mut seen = Vec::new();
    for b in &bytes {
        seen.extend(splitter.feed(std::slice::from_ref(b))?);
    }
    assert_eq!(seen.len(), 1);
    assert!(!splitter.has_partial_frame());
    Ok(())
}

#[test]
fn splitter_keeps_partial_frames_pending() -> Result<()> {
    let bytes = load_fixture("tests/unit_tests/fixtures/framing/hello.hex")?;

    let mut splitter = ChunkSplitter::new(65_535);
    assert!(splitter.feed(&bytes[..10])?.is_empty());
    assert!(splitter.has_partial_frame());
    let rest = splitter.feed(&bytes[10..])?;
    assert_eq!(rest.len(), 1);
    Ok(())
}

#[test]
fn splitter_rejects_unknown_message_types() {
    let mut splitter = ChunkSplitter::new(65_535);
    let err = splitter
        .feed(b"XXXF\x0c\x00\x00\x00abcd")
        .expect_err("garbage accepted");
    assert_eq!(err.status(), StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);
}

#[test]
fn splitter_rejects_oversized_frames() {
    let mut splitter = ChunkSplitter::new(16);
    let err = splitter
        .feed(b"MSGF\xff\x00\x00\x00")
        .expect_err("oversized frame accepted");
    assert_eq!(err.status(), StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);
}

#[test]
fn assembler_joins_chunks_of_one_request() -> Result<()> {
    let mut assembler = MessageAssembler::new(DecodingLimits::default());

    let first = assembler.push(
        MessageType::Message,
        7,
        ChunkKind::Intermediate,
        Bytes::from_static(b"hello "),
    )?;
    assert!(matches!(first, AssemblyOutcome::Pending));

    let second = assembler.push(
        MessageType::Message,
        7,
        ChunkKind::Final,
        Bytes::from_static(b"world"),
    )?;
    match second {
        AssemblyOutcome::Complete(message) => {
            assert_eq!(message.request_id, 7);
            assert_eq!(message.body.as_ref(), b"hello world");
        },
        other => panic!("expected complete message, got {other:?}"),
    }
    Ok(())
}

#[test]
fn assembler_abort_drops_the_partial_message() -> Result<()> {
    let mut assembler = MessageAssembler::new(DecodingLimits::default());

    assembler.push(
        MessageType::Message,
        9,
        ChunkKind::Intermediate,
        Bytes::from_static(b"partial"),
    )?;
    let aborted = assembler.push(
        MessageType::Message,
        9,
        ChunkKind::Abort,
        Bytes::new(),
    )?;
    assert!(matches!(aborted, AssemblyOutcome::Aborted { request_id: 9, .. }));

    // A fresh final chunk for the same id starts from scratch.
    let outcome = assembler.push(
        MessageType::Message,
        9,
        ChunkKind::Final,
        Bytes::from_static(b"fresh"),
    )?;
    match outcome {
        AssemblyOutcome::Complete(message) => {
            assert_eq!(message.body.as_ref(), b"fresh")
        },
        other => panic!("expected complete message, got {other:?}"),
    }
    Ok(())
}

#[test]
fn assembler_enforces_the_message_size_limit() -> Result<()> {
    let limits = DecodingLimits {
        max_message_size: 8,
        ..DecodingLimits::default()
    };
    let mut assembler = MessageAssembler::new(limits);

    assembler.push(
        MessageType::Message,
        1,
        ChunkKind::Intermediate,
        Bytes::from_static(b"12345"),
    )?;
    let err = assembler
        .push(
            MessageType::Message,
            1,
            ChunkKind::Final,
            Bytes::from_static(b"67890"),
        )
        .expect_err("oversized message accepted");
    assert_eq!(err.status(), StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);
    Ok(())
}

#[test]
fn assembler_enforces_the_chunk_count_limit() -> Result<()> {
    let limits = DecodingLimits {
        max_chunk_count: 2,
        ..DecodingLimits::default()
    };
    let mut assembler = MessageAssembler::new(limits);

    for _ in 0..2 {
        assembler.push(
            MessageType::Message,
            1,
            ChunkKind::Intermediate,
            Bytes::from_static(b"x"),
        )?;
    }
    let err = assembler
        .push(MessageType::Message, 1, ChunkKind::Final, Bytes::from_static(b"x"))
        .expect_err("over-chunked message accepted");
    assert_eq!(err.status(), StatusCode::BAD_TCP_MESSAGE_TOO_LARGE);
    Ok(())
}
