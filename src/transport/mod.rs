// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Transport abstraction: the client owns exactly one connection that it
//! drives with timed receives. The default factory dials plain TCP; tests
//! substitute an in-memory implementation.

pub mod tcp;

use std::{fmt, future::Future, pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::encoding::UaError;

/// Result of a timed receive.
#[derive(Debug)]
pub enum RecvOutcome {
    /// Some bytes arrived; chunk boundaries are not respected.
    Data(Bytes),
    /// Nothing arrived within the allotted wait. Not an error.
    Timeout,
    /// The peer closed the connection.
    Closed,
}

/// A bidirectional byte stream with timed receives, exclusively owned by
/// one client.
#[async_trait]
pub trait Transport: Send + fmt::Debug {
    async fn send(&mut self, data: Bytes) -> Result<(), UaError>;

    async fn recv(&mut self, wait: Duration) -> Result<RecvOutcome, UaError>;

    async fn close(&mut self);
}

/// Local buffer configuration advertised in Hello.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportParams {
    #[serde(rename = "ReceiveBufferSize")]
    pub receive_buffer_size: u32,
    #[serde(rename = "SendBufferSize")]
    pub send_buffer_size: u32,
    #[serde(rename = "MaxMessageSize")]
    pub max_message_size: u32,
    #[serde(rename = "MaxChunkCount")]
    pub max_chunk_count: u32,
}

impl Default for TransportParams {
    fn default() -> Self {
        TransportParams {
            receive_buffer_size: 65_535,
            send_buffer_size: 65_535,
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 4096,
        }
    }
}

pub type BoxedTransport = Box<dyn Transport>;

type ConnectFuture = Pin<Box<dyn Future<Output = Result<BoxedTransport, UaError>> + Send>>;

/// Factory producing a transport for an endpoint url. Swappable so tests
/// and alternative stacks can plug in without touching the client.
pub type ConnectFn = Box<dyn Fn(String, TransportParams) -> ConnectFuture + Send>;

/// The stock factory: plain TCP via [`tcp::TcpTransport`].
pub fn tcp_connect_fn() -> ConnectFn {
    Box::new(|url, params| {
        Box::pin(async move { tcp::TcpTransport::connect(&url, &params).await })
    })
}
