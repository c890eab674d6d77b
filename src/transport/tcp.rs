// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Plain TCP transport for `opc.tcp://` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::debug;

use crate::{
    transport::{BoxedTransport, RecvOutcome, Transport, TransportParams},
    types::{encoding::UaError, status::StatusCode},
};

/// Scheme prefix of every OPC UA TCP endpoint url.
const OPC_TCP_SCHEME: &str = "opc.tcp://";

/// Extract `host:port` from an `opc.tcp://host:port/path` url. A missing
/// port defaults to 4840 (IANA-registered for OPC UA).
pub fn socket_address_of(endpoint_url: &str) -> Result<String, UaError> {
    let rest = endpoint_url.strip_prefix(OPC_TCP_SCHEME).ok_or_else(|| {
        UaError::new(
            StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            format!("endpoint url {endpoint_url} does not start with {OPC_TCP_SCHEME}"),
        )
    })?;
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        return Err(UaError::new(
            StatusCode::BAD_TCP_ENDPOINT_URL_INVALID,
            "endpoint url has no host",
        ));
    }
    if authority.contains(':') {
        Ok(authority.to_string())
    } else {
        Ok(format!("{authority}:4840"))
    }
}

#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    scratch: BytesMut,
}

impl TcpTransport {
    pub async fn connect(
        endpoint_url: &str,
        params: &TransportParams,
    ) -> Result<BoxedTransport, UaError> {
        let address = socket_address_of(endpoint_url)?;
        let stream = TcpStream::connect(&address).await.map_err(|e| {
            UaError::new(
                StatusCode::BAD_CONNECTION_REJECTED,
                format!("connect to {address} failed: {e}"),
            )
        })?;
        stream.set_nodelay(true).map_err(UaError::from)?;
        debug!(%address, "tcp transport connected");
        Ok(Box::new(TcpTransport {
            stream,
            scratch: BytesMut::with_capacity(params.receive_buffer_size as usize),
        }))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: Bytes) -> Result<(), UaError> {
        self.stream.write_all(&data).await.map_err(|e| {
            UaError::new(StatusCode::BAD_CONNECTION_CLOSED, format!("send failed: {e}"))
        })
    }

    async fn recv(&mut self, wait: Duration) -> Result<RecvOutcome, UaError> {
        self.scratch.clear();
        self.scratch.resize(self.scratch.capacity().max(4096), 0);
        let read = match timeout(wait, self.stream.read(&mut self.scratch)).await {
            Err(_) => return Ok(RecvOutcome::Timeout),
            Ok(Err(e)) => {
                return Err(UaError::new(
                    StatusCode::BAD_CONNECTION_CLOSED,
                    format!("recv failed: {e}"),
                ));
            },
            Ok(Ok(n)) => n,
        };
        if read == 0 {
            return Ok(RecvOutcome::Closed);
        }
        Ok(RecvOutcome::Data(Bytes::copy_from_slice(
            &self.scratch[..read],
        )))
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
