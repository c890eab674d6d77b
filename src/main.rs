// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use opcua_client_rs::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    client::client::UaClient,
    types::{
        node_id::NodeId,
        service::attribute::{ReadRequest, ReadValueId, TimestampsToReturn},
    },
};
use tracing::info;

/// ns=0;i=2258 — Server_ServerStatus_CurrentTime, present on every
/// conforming server.
const CURRENT_TIME_NODE: u32 = 2258;

#[tokio::main]
async fn main() -> Result<()> {
    let _init_logger = init_logger("tests/config_logger.yaml")?;

    let cfg = resolve_config_path("tests/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let endpoint_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "opc.tcp://localhost:4840".to_string());

    let mut client = UaClient::new(cfg);
    client
        .connect(&endpoint_url)
        .await
        .context("connect failed")?;
    info!(%endpoint_url, "connected");

    let request = ReadRequest {
        timestamps_to_return: TimestampsToReturn::Neither,
        nodes_to_read: Some(vec![ReadValueId::value_of(NodeId::numeric(
            0,
            CURRENT_TIME_NODE,
        ))]),
        ..ReadRequest::default()
    };
    let response = client.read(request).await.context("read failed")?;
    info!(?response, "server current time");

    // Let any remaining traffic settle before the goodbye.
    client.run_async(Duration::from_millis(100)).await.ok();

    client.disconnect().await.context("disconnect failed")?;
    info!("disconnected");
    Ok(())
}
