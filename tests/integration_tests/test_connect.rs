// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Result;
use opcua_client_rs::{
    client::client::ClientState,
    types::{
        node_id::NodeId,
        service::attribute::{ReadRequest, ReadValueId},
        status::StatusCode,
        variant::Variant,
    },
};

use crate::integration_tests::common::{MOCK_URL, connected_client, mock_client};

#[tokio::test]
async fn connect_walks_the_state_ladder_and_reads() -> Result<()> {
    let (mut client, server) = mock_client(|cfg| {
        cfg.client.timeout = Duration::from_millis(500);
    });
    server.lock().expect("lock").behavior.read_value = Some(42);

    let states = Arc::new(Mutex::new(Vec::new()));
    let recorded = states.clone();
    client.set_state_callback(Box::new(move |_client, state| {
        recorded.lock().expect("lock").push(state);
    }));

    client.connect(MOCK_URL).await?;
    assert_eq!(client.get_state(), ClientState::Session);
    assert_eq!(
        states.lock().expect("lock").as_slice(),
        &[
            ClientState::Connected,
            ClientState::SecureChannel,
            ClientState::Session
        ],
        "every transition must be observed exactly once"
    );

    let started = Instant::now();
    let request = ReadRequest {
        nodes_to_read: Some(vec![ReadValueId::value_of(NodeId::numeric(0, 2258))]),
        ..ReadRequest::default()
    };
    let response = client.read(request).await?;
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(
        response.response_header.service_result,
        StatusCode::GOOD
    );
    let results = response.results.expect("results");
    assert_eq!(results[0].value, Some(Variant::Int32(42)));

    client.disconnect().await?;
    assert_eq!(client.get_state(), ClientState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn connect_disconnect_connect_returns_to_session() -> Result<()> {
    let (mut client, _server) = mock_client(|_| {});

    // A repeated callback registered up front must survive the cycle.
    let timer_id = client.add_repeated_callback(|_| {}, Duration::from_millis(60_000))?;

    client.connect(MOCK_URL).await?;
    client.disconnect().await?;
    assert_eq!(client.get_state(), ClientState::Disconnected);
    assert_eq!(client.outstanding_requests(), 0);

    client.connect(MOCK_URL).await?;
    assert_eq!(client.get_state(), ClientState::Session);
    assert_eq!(client.outstanding_requests(), 0);

    client.remove_repeated_callback(timer_id).expect("timer survived");
    client.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn connect_requires_a_disconnected_client() -> Result<()> {
    let (mut client, _server) = connected_client(|_| {}).await;

    let err = client.connect(MOCK_URL).await.expect_err("double connect");
    assert_eq!(err.status(), StatusCode::BAD_INVALID_STATE);

    // The existing connection is untouched.
    assert_eq!(client.get_state(), ClientState::Session);
    client.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn empty_url_is_rejected_without_touching_state() -> Result<()> {
    let (mut client, _server) = mock_client(|_| {});
    let err = client.connect("").await.expect_err("empty url accepted");
    assert_eq!(err.status(), StatusCode::BAD_INVALID_ARGUMENT);
    assert_eq!(client.get_state(), ClientState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn get_endpoints_works_while_disconnected() -> Result<()> {
    let (mut client, _server) = mock_client(|_| {});

    let endpoints = client.get_endpoints(MOCK_URL).await?;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].endpoint_url.as_str(), MOCK_URL);

    // The temporary connection is gone again.
    assert_eq!(client.get_state(), ClientState::Disconnected);
    assert!(client.get_connection().is_none());
    Ok(())
}

#[tokio::test]
async fn get_connection_is_gated_on_state() -> Result<()> {
    let (mut client, _server) = mock_client(|_| {});
    assert!(client.get_connection().is_none());

    client.connect(MOCK_URL).await?;
    assert!(client.get_connection().is_some());

    client.close();
    assert!(client.get_connection().is_none());
    Ok(())
}
