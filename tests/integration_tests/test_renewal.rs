// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use opcua_client_rs::types::{
    node_id::NodeId,
    service::attribute::{ReadRequest, ReadValueId},
    status::StatusCode,
};

use crate::integration_tests::common::{connected_client, mock_client, MOCK_URL};

#[tokio::test]
async fn token_renews_after_three_quarters_of_the_lifetime() -> Result<()> {
    let (mut client, server) = mock_client(|_| {});
    server.lock().expect("lock").behavior.lifetime_ms = 400;

    client.connect(MOCK_URL).await?;
    assert_eq!(server.lock().expect("lock").renew_count, 0);

    // Well before the 300 ms mark nothing must happen.
    client.run_async(Duration::from_millis(150)).await?;
    assert_eq!(
        server.lock().expect("lock").renew_count,
        0,
        "renewal before 75% of the lifetime"
    );

    // Crossing the mark triggers exactly the renewal traffic.
    client.run_async(Duration::from_millis(350)).await?;
    let renewals = server.lock().expect("lock").renew_count;
    assert!(renewals >= 1, "no renewal observed after the deadline");

    // The channel keeps working under the fresh token.
    let response = client
        .read(ReadRequest {
            nodes_to_read: Some(vec![ReadValueId::value_of(NodeId::numeric(0, 2258))]),
            ..ReadRequest::default()
        })
        .await?;
    assert_eq!(response.response_header.service_result, StatusCode::GOOD);

    client.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn manual_renewal_rotates_the_token_immediately() -> Result<()> {
    let (mut client, server) = connected_client(|_| {}).await;
    assert_eq!(server.lock().expect("lock").renew_count, 0);

    client.manually_renew_secure_channel().await?;
    assert_eq!(server.lock().expect("lock").renew_count, 1);

    client.manually_renew_secure_channel().await?;
    assert_eq!(server.lock().expect("lock").renew_count, 2);

    client.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn manual_renewal_needs_a_channel() -> Result<()> {
    let (mut client, _server) = mock_client(|_| {});
    let err = client
        .manually_renew_secure_channel()
        .await
        .expect_err("renewal without a channel");
    assert_eq!(err.status(), StatusCode::BAD_SERVER_NOT_CONNECTED);
    Ok(())
}
