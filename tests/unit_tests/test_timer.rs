// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use opcua_client_rs::{
    cfg::config::Config,
    client::client::UaClient,
    types::status::StatusCode,
};

fn disconnected_client() -> UaClient {
    UaClient::new(Config::default())
}

#[tokio::test]
async fn interval_below_five_millis_is_rejected() {
    let mut client = disconnected_client();

    let err = client
        .add_repeated_callback(|_| {}, Duration::from_millis(4))
        .expect_err("4 ms accepted");
    assert_eq!(err.status(), StatusCode::BAD_INVALID_ARGUMENT);

    client
        .add_repeated_callback(|_| {}, Duration::from_millis(5))
        .expect("5 ms rejected");
}

#[tokio::test]
async fn callback_ids_are_unique_and_never_reused() {
    let mut client = disconnected_client();

    let a = client
        .add_repeated_callback(|_| {}, Duration::from_millis(10))
        .expect("add");
    client.remove_repeated_callback(a).expect("remove");
    let b = client
        .add_repeated_callback(|_| {}, Duration::from_millis(10))
        .expect("add");
    assert_ne!(a, b, "callback id reused after removal");
}

#[tokio::test]
async fn repeated_callback_fires_repeatedly() -> Result<()> {
    let mut client = disconnected_client();
    let fired = Arc::new(AtomicU32::new(0));

    let counter = fired.clone();
    client.add_repeated_callback(
        move |_client| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(5),
    )?;

    client.run_async(Duration::from_millis(40)).await?;
    let count = fired.load(Ordering::SeqCst);
    assert!(
        (2..=9).contains(&count),
        "expected a handful of fires in 40 ms, got {count}"
    );
    Ok(())
}

#[tokio::test]
async fn removing_a_callback_stops_it() -> Result<()> {
    let mut client = disconnected_client();
    let fired = Arc::new(AtomicU32::new(0));

    let counter = fired.clone();
    let id = client.add_repeated_callback(
        move |_client| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(5),
    )?;

    client.run_async(Duration::from_millis(20)).await?;
    client.remove_repeated_callback(id)?;
    let seen = fired.load(Ordering::SeqCst);

    client.run_async(Duration::from_millis(20)).await?;
    assert_eq!(fired.load(Ordering::SeqCst), seen, "fired after removal");

    // The id is gone; a second removal reports the bad argument.
    let err = client.remove_repeated_callback(id).expect_err("double remove");
    assert_eq!(err.status(), StatusCode::BAD_INVALID_ARGUMENT);
    Ok(())
}

#[tokio::test]
async fn a_callback_may_remove_itself() -> Result<()> {
    let mut client = disconnected_client();
    let fired = Arc::new(AtomicU32::new(0));

    let counter = fired.clone();
    // The id is only known after registration; route it through a cell.
    let id_cell = Arc::new(AtomicU32::new(0));
    let id_for_cb = id_cell.clone();
    let id = client.add_repeated_callback(
        move |client| {
            counter.fetch_add(1, Ordering::SeqCst);
            let own_id = u64::from(id_for_cb.load(Ordering::SeqCst));
            client
                .remove_repeated_callback(own_id)
                .expect("self-removal must be legal");
        },
        Duration::from_millis(5),
    )?;
    id_cell.store(id as u32, Ordering::SeqCst);

    client.run_async(Duration::from_millis(40)).await?;
    assert_eq!(fired.load(Ordering::SeqCst), 1, "self-removed timer fired again");
    Ok(())
}

#[tokio::test]
async fn changing_the_interval_reschedules() -> Result<()> {
    let mut client = disconnected_client();
    let fired = Arc::new(AtomicU32::new(0));

    let counter = fired.clone();
    let id = client.add_repeated_callback(
        move |_client| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        Duration::from_millis(5),
    )?;

    client.change_repeated_callback_interval(id, Duration::from_millis(500))?;
    client.run_async(Duration::from_millis(40)).await?;
    assert_eq!(
        fired.load(Ordering::SeqCst),
        0,
        "stretched interval should not fire within the window"
    );

    let err = client
        .change_repeated_callback_interval(id, Duration::from_millis(3))
        .expect_err("3 ms accepted");
    assert_eq!(err.status(), StatusCode::BAD_INVALID_ARGUMENT);
    Ok(())
}
