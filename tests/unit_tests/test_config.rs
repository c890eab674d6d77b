// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use opcua_client_rs::cfg::{cli::resolve_config_path, config::Config, logger::init_logger};
use serial_test::serial;

#[test]
fn config_loads_from_yaml() -> Result<()> {
    let cfg = resolve_config_path("tests/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    assert_eq!(cfg.client.timeout, Duration::from_millis(5_000));
    assert_eq!(
        cfg.client.secure_channel_lifetime,
        Duration::from_millis(3_600_000)
    );
    assert_eq!(cfg.client.application_uri, "urn:opcua-client-rs:test");
    assert_eq!(cfg.client.outstanding_publish_requests, 0);
    assert_eq!(cfg.transport.receive_buffer_size, 65_535);
    Ok(())
}

#[test]
fn zero_timeout_is_rejected() {
    let mut cfg = Config::default();
    cfg.client.timeout = Duration::ZERO;
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn undersized_buffers_are_rejected() {
    let mut cfg = Config::default();
    cfg.transport.receive_buffer_size = 1024;
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn tiny_channel_lifetimes_are_normalized_up() -> Result<()> {
    let mut cfg = Config::default();
    cfg.client.secure_channel_lifetime = Duration::from_millis(10);
    cfg.validate_and_normalize()?;
    assert!(cfg.client.secure_channel_lifetime >= Duration::from_millis(1_000));
    Ok(())
}

#[test]
#[serial]
fn logger_initializes_from_yaml() -> Result<()> {
    let _guard = init_logger("tests/config_logger.yaml")?;
    tracing::info!("logger smoke test");
    Ok(())
}
