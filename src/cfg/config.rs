// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::transport::TransportParams;

/// Smallest secure-channel token lifetime worth requesting; anything
/// shorter makes the renewal traffic dominate the channel.
const MIN_CHANNEL_LIFETIME: Duration = Duration::from_millis(1_000);

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Client-side protocol parameters (timeouts, identity, publish pump).
    pub client: ClientConfig,
    /// Buffer limits advertised during the Hello/Acknowledge handshake.
    pub transport: TransportParams,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ClientConfig {
    #[serde(rename = "Timeout", with = "serde_millis")]
    /// Deadline for synchronous service calls.
    pub timeout: Duration,

    #[serde(rename = "SecureChannelLifetime", with = "serde_millis")]
    /// Token lifetime requested in OpenSecureChannel; renewal triggers at
    /// 75% of whatever the server revises this to.
    pub secure_channel_lifetime: Duration,

    #[serde(rename = "SessionTimeout", with = "serde_millis")]
    /// Requested session timeout.
    pub session_timeout: Duration,

    #[serde(rename = "ApplicationUri")]
    /// Application instance URI reported in CreateSession.
    pub application_uri: String,

    #[serde(default, rename = "ProductUri")]
    pub product_uri: String,

    #[serde(default = "default_session_name", rename = "SessionName")]
    pub session_name: String,

    #[serde(default, rename = "ApplicationName")]
    /// Human-readable application name.
    pub application_name: String,

    #[serde(default, rename = "OutstandingPublishRequests")]
    /// Target number of PublishRequests kept in flight; 0 disables the
    /// publish pump.
    pub outstanding_publish_requests: u16,
}

fn default_session_name() -> String {
    "opcua-client-rs session".to_string()
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.client.timeout.is_zero(),
            "Timeout must be greater than zero"
        );
        ensure!(
            !self.client.application_uri.is_empty(),
            "ApplicationUri must not be empty"
        );

        if self.client.secure_channel_lifetime < MIN_CHANNEL_LIFETIME {
            self.client.secure_channel_lifetime = MIN_CHANNEL_LIFETIME;
        }

        // Part 6 mandates at least 8192-byte buffers.
        ensure!(
            self.transport.receive_buffer_size >= 8192,
            "ReceiveBufferSize must be at least 8192"
        );
        ensure!(
            self.transport.send_buffer_size >= 8192,
            "SendBufferSize must be at least 8192"
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client: ClientConfig {
                timeout: Duration::from_millis(5_000),
                secure_channel_lifetime: Duration::from_millis(3_600_000),
                session_timeout: Duration::from_millis(60_000),
                application_uri: "urn:opcua-client-rs".to_string(),
                product_uri: String::new(),
                session_name: default_session_name(),
                application_name: String::new(),
                outstanding_publish_requests: 0,
            },
            transport: TransportParams::default(),
        }
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
