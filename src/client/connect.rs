// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection orchestration: Hello/Acknowledge, OpenSecureChannel,
//! endpoint selection, CreateSession and ActivateSession, stepped as an
//! explicit phase machine. Any failure tears down whatever was built and
//! surfaces the first error.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    client::{
        client::{ClientState, Identity, Session, UaClient},
        pending::Continuation,
    },
    comms::{
        framing::{
            AcknowledgeMessage, ErrorMessage, HelloMessage, MessageType,
            PROTOCOL_VERSION, decode_transport_payload, encode_transport_message,
        },
        secure_channel::{SecureChannel, SecurityPolicy, SendLimits},
    },
    transport::RecvOutcome,
    types::{
        basic::{ByteString, LocalizedText, UaString},
        encoding::UaError,
        service::{
            channel::{
                CloseSecureChannelRequest, MessageSecurityMode, SecurityTokenRequestType,
            },
            discovery::{
                FindServersRequest, FindServersOnNetworkRequest, GetEndpointsRequest,
                ServerOnNetwork,
            },
            session::{
                ActivateSessionRequest, AnonymousIdentityToken, ApplicationDescription,
                ApplicationType, CloseSessionRequest, CreateSessionRequest,
                EndpointDescription, UserNameIdentityToken, UserTokenType,
            },
        },
        status::StatusCode,
    },
};

/// Connection build-up phases, stepped in order by `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectPhase {
    Transport,
    SecureChannel,
    Endpoint,
    Session,
    Done,
}

impl UaClient {
    /// Connect with an anonymous identity: transport, secure channel,
    /// endpoint selection, session create + activate.
    pub async fn connect(&mut self, endpoint_url: &str) -> Result<(), UaError> {
        self.connect_with_identity(endpoint_url, Identity::Anonymous)
            .await
    }

    /// Connect and activate the session with a username/password token.
    pub async fn connect_username(
        &mut self,
        endpoint_url: &str,
        user: &str,
        password: &str,
    ) -> Result<(), UaError> {
        self.connect_with_identity(
            endpoint_url,
            Identity::UserName {
                user: user.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    pub async fn connect_with_identity(
        &mut self,
        endpoint_url: &str,
        identity: Identity,
    ) -> Result<(), UaError> {
        if endpoint_url.is_empty() {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_ARGUMENT,
                "endpoint url must not be empty",
            ));
        }
        if self.get_state() != ClientState::Disconnected {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_STATE,
                "connect requires a disconnected client",
            ));
        }
        self.set_identity(identity);
        self.set_endpoint_url(Some(endpoint_url.to_string()));

        let mut phase = ConnectPhase::Transport;
        let mut chosen_endpoint: Option<EndpointDescription> = None;
        let result = loop {
            let step = match phase {
                ConnectPhase::Transport => {
                    let r = self.establish_transport(endpoint_url).await;
                    phase = ConnectPhase::SecureChannel;
                    r
                },
                ConnectPhase::SecureChannel => {
                    let r = self.establish_secure_channel().await;
                    phase = ConnectPhase::Endpoint;
                    r
                },
                ConnectPhase::Endpoint => {
                    let r = self.select_endpoint(endpoint_url).await;
                    phase = ConnectPhase::Session;
                    match r {
                        Ok(endpoint) => {
                            chosen_endpoint = Some(endpoint);
                            Ok(())
                        },
                        Err(e) => Err(e),
                    }
                },
                ConnectPhase::Session => {
                    let endpoint = chosen_endpoint.take().unwrap_or_default();
                    let r = self.establish_session(&endpoint).await;
                    phase = ConnectPhase::Done;
                    r
                },
                ConnectPhase::Done => break Ok(()),
            };
            if let Err(e) = step {
                break Err(e);
            }
        };

        if let Err(e) = &result {
            warn!(endpoint_url, "connect failed: {e}");
            self.teardown_now(StatusCode::BAD_SHUTDOWN);
        }
        result
    }

    /// Dial the transport and run the Hello/Acknowledge exchange.
    pub(crate) async fn establish_transport(
        &mut self,
        endpoint_url: &str,
    ) -> Result<(), UaError> {
        let params = self.config.transport.clone();
        let transport = (self.connect_fn())(endpoint_url.to_string(), params.clone()).await?;
        self.install_transport(transport);

        let hello = HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: params.receive_buffer_size,
            send_buffer_size: params.send_buffer_size,
            max_message_size: params.max_message_size,
            max_chunk_count: params.max_chunk_count,
            endpoint_url: endpoint_url.into(),
        };
        let frame = encode_transport_message(MessageType::Hello, &hello)?;
        let transport = self.transport_mut().ok_or_else(|| {
            UaError::new(StatusCode::BAD_SERVER_NOT_CONNECTED, "transport lost")
        })?;
        transport.send(frame).await?;

        let ack = self.await_acknowledge().await?;
        debug!(
            receive_buffer_size = ack.receive_buffer_size,
            send_buffer_size = ack.send_buffer_size,
            max_message_size = ack.max_message_size,
            max_chunk_count = ack.max_chunk_count,
            "acknowledge received"
        );

        // Our outgoing chunks must fit the server's receive buffer.
        self.negotiated = SendLimits {
            max_chunk_size: (ack.receive_buffer_size.min(params.send_buffer_size)) as usize,
            max_message_size: ack.max_message_size as usize,
            max_chunk_count: ack.max_chunk_count as usize,
        };
        self.set_state(ClientState::Connected);
        Ok(())
    }

    async fn await_acknowledge(&mut self) -> Result<AcknowledgeMessage, UaError> {
        let deadline = Instant::now() + self.config.client.timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(UaError::new(
                    StatusCode::BAD_TIMEOUT,
                    "no Acknowledge within the timeout",
                ));
            }
            let transport = self.transport_mut().ok_or_else(|| {
                UaError::new(StatusCode::BAD_SERVER_NOT_CONNECTED, "transport lost")
            })?;
            let outcome = transport.recv(deadline - now).await?;
            let bytes = match outcome {
                RecvOutcome::Data(bytes) => bytes,
                RecvOutcome::Timeout => continue,
                RecvOutcome::Closed => {
                    return Err(UaError::new(
                        StatusCode::BAD_CONNECTION_CLOSED,
                        "server closed the connection before Acknowledge",
                    ));
                },
            };
            let chunks = self.splitter.feed(&bytes)?;
            let Some(chunk) = chunks.into_iter().next() else {
                continue;
            };
            return match chunk.message_type {
                MessageType::Acknowledge => {
                    let ack: AcknowledgeMessage =
                        decode_transport_payload(&chunk.body, self.decoding_limits())?;
                    Ok(ack)
                },
                MessageType::Error => {
                    let err: ErrorMessage =
                        decode_transport_payload(&chunk.body, self.decoding_limits())?;
                    Err(UaError::new(
                        StatusCode::BAD_CONNECTION_REJECTED,
                        format!("server rejected Hello: {} ({})", err.error, err.reason.as_str()),
                    ))
                },
                other => Err(UaError::new(
                    StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID,
                    format!("expected ACK, got {other:?}"),
                )),
            };
        }
    }

    async fn establish_secure_channel(&mut self) -> Result<(), UaError> {
        self.channel = Some(SecureChannel::new(SecurityPolicy::None, self.negotiated));
        self.open_secure_channel_sync(SecurityTokenRequestType::Issue)
            .await?;
        self.set_state(ClientState::SecureChannel);
        Ok(())
    }

    /// Fetch the server's endpoints over the fresh channel and pick the
    /// one matching our security policy. A mismatch between the policy we
    /// opened with and the chosen endpoint would trigger a single
    /// close-and-reopen; with only policy None on both sides that path is
    /// never taken.
    async fn select_endpoint(
        &mut self,
        endpoint_url: &str,
    ) -> Result<EndpointDescription, UaError> {
        let request = GetEndpointsRequest {
            endpoint_url: endpoint_url.into(),
            ..GetEndpointsRequest::default()
        };
        let response = self.service(request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "GetEndpoints failed"));
        }
        let endpoints = response.endpoints.unwrap_or_default();
        let policy = SecurityPolicy::None;
        let chosen = endpoints
            .iter()
            .filter(|e| e.security_mode == MessageSecurityMode::None)
            .find(|e| SecurityPolicy::from_uri(e.security_policy_uri.as_str()) == Some(policy));
        match chosen {
            Some(endpoint) => {
                debug!(
                    endpoint = endpoint.endpoint_url.as_str(),
                    policy = endpoint.security_policy_uri.as_str(),
                    "endpoint selected"
                );
                Ok(endpoint.clone())
            },
            None => Err(UaError::new(
                StatusCode::BAD_SECURITY_CHECKS_FAILED,
                format!(
                    "server offers no endpoint for policy {} ({} endpoints total)",
                    policy.uri(),
                    endpoints.len()
                ),
            )),
        }
    }

    /// Create (or reuse) a session and activate it with the configured
    /// identity. Re-activating a surviving session promotes the client to
    /// `SessionRenewed`; if the server refuses, a fresh session is
    /// created once.
    async fn establish_session(
        &mut self,
        endpoint: &EndpointDescription,
    ) -> Result<(), UaError> {
        for attempt in 0..2u8 {
            let renewing = self.session.is_some();
            if !renewing {
                self.create_session(endpoint).await?;
            }
            match self.activate_session(endpoint).await {
                Ok(()) => {
                    self.set_state(if renewing {
                        ClientState::SessionRenewed
                    } else {
                        ClientState::Session
                    });
                    return Ok(());
                },
                Err(e) if renewing && attempt == 0 => {
                    // Stale session from a previous channel; start over
                    // with a fresh one.
                    info!("session re-activation failed ({e}), creating a new session");
                    self.session = None;
                },
                Err(e) => return Err(e),
            }
        }
        Err(UaError::new(
            StatusCode::BAD_SESSION_NOT_ACTIVATED,
            "session activation did not converge",
        ))
    }

    async fn create_session(
        &mut self,
        endpoint: &EndpointDescription,
    ) -> Result<(), UaError> {
        let cfg = &self.config.client;
        let request = CreateSessionRequest {
            client_description: ApplicationDescription {
                application_uri: cfg.application_uri.as_str().into(),
                product_uri: cfg.product_uri.as_str().into(),
                application_name: LocalizedText::new(&cfg.application_name),
                application_type: ApplicationType::Client,
                ..ApplicationDescription::default()
            },
            server_uri: endpoint.server.application_uri.clone(),
            endpoint_url: self
                .endpoint_url()
                .map(UaString::from)
                .unwrap_or_default(),
            session_name: cfg.session_name.as_str().into(),
            client_nonce: ByteString::nonce(32),
            client_certificate: ByteString::null(),
            requested_session_timeout: cfg.session_timeout.as_millis() as f64,
            max_response_message_size: self.config.transport.max_message_size,
            ..CreateSessionRequest::default()
        };
        let response = self.service(request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "CreateSession failed"));
        }
        info!(session_id = %response.session_id, "session created");
        self.session = Some(Session {
            session_id: response.session_id,
            authentication_token: response.authentication_token,
            server_nonce: response.server_nonce,
            max_request_message_size: response.max_request_message_size,
            activated: false,
        });
        Ok(())
    }

    async fn activate_session(
        &mut self,
        endpoint: &EndpointDescription,
    ) -> Result<(), UaError> {
        let user_identity_token = match self.identity().clone() {
            Identity::Anonymous => AnonymousIdentityToken {
                policy_id: policy_id_for(endpoint, UserTokenType::Anonymous)
                    .unwrap_or_else(|| "anonymous".into()),
            }
            .into_extension_object()?,
            Identity::UserName { user, password } => UserNameIdentityToken {
                policy_id: policy_id_for(endpoint, UserTokenType::UserName)
                    .unwrap_or_else(|| "username".into()),
                user_name: user.as_str().into(),
                // Policy None: the password travels unencrypted and the
                // algorithm field stays null.
                password: ByteString(Some(password.into_bytes())),
                encryption_algorithm: UaString::null(),
            }
            .into_extension_object()?,
        };

        // With policy None the client signature over
        // serverNonce || serverCertificate is empty bytes.
        let request = ActivateSessionRequest {
            user_identity_token,
            ..ActivateSessionRequest::default()
        };
        let response = self.service(request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "ActivateSession failed"));
        }
        if let Some(session) = self.session.as_mut() {
            session.server_nonce = response.server_nonce;
            session.activated = true;
        }
        info!("session activated");
        Ok(())
    }

    // ── graceful shutdown ───────────────────────────────────────────────

    /// Close the session and the channel with the protocol goodbyes, then
    /// drop the transport. Errors during teardown are logged, never
    /// returned; the client always ends `Disconnected`.
    pub async fn disconnect(&mut self) -> Result<(), UaError> {
        if self.session.as_ref().is_some_and(|s| s.activated)
            && self.get_state() >= ClientState::Session
        {
            let request = CloseSessionRequest {
                delete_subscriptions: true,
                ..CloseSessionRequest::default()
            };
            match self.service(request).await {
                Ok(response) => {
                    let status = response.response_header.service_result;
                    if !status.is_good() {
                        warn!(%status, "CloseSession not accepted");
                    }
                },
                Err(e) => warn!("CloseSession failed: {e}"),
            }
        }
        self.session = None;

        if self.get_state() >= ClientState::SecureChannel {
            let request = CloseSecureChannelRequest::default();
            let deadline = Instant::now() + self.config.client.timeout;
            if let Err(e) = self
                .dispatch_request(request, Continuation::discard(), deadline)
                .await
            {
                debug!("CloseSecureChannel send failed: {e}");
            }
        }

        if let Some(transport) = self.transport_mut() {
            transport.close().await;
        }
        self.teardown_now(StatusCode::BAD_SHUTDOWN);
        Ok(())
    }

    // ── discovery ───────────────────────────────────────────────────────

    /// List the endpoints of `server_url`. Runs over the current channel
    /// when connected, otherwise over a temporary one that is torn down
    /// afterwards.
    pub async fn get_endpoints(
        &mut self,
        server_url: &str,
    ) -> Result<Vec<EndpointDescription>, UaError> {
        let request = GetEndpointsRequest {
            endpoint_url: server_url.into(),
            ..GetEndpointsRequest::default()
        };
        let response = self.discovery_service(server_url, request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "GetEndpoints failed"));
        }
        Ok(response.endpoints.unwrap_or_default())
    }

    /// Query the servers registered at `server_url`, optionally filtered
    /// by server uri and preferred locales.
    pub async fn find_servers(
        &mut self,
        server_url: &str,
        server_uris: Vec<String>,
        locale_ids: Vec<String>,
    ) -> Result<Vec<ApplicationDescription>, UaError> {
        let request = FindServersRequest {
            endpoint_url: server_url.into(),
            locale_ids: to_string_array(locale_ids),
            server_uris: to_string_array(server_uris),
            ..FindServersRequest::default()
        };
        let response = self.discovery_service(server_url, request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "FindServers failed"));
        }
        Ok(response.servers.unwrap_or_default())
    }

    /// Network-wide discovery against an LDS.
    pub async fn find_servers_on_network(
        &mut self,
        server_url: &str,
        starting_record_id: u32,
        max_records_to_return: u32,
        capability_filter: Vec<String>,
    ) -> Result<Vec<ServerOnNetwork>, UaError> {
        let request = FindServersOnNetworkRequest {
            starting_record_id,
            max_records_to_return,
            server_capability_filter: to_string_array(capability_filter),
            ..FindServersOnNetworkRequest::default()
        };
        let response = self.discovery_service(server_url, request).await?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "FindServersOnNetwork failed"));
        }
        Ok(response.servers.unwrap_or_default())
    }

    /// Run a discovery request over the live channel, or bring up a
    /// temporary connection for it when disconnected.
    async fn discovery_service<R>(
        &mut self,
        server_url: &str,
        request: R,
    ) -> Result<R::Response, UaError>
    where
        R: crate::types::service::ServiceRequest,
    {
        if self.get_state() >= ClientState::SecureChannel {
            return self.service(request).await;
        }
        if self.get_state() != ClientState::Disconnected {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_STATE,
                "client is mid-connect",
            ));
        }
        let result = async {
            self.establish_transport(server_url).await?;
            self.establish_secure_channel().await?;
            self.service(request).await
        }
        .await;
        self.teardown_now(StatusCode::BAD_SHUTDOWN);
        result
    }
}

fn policy_id_for(
    endpoint: &EndpointDescription,
    token_type: UserTokenType,
) -> Option<UaString> {
    endpoint
        .user_identity_tokens
        .as_ref()?
        .iter()
        .find(|p| p.token_type == token_type)
        .map(|p| p.policy_id.clone())
}

fn to_string_array(values: Vec<String>) -> Option<Vec<UaString>> {
    if values.is_empty() {
        return None;
    }
    Some(values.into_iter().map(UaString::from).collect())
}
