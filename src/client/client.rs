// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The client runtime: one transport, one secure channel, one session,
//! and the cooperative event loop that multiplexes request/response
//! traffic, repeated callbacks and the publish pump over them.
//!
//! The client is single-task cooperative. Every piece of state is mutated
//! from inside `run`/`run_iterate`/`service`/`async_service` or from a
//! callback they invoke; the `&mut self` receivers make concurrent entry
//! unrepresentable.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::Config,
    client::{
        pending::{Continuation, PendingRequest, RequestTable, ResponseOutcome},
        publish::{PublishPump, SubscriptionHandler},
        timer::TimerWheel,
    },
    comms::{
        framing::{
            AssemblyOutcome, ChunkSplitter, ErrorMessage, MessageAssembler, MessageType,
            PROTOCOL_VERSION, RawChunk, decode_transport_payload,
        },
        secure_channel::{SecureChannel, SendLimits},
    },
    transport::{BoxedTransport, ConnectFn, RecvOutcome, tcp_connect_fn},
    types::{
        basic::{ByteString, DateTime},
        encoding::{BinaryDecodable, DecodingLimits, UaError},
        header::ServiceFault,
        node_id::NodeId,
        registry::{DataTypeDescriptor, TypeRegistry},
        service::{
            SERVICE_FAULT_TYPE_ID, ServiceMessage, ServiceRequest, ServiceResponse,
            channel::{
                CloseSecureChannelRequest, OpenSecureChannelRequest,
                OpenSecureChannelResponse, SecurityTokenRequestType,
            },
            subscription::{PublishRequest, PublishResponse},
        },
        status::StatusCode,
    },
    utils::wait_budget,
};

/// Publish requests wait for server-paced responses; they must not trip
/// the ordinary per-request deadline.
const PUBLISH_REQUEST_DEADLINE: Duration = Duration::from_secs(3600);

/// Connection progress of a client. Transitions run forward except for
/// drops back to `Disconnected` and the renewal loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Disconnected,
    /// TCP is up and Hello/Acknowledge succeeded.
    Connected,
    /// OpenSecureChannel completed.
    SecureChannel,
    /// A session is created and activated.
    Session,
    /// An existing session was re-activated over a fresh channel.
    SessionRenewed,
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientState::Disconnected => "Disconnected",
            ClientState::Connected => "Connected",
            ClientState::SecureChannel => "SecureChannel",
            ClientState::Session => "Session",
            ClientState::SessionRenewed => "SessionRenewed",
        };
        f.write_str(s)
    }
}

/// User identity presented during ActivateSession.
#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    UserName { user: String, password: String },
}

/// Application-level context above the secure channel.
#[derive(Debug)]
pub struct Session {
    pub session_id: NodeId,
    pub authentication_token: NodeId,
    pub server_nonce: ByteString,
    pub max_request_message_size: u32,
    pub activated: bool,
}

/// Observer of state transitions; fires synchronously at the transition
/// point, exactly once per transition.
pub type StateCallback = Box<dyn FnMut(&mut UaClient, ClientState) + Send>;

pub struct UaClient {
    pub(crate) config: Config,
    state: ClientState,
    identity: Identity,
    endpoint_url: Option<String>,
    connect_fn: ConnectFn,
    state_callback: Option<StateCallback>,
    registry: TypeRegistry,
    limits: DecodingLimits,
    /// Outgoing limits from the server's Acknowledge.
    pub(crate) negotiated: SendLimits,

    transport: Option<BoxedTransport>,
    pub(crate) channel: Option<SecureChannel>,
    pub(crate) session: Option<Session>,

    pub(crate) splitter: ChunkSplitter,
    assembler: MessageAssembler,
    pending: RequestTable,
    timers: TimerWheel,
    pub(crate) publish: PublishPump,

    /// At most one OpenSecureChannel may be outstanding.
    open_in_flight: bool,
    /// True while a user callback runs; synchronous services are illegal
    /// then.
    in_callback: bool,
}

impl std::fmt::Debug for UaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UaClient")
            .field("state", &self.state)
            .field("endpoint_url", &self.endpoint_url)
            .field("pending", &self.pending.len())
            .field("timers", &self.timers.len())
            .field("publish", &self.publish)
            .finish()
    }
}

impl UaClient {
    pub fn new(config: Config) -> Self {
        let limits = DecodingLimits {
            max_message_size: config.transport.max_message_size as usize,
            max_chunk_count: config.transport.max_chunk_count as usize,
            ..DecodingLimits::default()
        };
        let splitter = ChunkSplitter::new(config.transport.receive_buffer_size as usize);
        let assembler = MessageAssembler::new(limits.clone());
        let publish = PublishPump::new(config.client.outstanding_publish_requests);
        UaClient {
            config,
            state: ClientState::Disconnected,
            identity: Identity::Anonymous,
            endpoint_url: None,
            connect_fn: tcp_connect_fn(),
            state_callback: None,
            registry: TypeRegistry::builtin(),
            limits,
            negotiated: SendLimits::default(),
            transport: None,
            channel: None,
            session: None,
            splitter,
            assembler,
            pending: RequestTable::default(),
            timers: TimerWheel::default(),
            publish,
            open_in_flight: false,
            in_callback: false,
        }
    }

    /// Replace the transport factory (tests, alternative stacks).
    pub fn set_connect_fn(&mut self, connect_fn: ConnectFn) {
        self.connect_fn = connect_fn;
    }

    pub fn set_state_callback(&mut self, callback: StateCallback) {
        self.state_callback = Some(callback);
    }

    /// Merge custom structure descriptors into the decoder registry.
    pub fn add_custom_types(
        &mut self,
        descriptors: impl IntoIterator<Item = DataTypeDescriptor>,
    ) {
        self.registry.extend(descriptors);
    }

    #[inline]
    pub fn get_state(&self) -> ClientState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    #[inline]
    pub(crate) fn decoding_limits(&self) -> &DecodingLimits {
        &self.limits
    }

    /// The raw transport, valid only while the client is not
    /// `Disconnected`. Interleaving use with `run` is the caller's
    /// responsibility under the single-task contract.
    pub fn get_connection(&mut self) -> Option<&mut BoxedTransport> {
        if self.state == ClientState::Disconnected {
            return None;
        }
        self.transport.as_mut()
    }

    pub(crate) fn set_state(&mut self, new: ClientState) {
        if self.state == new {
            return;
        }
        info!(from = %self.state, to = %new, "client state transition");
        self.state = new;
        if let Some(mut cb) = self.state_callback.take() {
            let was = self.in_callback;
            self.in_callback = true;
            cb(self, new);
            self.in_callback = was;
            if self.state_callback.is_none() {
                self.state_callback = Some(cb);
            }
        }
    }

    // ── request dispatch ────────────────────────────────────────────────

    /// Encode, frame and transmit a request; register its continuation.
    /// Returns the channel request id (also used as requestHandle).
    pub(crate) async fn dispatch_request<R: ServiceRequest>(
        &mut self,
        mut request: R,
        continuation: Continuation,
        deadline: Instant,
    ) -> Result<u32, UaError> {
        if self.transport.is_none() {
            return Err(UaError::new(
                StatusCode::BAD_SERVER_NOT_CONNECTED,
                "no transport; connect first",
            ));
        }
        let timeout_hint = self.config.client.timeout.as_millis() as u32;
        let authentication_token = self
            .session
            .as_ref()
            .map(|s| s.authentication_token.clone())
            .unwrap_or_default();
        let channel = self.channel.as_mut().ok_or_else(|| {
            UaError::new(StatusCode::BAD_SERVER_NOT_CONNECTED, "no secure channel")
        })?;

        let request_id = channel.next_request_id();
        let header = request.request_header_mut();
        header.authentication_token = authentication_token;
        header.timestamp = DateTime::now();
        header.request_handle = request_id;
        header.timeout_hint = timeout_hint;

        let message_type = if R::TYPE_ID == OpenSecureChannelRequest::TYPE_ID {
            MessageType::OpenSecureChannel
        } else if R::TYPE_ID == CloseSecureChannelRequest::TYPE_ID {
            MessageType::CloseSecureChannel
        } else {
            MessageType::Message
        };

        let mut body = Vec::with_capacity(request.enveloped_byte_len());
        request.encode_enveloped(&mut body)?;
        let chunks = channel.encode_message(message_type, request_id, &body)?;

        debug!(
            request_id,
            request = R::TYPE_NAME,
            chunks = chunks.len(),
            "dispatching request"
        );
        for chunk in chunks {
            let transport = self.transport.as_mut().ok_or_else(|| {
                UaError::new(StatusCode::BAD_SERVER_NOT_CONNECTED, "transport lost")
            })?;
            if let Err(e) = transport.send(chunk).await {
                warn!(request_id, "send failed: {e}");
                self.teardown_now(StatusCode::BAD_CONNECTION_CLOSED);
                return Err(e);
            }
        }

        // CLO is fire-and-forget; everything else awaits a response.
        if message_type != MessageType::CloseSecureChannel {
            self.pending.insert(
                request_id,
                PendingRequest {
                    type_name: R::TYPE_NAME,
                    deadline,
                    continuation,
                },
            );
        }
        Ok(request_id)
    }

    /// Synchronous service call: dispatch, then drive the event loop
    /// until the response arrives or the deadline passes.
    pub async fn service<R: ServiceRequest>(
        &mut self,
        request: R,
    ) -> Result<R::Response, UaError> {
        debug_assert!(
            !self.in_callback,
            "synchronous service invoked from inside a client callback"
        );
        if self.in_callback {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_STATE,
                "synchronous service inside a callback",
            ));
        }

        let (tx, mut rx) = oneshot::channel();
        let deadline = Instant::now() + self.config.client.timeout;
        let request_id = self
            .dispatch_request(request, Continuation::Sync(tx), deadline)
            .await?;

        loop {
            match rx.try_recv() {
                Ok(Ok(body)) => return Ok(self.decode_response::<R::Response>(&body)),
                Ok(Err(status)) => {
                    return Err(UaError::new(
                        status,
                        format!("{} completed without response", R::TYPE_NAME),
                    ));
                },
                Err(oneshot::error::TryRecvError::Empty) => {},
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(UaError::new(
                        StatusCode::BAD_SHUTDOWN,
                        "pending request dropped",
                    ));
                },
            }

            let now = Instant::now();
            if now >= deadline {
                self.pending.remove(request_id);
                return Err(UaError::new(
                    StatusCode::BAD_TIMEOUT,
                    format!("{} timed out", R::TYPE_NAME),
                ));
            }
            let wait = self.iteration_wait(now, deadline - now);
            if let Err(e) = self.iterate(Some(wait)).await {
                // The teardown has already completed our continuation.
                return match rx.try_recv() {
                    Ok(Ok(body)) => Ok(self.decode_response::<R::Response>(&body)),
                    Ok(Err(status)) => Err(UaError::new(
                        status,
                        format!("{} failed with the channel", R::TYPE_NAME),
                    )),
                    _ => Err(e),
                };
            }
        }
    }

    /// Asynchronous service call: dispatch and return the request id. The
    /// callback is invoked exactly once, with a synthetic response
    /// carrying the failure status if no real response can arrive.
    pub async fn async_service<R, F>(
        &mut self,
        request: R,
        callback: F,
    ) -> Result<u32, UaError>
    where
        R: ServiceRequest,
        F: FnOnce(&mut UaClient, u32, R::Response) + Send + 'static,
    {
        let deadline = Instant::now() + self.config.client.timeout;
        let continuation = Continuation::Async(Box::new(
            move |client: &mut UaClient, request_id: u32, outcome: ResponseOutcome| {
                let response = match outcome {
                    Ok(body) => client.decode_response::<R::Response>(&body),
                    Err(status) => R::Response::from_service_result(status),
                };
                callback(client, request_id, response);
            },
        ));
        self.dispatch_request(request, continuation, deadline).await
    }

    /// Decode an enveloped response body as `R`, degrading to a synthetic
    /// response on faults, mismatches and decode failures.
    pub(crate) fn decode_response<R: ServiceResponse>(&self, body: &Bytes) -> R {
        let mut slice = body.as_ref();
        let type_id = match NodeId::decode(&mut slice, &self.limits) {
            Ok(id) => id,
            Err(e) => {
                warn!("response envelope unreadable: {e}");
                return R::from_service_result(StatusCode::BAD_DECODING_ERROR);
            },
        };
        let numeric = type_id.as_ns0_numeric();
        if numeric == Some(R::TYPE_ID) {
            match R::decode(&mut slice, &self.limits) {
                Ok(response) => response,
                Err(e) => {
                    warn!(response = R::TYPE_NAME, "response decode failed: {e}");
                    R::from_service_result(StatusCode::BAD_DECODING_ERROR)
                },
            }
        } else if numeric == Some(SERVICE_FAULT_TYPE_ID) {
            match ServiceFault::decode(&mut slice, &self.limits) {
                Ok(fault) => {
                    let status = fault.response_header.service_result;
                    debug!(response = R::TYPE_NAME, %status, "service fault");
                    let mut response = R::from_service_result(status);
                    *response.response_header_mut() = fault.response_header;
                    response
                },
                Err(e) => {
                    warn!("service fault decode failed: {e}");
                    R::from_service_result(StatusCode::BAD_DECODING_ERROR)
                },
            }
        } else {
            warn!(
                expected = R::TYPE_NAME,
                received = %self.registry.name_of(&type_id),
                "response type mismatch"
            );
            R::from_service_result(StatusCode::BAD_RESPONSE_TYPE_MISMATCH)
        }
    }

    fn complete_pending(
        &mut self,
        request_id: u32,
        entry: PendingRequest,
        outcome: ResponseOutcome,
    ) {
        match entry.continuation {
            Continuation::Sync(tx) => {
                let _ = tx.send(outcome);
            },
            Continuation::Async(callback) => {
                let was = self.in_callback;
                self.in_callback = true;
                callback(self, request_id, outcome);
                self.in_callback = was;
            },
        }
    }

    // ── incoming traffic ────────────────────────────────────────────────

    /// Feed raw transport bytes through the chunk codec, routing every
    /// complete message. Public so callers driving the connection by hand
    /// can inject received data.
    pub fn process_binary_message(&mut self, data: &[u8]) -> Result<(), UaError> {
        let chunks = match self.splitter.feed(data) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("chunk framing failed: {e}");
                self.teardown_now(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                return Err(e);
            },
        };
        for chunk in chunks {
            self.handle_chunk(chunk)?;
        }
        Ok(())
    }

    fn handle_chunk(&mut self, chunk: RawChunk) -> Result<(), UaError> {
        match chunk.message_type {
            MessageType::Hello | MessageType::Acknowledge => {
                warn!(message_type = ?chunk.message_type, "unexpected negotiation message");
                Ok(())
            },
            MessageType::Error => {
                let parsed: ErrorMessage =
                    decode_transport_payload(&chunk.body, &self.limits)
                        .unwrap_or_else(|_| ErrorMessage {
                            error: StatusCode::BAD_TCP_INTERNAL_ERROR,
                            reason: "unreadable ERR message".into(),
                        });
                warn!(error = %parsed.error, reason = parsed.reason.as_str(), "server sent ERR");
                self.teardown_now(StatusCode::BAD_CONNECTION_CLOSED);
                Err(UaError::new(
                    StatusCode::BAD_CONNECTION_CLOSED,
                    format!("server error: {} ({})", parsed.error, parsed.reason.as_str()),
                ))
            },
            MessageType::OpenSecureChannel
            | MessageType::CloseSecureChannel
            | MessageType::Message => {
                let message_type = chunk.message_type;
                let Some(channel) = self.channel.as_mut() else {
                    warn!("channel-bound chunk without a secure channel");
                    return Ok(());
                };
                let decoded = match channel.decode_chunk(chunk, &self.limits) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("chunk rejected: {e}");
                        self.teardown_now(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                        return Err(e);
                    },
                };
                let outcome = match self.assembler.push(
                    message_type,
                    decoded.request_id,
                    decoded.kind,
                    decoded.payload,
                ) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("message reassembly failed: {e}");
                        self.teardown_now(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                        return Err(e);
                    },
                };
                match outcome {
                    AssemblyOutcome::Pending => Ok(()),
                    AssemblyOutcome::Aborted {
                        request_id,
                        payload,
                    } => self.handle_abort(request_id, &payload),
                    AssemblyOutcome::Complete(message) => {
                        self.route_message(message.request_id, message.body);
                        Ok(())
                    },
                }
            },
        }
    }

    /// Peer aborted a partially sent message: the pending request fails
    /// with the carried error code, the channel stays up.
    fn handle_abort(&mut self, request_id: u32, payload: &Bytes) -> Result<(), UaError> {
        let status = decode_transport_payload::<ErrorMessage>(payload, &self.limits)
            .map(|e| e.error)
            .unwrap_or(StatusCode::BAD_COMMUNICATION_ERROR);
        warn!(request_id, %status, "message aborted by peer");
        if let Some(entry) = self.pending.remove(request_id) {
            self.complete_pending(request_id, entry, Err(status));
        }
        Ok(())
    }

    fn route_message(&mut self, request_id: u32, body: Bytes) {
        let Some(entry) = self.pending.remove(request_id) else {
            // Stale (timed out) or duplicate response; both are dropped
            // without touching the channel.
            debug!(request_id, "discarding response for unknown request id");
            return;
        };
        debug!(request_id, request = entry.type_name, "routing response");
        self.complete_pending(request_id, entry, Ok(body));
    }

    // ── event loop ──────────────────────────────────────────────────────

    /// One pass of the event loop. `recv_wait = None` skips the network
    /// receive (the `run_iterate` flavor).
    pub(crate) async fn iterate(
        &mut self,
        recv_wait: Option<Duration>,
    ) -> Result<(), UaError> {
        if let Some(wait) = recv_wait {
            // Disconnected clients still drive their timers; there is
            // just nothing to receive.
            let outcome = match self.transport.as_mut() {
                Some(transport) => transport.recv(wait).await,
                None => {
                    tokio::time::sleep(wait).await;
                    Ok(RecvOutcome::Timeout)
                },
            };
            match outcome {
                Ok(RecvOutcome::Data(bytes)) => self.process_binary_message(&bytes)?,
                Ok(RecvOutcome::Timeout) => {},
                Ok(RecvOutcome::Closed) => {
                    let mid_frame = self.splitter.has_partial_frame();
                    self.teardown_now(StatusCode::BAD_CONNECTION_CLOSED);
                    let status = if mid_frame {
                        StatusCode::BAD_COMMUNICATION_ERROR
                    } else {
                        StatusCode::BAD_CONNECTION_CLOSED
                    };
                    return Err(UaError::new(status, "connection closed by peer"));
                },
                Err(e) => {
                    self.teardown_now(StatusCode::BAD_CONNECTION_CLOSED);
                    return Err(e);
                },
            }
        }

        let now = Instant::now();
        self.expire_pending(now);
        self.run_due_timers(now);
        self.renew_channel_if_due(now).await?;
        self.top_up_publish().await?;
        Ok(())
    }

    /// Execute the main loop until `timeout` elapses. Returns the advice
    /// for how long the caller may wait before the next `run`.
    pub async fn run(&mut self, timeout: Duration) -> Result<Duration, UaError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            let wait = self.iteration_wait(now, deadline.saturating_duration_since(now));
            self.iterate(Some(wait)).await?;
            if Instant::now() >= deadline {
                break;
            }
        }
        Ok(self.next_timeout_hint(Instant::now()))
    }

    /// `run` without caring about the next-wait advice.
    pub async fn run_async(&mut self, timeout: Duration) -> Result<(), UaError> {
        self.run(timeout).await.map(|_| ())
    }

    /// Like `run` but without the network receive; incoming bytes are the
    /// caller's business via `process_binary_message`.
    pub async fn run_iterate(&mut self) -> Result<Duration, UaError> {
        self.iterate(None).await?;
        Ok(self.next_timeout_hint(Instant::now()))
    }

    fn iteration_wait(&self, now: Instant, limit: Duration) -> Duration {
        wait_budget(
            &[
                self.timers.earliest_deadline(),
                self.pending.earliest_deadline(),
                self.channel.as_ref().and_then(|c| c.renewal_deadline()),
            ],
            now,
            limit,
        )
    }

    fn next_timeout_hint(&self, now: Instant) -> Duration {
        self.iteration_wait(now, self.config.client.timeout)
    }

    fn expire_pending(&mut self, now: Instant) {
        for request_id in self.pending.expired(now) {
            if let Some(entry) = self.pending.remove(request_id) {
                debug!(request_id, request = entry.type_name, "request timed out");
                self.complete_pending(request_id, entry, Err(StatusCode::BAD_TIMEOUT));
            }
        }
    }

    fn run_due_timers(&mut self, now: Instant) {
        while let Some(mut fired) = self.timers.pop_due(now) {
            let was = self.in_callback;
            self.in_callback = true;
            fired.run(self);
            self.in_callback = was;
            self.timers.rearm(fired, Instant::now());
        }
    }

    async fn renew_channel_if_due(&mut self, now: Instant) -> Result<(), UaError> {
        if self.open_in_flight {
            return Ok(());
        }
        let due = self
            .channel
            .as_ref()
            .is_some_and(|channel| channel.needs_renewal(now));
        if !due {
            return Ok(());
        }
        debug!("secure channel token at 75% lifetime, renewing");
        self.issue_channel_open_async(SecurityTokenRequestType::Renew)
            .await
            .map(|_| ())
    }

    /// Dispatch an OPN request whose response is applied to the channel
    /// in the background (renewal path).
    async fn issue_channel_open_async(
        &mut self,
        request_type: SecurityTokenRequestType,
    ) -> Result<u32, UaError> {
        let request = self.build_open_request(request_type)?;
        self.open_in_flight = true;
        let deadline = Instant::now() + self.config.client.timeout;
        let continuation = Continuation::Async(Box::new(
            |client: &mut UaClient, _request_id: u32, outcome: ResponseOutcome| {
                client.open_in_flight = false;
                match outcome {
                    Ok(body) => {
                        let response: OpenSecureChannelResponse =
                            client.decode_response(&body);
                        let status = response.response_header.service_result;
                        if status.is_good() {
                            if let Some(channel) = client.channel.as_mut() {
                                channel.apply_open_response(&response, Instant::now());
                            }
                        } else {
                            warn!(%status, "secure channel renewal rejected");
                            client.teardown_now(StatusCode::BAD_SECURE_CHANNEL_CLOSED);
                        }
                    },
                    // The channel died while the OPN was in flight; the
                    // teardown has already run.
                    Err(status) => {
                        debug!(%status, "channel open request flushed");
                    },
                }
            },
        ));
        let result = self
            .dispatch_request(request, continuation, deadline)
            .await;
        if result.is_err() {
            self.open_in_flight = false;
        }
        result
    }

    /// Issue or renew the channel token and wait for the result.
    pub(crate) async fn open_secure_channel_sync(
        &mut self,
        request_type: SecurityTokenRequestType,
    ) -> Result<(), UaError> {
        let request = self.build_open_request(request_type)?;
        self.open_in_flight = true;
        let result = self.service(request).await;
        self.open_in_flight = false;
        let response = result?;
        let status = response.response_header.service_result;
        if !status.is_good() {
            return Err(UaError::new(status, "OpenSecureChannel rejected"));
        }
        let channel = self.channel.as_mut().ok_or_else(|| {
            UaError::new(StatusCode::BAD_SECURE_CHANNEL_CLOSED, "channel vanished")
        })?;
        channel.apply_open_response(&response, Instant::now());
        Ok(())
    }

    fn build_open_request(
        &mut self,
        request_type: SecurityTokenRequestType,
    ) -> Result<OpenSecureChannelRequest, UaError> {
        if self.open_in_flight {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_STATE,
                "an OpenSecureChannel request is already in flight",
            ));
        }
        let requested_lifetime =
            self.config.client.secure_channel_lifetime.as_millis() as u32;
        let channel = self.channel.as_mut().ok_or_else(|| {
            UaError::new(StatusCode::BAD_SERVER_NOT_CONNECTED, "no secure channel")
        })?;
        Ok(OpenSecureChannelRequest {
            client_protocol_version: PROTOCOL_VERSION,
            request_type,
            security_mode: crate::types::service::channel::MessageSecurityMode::None,
            client_nonce: channel.make_client_nonce(),
            requested_lifetime,
            ..OpenSecureChannelRequest::default()
        })
    }

    /// Force a token renewal regardless of the deadline.
    pub async fn manually_renew_secure_channel(&mut self) -> Result<(), UaError> {
        if self.state < ClientState::SecureChannel {
            return Err(UaError::new(
                StatusCode::BAD_SERVER_NOT_CONNECTED,
                "no secure channel to renew",
            ));
        }
        self.open_secure_channel_sync(SecurityTokenRequestType::Renew)
            .await
    }

    // ── publish pump ────────────────────────────────────────────────────

    /// Route NotificationMessages of a subscription to `handler`. The
    /// pump only runs while at least one handler is registered.
    pub fn register_subscription_handler(
        &mut self,
        subscription_id: u32,
        handler: SubscriptionHandler,
    ) {
        self.publish.register_handler(subscription_id, handler);
    }

    pub fn unregister_subscription_handler(&mut self, subscription_id: u32) {
        self.publish.unregister_handler(subscription_id);
    }

    async fn top_up_publish(&mut self) -> Result<(), UaError> {
        if self.state < ClientState::Session {
            return Ok(());
        }
        while self.publish.deficit() > 0 {
            let request = PublishRequest {
                subscription_acknowledgements: self.publish.take_acknowledgements(),
                ..PublishRequest::default()
            };
            let deadline = Instant::now() + PUBLISH_REQUEST_DEADLINE;
            let continuation = Continuation::Async(Box::new(
                |client: &mut UaClient, _request_id: u32, outcome: ResponseOutcome| {
                    client.on_publish_outcome(outcome);
                },
            ));
            self.dispatch_request(request, continuation, deadline).await?;
            self.publish.note_dispatched();
        }
        Ok(())
    }

    fn on_publish_outcome(&mut self, outcome: ResponseOutcome) {
        self.publish.note_response();
        let body = match outcome {
            Ok(body) => body,
            Err(status) => {
                debug!(%status, "publish request flushed");
                return;
            },
        };
        let response: PublishResponse = self.decode_response(&body);
        let status = response.response_header.service_result;
        if status.base() == StatusCode::BAD_TOO_MANY_PUBLISH_REQUESTS {
            warn!(
                target = self.publish.target(),
                "server limits publish requests, backing off"
            );
            self.publish.note_too_many();
            return;
        }
        if status.base() == StatusCode::BAD_SESSION_ID_INVALID
            || status.base() == StatusCode::BAD_SESSION_CLOSED
        {
            warn!(%status, "session rejected by server, dropping it");
            self.drop_session();
            return;
        }
        if !status.is_good() {
            warn!(%status, "publish response not good");
            return;
        }

        let subscription_id = response.subscription_id;
        let notification = &response.notification_message;
        let has_payload = notification
            .notification_data
            .as_ref()
            .is_some_and(|d| !d.is_empty());
        if has_payload {
            self.publish
                .queue_acknowledgement(subscription_id, notification.sequence_number);
        }
        if let Some(mut handler) = self.publish.take_handler(subscription_id) {
            let was = self.in_callback;
            self.in_callback = true;
            handler(self, subscription_id, notification);
            self.in_callback = was;
            self.publish.put_handler_back(subscription_id, handler);
        } else {
            debug!(subscription_id, "notification without a registered handler");
        }
    }

    /// The server no longer recognizes our session. The channel survives;
    /// the caller decides whether to connect again.
    fn drop_session(&mut self) {
        self.session = None;
        if self.state > ClientState::SecureChannel {
            self.set_state(ClientState::SecureChannel);
        }
    }

    // ── timers ──────────────────────────────────────────────────────────

    /// Register a cyclic callback executed from the event loop. The
    /// interval must be at least 5 ms.
    pub fn add_repeated_callback(
        &mut self,
        callback: impl FnMut(&mut UaClient) + Send + 'static,
        interval: Duration,
    ) -> Result<u64, UaError> {
        self.timers
            .add(interval, Box::new(callback), Instant::now())
    }

    pub fn change_repeated_callback_interval(
        &mut self,
        callback_id: u64,
        interval: Duration,
    ) -> Result<(), UaError> {
        self.timers
            .change_interval(callback_id, interval, Instant::now())
    }

    pub fn remove_repeated_callback(&mut self, callback_id: u64) -> Result<(), UaError> {
        self.timers.remove(callback_id)
    }

    // ── teardown ────────────────────────────────────────────────────────

    /// Drop the transport and channel state and fail every outstanding
    /// request with `flush_status`, ascending by request id. The session
    /// object survives so a later `connect` can try to re-activate it.
    pub(crate) fn teardown_now(&mut self, flush_status: StatusCode) {
        // Dropping the TCP stream closes it; no graceful CLO here.
        self.transport = None;
        if let Some(channel) = self.channel.as_mut() {
            channel.reset();
        }
        self.channel = None;
        self.splitter.reset();
        self.assembler.reset();
        self.open_in_flight = false;
        self.publish.reset_in_flight();

        let drained = self.pending.drain_all();
        if !drained.is_empty() {
            info!(
                count = drained.len(),
                %flush_status,
                "flushing outstanding requests"
            );
        }
        for (request_id, entry) in drained {
            self.complete_pending(request_id, entry, Err(flush_status));
        }
        self.set_state(ClientState::Disconnected);
    }

    /// Drop the connection without the graceful CloseSession /
    /// CloseSecureChannel exchange.
    pub fn close(&mut self) {
        self.session = None;
        self.teardown_now(StatusCode::BAD_SHUTDOWN);
    }

    /// Terminal shutdown: like `close`, and every async continuation has
    /// run once this returns. The value should be dropped afterwards.
    pub fn delete(&mut self) {
        self.close();
        self.timers = TimerWheel::default();
    }

    /// Return to `Disconnected` keeping configuration and repeated
    /// callbacks registered.
    pub fn reset(&mut self) {
        self.session = None;
        self.teardown_now(StatusCode::BAD_SHUTDOWN);
    }

    // ── accessors used by the connect orchestration ─────────────────────

    pub(crate) fn connect_fn(&self) -> &ConnectFn {
        &self.connect_fn
    }

    pub(crate) fn identity(&self) -> &Identity {
        &self.identity
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub(crate) fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub(crate) fn set_endpoint_url(&mut self, url: Option<String>) {
        self.endpoint_url = url;
    }

    pub(crate) fn transport_mut(&mut self) -> Option<&mut BoxedTransport> {
        self.transport.as_mut()
    }

    pub(crate) fn install_transport(&mut self, transport: BoxedTransport) {
        self.transport = Some(transport);
    }

    /// Number of requests dispatched but not yet completed.
    pub fn outstanding_requests(&self) -> usize {
        self.pending.len()
    }
}
