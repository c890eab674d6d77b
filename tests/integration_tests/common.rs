// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory mock server: speaks just enough OPC UA binary to carry the
//! client through connect, services and the publish pump, with behavior
//! knobs for the failure scenarios.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use opcua_client_rs::{
    cfg::config::Config,
    client::client::UaClient,
    comms::{
        framing::{
            AcknowledgeMessage, AsymmetricSecurityHeader, ChunkSplitter, HelloMessage,
            MessageType, RawChunk, SequenceHeader, decode_transport_payload,
            encode_transport_message,
        },
        secure_channel::{SecureChannel, SecurityPolicy, SendLimits},
    },
    transport::{BoxedTransport, ConnectFn, RecvOutcome, Transport},
    types::{
        basic::{ByteString, DateTime, ExtensionObject},
        encoding::{BinaryDecodable, DecodingLimits, UaError},
        header::{ResponseHeader, ServiceFault},
        node_id::NodeId,
        service::{
            ServiceMessage,
            attribute::{ReadRequest, ReadResponse},
            channel::{
                MessageSecurityMode, OpenSecureChannelRequest, OpenSecureChannelResponse,
                ChannelSecurityToken, SecurityTokenRequestType,
            },
            discovery::GetEndpointsResponse,
            session::{
                ActivateSessionResponse, CloseSessionResponse, CreateSessionResponse,
                EndpointDescription, UserTokenPolicy, UserTokenType,
            },
            subscription::{
                CreateSubscriptionResponse, DataChangeNotification,
                MonitoredItemNotification, NotificationMessage, PublishRequest,
                PublishResponse,
            },
        },
        status::StatusCode,
        variant::{DataValue, Variant},
    },
};

pub const MOCK_URL: &str = "opc.tcp://mock:4840";
const MOCK_CHANNEL_ID: u32 = 7;
/// DefaultBinary id of DataChangeNotification.
const DATA_CHANGE_TYPE_ID: u32 = 811;

#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Revised secure-channel lifetime returned on OPN (ms); 0 keeps the
    /// requested value.
    pub lifetime_ms: u32,
    /// Never answer Read requests.
    pub silent_reads: bool,
    /// Hold read responses until two reads arrived, then answer in
    /// reverse order.
    pub reorder_reads: bool,
    /// Answer reads with a CreateSubscriptionResponse (type mismatch).
    pub wrong_read_response: bool,
    /// Fixed Int32 read result; by default the node's numeric id is
    /// echoed back.
    pub read_value: Option<i32>,
    /// Answer every publish immediately with a notification.
    pub respond_publish: bool,
}

pub struct MockServer {
    splitter: ChunkSplitter,
    channel: SecureChannel,
    token_id: u32,
    out: VecDeque<Bytes>,
    pub behavior: Behavior,

    pub renew_count: u32,
    pub publish_received: u32,
    pub read_received: u32,
    pub acked: Vec<(u32, u32)>,
    notification_seq: u32,
    held_reads: Vec<(u32, ReadResponse)>,
    pending_publishes: VecDeque<u32>,
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("renew_count", &self.renew_count)
            .field("publish_received", &self.publish_received)
            .field("read_received", &self.read_received)
            .finish()
    }
}

impl MockServer {
    pub fn new() -> Self {
        MockServer {
            splitter: ChunkSplitter::new(1024 * 1024),
            channel: SecureChannel::new(SecurityPolicy::None, SendLimits::default()),
            token_id: 0,
            out: VecDeque::new(),
            behavior: Behavior::default(),
            renew_count: 0,
            publish_received: 0,
            read_received: 0,
            acked: Vec::new(),
            notification_seq: 0,
            held_reads: Vec::new(),
            pending_publishes: VecDeque::new(),
        }
    }

    pub fn reset_connection(&mut self) {
        self.splitter = ChunkSplitter::new(1024 * 1024);
        self.channel = SecureChannel::new(SecurityPolicy::None, SendLimits::default());
        self.held_reads.clear();
        self.pending_publishes.clear();
    }

    pub fn pending_publish_count(&self) -> usize {
        self.pending_publishes.len()
    }

    /// Answer one held publish with a ServiceFault carrying `status`.
    pub fn fault_pending_publish(&mut self, status: StatusCode) {
        let Some(request_id) = self.pending_publishes.pop_front() else {
            panic!("no pending publish to fault");
        };
        let fault = ServiceFault {
            response_header: ResponseHeader {
                request_handle: request_id,
                service_result: status,
                timestamp: DateTime::now(),
                ..ResponseHeader::default()
            },
        };
        self.respond(MessageType::Message, request_id, &fault)
            .expect("fault framing");
    }

    /// Answer one held publish with a data-change notification.
    pub fn answer_pending_publish(&mut self) {
        let Some(request_id) = self.pending_publishes.pop_front() else {
            panic!("no pending publish to answer");
        };
        let response = self.notification_response(request_id);
        self.respond(MessageType::Message, request_id, &response)
            .expect("publish framing");
    }

    fn notification_response(&mut self, request_id: u32) -> PublishResponse {
        self.notification_seq += 1;
        let notification = MonitoredItemNotification {
            client_handle: 1,
            value: DataValue::new(Variant::Int32(self.notification_seq as i32)),
        };
        let body = DataChangeNotification {
            monitored_items: Some(vec![notification]),
            ..DataChangeNotification::default()
        };
        let entry = ExtensionObject::from_message(
            NodeId::numeric(0, DATA_CHANGE_TYPE_ID),
            &body,
        )
        .expect("notification encode");
        PublishResponse {
            response_header: good_header(request_id),
            subscription_id: 1,
            available_sequence_numbers: Some(vec![self.notification_seq]),
            more_notifications: false,
            notification_message: NotificationMessage {
                sequence_number: self.notification_seq,
                publish_time: DateTime::now(),
                notification_data: Some(vec![entry]),
            },
            ..PublishResponse::default()
        }
    }

    pub fn ingest(&mut self, data: &[u8]) -> Result<(), UaError> {
        let chunks = self.splitter.feed(data)?;
        for chunk in chunks {
            self.handle_chunk(chunk)?;
        }
        Ok(())
    }

    pub fn pop_outgoing(&mut self) -> Option<Bytes> {
        self.out.pop_front()
    }

    fn handle_chunk(&mut self, chunk: RawChunk) -> Result<(), UaError> {
        let limits = DecodingLimits::default();
        match chunk.message_type {
            MessageType::Hello => {
                let hello: HelloMessage = decode_transport_payload(&chunk.body, &limits)?;
                let ack = AcknowledgeMessage {
                    protocol_version: hello.protocol_version,
                    receive_buffer_size: hello.receive_buffer_size,
                    send_buffer_size: hello.send_buffer_size,
                    max_message_size: hello.max_message_size,
                    max_chunk_count: hello.max_chunk_count,
                };
                let frame = encode_transport_message(MessageType::Acknowledge, &ack)?;
                self.out.push_back(frame);
                Ok(())
            },
            MessageType::Acknowledge | MessageType::Error => Ok(()),
            MessageType::OpenSecureChannel
            | MessageType::CloseSecureChannel
            | MessageType::Message => {
                let (request_id, type_num, rest) = parse_channel_chunk(chunk, &limits)?;
                self.handle_request(request_id, type_num, rest)
            },
        }
    }

    fn respond<T: ServiceMessage>(
        &mut self,
        message_type: MessageType,
        request_id: u32,
        message: &T,
    ) -> Result<(), UaError> {
        let mut body = Vec::with_capacity(message.enveloped_byte_len());
        message.encode_enveloped(&mut body)?;
        let chunks = self.channel.encode_message(message_type, request_id, &body)?;
        self.out.extend(chunks);
        Ok(())
    }

    fn handle_request(
        &mut self,
        request_id: u32,
        type_num: u32,
        rest: Bytes,
    ) -> Result<(), UaError> {
        let limits = DecodingLimits::default();
        match type_num {
            // OpenSecureChannelRequest
            446 => {
                let mut slice = rest.as_ref();
                let request = OpenSecureChannelRequest::decode(&mut slice, &limits)?;
                if request.request_type == SecurityTokenRequestType::Renew {
                    self.renew_count += 1;
                }
                self.token_id += 1;
                self.channel.install_token(MOCK_CHANNEL_ID, self.token_id);
                let lifetime = if self.behavior.lifetime_ms > 0 {
                    self.behavior.lifetime_ms
                } else {
                    request.requested_lifetime
                };
                let response = OpenSecureChannelResponse {
                    response_header: good_header(request_id),
                    server_protocol_version: 0,
                    security_token: ChannelSecurityToken {
                        channel_id: MOCK_CHANNEL_ID,
                        token_id: self.token_id,
                        created_at: DateTime::now(),
                        revised_lifetime: lifetime,
                    },
                    server_nonce: ByteString::nonce(32),
                };
                self.respond(MessageType::OpenSecureChannel, request_id, &response)
            },
            // GetEndpointsRequest
            428 => {
                let response = GetEndpointsResponse {
                    response_header: good_header(request_id),
                    endpoints: Some(vec![mock_endpoint()]),
                };
                self.respond(MessageType::Message, request_id, &response)
            },
            461 => {
                let response = CreateSessionResponse {
                    response_header: good_header(request_id),
                    session_id: NodeId::numeric(1, 100),
                    authentication_token: NodeId::numeric(1, 101),
                    revised_session_timeout: 60_000.0,
                    server_nonce: ByteString::nonce(32),
                    ..CreateSessionResponse::default()
                };
                self.respond(MessageType::Message, request_id, &response)
            },
            467 => {
                let response = ActivateSessionResponse {
                    response_header: good_header(request_id),
                    server_nonce: ByteString::nonce(32),
                    ..ActivateSessionResponse::default()
                };
                self.respond(MessageType::Message, request_id, &response)
            },
            473 => {
                let response = CloseSessionResponse {
                    response_header: good_header(request_id),
                };
                self.respond(MessageType::Message, request_id, &response)
            },
            // CLO never gets an answer.
            452 => Ok(()),
            // ReadRequest
            631 => {
                self.read_received += 1;
                let mut slice = rest.as_ref();
                let request = ReadRequest::decode(&mut slice, &limits)?;
                self.handle_read(request_id, request)
            },
            787 => {
                let response = CreateSubscriptionResponse {
                    response_header: good_header(request_id),
                    subscription_id: 1,
                    revised_publishing_interval: 100.0,
                    revised_lifetime_count: 60,
                    revised_max_keep_alive_count: 20,
                };
                self.respond(MessageType::Message, request_id, &response)
            },
            // PublishRequest
            826 => {
                self.publish_received += 1;
                let mut slice = rest.as_ref();
                let request = PublishRequest::decode(&mut slice, &limits)?;
                for ack in request.subscription_acknowledgements.unwrap_or_default() {
                    self.acked.push((ack.subscription_id, ack.sequence_number));
                }
                if self.behavior.respond_publish {
                    let response = self.notification_response(request_id);
                    self.respond(MessageType::Message, request_id, &response)
                } else {
                    self.pending_publishes.push_back(request_id);
                    Ok(())
                }
            },
            _ => {
                let fault = ServiceFault {
                    response_header: ResponseHeader {
                        request_handle: request_id,
                        service_result: StatusCode::BAD_SERVICE_UNSUPPORTED,
                        timestamp: DateTime::now(),
                        ..ResponseHeader::default()
                    },
                };
                self.respond(MessageType::Message, request_id, &fault)
            },
        }
    }

    fn handle_read(&mut self, request_id: u32, request: ReadRequest) -> Result<(), UaError> {
        if self.behavior.silent_reads {
            return Ok(());
        }
        if self.behavior.wrong_read_response {
            let response = CreateSubscriptionResponse {
                response_header: good_header(request_id),
                subscription_id: 99,
                ..CreateSubscriptionResponse::default()
            };
            return self.respond(MessageType::Message, request_id, &response);
        }

        let results: Vec<DataValue> = request
            .nodes_to_read
            .unwrap_or_default()
            .iter()
            .map(|node| {
                let value = self.behavior.read_value.unwrap_or_else(|| {
                    node.node_id.as_ns0_numeric().unwrap_or(0) as i32
                });
                DataValue::new(Variant::Int32(value))
            })
            .collect();
        let response = ReadResponse {
            response_header: good_header(request_id),
            results: Some(results),
            ..ReadResponse::default()
        };

        if self.behavior.reorder_reads {
            self.held_reads.push((request_id, response));
            if self.held_reads.len() == 2 {
                let (first_id, first) = self.held_reads.remove(0);
                let (second_id, second) = self.held_reads.remove(0);
                self.respond(MessageType::Message, second_id, &second)?;
                self.respond(MessageType::Message, first_id, &first)?;
            }
            return Ok(());
        }
        self.respond(MessageType::Message, request_id, &response)
    }
}

fn good_header(request_id: u32) -> ResponseHeader {
    ResponseHeader {
        timestamp: DateTime::now(),
        request_handle: request_id,
        service_result: StatusCode::GOOD,
        ..ResponseHeader::default()
    }
}

fn mock_endpoint() -> EndpointDescription {
    EndpointDescription {
        endpoint_url: MOCK_URL.into(),
        security_mode: MessageSecurityMode::None,
        security_policy_uri: SecurityPolicy::None.uri().into(),
        user_identity_tokens: Some(vec![
            UserTokenPolicy {
                policy_id: "anonymous".into(),
                token_type: UserTokenType::Anonymous,
                ..UserTokenPolicy::default()
            },
            UserTokenPolicy {
                policy_id: "username".into(),
                token_type: UserTokenType::UserName,
                ..UserTokenPolicy::default()
            },
        ]),
        ..EndpointDescription::default()
    }
}

/// Split one channel-bound chunk into request id, message type id and the
/// remaining body.
fn parse_channel_chunk(
    chunk: RawChunk,
    limits: &DecodingLimits,
) -> Result<(u32, u32, Bytes), UaError> {
    let mut body = chunk.body;
    let _channel_id = body.get_u32_le();
    let mut slice = body.as_ref();
    if chunk.message_type == MessageType::OpenSecureChannel {
        let _ = AsymmetricSecurityHeader::decode(&mut slice, limits)?;
    } else {
        let _token_id = u32::decode(&mut slice, limits)?;
    }
    let sequence = SequenceHeader::decode(&mut slice, limits)?;
    let type_id = NodeId::decode(&mut slice, limits)?;
    let consumed = body.len() - slice.len();
    body.advance(consumed);
    let type_num = type_id.as_ns0_numeric().unwrap_or(0);
    Ok((sequence.request_id, type_num, body))
}

#[derive(Debug)]
pub struct MockTransport {
    server: Arc<Mutex<MockServer>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: Bytes) -> Result<(), UaError> {
        self.server.lock().expect("server lock").ingest(&data)
    }

    async fn recv(&mut self, wait: Duration) -> Result<RecvOutcome, UaError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(frame) = self.server.lock().expect("server lock").pop_outgoing() {
                return Ok(RecvOutcome::Data(frame));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(RecvOutcome::Timeout);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    async fn close(&mut self) {}
}

/// Transport factory plus a handle to script the server from the test.
pub fn mock_connect_fn() -> (ConnectFn, Arc<Mutex<MockServer>>) {
    let server = Arc::new(Mutex::new(MockServer::new()));
    let handle = server.clone();
    let connect_fn: ConnectFn = Box::new(move |_url, _params| {
        let server = server.clone();
        Box::pin(async move {
            server.lock().expect("server lock").reset_connection();
            Ok(Box::new(MockTransport { server }) as BoxedTransport)
        })
    });
    (connect_fn, handle)
}

pub fn mock_client(tune: impl FnOnce(&mut Config)) -> (UaClient, Arc<Mutex<MockServer>>) {
    let mut config = Config::default();
    config.client.timeout = Duration::from_millis(1_000);
    tune(&mut config);
    let mut client = UaClient::new(config);
    let (connect_fn, server) = mock_connect_fn();
    client.set_connect_fn(connect_fn);
    (client, server)
}

pub async fn connected_client(
    tune: impl FnOnce(&mut Config),
) -> (UaClient, Arc<Mutex<MockServer>>) {
    let (mut client, server) = mock_client(tune);
    client.connect(MOCK_URL).await.expect("connect");
    (client, server)
}
