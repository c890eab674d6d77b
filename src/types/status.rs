// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! OPC UA status codes (Part 6 / Part 4 numeric values).
//!
//! Only the codes this client produces or inspects are listed by name;
//! anything else coming off the wire is preserved verbatim inside the
//! opaque `u32` and printed in hex.

use core::fmt;

use serde::{Deserialize, Serialize};

macro_rules! status_codes {
    ($($name:ident = $value:expr, $doc:expr;)+) => {
        impl StatusCode {
            $(
                #[doc = $doc]
                pub const $name: StatusCode = StatusCode($value);
            )+

            /// Symbolic name for a known code, `None` for an unlisted one.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

/// A 32-bit OPC UA status code. The top two bits carry the severity
/// (00 good, 01 uncertain, 10 bad).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

status_codes! {
    GOOD = 0x0000_0000, "The operation succeeded.";
    BAD_UNEXPECTED_ERROR = 0x8001_0000, "An unexpected error occurred.";
    BAD_INTERNAL_ERROR = 0x8002_0000, "An internal error occurred.";
    BAD_OUT_OF_MEMORY = 0x8003_0000, "Not enough memory.";
    BAD_COMMUNICATION_ERROR = 0x8005_0000, "A low level communication error occurred.";
    BAD_ENCODING_ERROR = 0x8006_0000, "Encoding halted because of an invalid value.";
    BAD_DECODING_ERROR = 0x8007_0000, "Decoding halted because of invalid data.";
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000, "A message exceeded the decoder limits.";
    BAD_UNKNOWN_RESPONSE = 0x8009_0000, "An unrecognized response was received.";
    BAD_TIMEOUT = 0x800A_0000, "The operation timed out.";
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000, "The server does not support the service.";
    BAD_SHUTDOWN = 0x800C_0000, "The operation was cancelled because the client is shutting down.";
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000, "No connection to the server is established.";
    BAD_NOTHING_TO_DO = 0x800F_0000, "The request contained no work to do.";
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000, "The request contained too many operations.";
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000, "A security check failed (sequence or token).";
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000, "The user identity token is not valid.";
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000, "The user identity token was rejected.";
    BAD_SECURE_CHANNEL_ID_INVALID = 0x8022_0000, "The secure channel id is unknown.";
    BAD_NONCE_INVALID = 0x8024_0000, "The nonce is invalid.";
    BAD_SESSION_ID_INVALID = 0x8025_0000, "The session id is not valid.";
    BAD_SESSION_CLOSED = 0x8026_0000, "The session was closed by the client.";
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000, "The session cannot be used because activation failed.";
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000, "The subscription id is not valid.";
    BAD_NODE_ID_UNKNOWN = 0x8034_0000, "The node id refers to an unknown node.";
    BAD_TOO_MANY_PUBLISH_REQUESTS = 0x8077_0000, "The server has reached its publish request limit.";
    BAD_NO_SUBSCRIPTION = 0x8079_0000, "There is no subscription available for this session.";
    BAD_TCP_MESSAGE_TYPE_INVALID = 0x807E_0000, "The message type is not valid.";
    BAD_TCP_SECURE_CHANNEL_UNKNOWN = 0x807F_0000, "The secure channel id is unknown on the transport.";
    BAD_TCP_MESSAGE_TOO_LARGE = 0x8080_0000, "The message size exceeds the negotiated limits.";
    BAD_TCP_INTERNAL_ERROR = 0x8082_0000, "An internal transport error occurred.";
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000, "The endpoint url is not valid.";
    BAD_REQUEST_TIMEOUT = 0x8085_0000, "The request could not be sent before the timeout expired.";
    BAD_SECURE_CHANNEL_CLOSED = 0x8086_0000, "The secure channel has been closed.";
    BAD_SECURE_CHANNEL_TOKEN_UNKNOWN = 0x8087_0000, "The token has expired or is not recognized.";
    BAD_SEQUENCE_NUMBER_INVALID = 0x8088_0000, "The sequence number is not valid.";
    BAD_INVALID_ARGUMENT = 0x80AB_0000, "One or more arguments are invalid.";
    BAD_CONNECTION_REJECTED = 0x80AC_0000, "The server rejected the connection.";
    BAD_DISCONNECT = 0x80AD_0000, "The server has disconnected from the client.";
    BAD_CONNECTION_CLOSED = 0x80AE_0000, "The network connection has been closed.";
    BAD_INVALID_STATE = 0x80AF_0000, "The operation is not legal in the current client state.";
    BAD_END_OF_STREAM = 0x80B0_0000, "Cannot move beyond the end of the stream.";
    BAD_REQUEST_TOO_LARGE = 0x80B8_0000, "The request message exceeds the server limits.";
    BAD_RESPONSE_TOO_LARGE = 0x80B9_0000, "The response message exceeds the client limits.";
    // Not assigned by Part 6; local code kept out of the reserved ranges.
    BAD_RESPONSE_TYPE_MISMATCH = 0x80FE_0000, "The decoded response type does not match the request.";
}

impl StatusCode {
    /// Severity test: the top two bits are zero for good codes.
    #[inline]
    pub fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    #[inline]
    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Status with the info bits (lower 16) stripped, for table lookups.
    #[inline]
    pub fn base(self) -> StatusCode {
        StatusCode(self.0 & 0xFFFF_0000)
    }
}

impl From<u32> for StatusCode {
    fn from(v: u32) -> Self {
        StatusCode(v)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base().name() {
            Some(name) => f.write_str(name),
            None => write!(f, "StatusCode(0x{:08X})", self.0),
        }
    }
}
