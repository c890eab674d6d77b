// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Service message traits. Every OPC UA service is a request/response
//! struct pair; the traits below pin the DefaultBinary encoding id of
//! each side and give the dispatcher generic access to the headers.

pub mod attribute;
pub mod channel;
pub mod discovery;
pub mod method;
pub mod node_management;
pub mod query;
pub mod session;
pub mod subscription;
pub mod view;

use std::io::Write;

use crate::types::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    header::{RequestHeader, ResponseHeader},
    node_id::NodeId,
    status::StatusCode,
};

/// DefaultBinary encoding id of `ServiceFault`.
pub const SERVICE_FAULT_TYPE_ID: u32 = 397;

/// A message with a fixed ns=0 DefaultBinary encoding id.
pub trait ServiceMessage:
    BinaryEncodable + BinaryDecodable + std::fmt::Debug + Send + 'static
{
    const TYPE_ID: u32;
    const TYPE_NAME: &'static str;

    fn type_id() -> NodeId {
        NodeId::numeric(0, Self::TYPE_ID)
    }

    /// Write the message the way it travels inside a chunk body: the
    /// encoding node id followed by the structure fields.
    fn encode_enveloped<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        Self::type_id().encode(stream)?;
        self.encode(stream)
    }

    fn enveloped_byte_len(&self) -> usize {
        Self::type_id().byte_len() + self.byte_len()
    }
}

impl ServiceMessage for crate::types::header::ServiceFault {
    const TYPE_ID: u32 = SERVICE_FAULT_TYPE_ID;
    const TYPE_NAME: &'static str = "ServiceFault";
}

/// Request side of a service pair.
pub trait ServiceRequest: ServiceMessage {
    type Response: ServiceResponse;

    fn request_header(&self) -> &RequestHeader;
    fn request_header_mut(&mut self) -> &mut RequestHeader;
}

/// Response side of a service pair.
pub trait ServiceResponse: ServiceMessage + Default {
    fn response_header(&self) -> &ResponseHeader;
    fn response_header_mut(&mut self) -> &mut ResponseHeader;

    /// Synthetic empty response carrying only a service result; delivered
    /// to continuations when the real response can never arrive.
    fn from_service_result(status: StatusCode) -> Self {
        let mut response = Self::default();
        response.response_header_mut().service_result = status;
        response
    }
}

/// Binds a request/response struct pair to their encoding ids and headers.
#[macro_export]
macro_rules! service_pair {
    ($request:ident = $request_id:expr, $response:ident = $response_id:expr) => {
        impl $crate::types::service::ServiceMessage for $request {
            const TYPE_ID: u32 = $request_id;
            const TYPE_NAME: &'static str = stringify!($request);
        }

        impl $crate::types::service::ServiceRequest for $request {
            type Response = $response;

            fn request_header(&self) -> &$crate::types::header::RequestHeader {
                &self.request_header
            }

            fn request_header_mut(&mut self) -> &mut $crate::types::header::RequestHeader {
                &mut self.request_header
            }
        }

        impl $crate::types::service::ServiceMessage for $response {
            const TYPE_ID: u32 = $response_id;
            const TYPE_NAME: &'static str = stringify!($response);
        }

        impl $crate::types::service::ServiceResponse for $response {
            fn response_header(&self) -> &$crate::types::header::ResponseHeader {
                &self.response_header
            }

            fn response_header_mut(
                &mut self,
            ) -> &mut $crate::types::header::ResponseHeader {
                &mut self.response_header
            }
        }
    };
}
