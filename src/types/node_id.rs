// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Node identifiers and their five binary encodings (Part 6 §5.2.2.9).

use core::fmt;
use std::io::{Read, Write};

use crate::types::{
    basic::{ByteString, Guid, UaString},
    encoding::{
        BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult, UaError,
    },
};

const TWO_BYTE: u8 = 0x00;
const FOUR_BYTE: u8 = 0x01;
const NUMERIC: u8 = 0x02;
const STRING: u8 = 0x03;
const GUID: u8 = 0x04;
const BYTE_STRING: u8 = 0x05;

/// Bit set on the encoding byte of an `ExpandedNodeId` carrying a
/// namespace URI.
const HAS_NAMESPACE_URI: u8 = 0x80;
/// Bit set when an `ExpandedNodeId` carries a server index.
const HAS_SERVER_INDEX: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u32),
    String(UaString),
    Guid(Guid),
    ByteString(ByteString),
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::Numeric(0)
    }
}

/// Identifier of a node in a server address space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub const fn numeric(namespace: u16, value: u32) -> Self {
        NodeId {
            namespace,
            identifier: Identifier::Numeric(value),
        }
    }

    pub fn string(namespace: u16, value: &str) -> Self {
        NodeId {
            namespace,
            identifier: Identifier::String(value.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Numeric value when this is an `ns=0` numeric id; used to match
    /// message type ids.
    pub fn as_ns0_numeric(&self) -> Option<u32> {
        match (&self.identifier, self.namespace) {
            (Identifier::Numeric(v), 0) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Identifier::Numeric(v) => write!(f, "ns={};i={v}", self.namespace),
            Identifier::String(s) => write!(f, "ns={};s={}", self.namespace, s.as_str()),
            Identifier::Guid(g) => write!(
                f,
                "ns={};g={:08x}-{:04x}-{:04x}",
                self.namespace, g.data1, g.data2, g.data3
            ),
            Identifier::ByteString(b) => {
                write!(f, "ns={};b={}", self.namespace, hex::encode(b.as_bytes()))
            },
        }
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        match &self.identifier {
            Identifier::Numeric(v) if self.namespace == 0 && *v <= 0xFF => 2,
            Identifier::Numeric(v) if self.namespace <= 0xFF && *v <= 0xFFFF => 4,
            Identifier::Numeric(_) => 7,
            Identifier::String(s) => 3 + s.byte_len(),
            Identifier::Guid(_) => 3 + 16,
            Identifier::ByteString(b) => 3 + b.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.identifier {
            Identifier::Numeric(v) if self.namespace == 0 && *v <= 0xFF => {
                TWO_BYTE.encode(stream)?;
                (*v as u8).encode(stream)
            },
            Identifier::Numeric(v) if self.namespace <= 0xFF && *v <= 0xFFFF => {
                FOUR_BYTE.encode(stream)?;
                (self.namespace as u8).encode(stream)?;
                (*v as u16).encode(stream)
            },
            Identifier::Numeric(v) => {
                NUMERIC.encode(stream)?;
                self.namespace.encode(stream)?;
                v.encode(stream)
            },
            Identifier::String(s) => {
                STRING.encode(stream)?;
                self.namespace.encode(stream)?;
                s.encode(stream)
            },
            Identifier::Guid(g) => {
                GUID.encode(stream)?;
                self.namespace.encode(stream)?;
                g.encode(stream)
            },
            Identifier::ByteString(b) => {
                BYTE_STRING.encode(stream)?;
                self.namespace.encode(stream)?;
                b.encode(stream)
            },
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        // The URI/server-index bits belong to ExpandedNodeId and are
        // handled there; mask them off for the format dispatch.
        let encoding = u8::decode(stream, limits)? & 0x3F;
        decode_body(stream, limits, encoding)
    }
}

fn decode_body<S: Read + ?Sized>(
    stream: &mut S,
    limits: &DecodingLimits,
    encoding: u8,
) -> EncodingResult<NodeId> {
    match encoding {
        TWO_BYTE => Ok(NodeId::numeric(0, u32::from(u8::decode(stream, limits)?))),
        FOUR_BYTE => {
            let namespace = u16::from(u8::decode(stream, limits)?);
            let value = u32::from(u16::decode(stream, limits)?);
            Ok(NodeId::numeric(namespace, value))
        },
        NUMERIC => {
            let namespace = u16::decode(stream, limits)?;
            let value = u32::decode(stream, limits)?;
            Ok(NodeId::numeric(namespace, value))
        },
        STRING => {
            let namespace = u16::decode(stream, limits)?;
            let s = UaString::decode(stream, limits)?;
            Ok(NodeId {
                namespace,
                identifier: Identifier::String(s),
            })
        },
        GUID => {
            let namespace = u16::decode(stream, limits)?;
            let g = Guid::decode(stream, limits)?;
            Ok(NodeId {
                namespace,
                identifier: Identifier::Guid(g),
            })
        },
        BYTE_STRING => {
            let namespace = u16::decode(stream, limits)?;
            let b = ByteString::decode(stream, limits)?;
            Ok(NodeId {
                namespace,
                identifier: Identifier::ByteString(b),
            })
        },
        other => Err(UaError::decoding(format!(
            "invalid node id encoding 0x{other:02x}"
        ))),
    }
}

/// Node id extended with an optional namespace URI and server index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: UaString,
    pub server_index: u32,
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: UaString::null(),
            server_index: 0,
        }
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len();
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            size += 4;
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // Re-encode the inner node id with the extension bits folded into
        // its first byte.
        let mut inner = self.node_id.encode_to_vec()?;
        if !self.namespace_uri.is_null() {
            inner[0] |= HAS_NAMESPACE_URI;
        }
        if self.server_index != 0 {
            inner[0] |= HAS_SERVER_INDEX;
        }
        stream.write_all(&inner)?;
        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(stream)?;
        }
        if self.server_index != 0 {
            self.server_index.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let encoding = u8::decode(stream, limits)?;
        let node_id = decode_body(stream, limits, encoding & 0x3F)?;
        let namespace_uri = if encoding & HAS_NAMESPACE_URI != 0 {
            UaString::decode(stream, limits)?
        } else {
            UaString::null()
        };
        let server_index = if encoding & HAS_SERVER_INDEX != 0 {
            u32::decode(stream, limits)?
        } else {
            0
        };
        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}
