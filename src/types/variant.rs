// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Variant` and `DataValue`: the polymorphic value containers carried by
//! attribute reads, writes and data-change notifications.

use std::io::{Read, Write};

use crate::types::{
    basic::{
        ByteString, DateTime, ExtensionObject, Guid, LocalizedText, QualifiedName,
        UaString, XmlElement,
    },
    encoding::{
        BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult, UaError,
    },
    node_id::{ExpandedNodeId, NodeId},
    status::StatusCode,
};

/// Encoding-byte flag: the variant holds a one-dimensional array.
const ARRAY_BIT: u8 = 0x80;
/// Encoding-byte flag: array dimensions follow. Multi-dimensional arrays
/// are not produced by this client and are rejected on receive.
const DIMENSIONS_BIT: u8 = 0x40;

macro_rules! variants {
    ($($variant:ident($ty:ty) = $id:expr,)+) => {
        /// A scalar value tagged with its built-in type id.
        #[derive(Debug, Clone, PartialEq, Default)]
        pub enum Variant {
            /// The distinguished empty value (type id 0).
            #[default]
            Empty,
            $($variant($ty),)+
            /// A single-dimension array of same-typed scalars.
            Array(Vec<Variant>),
        }

        impl Variant {
            /// Built-in numeric type id per Part 6 §5.1.2 (0 when empty).
            pub fn type_id(&self) -> u8 {
                match self {
                    Variant::Empty => 0,
                    $(Variant::$variant(_) => $id,)+
                    Variant::Array(items) => {
                        items.first().map_or(0, Variant::type_id)
                    },
                }
            }

            fn scalar_byte_len(&self) -> usize {
                match self {
                    Variant::Empty => 0,
                    $(Variant::$variant(v) => v.byte_len(),)+
                    Variant::Array(_) => 0,
                }
            }

            fn encode_scalar<S: Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> EncodingResult<()> {
                match self {
                    Variant::Empty => Ok(()),
                    $(Variant::$variant(v) => v.encode(stream),)+
                    Variant::Array(_) => Err(UaError::encoding(
                        "nested arrays are not representable",
                    )),
                }
            }

            fn decode_scalar<S: Read + ?Sized>(
                stream: &mut S,
                limits: &DecodingLimits,
                type_id: u8,
            ) -> EncodingResult<Variant> {
                match type_id {
                    0 => Ok(Variant::Empty),
                    $($id => Ok(Variant::$variant(BinaryDecodable::decode(stream, limits)?)),)+
                    other => Err(UaError::decoding(format!(
                        "unsupported variant type id {other}"
                    ))),
                }
            }
        }

    };
}

macro_rules! variant_from {
    ($($variant:ident($ty:ty),)+) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$variant(v)
                }
            }
        )+
    };
}

// `XmlElement` is an alias of `UaString`, so it gets no own conversion;
// everything else converts directly.
variant_from! {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UaString),
    DateTime(DateTime),
    Guid(Guid),
    ByteString(ByteString),
    NodeId(NodeId),
    ExpandedNodeId(ExpandedNodeId),
    StatusCode(StatusCode),
    QualifiedName(QualifiedName),
    LocalizedText(LocalizedText),
    ExtensionObject(ExtensionObject),
}

variants! {
    Boolean(bool) = 1,
    SByte(i8) = 2,
    Byte(u8) = 3,
    Int16(i16) = 4,
    UInt16(u16) = 5,
    Int32(i32) = 6,
    UInt32(u32) = 7,
    Int64(i64) = 8,
    UInt64(u64) = 9,
    Float(f32) = 10,
    Double(f64) = 11,
    String(UaString) = 12,
    DateTime(DateTime) = 13,
    Guid(Guid) = 14,
    ByteString(ByteString) = 15,
    XmlElement(XmlElement) = 16,
    NodeId(NodeId) = 17,
    ExpandedNodeId(ExpandedNodeId) = 18,
    StatusCode(StatusCode) = 19,
    QualifiedName(QualifiedName) = 20,
    LocalizedText(LocalizedText) = 21,
    ExtensionObject(ExtensionObject) = 22,
}

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        match self {
            Variant::Empty => 1,
            Variant::Array(items) => {
                1 + 4 + items.iter().map(Variant::scalar_byte_len).sum::<usize>()
            },
            scalar => 1 + scalar.scalar_byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            Variant::Array(items) => {
                let type_id = self.type_id();
                if items.iter().any(|i| i.type_id() != type_id) {
                    return Err(UaError::encoding("mixed-type variant array"));
                }
                (type_id | ARRAY_BIT).encode(stream)?;
                let len = i32::try_from(items.len())
                    .map_err(|_| UaError::encoding("variant array too long"))?;
                len.encode(stream)?;
                for item in items {
                    item.encode_scalar(stream)?;
                }
                Ok(())
            },
            scalar => {
                scalar.type_id().encode(stream)?;
                scalar.encode_scalar(stream)
            },
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let encoding = u8::decode(stream, limits)?;
        if encoding & DIMENSIONS_BIT != 0 {
            return Err(UaError::decoding(
                "multi-dimensional variant arrays are not supported",
            ));
        }
        let type_id = encoding & 0x3F;
        if encoding & ARRAY_BIT == 0 {
            return Variant::decode_scalar(stream, limits, type_id);
        }
        let len = i32::decode(stream, limits)?;
        if len < 0 {
            return Ok(Variant::Array(Vec::new()));
        }
        let len = len as usize;
        if limits.max_array_length > 0 && len > limits.max_array_length {
            return Err(UaError::new(
                StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
                format!("variant array length {len}"),
            ));
        }
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(Variant::decode_scalar(stream, limits, type_id)?);
        }
        Ok(Variant::Array(items))
    }
}

const DV_VALUE: u8 = 0x01;
const DV_STATUS: u8 = 0x02;
const DV_SOURCE_TS: u8 = 0x04;
const DV_SERVER_TS: u8 = 0x08;
const DV_SOURCE_PICO: u8 = 0x10;
const DV_SERVER_PICO: u8 = 0x20;

/// A value with quality and timestamps, mask-prefixed on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<DateTime>,
    pub source_picoseconds: Option<u16>,
    pub server_timestamp: Option<DateTime>,
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    pub fn new(value: impl Into<Variant>) -> Self {
        DataValue {
            value: Some(value.into()),
            ..DataValue::default()
        }
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.value.as_ref().map_or(0, Variant::byte_len);
        size += self.status.map_or(0, |_| 4);
        size += self.source_timestamp.map_or(0, |_| 8);
        size += self.source_picoseconds.map_or(0, |_| 2);
        size += self.server_timestamp.map_or(0, |_| 8);
        size += self.server_picoseconds.map_or(0, |_| 2);
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= DV_VALUE;
        }
        if self.status.is_some() {
            mask |= DV_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= DV_SOURCE_TS;
        }
        if self.source_picoseconds.is_some() {
            mask |= DV_SOURCE_PICO;
        }
        if self.server_timestamp.is_some() {
            mask |= DV_SERVER_TS;
        }
        if self.server_picoseconds.is_some() {
            mask |= DV_SERVER_PICO;
        }
        mask.encode(stream)?;
        if let Some(v) = &self.value {
            v.encode(stream)?;
        }
        if let Some(v) = self.status {
            v.encode(stream)?;
        }
        if let Some(v) = self.source_timestamp {
            v.encode(stream)?;
        }
        if let Some(v) = self.source_picoseconds {
            v.encode(stream)?;
        }
        if let Some(v) = self.server_timestamp {
            v.encode(stream)?;
        }
        if let Some(v) = self.server_picoseconds {
            v.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let mask = u8::decode(stream, limits)?;
        let mut out = DataValue::default();
        if mask & DV_VALUE != 0 {
            out.value = Some(Variant::decode(stream, limits)?);
        }
        if mask & DV_STATUS != 0 {
            out.status = Some(StatusCode::decode(stream, limits)?);
        }
        if mask & DV_SOURCE_TS != 0 {
            out.source_timestamp = Some(DateTime::decode(stream, limits)?);
        }
        if mask & DV_SOURCE_PICO != 0 {
            out.source_picoseconds = Some(u16::decode(stream, limits)?);
        }
        if mask & DV_SERVER_TS != 0 {
            out.server_timestamp = Some(DateTime::decode(stream, limits)?);
        }
        if mask & DV_SERVER_PICO != 0 {
            out.server_picoseconds = Some(u16::decode(stream, limits)?);
        }
        Ok(out)
    }
}
