// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Binary codec backbone: the encode/decode traits every wire type
//! implements, primitive little-endian helpers, and the decoder limits
//! negotiated during the Hello/Acknowledge handshake.

use std::io::{Read, Write};

use thiserror::Error;

use crate::types::status::StatusCode;

/// Library error: an OPC UA status code plus a human-readable context line.
#[derive(Debug, Error)]
#[error("{status}: {context}")]
pub struct UaError {
    status: StatusCode,
    context: String,
}

impl UaError {
    pub fn new(status: StatusCode, context: impl Into<String>) -> Self {
        Self {
            status,
            context: context.into(),
        }
    }

    pub fn decoding(context: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_DECODING_ERROR, context)
    }

    pub fn encoding(context: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_ENCODING_ERROR, context)
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StatusCode> for UaError {
    fn from(status: StatusCode) -> Self {
        Self {
            status,
            context: String::new(),
        }
    }
}

impl From<std::io::Error> for UaError {
    fn from(e: std::io::Error) -> Self {
        let status = match e.kind() {
            std::io::ErrorKind::TimedOut => StatusCode::BAD_TIMEOUT,
            std::io::ErrorKind::UnexpectedEof => StatusCode::BAD_END_OF_STREAM,
            _ => StatusCode::BAD_CONNECTION_CLOSED,
        };
        Self::new(status, e.to_string())
    }
}

pub type EncodingResult<T> = Result<T, UaError>;

/// Limits applied while decoding, taken from the transport negotiation.
/// Zero means "no limit" for that dimension.
#[derive(Debug, Clone)]
pub struct DecodingLimits {
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub max_string_length: usize,
    pub max_array_length: usize,
}

impl Default for DecodingLimits {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
            max_chunk_count: 0,
            max_string_length: 1024 * 1024,
            max_array_length: 65_536,
        }
    }
}

/// Serialize a value into the OPC UA binary form (Part 6, little-endian).
pub trait BinaryEncodable {
    /// Exact number of bytes `encode` will write.
    fn byte_len(&self) -> usize;

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()>;

    /// Encode into a fresh buffer sized via `byte_len`.
    fn encode_to_vec(&self) -> EncodingResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.byte_len());
        self.encode(&mut out)?;
        Ok(out)
    }
}

/// Deserialize a value from the OPC UA binary form.
pub trait BinaryDecodable: Sized {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self>;
}

macro_rules! primitive_codec {
    ($($ty:ty),+) => {
        $(
            impl BinaryEncodable for $ty {
                #[inline]
                fn byte_len(&self) -> usize {
                    size_of::<$ty>()
                }

                fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
                    stream.write_all(&self.to_le_bytes())?;
                    Ok(())
                }
            }

            impl BinaryDecodable for $ty {
                fn decode<S: Read + ?Sized>(
                    stream: &mut S,
                    _: &DecodingLimits,
                ) -> EncodingResult<Self> {
                    let mut buf = [0u8; size_of::<$ty>()];
                    stream.read_exact(&mut buf)?;
                    Ok(<$ty>::from_le_bytes(buf))
                }
            }
        )+
    };
}

primitive_codec!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl BinaryEncodable for bool {
    #[inline]
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        stream.write_all(&[u8::from(*self)])?;
        Ok(())
    }
}

impl BinaryDecodable for bool {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(u8::decode(stream, limits)? != 0)
    }
}

impl BinaryEncodable for StatusCode {
    #[inline]
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.0.encode(stream)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(StatusCode(u32::decode(stream, limits)?))
    }
}

/// Arrays encode as an `i32` length (−1 = null array) followed by the
/// elements back to back.
impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn byte_len(&self) -> usize {
        match self {
            None => 4,
            Some(items) => 4 + items.iter().map(BinaryEncodable::byte_len).sum::<usize>(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match self {
            None => (-1i32).encode(stream),
            Some(items) => {
                let len = i32::try_from(items.len()).map_err(|_| {
                    UaError::encoding(format!("array of {} items too long", items.len()))
                })?;
                len.encode(stream)?;
                for item in items {
                    item.encode(stream)?;
                }
                Ok(())
            },
        }
    }
}

impl<T: BinaryDecodable> BinaryDecodable for Option<Vec<T>> {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let len = i32::decode(stream, limits)?;
        if len < 0 {
            return Ok(None);
        }
        let len = len as usize;
        if limits.max_array_length > 0 && len > limits.max_array_length {
            return Err(UaError::new(
                StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
                format!("array length {len} exceeds limit {}", limits.max_array_length),
            ));
        }
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(T::decode(stream, limits)?);
        }
        Ok(Some(items))
    }
}

/// Declares a plain OPC UA structure: the struct itself plus
/// field-by-field `BinaryEncodable`/`BinaryDecodable` impls in wire order.
#[macro_export]
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident: $ftype:ty,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ftype,
            )*
        }

        impl $crate::types::encoding::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                let mut size = 0usize;
                $(size += $crate::types::encoding::BinaryEncodable::byte_len(&self.$field);)*
                size
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::types::encoding::EncodingResult<()> {
                $($crate::types::encoding::BinaryEncodable::encode(&self.$field, stream)?;)*
                Ok(())
            }
        }

        impl $crate::types::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                limits: &$crate::types::encoding::DecodingLimits,
            ) -> $crate::types::encoding::EncodingResult<Self> {
                Ok(Self {
                    $($field: $crate::types::encoding::BinaryDecodable::decode(stream, limits)?,)*
                })
            }
        }
    };
}

/// Declares an `i32`-valued OPC UA enumeration.
#[macro_export]
macro_rules! ua_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[repr(i32)]
        pub enum $name {
            #[default]
            $($variant = $value,)+
        }

        impl $crate::types::encoding::BinaryEncodable for $name {
            #[inline]
            fn byte_len(&self) -> usize {
                4
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> $crate::types::encoding::EncodingResult<()> {
                $crate::types::encoding::BinaryEncodable::encode(&(*self as i32), stream)
            }
        }

        impl $crate::types::encoding::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                limits: &$crate::types::encoding::DecodingLimits,
            ) -> $crate::types::encoding::EncodingResult<Self> {
                let raw =
                    <i32 as $crate::types::encoding::BinaryDecodable>::decode(stream, limits)?;
                match raw {
                    $($value => Ok(Self::$variant),)+
                    other => Err($crate::types::encoding::UaError::decoding(format!(
                        "invalid {} value {other}",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}
