// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Built-in scalar types from Part 6 §5.1: strings, byte strings, GUIDs,
//! timestamps, localized text and the extension-object envelope.

use std::io::{Read, Write};

use chrono::{DateTime as ChronoDateTime, TimeZone, Utc};
use rand::RngExt;

use crate::types::{
    encoding::{
        BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult, UaError,
    },
    node_id::NodeId,
    status::StatusCode,
};

/// UTF-8 string with a distinguished null value (`length = −1` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UaString(pub Option<String>);

impl UaString {
    pub const fn null() -> Self {
        UaString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

impl From<&str> for UaString {
    fn from(s: &str) -> Self {
        UaString(Some(s.to_string()))
    }
}

impl From<String> for UaString {
    fn from(s: String) -> Self {
        UaString(Some(s))
    }
}

impl BinaryEncodable for UaString {
    fn byte_len(&self) -> usize {
        4 + self.0.as_ref().map_or(0, |s| s.len())
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.0 {
            None => (-1i32).encode(stream),
            Some(s) => {
                let len = i32::try_from(s.len())
                    .map_err(|_| UaError::encoding("string too long"))?;
                len.encode(stream)?;
                stream.write_all(s.as_bytes())?;
                Ok(())
            },
        }
    }
}

impl BinaryDecodable for UaString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let raw = read_sized(stream, limits, limits.max_string_length)?;
        match raw {
            None => Ok(UaString(None)),
            Some(bytes) => {
                let s = String::from_utf8(bytes)
                    .map_err(|e| UaError::decoding(format!("invalid UTF-8: {e}")))?;
                Ok(UaString(Some(s)))
            },
        }
    }
}

/// Opaque byte blob, same length-prefixed layout as `UaString`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteString(pub Option<Vec<u8>>);

impl ByteString {
    pub const fn null() -> Self {
        ByteString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(&[])
    }

    /// Cryptographically irrelevant random nonce of `len` bytes.
    pub fn nonce(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::rng().fill(bytes.as_mut_slice());
        ByteString(Some(bytes))
    }
}

impl From<&[u8]> for ByteString {
    fn from(b: &[u8]) -> Self {
        ByteString(Some(b.to_vec()))
    }
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.0.as_ref().map_or(0, Vec::len)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.0 {
            None => (-1i32).encode(stream),
            Some(b) => {
                let len = i32::try_from(b.len())
                    .map_err(|_| UaError::encoding("byte string too long"))?;
                len.encode(stream)?;
                stream.write_all(b)?;
                Ok(())
            },
        }
    }
}

impl BinaryDecodable for ByteString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(ByteString(read_sized(
            stream,
            limits,
            limits.max_string_length,
        )?))
    }
}

fn read_sized<S: Read + ?Sized>(
    stream: &mut S,
    limits: &DecodingLimits,
    max: usize,
) -> EncodingResult<Option<Vec<u8>>> {
    let len = i32::decode(stream, limits)?;
    if len < 0 {
        return Ok(None);
    }
    let len = len as usize;
    if max > 0 && len > max {
        return Err(UaError::new(
            StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
            format!("string length {len} exceeds limit {max}"),
        ));
    }
    let mut bytes = vec![0u8; len];
    stream.read_exact(&mut bytes)?;
    Ok(Some(bytes))
}

/// XML payloads travel as strings; this client never interprets them.
pub type XmlElement = UaString;

/// 16-byte GUID, mixed-endian per Part 6 (three little-endian groups plus
/// eight raw bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl BinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.data1.encode(stream)?;
        self.data2.encode(stream)?;
        self.data3.encode(stream)?;
        stream.write_all(&self.data4)?;
        Ok(())
    }
}

impl BinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let data1 = u32::decode(stream, limits)?;
        let data2 = u16::decode(stream, limits)?;
        let data3 = u16::decode(stream, limits)?;
        let mut data4 = [0u8; 8];
        stream.read_exact(&mut data4)?;
        Ok(Guid {
            data1,
            data2,
            data3,
            data4,
        })
    }
}

/// 100 ns ticks since 1601-01-01T00:00:00Z (Windows FILETIME epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DateTime(pub i64);

/// Offset between the OPC UA epoch and the Unix epoch, in seconds.
const EPOCH_DELTA_SECS: i64 = 11_644_473_600;

impl DateTime {
    pub fn now() -> Self {
        Self::from_chrono(&Utc::now())
    }

    pub fn from_chrono(dt: &ChronoDateTime<Utc>) -> Self {
        let ticks = (dt.timestamp() + EPOCH_DELTA_SECS) * 10_000_000
            + i64::from(dt.timestamp_subsec_nanos() / 100);
        DateTime(ticks)
    }

    pub fn to_chrono(self) -> ChronoDateTime<Utc> {
        let secs = self.0 / 10_000_000 - EPOCH_DELTA_SECS;
        let nanos = (self.0 % 10_000_000) as u32 * 100;
        Utc.timestamp_opt(secs, nanos)
            .single()
            .unwrap_or_default()
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.0.encode(stream)
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(DateTime(i64::decode(stream, limits)?))
    }
}

/// Name qualified by a namespace index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: UaString,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: &str) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self) -> usize {
        2 + self.name.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.namespace_index.encode(stream)?;
        self.name.encode(stream)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(QualifiedName {
            namespace_index: u16::decode(stream, limits)?,
            name: UaString::decode(stream, limits)?,
        })
    }
}

const LOCALIZED_TEXT_LOCALE: u8 = 0x01;
const LOCALIZED_TEXT_TEXT: u8 = 0x02;

/// Human-readable text with an optional locale, mask-prefixed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalizedText {
    pub locale: UaString,
    pub text: UaString,
}

impl LocalizedText {
    pub fn new(text: &str) -> Self {
        Self {
            locale: UaString::null(),
            text: text.into(),
        }
    }
}

impl BinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if !self.locale.is_null() {
            size += self.locale.byte_len();
        }
        if !self.text.is_null() {
            size += self.text.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let mut mask = 0u8;
        if !self.locale.is_null() {
            mask |= LOCALIZED_TEXT_LOCALE;
        }
        if !self.text.is_null() {
            mask |= LOCALIZED_TEXT_TEXT;
        }
        mask.encode(stream)?;
        if !self.locale.is_null() {
            self.locale.encode(stream)?;
        }
        if !self.text.is_null() {
            self.text.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for LocalizedText {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let mask = u8::decode(stream, limits)?;
        let locale = if mask & LOCALIZED_TEXT_LOCALE != 0 {
            UaString::decode(stream, limits)?
        } else {
            UaString::null()
        };
        let text = if mask & LOCALIZED_TEXT_TEXT != 0 {
            UaString::decode(stream, limits)?
        } else {
            UaString::null()
        };
        Ok(LocalizedText { locale, text })
    }
}

/// Body of an extension object. XML bodies are carried but never built by
/// this client.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtensionBody {
    #[default]
    None,
    Binary(ByteString),
    Xml(XmlElement),
}

/// A structure wrapped with its encoding node id, kept opaque unless the
/// caller resolves it through the type registry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionObject {
    pub type_id: NodeId,
    pub body: ExtensionBody,
}

impl ExtensionObject {
    pub fn null() -> Self {
        Self::default()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.body, ExtensionBody::None)
    }

    /// Wrap an already-encodable structure under its binary encoding id.
    pub fn from_message<T: BinaryEncodable>(
        type_id: NodeId,
        value: &T,
    ) -> EncodingResult<Self> {
        Ok(Self {
            type_id,
            body: ExtensionBody::Binary(ByteString(Some(value.encode_to_vec()?))),
        })
    }

    /// Decode the binary body as `T`; fails on XML or empty bodies.
    pub fn decode_body<T: BinaryDecodable>(
        &self,
        limits: &DecodingLimits,
    ) -> EncodingResult<T> {
        match &self.body {
            ExtensionBody::Binary(b) => {
                let mut slice = b.as_bytes();
                T::decode(&mut slice, limits)
            },
            _ => Err(UaError::decoding("extension object has no binary body")),
        }
    }
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self) -> usize {
        let body = match &self.body {
            ExtensionBody::None => 0,
            ExtensionBody::Binary(b) => b.byte_len(),
            ExtensionBody::Xml(x) => x.byte_len(),
        };
        self.type_id.byte_len() + 1 + body
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.type_id.encode(stream)?;
        match &self.body {
            ExtensionBody::None => 0u8.encode(stream),
            ExtensionBody::Binary(b) => {
                1u8.encode(stream)?;
                b.encode(stream)
            },
            ExtensionBody::Xml(x) => {
                2u8.encode(stream)?;
                x.encode(stream)
            },
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let type_id = NodeId::decode(stream, limits)?;
        let encoding = u8::decode(stream, limits)?;
        let body = match encoding {
            0 => ExtensionBody::None,
            1 => ExtensionBody::Binary(ByteString::decode(stream, limits)?),
            2 => ExtensionBody::Xml(XmlElement::decode(stream, limits)?),
            other => {
                return Err(UaError::decoding(format!(
                    "invalid extension object encoding {other}"
                )));
            },
        };
        Ok(ExtensionObject { type_id, body })
    }
}

const DIAG_SYMBOLIC_ID: u8 = 0x01;
const DIAG_NAMESPACE: u8 = 0x02;
const DIAG_LOCALIZED_TEXT: u8 = 0x04;
const DIAG_LOCALE: u8 = 0x08;
const DIAG_ADDITIONAL_INFO: u8 = 0x10;
const DIAG_INNER_STATUS: u8 = 0x20;
const DIAG_INNER_DIAGNOSTIC: u8 = 0x40;

/// Vendor diagnostics attached to response headers. Decoded faithfully,
/// produced empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub localized_text: Option<i32>,
    pub locale: Option<i32>,
    pub additional_info: Option<UaString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        size += self.symbolic_id.map_or(0, |_| 4);
        size += self.namespace_uri.map_or(0, |_| 4);
        size += self.localized_text.map_or(0, |_| 4);
        size += self.locale.map_or(0, |_| 4);
        size += self.additional_info.as_ref().map_or(0, UaString::byte_len);
        size += self.inner_status_code.map_or(0, |_| 4);
        size += self
            .inner_diagnostic_info
            .as_ref()
            .map_or(0, |d| d.byte_len());
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        let mut mask = 0u8;
        if self.symbolic_id.is_some() {
            mask |= DIAG_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= DIAG_NAMESPACE;
        }
        if self.localized_text.is_some() {
            mask |= DIAG_LOCALIZED_TEXT;
        }
        if self.locale.is_some() {
            mask |= DIAG_LOCALE;
        }
        if self.additional_info.is_some() {
            mask |= DIAG_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= DIAG_INNER_STATUS;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= DIAG_INNER_DIAGNOSTIC;
        }
        mask.encode(stream)?;
        if let Some(v) = self.symbolic_id {
            v.encode(stream)?;
        }
        if let Some(v) = self.namespace_uri {
            v.encode(stream)?;
        }
        if let Some(v) = self.localized_text {
            v.encode(stream)?;
        }
        if let Some(v) = self.locale {
            v.encode(stream)?;
        }
        if let Some(v) = &self.additional_info {
            v.encode(stream)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(stream)?;
        }
        if let Some(v) = &self.inner_diagnostic_info {
            v.encode(stream)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        let mask = u8::decode(stream, limits)?;
        let mut out = DiagnosticInfo::default();
        if mask & DIAG_SYMBOLIC_ID != 0 {
            out.symbolic_id = Some(i32::decode(stream, limits)?);
        }
        if mask & DIAG_NAMESPACE != 0 {
            out.namespace_uri = Some(i32::decode(stream, limits)?);
        }
        if mask & DIAG_LOCALIZED_TEXT != 0 {
            out.localized_text = Some(i32::decode(stream, limits)?);
        }
        if mask & DIAG_LOCALE != 0 {
            out.locale = Some(i32::decode(stream, limits)?);
        }
        if mask & DIAG_ADDITIONAL_INFO != 0 {
            out.additional_info = Some(UaString::decode(stream, limits)?);
        }
        if mask & DIAG_INNER_STATUS != 0 {
            out.inner_status_code = Some(StatusCode::decode(stream, limits)?);
        }
        if mask & DIAG_INNER_DIAGNOSTIC != 0 {
            out.inner_diagnostic_info =
                Some(Box::new(DiagnosticInfo::decode(stream, limits)?));
        }
        Ok(out)
    }
}
