// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use hex_literal::hex;
use opcua_client_rs::types::{
    basic::{ByteString, DateTime, ExtensionObject, LocalizedText, QualifiedName, UaString},
    encoding::{BinaryDecodable, BinaryEncodable, DecodingLimits},
    header::RequestHeader,
    node_id::{Identifier, NodeId},
    registry::TypeRegistry,
    service::{
        ServiceMessage,
        attribute::{ReadRequest, ReadValueId, TimestampsToReturn},
        session::UserNameIdentityToken,
        subscription::{CreateSubscriptionRequest, PublishResponse},
    },
    status::StatusCode,
    variant::{DataValue, Variant},
};

fn round_trip<T>(value: &T) -> Result<T>
where
    T: BinaryEncodable + BinaryDecodable,
{
    let encoded = value.encode_to_vec()?;
    assert_eq!(encoded.len(), value.byte_len(), "byte_len disagrees with encode");
    let mut slice = encoded.as_slice();
    let decoded = T::decode(&mut slice, &DecodingLimits::default())?;
    assert!(slice.is_empty(), "decode left {} trailing bytes", slice.len());
    Ok(decoded)
}

#[test]
fn node_id_two_byte_form() -> Result<()> {
    let id = NodeId::numeric(0, 255);
    let encoded = id.encode_to_vec()?;
    assert_eq!(encoded, hex!("00ff"));
    assert_eq!(round_trip(&id)?, id);
    Ok(())
}

#[test]
fn node_id_four_byte_form() -> Result<()> {
    let id = NodeId::numeric(3, 2258);
    let encoded = id.encode_to_vec()?;
    assert_eq!(encoded[0], 0x01);
    assert_eq!(encoded.len(), 4);
    assert_eq!(round_trip(&id)?, id);
    Ok(())
}

#[test]
fn node_id_numeric_and_string_forms() -> Result<()> {
    let numeric = NodeId::numeric(300, 0x0001_0000);
    assert_eq!(numeric.encode_to_vec()?.len(), 7);
    assert_eq!(round_trip(&numeric)?, numeric);

    let string = NodeId::string(2, "Demo.Static.Scalar.Int32");
    let decoded = round_trip(&string)?;
    assert_eq!(decoded, string);
    match decoded.identifier {
        Identifier::String(s) => assert_eq!(s.as_str(), "Demo.Static.Scalar.Int32"),
        other => panic!("expected string identifier, got {other:?}"),
    }
    Ok(())
}

#[test]
fn strings_distinguish_null_from_empty() -> Result<()> {
    assert_eq!(UaString::null().encode_to_vec()?, (-1i32).to_le_bytes());
    assert_eq!(UaString::from("").encode_to_vec()?, 0i32.to_le_bytes());
    assert_eq!(round_trip(&UaString::null())?, UaString::null());
    assert_eq!(round_trip(&ByteString::null())?, ByteString::null());
    Ok(())
}

#[test]
fn date_time_round_trips_through_chrono() {
    let now = DateTime::now();
    let through = DateTime::from_chrono(&now.to_chrono());
    assert_eq!(now, through);
}

#[test]
fn variant_scalars_round_trip() -> Result<()> {
    for value in [
        Variant::Boolean(true),
        Variant::Int32(-42),
        Variant::UInt64(u64::MAX),
        Variant::Double(1.5),
        Variant::String("hello".into()),
        Variant::StatusCode(StatusCode::BAD_TIMEOUT),
        Variant::NodeId(NodeId::numeric(0, 2258)),
        Variant::LocalizedText(LocalizedText::new("text")),
        Variant::Empty,
    ] {
        assert_eq!(round_trip(&value)?, value);
    }
    Ok(())
}

#[test]
fn variant_arrays_round_trip() -> Result<()> {
    let array = Variant::Array(vec![
        Variant::Int32(1),
        Variant::Int32(2),
        Variant::Int32(3),
    ]);
    assert_eq!(round_trip(&array)?, array);
    Ok(())
}

#[test]
fn mixed_type_variant_arrays_are_rejected() {
    let array = Variant::Array(vec![Variant::Int32(1), Variant::Boolean(true)]);
    assert!(array.encode_to_vec().is_err());
}

#[test]
fn data_value_mask_covers_only_present_fields() -> Result<()> {
    let sparse = DataValue {
        value: Some(Variant::Int32(42)),
        status: Some(StatusCode::GOOD),
        ..DataValue::default()
    };
    let decoded = round_trip(&sparse)?;
    assert_eq!(decoded, sparse);
    assert!(decoded.source_timestamp.is_none());
    assert!(decoded.server_timestamp.is_none());
    Ok(())
}

#[test]
fn qualified_name_and_extension_object_round_trip() -> Result<()> {
    let name = QualifiedName::new(4, "Temperature");
    assert_eq!(round_trip(&name)?, name);

    let token = UserNameIdentityToken {
        policy_id: "username".into(),
        user_name: "operator".into(),
        password: ByteString(Some(b"secret".to_vec())),
        encryption_algorithm: UaString::null(),
    };
    let wrapped = token.clone().into_extension_object()?;
    let restored: ExtensionObject = round_trip(&wrapped)?;
    let inner: UserNameIdentityToken =
        restored.decode_body(&DecodingLimits::default())?;
    assert_eq!(inner, token);
    Ok(())
}

#[test]
fn request_header_round_trips() -> Result<()> {
    let header = RequestHeader {
        authentication_token: NodeId::numeric(1, 4711),
        timestamp: DateTime::now(),
        request_handle: 99,
        timeout_hint: 5_000,
        ..RequestHeader::default()
    };
    assert_eq!(round_trip(&header)?, header);
    Ok(())
}

#[test]
fn service_requests_round_trip_structurally() -> Result<()> {
    let read = ReadRequest {
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both,
        nodes_to_read: Some(vec![ReadValueId::value_of(NodeId::numeric(0, 2258))]),
        ..ReadRequest::default()
    };
    assert_eq!(round_trip(&read)?, read);

    let create = CreateSubscriptionRequest {
        requested_publishing_interval: 250.0,
        requested_lifetime_count: 60,
        requested_max_keep_alive_count: 20,
        max_notifications_per_publish: 0,
        publishing_enabled: true,
        priority: 1,
        ..CreateSubscriptionRequest::default()
    };
    assert_eq!(round_trip(&create)?, create);
    Ok(())
}

#[test]
fn the_envelope_carries_the_binary_encoding_id() -> Result<()> {
    let request = ReadRequest::default();
    let mut body = Vec::new();
    request.encode_enveloped(&mut body)?;

    let mut slice = body.as_slice();
    let type_id = NodeId::decode(&mut slice, &DecodingLimits::default())?;
    assert_eq!(type_id, NodeId::numeric(0, 631));
    Ok(())
}

#[test]
fn registry_resolves_builtin_and_custom_types() {
    let mut registry = TypeRegistry::builtin();
    assert_eq!(
        registry.name_of(&NodeId::numeric(0, PublishResponse::TYPE_ID)),
        "PublishResponse"
    );

    registry.extend([opcua_client_rs::types::registry::DataTypeDescriptor {
        name: "MachineStatus",
        encoding_id: NodeId::numeric(4, 5001),
    }]);
    assert_eq!(registry.name_of(&NodeId::numeric(4, 5001)), "MachineStatus");
    assert!(registry.lookup(&NodeId::numeric(4, 9999)).is_none());
}
