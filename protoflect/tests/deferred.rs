use protoflect::{
    coerce, decode_struct_from_bytes, encode_struct_to_bytes, enumerate, DescriptorPoolRegistry,
    FieldKind, FieldTy, PoolId, StructTy, Value,
};
use protoflect_testhelpers::schema::{FieldProto, FileProto, MessageProto};
use protoflect_testhelpers::setup;

fn carrier_file() -> FileProto {
    FileProto::new("d.proto")
        .package("d")
        .message(
            MessageProto::new("Carrier")
                .field(FieldProto::string("tag", 1))
                .field(FieldProto::message("payload", 2, ".d.Payload")),
        )
        .message(
            MessageProto::new("Payload")
                .field(FieldProto::int32("id", 1))
                .field(FieldProto::string("label", 2)),
        )
        .message(MessageProto::new("Other").field(FieldProto::string("different", 1)))
}

fn registry() -> DescriptorPoolRegistry {
    let mut reg = DescriptorPoolRegistry::new();
    assert!(reg.add_schema(PoolId::DEFAULT, &carrier_file().encode()));
    reg
}

fn payload_ty() -> std::sync::Arc<StructTy> {
    StructTy::new(
        "Payload",
        vec![
            FieldTy::new("id", FieldKind::I32),
            FieldTy::new("label", FieldKind::Str),
        ],
    )
}

fn deferred_carrier_ty() -> std::sync::Arc<StructTy> {
    StructTy::new(
        "Carrier",
        vec![
            FieldTy::new("tag", FieldKind::Str),
            FieldTy::new("payload", FieldKind::Any),
        ],
    )
}

/// Wire bytes for a carrier whose payload is `{id: 7, label: "seven"}`.
fn carrier_bytes(reg: &DescriptorPoolRegistry) -> Vec<u8> {
    let concrete_ty = StructTy::new(
        "Carrier",
        vec![
            FieldTy::new("tag", FieldKind::Str),
            FieldTy::new("payload", FieldKind::Struct(payload_ty())),
        ],
    );
    let mut payload = payload_ty().instantiate();
    payload.set("id", Value::I32(7));
    payload.set("label", Value::Str("seven".into()));
    let mut carrier = concrete_ty.instantiate();
    carrier.set("tag", Value::Str("t".into()));
    carrier.set("payload", Value::Struct(payload));
    encode_struct_to_bytes(reg, "d.Carrier", &carrier, PoolId::DEFAULT).unwrap()
}

#[test]
fn decode_defers_the_sub_message() {
    setup();
    let reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));
    let Some(Value::Any(any)) = carrier.get("payload") else {
        panic!("payload should be a deferred value");
    };
    assert!(!any.is_empty());

    // field access by schema number without coercing
    assert_eq!(enumerate(any, 1), Some(("id".to_string(), Value::I32(7))));
    assert_eq!(
        enumerate(any, 2),
        Some(("label".to_string(), Value::Str("seven".into())))
    );
    assert_eq!(enumerate(any, 9), None);
}

#[test]
fn coerce_into_matching_type() {
    setup();
    let reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));
    let Some(Value::Any(any)) = carrier.get("payload") else {
        panic!("payload should be a deferred value");
    };

    let desc = reg.resolve(PoolId::DEFAULT, "d.Payload").unwrap();
    let mut out = payload_ty().instantiate();
    assert!(coerce(any, desc, &mut out));
    assert_eq!(out.get("id"), Some(&Value::I32(7)));
    assert_eq!(out.get("label"), Some(&Value::Str("seven".into())));
}

#[test]
fn coerce_into_wrong_type_is_refused() {
    setup();
    let reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));
    let Some(Value::Any(any)) = carrier.get("payload") else {
        panic!("payload should be a deferred value");
    };

    // field 1 is an int32 in the payload but a string in Other
    let other = reg.resolve(PoolId::DEFAULT, "d.Other").unwrap();
    let other_ty = StructTy::new("Other", vec![FieldTy::new("different", FieldKind::Str)]);
    let mut out = other_ty.instantiate();
    out.set("different", Value::Str("keep".into()));
    assert!(!coerce(any, other, &mut out));
    assert_eq!(out.get("different"), Some(&Value::Str("keep".into())));
}

#[test]
fn empty_box_refuses_coercion() {
    setup();
    let reg = registry();
    let ty = deferred_carrier_ty();
    let carrier = ty.instantiate();
    let Some(Value::Any(any)) = carrier.get("payload") else {
        panic!("payload should be a deferred value");
    };
    assert!(any.is_empty());
    let desc = reg.resolve(PoolId::DEFAULT, "d.Payload").unwrap();
    let mut out = payload_ty().instantiate();
    assert!(!coerce(any, desc, &mut out));
}

#[test]
fn deferred_payload_reencodes_identically() {
    setup();
    let reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));

    let again = encode_struct_to_bytes(&reg, "d.Carrier", &carrier, PoolId::DEFAULT).unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn cleared_box_encodes_nothing() {
    setup();
    let reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));
    if let Some(Value::Any(any)) = carrier.get_mut("payload") {
        any.clear();
    }

    let again = encode_struct_to_bytes(&reg, "d.Carrier", &carrier, PoolId::DEFAULT).unwrap();
    // only the tag survives
    assert_eq!(again, [0x0a, 0x01, b't']);
}

#[test]
fn boxes_survive_schema_clearing() {
    setup();
    let mut reg = registry();
    let bytes = carrier_bytes(&reg);

    let ty = deferred_carrier_ty();
    let mut carrier = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "d.Carrier",
        &mut carrier,
        PoolId::DEFAULT
    ));

    reg.clear_schemas();
    assert!(reg.resolve(PoolId::DEFAULT, "d.Payload").is_none());

    // the box carries its own descriptor snapshot
    let Some(Value::Any(any)) = carrier.get("payload") else {
        panic!("payload should be a deferred value");
    };
    assert_eq!(enumerate(any, 1), Some(("id".to_string(), Value::I32(7))));
}
