use protoflect::{
    decode_struct_from_bytes, encode_struct_to_bytes, DescriptorPoolRegistry, EnumTy, FieldKind,
    FieldTy, PoolId, StructTy, Value,
};
use protoflect_testhelpers::schema::{FieldProto, FileProto, MessageProto};
use protoflect_testhelpers::setup;

fn registry(file: &FileProto) -> DescriptorPoolRegistry {
    let mut reg = DescriptorPoolRegistry::new();
    assert!(reg.add_schema(PoolId::DEFAULT, &file.encode()));
    reg
}

#[test]
fn named_scenario_roundtrips() {
    setup();
    let file = FileProto::new("s.proto").message(
        MessageProto::new("Message")
            .field(FieldProto::string("name", 1))
            .field(FieldProto::int32("values", 2).repeated()),
    );
    let reg = registry(&file);
    let ty = StructTy::new(
        "Message",
        vec![
            FieldTy::new("name", FieldKind::Str),
            FieldTy::new("values", FieldKind::Array(Box::new(FieldKind::I32))),
        ],
    );
    let mut v = ty.instantiate();
    v.set("name", Value::Str("a".into()));
    v.set(
        "values",
        Value::Array(vec![Value::I32(1), Value::I32(2), Value::I32(3)]),
    );

    let bytes = encode_struct_to_bytes(&reg, "Message", &v, PoolId::DEFAULT).unwrap();
    assert_eq!(bytes, [0x0a, 0x01, b'a', 0x12, 0x03, 0x01, 0x02, 0x03]);

    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Message",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back, v);
}

#[test]
fn arrays_roundtrip_at_boundary_lengths() {
    setup();
    let file = FileProto::new("a.proto").message(
        MessageProto::new("Row").field(FieldProto::int32("values", 1).repeated()),
    );
    let reg = registry(&file);
    let ty = StructTy::new(
        "Row",
        vec![FieldTy::new(
            "values",
            FieldKind::Array(Box::new(FieldKind::I32)),
        )],
    );
    for k in [0usize, 1, 100] {
        let values: Vec<Value> = (0..k as i32).map(Value::I32).collect();
        let mut v = ty.instantiate();
        v.set("values", Value::Array(values.clone()));

        let bytes = encode_struct_to_bytes(&reg, "Row", &v, PoolId::DEFAULT).unwrap();
        let mut back = ty.instantiate();
        assert!(decode_struct_from_bytes(
            &reg,
            &bytes,
            "Row",
            &mut back,
            PoolId::DEFAULT
        ));
        assert_eq!(back.get("values"), Some(&Value::Array(values)), "k = {k}");
    }
}

#[test]
fn scalar_kinds_roundtrip() {
    setup();
    let file = FileProto::new("k.proto")
        .package("k")
        .enumeration("Color", &[("RED", 0), ("GREEN", 1), ("BLUE", 2)])
        .message(
            MessageProto::new("Kinds")
                .field(FieldProto::bool("flag", 1))
                .field(FieldProto::uint32("small", 2))
                .field(FieldProto::int64("big", 3))
                .field(FieldProto::uint64("huge", 4))
                .field(FieldProto::float("ratio", 5))
                .field(FieldProto::double("precise", 6))
                .field(FieldProto::bytes("blob", 7))
                .field(FieldProto::enumeration("color", 8, ".k.Color")),
        );
    let reg = registry(&file);
    let color = EnumTy::new("Color", vec![("RED", 0), ("GREEN", 1), ("BLUE", 2)]);
    let ty = StructTy::new(
        "Kinds",
        vec![
            FieldTy::new("flag", FieldKind::Bool),
            FieldTy::new("small", FieldKind::U32),
            FieldTy::new("big", FieldKind::I64),
            FieldTy::new("huge", FieldKind::U64),
            FieldTy::new("ratio", FieldKind::F32),
            FieldTy::new("precise", FieldKind::F64),
            FieldTy::new("blob", FieldKind::Array(Box::new(FieldKind::U8))),
            FieldTy::new("color", FieldKind::Enum(color)),
        ],
    );
    let mut v = ty.instantiate();
    v.set("flag", Value::Bool(true));
    v.set("small", Value::U32(7));
    v.set("big", Value::I64(-5_000_000_000));
    v.set("huge", Value::U64(u64::MAX));
    v.set("ratio", Value::F32(1.5));
    v.set("precise", Value::F64(-2.25));
    v.set(
        "blob",
        Value::Array(vec![Value::U8(0), Value::U8(255), Value::U8(16)]),
    );
    v.set("color", Value::Enum(2));

    let bytes = encode_struct_to_bytes(&reg, "k.Kinds", &v, PoolId::DEFAULT).unwrap();
    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "k.Kinds",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back, v);
}

#[test]
fn nested_structs_and_maps_roundtrip() {
    setup();
    let file = FileProto::new("n.proto")
        .package("n")
        .message(
            MessageProto::new("Outer")
                .field(FieldProto::message("inner", 1, ".n.Inner"))
                .field(FieldProto::message("items", 2, ".n.Outer.ItemsEntry").repeated())
                .nested(
                    MessageProto::new("ItemsEntry")
                        .map_entry()
                        .field(FieldProto::string("key", 1))
                        .field(FieldProto::message("value", 2, ".n.Inner")),
                ),
        )
        .message(MessageProto::new("Inner").field(FieldProto::int32("id", 1)));
    let reg = registry(&file);

    let inner_ty = StructTy::new("Inner", vec![FieldTy::new("id", FieldKind::I32)]);
    let ty = StructTy::new(
        "Outer",
        vec![
            FieldTy::new("inner", FieldKind::Struct(inner_ty.clone())),
            FieldTy::new(
                "items",
                FieldKind::Map(
                    Box::new(FieldKind::Str),
                    Box::new(FieldKind::Struct(inner_ty.clone())),
                ),
            ),
        ],
    );
    let mut first = inner_ty.instantiate();
    first.set("id", Value::I32(1));
    let mut second = inner_ty.instantiate();
    second.set("id", Value::I32(2));

    let mut v = ty.instantiate();
    v.set("inner", Value::Struct(first.clone()));
    v.set(
        "items",
        Value::Map(vec![
            (Value::Str("a".into()), Value::Struct(first)),
            (Value::Str("b".into()), Value::Struct(second)),
        ]),
    );

    let bytes = encode_struct_to_bytes(&reg, "n.Outer", &v, PoolId::DEFAULT).unwrap();
    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "n.Outer",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back, v);
}

#[test]
fn partial_schemas_are_tolerated() {
    setup();
    let file = FileProto::new("p.proto").message(
        MessageProto::new("Person")
            .field(FieldProto::string("name", 1))
            .field(FieldProto::int32("age", 2)),
    );
    let reg = registry(&file);
    // host lacks "age" and carries an extra field the schema lacks
    let ty = StructTy::new(
        "Person",
        vec![
            FieldTy::new("name", FieldKind::Str),
            FieldTy::new("nickname", FieldKind::Str),
        ],
    );
    let mut v = ty.instantiate();
    v.set("name", Value::Str("ada".into()));
    v.set("nickname", Value::Str("al".into()));

    let bytes = encode_struct_to_bytes(&reg, "Person", &v, PoolId::DEFAULT).unwrap();

    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Person",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("name"), Some(&Value::Str("ada".into())));
    // never on the wire, left at its default
    assert_eq!(back.get("nickname"), Some(&Value::Str(String::new())));
}

#[test]
fn unknown_wire_fields_are_skipped() {
    setup();
    let full = FileProto::new("u.proto").message(
        MessageProto::new("Rec")
            .field(FieldProto::string("name", 1))
            .field(FieldProto::int32("extra", 2)),
    );
    let reduced = FileProto::new("u.proto")
        .message(MessageProto::new("Rec").field(FieldProto::string("name", 1)));

    let full_reg = registry(&full);
    let reduced_reg = registry(&reduced);

    let full_ty = StructTy::new(
        "Rec",
        vec![
            FieldTy::new("name", FieldKind::Str),
            FieldTy::new("extra", FieldKind::I32),
        ],
    );
    let mut v = full_ty.instantiate();
    v.set("name", Value::Str("x".into()));
    v.set("extra", Value::I32(99));
    let bytes = encode_struct_to_bytes(&full_reg, "Rec", &v, PoolId::DEFAULT).unwrap();

    let reduced_ty = StructTy::new("Rec", vec![FieldTy::new("name", FieldKind::Str)]);
    let mut back = reduced_ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reduced_reg,
        &bytes,
        "Rec",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("name"), Some(&Value::Str("x".into())));
}

#[test]
fn numbers_cross_string_fields() {
    setup();
    let file = FileProto::new("c.proto")
        .message(MessageProto::new("Rec").field(FieldProto::string("code", 1)));
    let reg = registry(&file);
    let ty = StructTy::new("Rec", vec![FieldTy::new("code", FieldKind::I32)]);
    let mut v = ty.instantiate();
    v.set("code", Value::I32(-42));

    // the numeric host field travels as its decimal text
    let bytes = encode_struct_to_bytes(&reg, "Rec", &v, PoolId::DEFAULT).unwrap();
    assert_eq!(bytes, [0x0a, 0x03, b'-', b'4', b'2']);

    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Rec",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("code"), Some(&Value::I32(-42)));
}

#[test]
fn enum_symbols_decode_from_strings() {
    setup();
    let file = FileProto::new("e.proto")
        .message(MessageProto::new("Paint").field(FieldProto::string("color", 1)));
    let reg = registry(&file);

    let color = EnumTy::new("Color", vec![("RED", 0), ("GREEN", 1)]);
    let ty = StructTy::new("Paint", vec![FieldTy::new("color", FieldKind::Enum(color))]);

    // a wire message carrying the symbol as text
    let bytes = vec![0x0a, 0x05, b'G', b'R', b'E', b'E', b'N'];
    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Paint",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("color"), Some(&Value::Enum(1)));
}

#[test]
fn repeated_wire_field_clamps_into_scalar_host() {
    setup();
    let file = FileProto::new("r.proto").message(
        MessageProto::new("Row").field(FieldProto::int32("values", 1).repeated()),
    );
    let reg = registry(&file);

    let array_ty = StructTy::new(
        "Row",
        vec![FieldTy::new(
            "values",
            FieldKind::Array(Box::new(FieldKind::I32)),
        )],
    );
    let mut v = array_ty.instantiate();
    v.set("values", Value::Array(vec![Value::I32(7), Value::I32(8)]));
    let bytes = encode_struct_to_bytes(&reg, "Row", &v, PoolId::DEFAULT).unwrap();

    let scalar_ty = StructTy::new("Row", vec![FieldTy::new("values", FieldKind::I32)]);
    let mut back = scalar_ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Row",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("values"), Some(&Value::I32(7)));
}

#[test]
fn scalar_host_feeds_repeated_wire_field() {
    setup();
    let file = FileProto::new("r2.proto").message(
        MessageProto::new("Row").field(FieldProto::int32("values", 1).repeated()),
    );
    let reg = registry(&file);

    let scalar_ty = StructTy::new("Row", vec![FieldTy::new("values", FieldKind::I32)]);
    let mut v = scalar_ty.instantiate();
    v.set("values", Value::I32(5));
    let bytes = encode_struct_to_bytes(&reg, "Row", &v, PoolId::DEFAULT).unwrap();

    let array_ty = StructTy::new(
        "Row",
        vec![FieldTy::new(
            "values",
            FieldKind::Array(Box::new(FieldKind::I32)),
        )],
    );
    let mut back = array_ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Row",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back.get("values"), Some(&Value::Array(vec![Value::I32(5)])));
}

#[test]
fn sets_roundtrip_and_drop_duplicates() {
    setup();
    let file = FileProto::new("st.proto")
        .message(MessageProto::new("Bag").field(FieldProto::int32("vals", 1).repeated()));
    let reg = registry(&file);
    let ty = StructTy::new(
        "Bag",
        vec![FieldTy::new(
            "vals",
            FieldKind::Set(Box::new(FieldKind::I32)),
        )],
    );
    let mut v = ty.instantiate();
    v.set(
        "vals",
        Value::Set(vec![Value::I32(1), Value::I32(2), Value::I32(3)]),
    );

    let bytes = encode_struct_to_bytes(&reg, "Bag", &v, PoolId::DEFAULT).unwrap();
    let mut back = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &bytes,
        "Bag",
        &mut back,
        PoolId::DEFAULT
    ));
    assert_eq!(back, v);

    // a packed run carrying duplicate elements collapses on decode
    let doubled = vec![0x0a, 0x04, 0x07, 0x07, 0x08, 0x07];
    let mut deduped = ty.instantiate();
    assert!(decode_struct_from_bytes(
        &reg,
        &doubled,
        "Bag",
        &mut deduped,
        PoolId::DEFAULT
    ));
    assert_eq!(
        deduped.get("vals"),
        Some(&Value::Set(vec![Value::I32(7), Value::I32(8)]))
    );
}

#[test]
fn mismatched_host_values_skip_map_fields() {
    setup();
    let file = FileProto::new("mm.proto").message(
        MessageProto::new("Holder")
            .field(FieldProto::string("name", 1))
            .field(FieldProto::message("tags", 2, ".Holder.TagsEntry").repeated())
            .nested(
                MessageProto::new("TagsEntry")
                    .map_entry()
                    .field(FieldProto::string("key", 1))
                    .field(FieldProto::int32("value", 2)),
            ),
    );
    let reg = registry(&file);

    // an array of structs where the schema expects a map
    let tag_ty = StructTy::new("Tag", vec![FieldTy::new("id", FieldKind::I32)]);
    let seq_ty = StructTy::new(
        "Holder",
        vec![
            FieldTy::new("name", FieldKind::Str),
            FieldTy::new(
                "tags",
                FieldKind::Array(Box::new(FieldKind::Struct(tag_ty.clone()))),
            ),
        ],
    );
    let mut tag = tag_ty.instantiate();
    tag.set("id", Value::I32(0));
    let mut v = seq_ty.instantiate();
    v.set("name", Value::Str("h".into()));
    v.set("tags", Value::Array(vec![Value::Struct(tag)]));

    let bytes = encode_struct_to_bytes(&reg, "Holder", &v, PoolId::DEFAULT).unwrap();
    // only the name survives
    assert_eq!(bytes, [0x0a, 0x01, b'h']);

    // same for a scalar host field matched to the map
    let scalar_ty = StructTy::new(
        "Holder",
        vec![
            FieldTy::new("name", FieldKind::Str),
            FieldTy::new("tags", FieldKind::I32),
        ],
    );
    let mut w = scalar_ty.instantiate();
    w.set("name", Value::Str("h".into()));
    w.set("tags", Value::I32(5));
    let bytes = encode_struct_to_bytes(&reg, "Holder", &w, PoolId::DEFAULT).unwrap();
    assert_eq!(bytes, [0x0a, 0x01, b'h']);
}

#[test]
fn empty_arrays_count_as_unmatched() {
    setup();
    let file = FileProto::new("z.proto")
        .message(MessageProto::new("Row").field(FieldProto::int32("values", 1).repeated()));
    let reg = registry(&file);
    let desc = reg.resolve(PoolId::DEFAULT, "Row").unwrap();
    let ty = StructTy::new(
        "Row",
        vec![FieldTy::new(
            "values",
            FieldKind::Array(Box::new(FieldKind::I32)),
        )],
    );
    let v = ty.instantiate();

    let mut msg = protoflect::WireMessage::new();
    assert_eq!(protoflect::encode_struct(&v, desc, &mut msg), 0);
}

#[test]
fn missing_schema_returns_nothing() {
    setup();
    let reg = DescriptorPoolRegistry::new();
    let ty = StructTy::new("Ghost", vec![FieldTy::new("x", FieldKind::I32)]);
    let v = ty.instantiate();
    assert!(encode_struct_to_bytes(&reg, "Ghost", &v, PoolId::DEFAULT).is_none());

    let mut out = ty.instantiate();
    assert!(!decode_struct_from_bytes(
        &reg,
        &[],
        "Ghost",
        &mut out,
        PoolId::DEFAULT
    ));
}

#[test]
fn malformed_bytes_leave_host_untouched() {
    setup();
    let file = FileProto::new("m.proto")
        .message(MessageProto::new("Rec").field(FieldProto::string("name", 1)));
    let reg = registry(&file);
    let ty = StructTy::new("Rec", vec![FieldTy::new("name", FieldKind::Str)]);
    let mut out = ty.instantiate();
    out.set("name", Value::Str("before".into()));

    // truncated length-delimited payload
    let bad = vec![0x0a, 0x05, b'a'];
    assert!(!decode_struct_from_bytes(
        &reg,
        &bad,
        "Rec",
        &mut out,
        PoolId::DEFAULT
    ));
    assert_eq!(out.get("name"), Some(&Value::Str("before".into())));
}
