//! Integration tests for typed I/O: every class of the type algebra written
//! and read back through attributes and datasets.

use chrono::NaiveDate;
use proptest::prelude::*;

use strata::{
    AttributeHost, CharacterSet, Location, SpaceDescriptor, Store, StoreError, StringPadding,
    TypeDescriptor, Value,
};

fn scalar() -> SpaceDescriptor {
    SpaceDescriptor::scalar()
}

#[test]
fn test_primitive_attributes() {
    let store = Store::new();
    let file = store.create_file("prims", true).unwrap();

    let cases: Vec<(&str, TypeDescriptor, Value)> = vec![
        ("i8", TypeDescriptor::of::<i8>(), Value::I8(-5)),
        ("u16", TypeDescriptor::of::<u16>(), Value::U16(40_000)),
        ("i32", TypeDescriptor::of::<i32>(), Value::I32(i32::MIN)),
        ("u64", TypeDescriptor::of::<u64>(), Value::U64(u64::MAX)),
        ("f32", TypeDescriptor::of::<f32>(), Value::F32(1.5)),
        ("f64", TypeDescriptor::of::<f64>(), Value::F64(-0.125)),
        ("flag", TypeDescriptor::of::<bool>(), Value::Bool(true)),
    ];
    for (name, ty, value) in cases {
        let attr = file.create_attribute(name, &ty, &scalar()).unwrap();
        attr.write(&value).unwrap();
        assert_eq!(attr.read().unwrap(), value, "attribute {}", name);
    }
}

#[test]
fn test_string_attributes() {
    let store = Store::new();
    let file = store.create_file("strings", true).unwrap();

    let fixed = TypeDescriptor::fixed_string(16, CharacterSet::Utf8, StringPadding::NullTerminate)
        .unwrap();
    let attr = file.create_attribute("fixed", &fixed, &scalar()).unwrap();
    attr.write_string("héllo").unwrap();
    assert_eq!(attr.read_string().unwrap(), "héllo");

    let vlen = TypeDescriptor::variable_string(CharacterSet::Utf8);
    let attr = file.create_attribute("vlen", &vlen, &scalar()).unwrap();
    attr.write_string("arbitrarily long content, no declared capacity")
        .unwrap();
    assert_eq!(
        attr.read_string().unwrap(),
        "arbitrarily long content, no declared capacity"
    );
}

#[test]
fn test_enum_and_compound_dataset() {
    let store = Store::new();
    let file = store.create_file("structured", true).unwrap();

    let state = TypeDescriptor::enumeration(
        TypeDescriptor::of::<i16>(),
        &[("IDLE", 0), ("RUNNING", 1), ("DONE", 2)],
    )
    .unwrap();
    let record = TypeDescriptor::compound(16)
        .insert("id", 0, TypeDescriptor::of::<i32>())
        .unwrap()
        .insert("state", 4, state)
        .unwrap()
        .insert("score", 8, TypeDescriptor::of::<f64>())
        .unwrap()
        .build()
        .unwrap();

    let ds = file
        .create_data_set("records", &record, &SpaceDescriptor::simple_fixed(&[2]))
        .unwrap();
    let rows = Value::Array(vec![
        Value::Compound(vec![
            ("id".into(), Value::I32(1)),
            ("state".into(), Value::Enum("RUNNING".into())),
            ("score".into(), Value::F64(0.5)),
        ]),
        Value::Compound(vec![
            ("id".into(), Value::I32(2)),
            ("state".into(), Value::Enum("DONE".into())),
            ("score".into(), Value::F64(0.9)),
        ]),
    ]);
    ds.write(&rows).unwrap();
    assert_eq!(ds.read().unwrap(), rows);
}

#[test]
fn test_array_element_dataset() {
    let store = Store::new();
    let file = store.create_file("arrays", true).unwrap();

    // Two elements, each itself a fixed 3-vector.
    let vec3 = TypeDescriptor::array(TypeDescriptor::of::<f32>(), &[3]).unwrap();
    let ds = file
        .create_data_set("vecs", &vec3, &SpaceDescriptor::simple_fixed(&[2]))
        .unwrap();
    let value = Value::Array(vec![
        Value::Array(vec![Value::F32(1.0), Value::F32(2.0), Value::F32(3.0)]),
        Value::Array(vec![Value::F32(4.0), Value::F32(5.0), Value::F32(6.0)]),
    ]);
    ds.write(&value).unwrap();
    assert_eq!(ds.read().unwrap(), value);
}

#[test]
fn test_datetime_contract() {
    let store = Store::new();
    let file = store.create_file("dates", true).unwrap();
    let attr = file
        .create_attribute("modified", &TypeDescriptor::of::<f64>(), &scalar())
        .unwrap();

    let dt = NaiveDate::from_ymd_opt(1999, 12, 31)
        .unwrap()
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap();
    attr.write_datetime(dt).unwrap();
    assert_eq!(attr.read_datetime().unwrap(), dt);
}

#[test]
fn test_write_validation_precedes_storage() {
    let store = Store::new();
    let file = store.create_file("checks", true).unwrap();
    let attr = file
        .create_attribute("n", &TypeDescriptor::of::<i32>(), &scalar())
        .unwrap();
    attr.write_i32(7).unwrap();

    // A rejected write leaves the stored value untouched.
    assert!(matches!(
        attr.write(&Value::F64(1.0)).unwrap_err(),
        StoreError::TypeClassMismatch { .. }
    ));
    assert!(matches!(
        attr.write(&Value::I64(1)).unwrap_err(),
        StoreError::StorageSizeMismatch { .. }
    ));
    assert_eq!(attr.read_i32().unwrap(), 7);
}

#[test]
fn test_multi_element_attribute() {
    let store = Store::new();
    let file = store.create_file("multi", true).unwrap();
    let attr = file
        .create_attribute(
            "grid",
            &TypeDescriptor::of::<u8>(),
            &SpaceDescriptor::simple_fixed(&[2, 2]),
        )
        .unwrap();
    let value = Value::Array(vec![
        Value::U8(1),
        Value::U8(2),
        Value::U8(3),
        Value::U8(4),
    ]);
    attr.write(&value).unwrap();
    assert_eq!(attr.read().unwrap(), value);

    assert!(matches!(
        attr.write(&Value::Array(vec![Value::U8(1)])).unwrap_err(),
        StoreError::ShapeMismatch {
            expected: 4,
            actual: 1
        }
    ));
}

proptest! {
    #[test]
    fn prop_i64_attribute_round_trip(v in any::<i64>()) {
        let store = Store::new();
        let file = store.create_file("prop", true).unwrap();
        let attr = file
            .create_attribute("v", &TypeDescriptor::of::<i64>(), &scalar())
            .unwrap();
        attr.write_i64(v).unwrap();
        prop_assert_eq!(attr.read_i64().unwrap(), v);
    }

    #[test]
    fn prop_f64_attribute_round_trip(v in any::<f64>().prop_filter("NaN", |x| !x.is_nan())) {
        let store = Store::new();
        let file = store.create_file("prop", true).unwrap();
        let attr = file
            .create_attribute("v", &TypeDescriptor::of::<f64>(), &scalar())
            .unwrap();
        attr.write_f64(v).unwrap();
        prop_assert_eq!(attr.read_f64().unwrap(), v);
    }

    #[test]
    fn prop_fixed_string_round_trip(s in "[a-zA-Z0-9 ]{0,31}") {
        let store = Store::new();
        let file = store.create_file("prop", true).unwrap();
        let ty = TypeDescriptor::fixed_string(
            32,
            CharacterSet::Ascii,
            StringPadding::NullTerminate,
        )
        .unwrap();
        let attr = file.create_attribute("s", &ty, &scalar()).unwrap();
        attr.write_string(&s).unwrap();
        prop_assert_eq!(attr.read_string().unwrap(), s);
    }

    #[test]
    fn prop_dataset_whole_round_trip(values in proptest::collection::vec(any::<i32>(), 1..64)) {
        let store = Store::new();
        let file = store.create_file("prop", true).unwrap();
        let space = SpaceDescriptor::simple_fixed(&[values.len() as u64]);
        let ds = file
            .create_data_set("xs", &TypeDescriptor::of::<i32>(), &space)
            .unwrap();
        let value = if values.len() == 1 {
            Value::I32(values[0])
        } else {
            Value::Array(values.iter().copied().map(Value::I32).collect())
        };
        ds.write(&value).unwrap();
        prop_assert_eq!(ds.read().unwrap(), value);
    }
}
