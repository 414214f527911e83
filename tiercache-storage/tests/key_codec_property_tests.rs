//! Property-Based Tests for key rendering and payload encoding
//!
//! Properties:
//! - Keys are `namespace:prefix_a_b` with each component in canonical form
//! - Equal components always render the same key
//! - A primitive or timestamp survives a JSON payload and reshape back
//!   into its own shape

use std::sync::Arc;

use proptest::prelude::*;
use tiercache_storage::{
    decode_payload, encode_payload, Converter, ExpirationPolicy, KeyBuilder, MemoryStore, Shape,
    Value,
};
use tiercache_test_utils::generators::{arb_key_word, arb_simple_value};

fn builder(arity: usize) -> KeyBuilder {
    KeyBuilder::new(
        "ns",
        "p",
        arity,
        Arc::new(MemoryStore::new()),
        Arc::new(ExpirationPolicy::never()),
    )
    .expect("builder should succeed")
}

fn shape_of(value: &Value) -> Shape {
    match value {
        Value::Bool(_) => Shape::Bool,
        Value::Int(_) => Shape::Int { bits: 64 },
        Value::UInt(_) => Shape::UInt { bits: 64 },
        Value::Float(_) => Shape::Float { bits: 64 },
        Value::Timestamp(_) => Shape::Timestamp,
        _ => Shape::String,
    }
}

fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Float(a), Value::Float(b)) => (a - b).abs() <= a.abs().max(1.0) * 1e-12,
        _ => left == right,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_key_renders_components_in_order(word in arb_key_word(), value in arb_simple_value()) {
        let converter = Converter::default();
        let expected = format!(
            "ns:p_{}_{}",
            word,
            converter.render_simple(&value).expect("simple values render")
        );
        let handle = builder(2)
            .key(vec![Value::from(word.as_str()), value])
            .expect("key should succeed");
        prop_assert_eq!(handle.key().as_str(), expected);
    }

    #[test]
    fn prop_key_is_deterministic(a in arb_key_word(), b in arb_key_word()) {
        let keys = builder(2);
        let first = keys.key((a.as_str(), b.as_str())).expect("key should succeed");
        let second = keys.key((a.clone(), b.clone())).expect("key should succeed");
        prop_assert_eq!(first.key(), second.key());
    }

    #[test]
    fn prop_simple_value_survives_payload(value in arb_simple_value()) {
        let converter = Converter::default();
        let payload = encode_payload(&converter, &value).expect("encode should succeed");
        let decoded = decode_payload(&payload).expect("decode should succeed");
        let reshaped = converter
            .coerce(decoded, &shape_of(&value))
            .expect("reshape should succeed");
        prop_assert!(same_value(&reshaped, &value), "{:?} came back as {:?}", value, reshaped);
    }
}
