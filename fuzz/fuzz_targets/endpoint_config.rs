#![no_main]

//! Fuzz target for endpoint configuration values.
//!
//! Feeds arbitrary JSON to the registry. Whatever the input, the registry
//! must either take it as a URL list or leave its contents untouched.

use beacon_delivery::EndpointRegistry;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let mut registry = EndpointRegistry::with_defaults();
    let before = registry.list();

    if registry.replace_value(&value) {
        let expected = match &value {
            Value::String(_) => 1,
            Value::Array(items) => items.len(),
            _ => panic!("non-URL value accepted: {value}"),
        };
        assert_eq!(registry.len(), expected);
    } else {
        assert_eq!(registry.list(), before);
    }

    let appended = registry.clone().append("https://fuzz.test/collect");
    assert_eq!(appended, !registry.contains("https://fuzz.test/collect"));
});
