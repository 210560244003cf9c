#![no_main]

//! Fuzz target for fallback URL construction.
//!
//! Arbitrary endpoint strings and payloads must never panic, and any URL
//! produced must carry the payload and marker parameters.

use beacon_delivery::{encode_fallback_payload, fallback_url, Endpoint};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (&str, &[u8])| {
    let (endpoint, payload) = input;

    let Ok(url) = fallback_url(&Endpoint::from(endpoint), payload, "beacon") else {
        return;
    };

    assert!(matches!(url.scheme(), "http" | "https"));

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let tail = &pairs[pairs.len() - 3..];
    assert_eq!(tail[0], ("data".to_string(), encode_fallback_payload(payload)));
    assert_eq!(tail[1], ("fallback".to_string(), "true".to_string()));
    assert_eq!(tail[2], ("source".to_string(), "beacon".to_string()));
});
