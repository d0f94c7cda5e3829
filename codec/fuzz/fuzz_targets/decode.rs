#![no_main]

use libfuzzer_sys::fuzz_target;
use slipstream_codec::{decode, encode, Config, Struct};

fuzz_target!(|data: &[u8]| {
    let cfg = Config {
        max_string_length: 4096,
        max_container_length: 4096,
        max_depth: 16,
    };
    let Ok(decoded) = slipstream_codec::decode_cfg::<Struct>(data, cfg) else {
        return;
    };

    // Anything that decodes must re-encode to a stable form.
    let encoded = encode(&decoded).expect("failed to encode a decoded struct");
    let again: Struct = decode(&encoded).expect("failed to decode a re-encoded struct");
    let reencoded = encode(&again).expect("failed to encode twice");
    assert_eq!(encoded, reencoded);
});
