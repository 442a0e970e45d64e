#![no_main]

use libfuzzer_sys::fuzz_target;
use std::time::Duration;
use vms_gateway::auth::{SessionVerdict, TokenCodec};

const NOW: i64 = 1_700_000_000;

fuzz_target!(|data: &[u8]| {
    let Ok(codec) = TokenCodec::new(&[7u8; 32], "session-key-01", Duration::from_secs(300)) else {
        return;
    };

    if let Ok(raw) = std::str::from_utf8(data) {
        // Arbitrary input must never verify and never panic
        let verdict = codec.verify_at(raw, NOW);
        assert!(!matches!(verdict, SessionVerdict::Valid(_)));
    }
});
