#![no_main]

use libfuzzer_sys::fuzz_target;
use vms_gateway::services::relay_client::{parse_limit, TimeWindow};

const NOW_MS: i64 = 1_700_000_000_000;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let (from, to) = s.split_once('|').unwrap_or((s, ""));

    if let Ok(window) = TimeWindow::resolve(Some(from), Some(to), 30, NOW_MS) {
        assert!(window.from_ms <= window.to_ms);
    }

    if let Ok(limit) = parse_limit(Some(s), 50) {
        assert!((1..=1000).contains(&limit));
    }
});
