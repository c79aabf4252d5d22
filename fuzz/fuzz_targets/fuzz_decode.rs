#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Header probe must never panic
    let _ = zenlerc::Lerc1Info::from_bytes(data);

    // Full decode must never panic; cap allocations so the fuzzer spends
    // its time in the parser, not in zeroing huge rasters
    let limits = zenlerc::Limits {
        max_memory_bytes: Some(64 << 20),
        ..Default::default()
    };
    let _ = zenlerc::decode_with_limits(data, &limits, enough::Unstoppable);
});
