#![no_main]
use libfuzzer_sys::fuzz_target;
use zenlerc::*;

fuzz_target!(|data: &[u8]| {
    // Whatever decodes must re-encode at the stream's own bound and come
    // back with the same mask and values within that bound
    let limits = Limits {
        max_memory_bytes: Some(64 << 20),
        ..Default::default()
    };
    let Ok(decoded) = decode_with_limits(data, &limits, enough::Unstoppable) else {
        return;
    };
    let info = Lerc1Info::from_bytes(data).expect("decoded stream failed the header probe");
    if !info.max_z_error.is_finite() || info.max_z_error < 0.0 {
        return;
    }

    let reencoded =
        encode(&decoded, info.max_z_error, enough::Unstoppable).expect("re-encode failed");
    let second = decode(&reencoded, enough::Unstoppable).expect("re-encoded stream failed");

    assert_eq!(second.mask(), decoded.mask(), "mask drifted");
    for row in 0..decoded.height() {
        for col in 0..decoded.width() {
            if !decoded.is_valid(row, col) {
                continue;
            }
            let a = decoded.value(row, col);
            let b = second.value(row, col);
            if !a.is_finite() {
                // non-finite values ride in raw tiles, bit exact
                assert!(a == b || (a.is_nan() && b.is_nan()), "{a} became {b}");
                continue;
            }
            let a = f64::from(a);
            let b = f64::from(b);
            // slack for the f32 rounding of reconstructed values
            let slack = a.abs().max(b.abs()) * 1.0e-6 + 1.0e-30;
            assert!(
                (a - b).abs() <= info.max_z_error + slack,
                "({row},{col}): {a} became {b}, bound {}",
                info.max_z_error
            );
        }
    }
});
