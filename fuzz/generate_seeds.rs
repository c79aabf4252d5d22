#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn header(width: i32, height: i32, max_z_error: f64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"CntZImage ");
    out.extend_from_slice(&11i32.to_le_bytes());
    out.extend_from_slice(&8i32.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&max_z_error.to_le_bytes());
    out
}

fn part(out: &mut Vec<u8>, tiles_vert: i32, tiles_hori: i32, payload: &[u8], max_val: f32) {
    out.extend_from_slice(&tiles_vert.to_le_bytes());
    out.extend_from_slice(&tiles_hori.to_le_bytes());
    out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    out.extend_from_slice(&max_val.to_le_bytes());
    out.extend_from_slice(payload);
}

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // 4x3, all pixels invalid: constant zero mask, one all-zero tile
    let mut void = header(4, 3, 0.0);
    part(&mut void, 0, 0, &[], 0.0);
    part(&mut void, 1, 1, &[0x02], 0.0);
    fs::write(format!("{dir}/void_4x3.lerc1"), void).unwrap();

    // 2x2 constant 5.0: one constant-minimum tile with a one-byte value
    let mut constant = header(2, 2, 0.01);
    part(&mut constant, 0, 0, &[], 1.0);
    part(&mut constant, 1, 1, &[0x83, 0x05], 5.0);
    fs::write(format!("{dir}/const_2x2.lerc1"), constant).unwrap();

    // 4x1 ramp 0..=3 at bound 0.5: packed tile, 2-bit samples 00 01 10 11
    let mut packed = header(4, 1, 0.5);
    part(&mut packed, 0, 0, &[], 1.0);
    part(&mut packed, 1, 1, &[0x81, 0x00, 0x82, 0x04, 0x1B], 3.0);
    fs::write(format!("{dir}/packed_4x1.lerc1"), packed).unwrap();

    // 2x2 with an RLE mask: left column valid, constant tile for values
    let mut rle = header(2, 2, 0.01);
    part(&mut rle, 0, 0, &[0x01, 0x00, 0xA0, 0x00, 0x80], 1.0);
    part(&mut rle, 1, 1, &[0x83, 0x05], 5.0);
    fs::write(format!("{dir}/rle_mask_2x2.lerc1"), rle).unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/just_signature.bin"), b"CntZImage ").unwrap();
    fs::write(format!("{dir}/header_only.bin"), header(100, 100, 0.1)).unwrap();
    let mut bad_version = header(2, 2, 0.0);
    bad_version[10] = 12;
    fs::write(format!("{dir}/bad_version.bin"), bad_version).unwrap();

    println!("Generated seed corpus in {dir}/");
}
