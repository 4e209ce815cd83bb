//! Hash helpers for pipeline-state keys. Values must stay stable within a process run only.

/// Mix `value` into `seed`.
pub fn combine_hash(seed: &mut u32, value: u32) {
    *seed ^= value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}

pub fn make_hash_f32(value: f32) -> u32 {
    // Fold -0.0 into 0.0 so equal values hash equally.
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

pub fn make_hash_u64(value: u64) -> u32 {
    (value as u32) ^ ((value >> 32) as u32)
}
