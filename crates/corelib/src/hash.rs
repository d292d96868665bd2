//! Key hashing for ring placement.
//!
//! The hash must stay bit-for-bit compatible with the stored placement data
//! produced by earlier deployments: for each UTF-16 code unit of the key,
//! `h = (h << 5) - h + code` under wrapping 32-bit signed arithmetic, then
//! the absolute value. Do not swap this for a stronger hash; position
//! compatibility matters more than distribution quality at this scale.

/// Number of positions on the ring.
pub const DEFAULT_RING_SIZE: u32 = 256;

/// Hash a key to a non-negative 32-bit value.
///
/// Iterates UTF-16 code units so multi-byte characters hash identically
/// across implementations of the same algorithm.
pub fn hash_key(key: &str) -> u32 {
    let mut h: i32 = 0;
    for code in key.encode_utf16() {
        h = h
            .wrapping_shl(5)
            .wrapping_sub(h)
            .wrapping_add(i32::from(code));
    }
    // `unsigned_abs` avoids the i32::MIN overflow that plain `abs` has.
    h.unsigned_abs()
}

/// Map a key onto the ring: `hash_key(key) % ring_size`.
pub fn ring_position(key: &str, ring_size: u32) -> u32 {
    hash_key(key) % ring_size
}
