//! 32-bit FNV-1a fingerprint
//!
//! Non-cryptographic corruption check embedded in every wrapped record.
//! The constants are load-bearing: writer and verifier must produce
//! identical values for the same bytes, so do not touch them.

/// FNV-1a 32-bit offset basis
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;

/// FNV-1a 32-bit prime
pub const FNV_PRIME: u32 = 0x0100_0193;

/// Compute the FNV-1a fingerprint of a byte buffer.
///
/// Pure function, no failure mode. Bytes are folded in input order.
pub fn fingerprint(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
