//! Wrapped file records
//!
//! Every file entering staging (and therefore every file in a snapshot) is
//! stored as a framed record:
//!
//! ```text
//! +-------------+------------------+--------------------+
//! | MAGIC "1234"| original bytes   | checksum (4 bytes) |
//! +-------------+------------------+--------------------+
//! ```
//!
//! The checksum is the FNV-1a fingerprint of `MAGIC ‖ original`, stored
//! little-endian so records are portable across hosts. The magic bytes are
//! framing only and are not validated on read; corruption anywhere in the
//! record surfaces through the checksum instead.

use crate::checksum::fingerprint;
use crate::error::VcsError;

/// Fixed framing prefix for every wrapped record
pub const MAGIC: &[u8; 4] = b"1234";

/// Bytes a record adds on top of the original content (magic + checksum)
pub const RECORD_OVERHEAD: usize = 8;

/// Wrap raw file bytes into an integrity-checked record.
///
/// `len(wrap(b)) == len(b) + RECORD_OVERHEAD` for every input.
pub fn wrap(bytes: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(bytes.len() + RECORD_OVERHEAD);
    record.extend_from_slice(MAGIC);
    record.extend_from_slice(bytes);

    let checksum = fingerprint(&record);
    record.extend_from_slice(&checksum.to_le_bytes());
    record
}

/// Verify a wrapped record and return the original bytes.
///
/// Fails with [`VcsError::Malformed`] when the record is shorter than the
/// fixed overhead, and with [`VcsError::ChecksumMismatch`] when the stored
/// checksum disagrees with the fingerprint recomputed over the payload
/// (magic included).
pub fn unwrap(record: &[u8]) -> Result<&[u8], VcsError> {
    if record.len() < RECORD_OVERHEAD {
        return Err(VcsError::Malformed { len: record.len() });
    }

    let (payload, trailer) = record.split_at(record.len() - 4);
    let stored = u32::from_le_bytes(trailer.try_into().expect("trailer is 4 bytes"));
    let computed = fingerprint(payload);

    if stored != computed {
        return Err(VcsError::ChecksumMismatch { stored, computed });
    }

    Ok(&payload[MAGIC.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Round Trip Tests ===

    #[test]
    fn test_round_trip() {
        let original = b"fn main() { println!(\"hi\"); }";
        let record = wrap(original);
        assert_eq!(unwrap(&record).unwrap(), original);
    }

    #[test]
    fn test_round_trip_empty_payload() {
        let record = wrap(b"");
        assert_eq!(record.len(), RECORD_OVERHEAD);
        assert_eq!(unwrap(&record).unwrap(), b"");
    }

    #[test]
    fn test_round_trip_binary_payload() {
        let original: Vec<u8> = (0..=255).collect();
        let record = wrap(&original);
        assert_eq!(unwrap(&record).unwrap(), original.as_slice());
    }

    // === Layout Tests ===

    #[test]
    fn test_record_length_invariant() {
        for len in [0usize, 1, 7, 8, 1024] {
            let original = vec![0xABu8; len];
            assert_eq!(wrap(&original).len(), len + RECORD_OVERHEAD);
        }
    }

    #[test]
    fn test_record_layout() {
        // The concrete layout: "1234" + content + little-endian fingerprint
        let record = wrap(b"hello");

        assert_eq!(&record[..4], b"1234");
        assert_eq!(&record[4..9], b"hello");
        assert_eq!(
            &record[9..],
            crate::checksum::fingerprint(b"1234hello").to_le_bytes()
        );
    }

    // === Failure Tests ===

    #[test]
    fn test_unwrap_too_short_is_malformed() {
        for len in 0..RECORD_OVERHEAD {
            let record = vec![0u8; len];
            assert!(matches!(
                unwrap(&record),
                Err(VcsError::Malformed { len: l }) if l == len
            ));
        }
    }

    #[test]
    fn test_unwrap_detects_payload_corruption() {
        let mut record = wrap(b"important data");
        record[6] ^= 0x40;

        assert!(matches!(
            unwrap(&record),
            Err(VcsError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unwrap_detects_magic_corruption() {
        // The magic is covered by the checksum even though it is never
        // compared byte-for-byte.
        let mut record = wrap(b"payload");
        record[0] ^= 0x01;

        assert!(matches!(
            unwrap(&record),
            Err(VcsError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unwrap_detects_trailer_corruption() {
        let mut record = wrap(b"payload");
        let last = record.len() - 1;
        record[last] ^= 0x80;

        assert!(matches!(
            unwrap(&record),
            Err(VcsError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_every_payload_bit_flip_detected() {
        let record = wrap(b"abc");

        for byte in 0..record.len() {
            for bit in 0..8 {
                let mut corrupt = record.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(
                    unwrap(&corrupt).is_err(),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }
}
