//! Book checksum (CRC-32) used to detect desynchronization from the feed.
//!
//! The exchange publishes a CRC-32 over the top of the book with every
//! aggregated update. The input string is built from the top
//! [`CHECKSUM_DEPTH`] ask levels followed by the same number of bid levels,
//! each level rendered as price with 10 fractional digits immediately followed
//! by quantity with 8 fractional digits:
//!
//! ```text
//! asks: (100.5, 2.0), (101.0, 4.0)   bids: (100.0, 5.0), (99.5, 3.0)
//! "100.5000000000" "2.00000000" "101.0000000000" "4.00000000" "100.0000000000" ...
//! ```
//!
//! Both sides are truncated to `min(CHECKSUM_DEPTH, asks.len(), bids.len())`.
//!
//! The CRC itself is the standard reflected CRC-32 (polynomial `0xEDB88320`,
//! init `0xFFFFFFFF`, final XOR `0xFFFFFFFF`). The lookup table is computed at
//! compile time.

use std::fmt::Write;

use crate::types::PriceLevel;

/// Number of levels per side covered by the checksum.
pub const CHECKSUM_DEPTH: usize = 10;

/// Fractional digits used for prices in the checksum string.
pub const PRICE_PRECISION: usize = 10;

/// Fractional digits used for quantities in the checksum string.
pub const QUANTITY_PRECISION: usize = 8;

const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Reflected CRC-32 lookup table.
pub const CRC32_TABLE: [u32; 256] = build_crc32_table();

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLYNOMIAL
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Standard table-driven CRC-32 of `bytes`.
#[inline]
pub fn crc32(bytes: &[u8]) -> u32 {
    let crc = bytes.iter().fold(0xFFFF_FFFFu32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
    });
    crc ^ 0xFFFF_FFFF
}

/// Build the checksum input string from asks (best first) and bids (best first).
pub fn format_levels_for_checksum(asks: &[PriceLevel], bids: &[PriceLevel]) -> String {
    let depth = CHECKSUM_DEPTH.min(asks.len()).min(bids.len());

    // 10 + 8 fractional digits, separators and integer part.
    let mut out = String::with_capacity(depth * 2 * 40);
    for level in asks.iter().take(depth).chain(bids.iter().take(depth)) {
        push_level(&mut out, level);
    }
    out
}

#[inline]
fn push_level(out: &mut String, level: &PriceLevel) {
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "{:.price_prec$}{:.qty_prec$}",
        level.price,
        level.quantity,
        price_prec = PRICE_PRECISION,
        qty_prec = QUANTITY_PRECISION,
    );
}

/// CRC-32 of the formatted top of book.
#[inline]
pub fn compute_checksum(asks: &[PriceLevel], bids: &[PriceLevel]) -> u32 {
    crc32(format_levels_for_checksum(asks, bids).as_bytes())
}

/// Compare the local top of book against the exchange checksum.
///
/// A book with an empty side cannot be checked and is reported as valid; the
/// exchange does the same while a subscription is still warming up.
pub fn validate(asks: &[PriceLevel], bids: &[PriceLevel], expected: u32) -> bool {
    if asks.is_empty() || bids.is_empty() {
        return true;
    }
    compute_checksum(asks, bids) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(pairs: &[(f64, f64)]) -> Vec<PriceLevel> {
        pairs.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect()
    }

    #[test]
    fn test_table_known_entries() {
        assert_eq!(CRC32_TABLE[0], 0x0000_0000);
        assert_eq!(CRC32_TABLE[1], 0x7707_3096);
        assert_eq!(CRC32_TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn test_format_exact_output() {
        let asks = levels(&[(100.5, 2.0), (101.0, 4.0)]);
        let bids = levels(&[(100.0, 5.0), (99.5, 3.0)]);
        assert_eq!(
            format_levels_for_checksum(&asks, &bids),
            "100.50000000002.00000000101.00000000004.00000000\
             100.00000000005.0000000099.50000000003.00000000"
        );
    }

    #[test]
    fn test_format_keeps_leading_zero() {
        let asks = levels(&[(0.05005, 0.5)]);
        let bids = levels(&[(0.05, 1.25)]);
        assert_eq!(
            format_levels_for_checksum(&asks, &bids),
            "0.05005000000.500000000.05000000001.25000000"
        );
        assert_eq!(compute_checksum(&asks, &bids), 1_488_305_673);
    }

    #[test]
    fn test_format_truncates_to_shorter_side() {
        let asks = levels(&[(10.0, 1.0), (11.0, 1.0), (12.0, 1.0)]);
        let bids = levels(&[(9.0, 1.0)]);
        assert_eq!(
            format_levels_for_checksum(&asks, &bids),
            "10.00000000001.000000009.00000000001.00000000"
        );
    }

    #[test]
    fn test_format_caps_at_depth() {
        let asks: Vec<_> = (0..15).map(|i| PriceLevel::new(200.0 + i as f64, 1.0)).collect();
        let bids: Vec<_> = (0..15).map(|i| PriceLevel::new(100.0 - i as f64, 1.0)).collect();
        let formatted = format_levels_for_checksum(&asks, &bids);
        assert!(formatted.contains("209.0000000000"));
        assert!(!formatted.contains("210.0000000000"));
        assert!(formatted.contains("91.0000000000"));
        assert!(!formatted.contains("90.0000000000"));
    }

    #[test]
    fn test_known_vectors() {
        let asks = levels(&[(100.5, 2.0), (101.0, 4.0)]);
        let bids = levels(&[(100.0, 5.0), (99.5, 3.0)]);
        assert_eq!(compute_checksum(&asks, &bids), 3_164_300_868);

        let asks = levels(&[(45285.2, 0.001), (45286.4, 1.54582015), (45286.6, 1.54571953)]);
        let bids = levels(&[(45283.5, 0.01), (45283.4, 1.54582015), (45282.1, 0.001)]);
        assert_eq!(compute_checksum(&asks, &bids), 1_037_897_802);
        assert!(validate(&asks, &bids, 1_037_897_802));
        assert!(!validate(&asks, &bids, 1_037_897_803));
    }

    #[test]
    fn test_empty_side_is_trivially_valid() {
        let asks = levels(&[(100.5, 2.0)]);
        assert!(validate(&asks, &[], 12345));
        assert!(validate(&[], &asks, 0));
        assert!(validate(&[], &[], 999));
    }
}
