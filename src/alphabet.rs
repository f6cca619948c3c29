//! Nucleotide symbol table and 4-bit packing
//!
//! Alignment records store bases as 4-bit codes, two per byte with the
//! first base in the high nibble. The sixteen symbols cover the four
//! nucleotides plus every IUPAC ambiguity code; any symbol outside the
//! table encodes as `N`.

/// The sixteen symbols of the 4-bit alphabet, indexed by code
pub const SYMBOLS: &[u8; 16] = b"=ACMGRSVTWYHKDBN";

/// Code for `N`, used for any symbol outside the alphabet
pub const CODE_N: u8 = 15;

/// Returns the 4-bit code for a nucleotide symbol.
///
/// Case insensitive. Symbols outside the alphabet map to [`CODE_N`].
#[must_use]
pub fn encode_symbol(symbol: u8) -> u8 {
    match symbol.to_ascii_uppercase() {
        b'=' => 0,
        b'A' => 1,
        b'C' => 2,
        b'M' => 3,
        b'G' => 4,
        b'R' => 5,
        b'S' => 6,
        b'V' => 7,
        b'T' => 8,
        b'W' => 9,
        b'Y' => 10,
        b'H' => 11,
        b'K' => 12,
        b'D' => 13,
        b'B' => 14,
        _ => CODE_N,
    }
}

/// Returns the symbol for a 4-bit code (low nibble only).
#[must_use]
pub fn decode_symbol(code: u8) -> u8 {
    SYMBOLS[usize::from(code & 0x0F)]
}

/// Packs ASCII symbols into 4-bit codes, two per byte, high nibble first.
///
/// The last byte of an odd-length sequence carries a zero low nibble.
#[must_use]
pub fn pack(symbols: &[u8]) -> Vec<u8> {
    let mut packed = Vec::with_capacity(symbols.len().div_ceil(2));
    for pair in symbols.chunks(2) {
        let hi = encode_symbol(pair[0]) << 4;
        let lo = if pair.len() == 2 {
            encode_symbol(pair[1])
        } else {
            0
        };
        packed.push(hi | lo);
    }
    packed
}

/// Unpacks `count` symbols from 4-bit codes.
#[must_use]
pub fn unpack(packed: &[u8], count: usize) -> Vec<u8> {
    let mut symbols = Vec::with_capacity(count);
    for index in 0..count {
        let byte = packed[index / 2];
        let code = if index % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        symbols.push(decode_symbol(code));
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Symbol Table Tests ====================

    #[test]
    fn test_symbol_codes_round_trip() {
        for (code, &symbol) in SYMBOLS.iter().enumerate() {
            assert_eq!(encode_symbol(symbol), code as u8);
            assert_eq!(decode_symbol(code as u8), symbol);
        }
    }

    #[test]
    fn test_lowercase_symbols() {
        assert_eq!(encode_symbol(b'a'), 1);
        assert_eq!(encode_symbol(b't'), 8);
    }

    #[test]
    fn test_unsupported_symbol_becomes_n() {
        assert_eq!(encode_symbol(b'X'), CODE_N);
        assert_eq!(encode_symbol(b'.'), CODE_N);
        assert_eq!(decode_symbol(CODE_N), b'N');
    }

    // ==================== Packing Tests ====================

    #[test]
    fn test_pack_even_length() {
        let packed = pack(b"ACGT");
        assert_eq!(packed, vec![0x12, 0x48]);
        assert_eq!(unpack(&packed, 4), b"ACGT");
    }

    #[test]
    fn test_pack_odd_length() {
        let packed = pack(b"ACG");
        assert_eq!(packed, vec![0x12, 0x40]);
        assert_eq!(unpack(&packed, 3), b"ACG");
    }

    #[test]
    fn test_pack_empty() {
        assert!(pack(b"").is_empty());
        assert!(unpack(&[], 0).is_empty());
    }

    #[test]
    fn test_pack_full_alphabet() {
        let packed = pack(SYMBOLS);
        assert_eq!(unpack(&packed, 16).as_slice(), SYMBOLS);
    }
}
