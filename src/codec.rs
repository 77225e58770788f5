//! Payload codec - hex, bit and byte conversions for captured frames
//!
//! Captures travel through the bench as hex strings (one per line in capture
//! files and scan logs). Before transmission they are expanded to bits and
//! packed back into bytes for the radio.

use thiserror::Error;
use tracing::debug;

/// Runs of this many (or more) '0' digits delimit frames in a capture
const ZERO_RUN_DELIMITER: usize = 4;

/// Fragments of this length or shorter are treated as noise
const MIN_FRAGMENT_LEN: usize = 5;

/// Codec error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid hex digit '{0}' in payload")]
    InvalidHex(char),

    #[error("invalid symbol '{0}' in bit string")]
    InvalidSymbol(char),

    #[error("empty payload")]
    Empty,
}

/// Parse a hex payload into bits, four per hex digit, most significant first
///
/// Leading zero digits are kept so that packing the bits again reproduces the
/// exact payload bytes.
pub fn hex_to_bits(hex: &str) -> Result<Vec<bool>, CodecError> {
    let hex = hex.trim();
    if hex.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut bits = Vec::with_capacity(hex.len() * 4);
    for c in hex.chars() {
        let nibble = c.to_digit(16).ok_or(CodecError::InvalidHex(c))?;
        for shift in (0..4).rev() {
            bits.push((nibble >> shift) & 1 == 1);
        }
    }
    Ok(bits)
}

/// Parse a hex payload as an unsigned integer and return its binary digits
/// without a fixed width (leading zero bits are dropped, zero is a single bit)
pub fn hex_to_bits_minimal(hex: &str) -> Result<Vec<bool>, CodecError> {
    let bits = hex_to_bits(hex)?;
    match bits.iter().position(|&bit| bit) {
        Some(first_one) => Ok(bits[first_one..].to_vec()),
        None => Ok(vec![false]),
    }
}

/// Pack bits into bytes, most significant bit first, zero-padding the last
/// byte on the right
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, bit)| if *bit { byte | (0x80 >> i) } else { byte })
        })
        .collect()
}

/// Read a string of '0'/'1' symbols (a binary de Bruijn sequence) as bits
pub fn bits_from_symbols(symbols: &str) -> Result<Vec<bool>, CodecError> {
    if symbols.is_empty() {
        return Err(CodecError::Empty);
    }
    symbols
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(CodecError::InvalidSymbol(other)),
        })
        .collect()
}

/// Decode a hex capture into the bytes handed to the transmitter
pub fn payload_to_bytes(hex: &str) -> Result<Vec<u8>, CodecError> {
    Ok(bits_to_bytes(&hex_to_bits(hex)?))
}

/// Decode a batch of hex captures for transmission
pub fn payloads_to_bytes<S: AsRef<str>>(payloads: &[S]) -> Result<Vec<Vec<u8>>, CodecError> {
    payloads
        .iter()
        .map(|payload| payload_to_bytes(payload.as_ref()))
        .collect()
}

/// Split a hex capture on runs of four or more '0' digits and drop
/// fragments that are too short to be a frame
pub fn split_by_zero_run(capture: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut zeros = 0usize;

    for c in capture.chars() {
        if c == '0' {
            zeros += 1;
            continue;
        }

        if zeros >= ZERO_RUN_DELIMITER {
            fragments.push(std::mem::take(&mut current));
        } else {
            current.extend(std::iter::repeat('0').take(zeros));
        }
        zeros = 0;
        current.push(c);
    }

    if zeros < ZERO_RUN_DELIMITER {
        current.extend(std::iter::repeat('0').take(zeros));
    }
    fragments.push(current);

    fragments.retain(|fragment| fragment.len() > MIN_FRAGMENT_LEN);
    fragments
}

/// Render a hex payload as `\xNN` escapes for display
///
/// Odd-length payloads cannot be paired into bytes and render as an empty
/// string.
pub fn format_hex_with_escapes(payload: &str) -> String {
    if payload.len() % 2 != 0 {
        debug!("Skipping odd-length payload for display: {}", payload);
        return String::new();
    }

    let mut formatted = String::with_capacity(payload.len() * 2);
    let mut digits = payload.chars();
    while let (Some(high), Some(low)) = (digits.next(), digits.next()) {
        formatted.push_str("\\x");
        formatted.push(high);
        formatted.push(low);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_bits_keeps_leading_zeros() {
        let bits = hex_to_bits("0A").unwrap();
        assert_eq!(bits, vec![false, false, false, false, true, false, true, false]);
    }

    #[test]
    fn test_hex_to_bits_minimal_drops_leading_zeros() {
        assert_eq!(hex_to_bits_minimal("0A").unwrap(), vec![true, false, true, false]);
        assert_eq!(hex_to_bits_minimal("0000").unwrap(), vec![false]);
    }

    #[test]
    fn test_hex_to_bits_rejects_garbage() {
        assert_eq!(hex_to_bits("12G4"), Err(CodecError::InvalidHex('G')));
        assert_eq!(hex_to_bits("  "), Err(CodecError::Empty));
    }

    #[test]
    fn test_bits_to_bytes_pads_right() {
        assert_eq!(bits_to_bytes(&[true, false, true]), vec![0xA0]);
        assert_eq!(
            bits_to_bytes(&[true, true, true, true, true, true, true, true, true]),
            vec![0xFF, 0x80]
        );
        assert!(bits_to_bytes(&[]).is_empty());
    }

    #[test]
    fn test_payload_matches_direct_hex_decode() {
        for hex in ["00", "0f", "8D4840D6202CC371C32CE0576098", "000000ff10", "ffffaaaa5555"] {
            let direct = hex::decode(hex).unwrap();
            let packed = bits_to_bytes(&hex_to_bits(hex).unwrap());
            assert_eq!(packed, direct, "payload {}", hex);
        }
    }

    #[test]
    fn test_payloads_to_bytes_stops_on_bad_line() {
        let ok = payloads_to_bytes(&["a1b2", "ffee"]).unwrap();
        assert_eq!(ok, vec![vec![0xA1, 0xB2], vec![0xFF, 0xEE]]);
        assert!(payloads_to_bytes(&["a1b2", "zz"]).is_err());
    }

    #[test]
    fn test_bits_from_symbols() {
        assert_eq!(bits_from_symbols("0110").unwrap(), vec![false, true, true, false]);
        assert_eq!(bits_from_symbols("012"), Err(CodecError::InvalidSymbol('2')));
    }

    #[test]
    fn test_split_by_zero_run_drops_short_fragments() {
        // Fragments "1010", "1111", "1011" are all sub-threshold
        assert!(split_by_zero_run("10100000111100001011").is_empty());
    }

    #[test]
    fn test_split_by_zero_run_keeps_frames() {
        let fragments = split_by_zero_run("ABCDEF0000123456000000FEDCBA98");
        assert_eq!(fragments, vec!["ABCDEF", "123456", "FEDCBA98"]);
    }

    #[test]
    fn test_split_by_zero_run_short_runs_stay_inside() {
        let fragments = split_by_zero_run("00000ABC000DEF0000");
        assert_eq!(fragments, vec!["ABC000DEF"]);
    }

    #[test]
    fn test_format_hex_with_escapes() {
        assert_eq!(format_hex_with_escapes("a1b2ff"), "\\xa1\\xb2\\xff");
        assert_eq!(format_hex_with_escapes("abc"), "");
        assert_eq!(format_hex_with_escapes(""), "");
    }
}
