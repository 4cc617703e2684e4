//! Variable-length scalar encoding
//!
//! Unsigned values up to 0x7F take one byte. Larger values are written as
//! a byte holding `256 - n` followed by the `n` significant big-endian
//! bytes. Signed values are folded into unsigned ones (sign in the low
//! bit), floats are written as their byte-reversed bit pattern so that
//! common values with short mantissas stay small.

/// Append an unsigned integer
#[inline]
pub fn write_uint(buf: &mut Vec<u8>, n: u64) {
    if n <= 0x7F {
        buf.push(n as u8);
        return;
    }
    let bytes = n.to_be_bytes();
    let skip = (n.leading_zeros() / 8) as usize;
    let len = bytes.len() - skip;
    buf.push((256 - len) as u8);
    buf.extend_from_slice(&bytes[skip..]);
}

/// Append a signed integer
#[inline]
pub fn write_int(buf: &mut Vec<u8>, n: i64) {
    write_uint(buf, fold_int(n));
}

/// Append a float
#[inline]
pub fn write_float(buf: &mut Vec<u8>, f: f64) {
    write_uint(buf, f.to_bits().swap_bytes());
}

#[inline]
pub const fn fold_int(n: i64) -> u64 {
    if n < 0 {
        ((!n) as u64) << 1 | 1
    } else {
        (n as u64) << 1
    }
}

#[inline]
pub const fn unfold_int(u: u64) -> i64 {
    let half = (u >> 1) as i64;
    if u & 1 != 0 {
        !half
    } else {
        half
    }
}

#[inline]
pub fn float_from_wire(u: u64) -> f64 {
    f64::from_bits(u.swap_bytes())
}

/// Number of payload bytes announced by a length byte, if valid
#[inline]
pub const fn payload_len(first: u8) -> Option<usize> {
    if first <= 0x7F {
        return Some(0);
    }
    let len = 256 - first as usize;
    if len > 8 {
        None
    } else {
        Some(len)
    }
}

/// Assemble a big-endian payload into an integer
#[inline]
pub fn from_be_payload(payload: &[u8]) -> u64 {
    payload.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint_bytes(n: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_uint(&mut buf, n);
        buf
    }

    #[test]
    fn test_small_uint_single_byte() {
        assert_eq!(uint_bytes(0), vec![0]);
        assert_eq!(uint_bytes(127), vec![0x7F]);
    }

    #[test]
    fn test_large_uint_length_prefix() {
        assert_eq!(uint_bytes(128), vec![0xFF, 0x80]);
        assert_eq!(uint_bytes(256), vec![0xFE, 0x01, 0x00]);
        assert_eq!(uint_bytes(u64::MAX).len(), 9);
        assert_eq!(uint_bytes(u64::MAX)[0], 0xF8);
    }

    #[test]
    fn test_int_folding() {
        assert_eq!(fold_int(0), 0);
        assert_eq!(fold_int(-1), 1);
        assert_eq!(fold_int(1), 2);
        assert_eq!(fold_int(-128), 255);
        for n in [0, 1, -1, 127, 128, -128, i64::MIN, i64::MAX] {
            assert_eq!(unfold_int(fold_int(n)), n);
        }
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(payload_len(0x10), Some(0));
        assert_eq!(payload_len(0xFF), Some(1));
        assert_eq!(payload_len(0xF8), Some(8));
        assert_eq!(payload_len(0xF7), None);
        assert_eq!(payload_len(0x80), None);
    }

    #[test]
    fn test_float_wire_form_is_compact_for_simple_values() {
        let mut buf = Vec::new();
        write_float(&mut buf, 1.0);
        // 1.0 = 0x3FF0_0000_0000_0000; reversed, only two bytes are significant
        assert_eq!(buf, vec![0xFE, 0xF0, 0x3F]);
        assert_eq!(float_from_wire(from_be_payload(&buf[1..])), 1.0);
    }
}
