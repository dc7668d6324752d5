//! Strict DER signature encoding check.
//!
//! A canonical signature is `0x30 len 0x02 lenR R 0x02 lenS S` where the
//! lengths exactly cover the input, neither integer is empty or negative, and
//! neither starts with a zero byte unless the following byte has its high bit
//! set. This is the consensus rule introduced by BIP66.
use crate::lax_der::{INTEGER_TAG, SEQUENCE_TAG};

/// Shortest strict encoding: two one-byte integers.
pub const STRICT_DER_MIN_LEN: usize = 8;
/// Longest strict encoding: two 33 byte integers.
pub const STRICT_DER_MAX_LEN: usize = 72;

/// Returns true when `sig` is a strictly canonical DER signature.
pub fn is_strict_der(sig: &[u8]) -> bool {
    if !(STRICT_DER_MIN_LEN..=STRICT_DER_MAX_LEN).contains(&sig.len()) {
        return false;
    }
    let byte = |i: usize| sig.get(i).copied().unwrap_or_default();

    if byte(0) != SEQUENCE_TAG || usize::from(byte(1)) != sig.len() - 2 {
        return false;
    }

    let len_r = usize::from(byte(3));
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = usize::from(byte(5 + len_r));
    if len_r + len_s + 6 != sig.len() {
        return false;
    }

    is_strict_integer(sig, 2) && is_strict_integer(sig, 4 + len_r)
}

/// Checks the INTEGER whose tag is at `tag_pos`.
fn is_strict_integer(sig: &[u8], tag_pos: usize) -> bool {
    let byte = |i: usize| sig.get(i).copied();
    let (Some(tag), Some(len)) = (byte(tag_pos), byte(tag_pos + 1)) else {
        return false;
    };
    if tag != INTEGER_TAG || len == 0 {
        return false;
    }
    let Some(first) = byte(tag_pos + 2) else {
        return false;
    };
    if first & 0x80 != 0 {
        return false;
    }
    match byte(tag_pos + 3) {
        Some(second) if len > 1 && first == 0 => second & 0x80 != 0,
        _ => true,
    }
}
