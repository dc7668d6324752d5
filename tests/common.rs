#![allow(dead_code, clippy::missing_panics_doc, clippy::unwrap_used)]

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

/// A random 32 byte value with at least one non-zero byte.
pub fn random_value() -> [u8; 32] {
    let mut value: [u8; 32] = rand::thread_rng().gen();
    value[31] |= 1;
    value
}

/// Minimal DER content of an unsigned big-endian integer.
pub fn encode_integer(value: &[u8]) -> Vec<u8> {
    let start = value.iter().position(|b| *b != 0).unwrap_or(value.len() - 1);
    let mut out = Vec::with_capacity(value.len() + 1);
    if value[start] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&value[start..]);
    out
}

/// Wraps two raw INTEGER contents into a short-form DER sequence.
pub fn encode_sequence(r: &[u8], s: &[u8]) -> Vec<u8> {
    let mut body = vec![0x02, u8::try_from(r.len()).unwrap()];
    body.extend_from_slice(r);
    body.extend_from_slice(&[0x02, u8::try_from(s.len()).unwrap()]);
    body.extend_from_slice(s);
    let mut out = vec![0x30, u8::try_from(body.len()).unwrap()];
    out.extend_from_slice(&body);
    out
}

/// Strict DER of the pair `(r, s)`.
pub fn strict_der(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    encode_sequence(&encode_integer(r), &encode_integer(s))
}

pub fn random_signing_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

pub fn message_hash(msg: &[u8]) -> [u8; 32] {
    Sha256::digest(msg).into()
}

/// Signs `prehash` and returns the signature (low-S, as k256 produces).
pub fn sign(key: &SigningKey, prehash: &[u8; 32]) -> Signature {
    key.sign_prehash(prehash).unwrap()
}
