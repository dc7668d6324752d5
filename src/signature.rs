//! Turning decoded `(r, s)` values into checked secp256k1 signatures.
//!
//! The lax decoder only extracts bytes. Range validation against the curve
//! order, low-S normalisation and verification are delegated to `k256` here.
use ecdsa::signature::hazmat::PrehashVerifier;
use elliptic_curve::bigint::{Encoding, U256};
use k256::{
    ecdsa::{Signature, VerifyingKey},
    PublicKey,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeGreater;
use thiserror::Error;

use crate::context::Secp256k1Context;
use crate::lax_der::{parse_lax_der, LaxDerError};

/// Width of one signature integer.
pub const SCALAR_LEN: usize = 32;
/// Width of a compact `r || s` signature.
pub const COMPACT_LEN: usize = 2 * SCALAR_LEN;

/// Errors turning bytes into a usable signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error(transparent)]
    Decode(#[from] LaxDerError),
    /// `r` or `s` is zero or not below the curve order.
    #[error("signature value out of range")]
    OutOfRange,
}

/// The two 32 byte big-endian integers of an ECDSA signature.
///
/// No range check has been applied; use [`signature`] for that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureValues {
    #[serde(with = "hex")]
    r: [u8; SCALAR_LEN],
    #[serde(with = "hex")]
    s: [u8; SCALAR_LEN],
}

impl SignatureValues {
    pub fn new(r: [u8; SCALAR_LEN], s: [u8; SCALAR_LEN]) -> Self {
        Self { r, s }
    }

    pub fn r(&self) -> &[u8; SCALAR_LEN] {
        &self.r
    }

    pub fn s(&self) -> &[u8; SCALAR_LEN] {
        &self.s
    }

    /// Splits a compact `r || s` encoding.
    pub fn from_compact(bytes: &[u8; COMPACT_LEN]) -> Self {
        let mut r = [0u8; SCALAR_LEN];
        let mut s = [0u8; SCALAR_LEN];
        let (r_bytes, s_bytes) = bytes.split_at(SCALAR_LEN);
        r.copy_from_slice(r_bytes);
        s.copy_from_slice(s_bytes);
        Self { r, s }
    }

    /// The compact `r || s` encoding.
    pub fn to_compact(&self) -> [u8; COMPACT_LEN] {
        let mut out = [0u8; COMPACT_LEN];
        let (r, s) = out.split_at_mut(SCALAR_LEN);
        r.copy_from_slice(&self.r);
        s.copy_from_slice(&self.s);
        out
    }
}

impl From<&Signature> for SignatureValues {
    fn from(sig: &Signature) -> Self {
        let (r, s) = sig.split_bytes();
        Self::new(r.into(), s.into())
    }
}

impl std::fmt::Debug for SignatureValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValues")
            .field("r", &hex::encode(self.r))
            .field("s", &hex::encode(self.s))
            .finish()
    }
}

impl std::fmt::Display for SignatureValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.to_compact()))
    }
}

/// Range checks `values` against the curve order and builds a signature.
pub fn signature(
    _ctx: &Secp256k1Context,
    values: &SignatureValues,
) -> Result<Signature, SignatureError> {
    Signature::from_scalars(values.r, values.s).map_err(|_| SignatureError::OutOfRange)
}

/// Whether `s` lies in the lower half of the curve order.
pub fn is_low_s(ctx: &Secp256k1Context, values: &SignatureValues) -> bool {
    let s = U256::from_be_bytes(values.s);
    !bool::from(s.ct_gt(ctx.half_order()))
}

/// Range checks `values` and moves `s` into the lower half of the order.
pub fn normalize(
    ctx: &Secp256k1Context,
    values: &SignatureValues,
) -> Result<Signature, SignatureError> {
    let sig = signature(ctx, values)?;
    Ok(sig.normalize_s().unwrap_or(sig))
}

/// Decodes `der` laxly and re-encodes the normalised signature as strict DER.
pub fn reencode_der(ctx: &Secp256k1Context, der: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let values = parse_lax_der(ctx, der)?;
    let sig = normalize(ctx, &values)?;
    Ok(sig.to_der().as_bytes().to_vec())
}

/// Verifies a laxly encoded signature over a 32 byte message hash.
///
/// The signature is normalised to low-S before verification, so both
/// malleated forms of a signature verify.
pub fn verify_lax(
    ctx: &Secp256k1Context,
    der: &[u8],
    prehash: &[u8; 32],
    public_key: &PublicKey,
) -> bool {
    let sig = match parse_lax_der(ctx, der)
        .map_err(SignatureError::from)
        .and_then(|values| normalize(ctx, &values))
    {
        Ok(sig) => sig,
        Err(err) => {
            tracing::trace!(%err, "signature rejected before verification");
            return false;
        }
    };
    VerifyingKey::from(public_key)
        .verify_prehash(prehash, &sig)
        .is_ok()
}
