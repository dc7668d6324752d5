//! Combining public keys under the secp256k1 group law.
use elliptic_curve::{
    sec1::{FromEncodedPoint, Tag},
    Group,
};
use k256::{EncodedPoint, ProjectivePoint, PublicKey};
use thiserror::Error;

use crate::context::Secp256k1Context;

/// Errors returned when combining or parsing public keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CombineError {
    /// The sum is the point at infinity, which is not a public key.
    #[error("combined key is the point at infinity")]
    PointAtInfinity,
    /// Nothing to combine.
    #[error("no public keys given")]
    NoKeys,
    /// The bytes do not encode a point on the curve.
    #[error("invalid public key encoding")]
    InvalidPoint,
}

/// Returns `a + b`.
pub fn combine_pubkeys(
    _ctx: &Secp256k1Context,
    a: &PublicKey,
    b: &PublicKey,
) -> Result<PublicKey, CombineError> {
    to_public_key(a.to_projective() + b.to_projective())
}

/// Returns the sum of all `keys`.
pub fn combine_all(
    _ctx: &Secp256k1Context,
    keys: &[PublicKey],
) -> Result<PublicKey, CombineError> {
    if keys.is_empty() {
        return Err(CombineError::NoKeys);
    }
    to_public_key(keys.iter().map(PublicKey::to_projective).sum())
}

fn to_public_key(sum: ProjectivePoint) -> Result<PublicKey, CombineError> {
    if bool::from(sum.is_identity()) {
        tracing::trace!("public keys sum to the identity");
        return Err(CombineError::PointAtInfinity);
    }
    PublicKey::from_affine(sum.to_affine()).map_err(|_| CombineError::PointAtInfinity)
}

/// Parses a SEC1 compressed or uncompressed public key.
pub fn parse_public_key(
    _ctx: &Secp256k1Context,
    sec1: &[u8],
) -> Result<PublicKey, CombineError> {
    let point = EncodedPoint::from_bytes(sec1).map_err(|_| CombineError::InvalidPoint)?;
    if matches!(point.tag(), Tag::Compact | Tag::Identity) {
        return Err(CombineError::InvalidPoint);
    }
    Option::from(PublicKey::from_encoded_point(&point)).ok_or(CombineError::InvalidPoint)
}
