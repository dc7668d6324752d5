//! Process-wide secp256k1 context.
//!
//! Every public operation of this crate takes a [`Secp256k1Context`]. The
//! context is immutable once built, so a single instance can be shared by any
//! number of threads without locking. Most callers should use
//! [`get_context`], which builds the shared instance on first use.
use std::sync::OnceLock;

use elliptic_curve::{bigint::U256, Curve};
use k256::{AffinePoint, ProjectivePoint, Secp256k1};

use crate::lax_der::LaxDerPolicy;

static CONTEXT: OnceLock<Secp256k1Context> = OnceLock::new();

/// Read-only curve parameters and decoding policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Secp256k1Context {
    generator: AffinePoint,
    order: U256,
    half_order: U256,
    lax_der: LaxDerPolicy,
}

impl Secp256k1Context {
    /// Builds a fresh context. Prefer [`get_context`] unless the host wants
    /// to own the context explicitly.
    pub fn new() -> Self {
        let order = Secp256k1::ORDER;
        Self {
            generator: ProjectivePoint::GENERATOR.to_affine(),
            order,
            half_order: order.shr_vartime(1),
            lax_der: LaxDerPolicy::default(),
        }
    }

    /// The curve generator `G`.
    pub fn generator(&self) -> &AffinePoint {
        &self.generator
    }

    /// The group order `n`.
    pub fn order(&self) -> &U256 {
        &self.order
    }

    /// `floor(n / 2)`, the largest low-S value.
    pub fn half_order(&self) -> &U256 {
        &self.half_order
    }

    pub(crate) fn lax_der_policy(&self) -> &LaxDerPolicy {
        &self.lax_der
    }
}

impl Default for Secp256k1Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the shared context, building it on the first call.
///
/// Concurrent first callers block until the single initialisation finishes
/// and then all observe the same instance.
pub fn get_context() -> &'static Secp256k1Context {
    CONTEXT.get_or_init(|| {
        tracing::debug!("initialising shared secp256k1 context");
        Secp256k1Context::new()
    })
}
