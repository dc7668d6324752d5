//! Lax DER signature decoding and public-key combination on secp256k1.
//!
//! Both entry points take the shared [`Secp256k1Context`] returned by
//! [`get_context`]:
//!
//! - [`parse_lax_der`] extracts `(r, s)` from a not necessarily canonical DER
//!   signature,
//! - [`combine_pubkeys`] adds two public keys and rejects the identity.
pub mod context;
pub mod encoding;
pub mod lax_der;
pub mod pubkey;
pub mod signature;

pub use context::{get_context, Secp256k1Context};
pub use lax_der::{decode_lax_der, parse_lax_der, LaxDerError};
pub use pubkey::{combine_all, combine_pubkeys, CombineError};
pub use signature::{SignatureError, SignatureValues};

pub use k256::PublicKey;
