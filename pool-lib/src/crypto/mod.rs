//!
//! The signature engine.
//!
//! A self-contained ECDSA implementation over secp256k1 whose nonces and
//! signatures are byte-identical to those of any other RFC 6979 signer.
//!

pub mod curve;
pub mod der;
pub mod ecdsa;
pub mod rfc6979;

pub use self::ecdsa::{public_key, sign, sign_with_nonce, verify, Signature};
pub use self::rfc6979::{deterministic_nonce, NonceGenerator};
