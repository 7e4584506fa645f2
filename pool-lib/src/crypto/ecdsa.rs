
use bitcoin::secp256k1::{PublicKey, SecretKey};
use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::PoolError;
use crate::crypto::curve::{self, AffinePoint, HALF_N, N};
use crate::crypto::rfc6979::NonceGenerator;


/// An ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
	pub r: BigUint,
	pub s: BigUint,
}

impl Signature {
	pub fn new(r: BigUint, s: BigUint) -> Signature {
		Signature { r, s }
	}

	/// Whether `s` is in the lower half of the group order.
	pub fn is_low_s(&self) -> bool {
		self.s <= *HALF_N
	}
}

fn secret_scalar(secret: &SecretKey) -> BigUint {
	BigUint::from_bytes_be(&secret.secret_bytes())
}

/// Derive the public key of a secret key.
pub fn public_key(secret: &SecretKey) -> PublicKey {
	curve::mul_base(&secret_scalar(secret))
		.expect("secret keys are never zero modulo n")
		.to_public_key()
}

/// Sign with an explicitly given nonce `k`.
///
/// Fails with [PoolError::InvalidNonce] when `k` is out of range or produces a
/// zero `r` or `s`. The returned `s` is always in the lower half of the order.
pub fn sign_with_nonce(
	secret: &SecretKey,
	hash: &[u8; 32],
	k: &BigUint,
) -> Result<Signature, PoolError> {
	let n = &*N;
	if k.is_zero() || k >= n {
		return Err(PoolError::InvalidNonce);
	}

	let point = curve::mul_base(k).ok_or(PoolError::InvalidNonce)?;
	let r = point.x() % n;
	if r.is_zero() {
		return Err(PoolError::InvalidNonce);
	}

	let z = BigUint::from_bytes_be(hash);
	let k_inv = curve::inv_mod(k, n).ok_or(PoolError::InvalidNonce)?;
	let mut s = k_inv * ((z + &r * secret_scalar(secret)) % n) % n;
	if s.is_zero() {
		return Err(PoolError::InvalidNonce);
	}
	if s > *HALF_N {
		s = n - s;
	}
	Ok(Signature { r, s })
}

/// Sign a message hash using RFC 6979 nonces.
///
/// In the negligible case that a nonce gives a zero `r` or `s`, the next
/// candidate of the nonce generator is used.
pub fn sign(secret: &SecretKey, hash: &[u8; 32]) -> Signature {
	let mut nonces = NonceGenerator::new(secret, hash);
	loop {
		let k = nonces.next_nonce();
		match sign_with_nonce(secret, hash, &k) {
			Ok(sig) => return sig,
			Err(e) => debug!("Discarding nonce candidate: {}", e),
		}
	}
}

/// Check an ECDSA signature.
///
/// Both low and high `s` values are accepted. Never panics, any malformed
/// input simply doesn't verify.
pub fn verify(pubkey: &PublicKey, hash: &[u8; 32], sig: &Signature) -> bool {
	let n = &*N;
	if sig.r.is_zero() || sig.r >= *n || sig.s.is_zero() || sig.s >= *n {
		return false;
	}

	let w = match curve::inv_mod(&sig.s, n) {
		Some(w) => w,
		None => return false,
	};
	let z = BigUint::from_bytes_be(hash);
	let u1 = z * &w % n;
	let u2 = &sig.r * &w % n;

	let q = Some(AffinePoint::from_public_key(pubkey));
	match curve::add(&curve::mul_base(&u1), &curve::mul(&u2, &q)) {
		Some(point) => point.x() % n == sig.r,
		None => false,
	}
}
