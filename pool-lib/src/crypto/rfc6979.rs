//!
//! Deterministic nonces following RFC 6979 with HMAC-SHA256.
//!
//! The generator yields the successive candidates of section 3.2 step h, so a
//! signer that can't use a nonce simply asks for the next one.
//!

use bitcoin::hashes::{sha256, Hash, HashEngine, Hmac, HmacEngine};
use bitcoin::secp256k1::SecretKey;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::crypto::curve::N;
use crate::util::to_bytes32;


fn hmac(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
	let mut engine = HmacEngine::<sha256::Hash>::new(key);
	for part in parts {
		engine.input(part);
	}
	Hmac::from_engine(engine).to_byte_array()
}

/// Iterator over the RFC 6979 nonce candidates for a key and message hash.
///
/// Every yielded value is in `[1, n-1]`. The iterator never ends.
pub struct NonceGenerator {
	k: [u8; 32],
	v: [u8; 32],
	started: bool,
}

impl NonceGenerator {
	pub fn new(secret: &SecretKey, hash: &[u8; 32]) -> NonceGenerator {
		// bits2octets: reduce the hash modulo n once
		let mut z = BigUint::from_bytes_be(hash);
		if z >= *N {
			z -= &*N;
		}
		let z = to_bytes32(&z);
		let x = secret.secret_bytes();

		let mut k = [0x00; 32];
		let mut v = [0x01; 32];
		k = hmac(&k, &[&v, &[0x00], &x, &z]);
		v = hmac(&k, &[&v]);
		k = hmac(&k, &[&v, &[0x01], &x, &z]);
		v = hmac(&k, &[&v]);

		NonceGenerator { k, v, started: false }
	}

	/// Produce the next nonce candidate.
	pub fn next_nonce(&mut self) -> BigUint {
		if self.started {
			self.reseed();
		}
		self.started = true;

		loop {
			self.v = hmac(&self.k, &[&self.v]);
			let t = BigUint::from_bytes_be(&self.v);
			if !t.is_zero() && t < *N {
				return t;
			}
			self.reseed();
		}
	}

	fn reseed(&mut self) {
		self.k = hmac(&self.k, &[&self.v, &[0x00]]);
		self.v = hmac(&self.k, &[&self.v]);
	}
}

impl Iterator for NonceGenerator {
	type Item = BigUint;

	fn next(&mut self) -> Option<BigUint> {
		Some(self.next_nonce())
	}
}

/// The first RFC 6979 nonce for the given key and message hash.
pub fn deterministic_nonce(secret: &SecretKey, hash: &[u8; 32]) -> BigUint {
	NonceGenerator::new(secret, hash).next_nonce()
}


#[cfg(test)]
mod test {
	use super::*;

	use std::str::FromStr;

	use bitcoin::hex::DisplayHex;
	use rand::{Rng, SeedableRng};

	fn key(hex: &str) -> SecretKey {
		SecretKey::from_str(hex).unwrap()
	}

	fn nonce_hex(secret: &SecretKey, msg: &str) -> String {
		let hash = sha256::Hash::hash(msg.as_bytes()).to_byte_array();
		to_bytes32(&deterministic_nonce(secret, &hash)).as_hex().to_string()
	}

	#[test]
	fn known_answers() {
		let one = key("0000000000000000000000000000000000000000000000000000000000000001");
		assert_eq!(nonce_hex(&one, "Satoshi Nakamoto"),
			"8f8a276c19f4149656b280621e358cce24f5f52542772691ee69063b74f15d15",
		);
		assert_eq!(
			nonce_hex(&one, "All those moments will be lost in time, like tears in rain. Time to die..."),
			"38aa22d72376b4dbc472e06c3ba403ee0a394da63fc58d88686c611aba98d6b3",
		);

		let max = key("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140");
		assert_eq!(nonce_hex(&max, "Satoshi Nakamoto"),
			"33a19b60e25fb6f4435af53a3d42d493644827367e6453928554f43e49aa6f90",
		);
	}

	#[test]
	fn deterministic_and_sensitive() {
		let mut rng = rand::rngs::SmallRng::seed_from_u64(6979);
		for _ in 0..20 {
			let secret = SecretKey::from_slice(&rng.random::<[u8; 32]>()).unwrap();
			let mut hash = rng.random::<[u8; 32]>();

			let k = deterministic_nonce(&secret, &hash);
			assert_eq!(k, deterministic_nonce(&secret, &hash));
			assert!(k < *N);

			hash[rng.random_range(0..32)] ^= 1u8 << rng.random_range(0..8u32);
			assert_ne!(k, deterministic_nonce(&secret, &hash));
		}
	}

	#[test]
	fn successive_candidates_differ() {
		let secret = key("0000000000000000000000000000000000000000000000000000000000000001");
		let hash = [0x42; 32];
		let mut nonces = NonceGenerator::new(&secret, &hash);
		let first = nonces.next_nonce();
		assert_eq!(first, deterministic_nonce(&secret, &hash));
		let rest = nonces.take(3).collect::<Vec<_>>();
		assert!(rest.iter().all(|k| *k != first));
		assert_ne!(rest[0], rest[1]);
	}

	#[test]
	fn hash_above_order_is_reduced() {
		let secret = key("0000000000000000000000000000000000000000000000000000000000000001");
		let big = [0xff; 32];
		let reduced = to_bytes32(&(BigUint::from_bytes_be(&big) - &*N));
		assert_eq!(deterministic_nonce(&secret, &big), deterministic_nonce(&secret, &reduced));
	}
}
